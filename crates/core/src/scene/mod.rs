use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::VisualiserError;

/// Selects which rendering strategy receives each magnitude snapshot.
///
/// The set is closed: every variant has exactly one handler in
/// [`crate::render`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationMode {
    #[default]
    Bars,
    Circular,
    Waveform,
    Particles,
}

impl VisualizationMode {
    pub const ALL: [VisualizationMode; 4] = [
        VisualizationMode::Bars,
        VisualizationMode::Circular,
        VisualizationMode::Waveform,
        VisualizationMode::Particles,
    ];

    /// Machine-friendly identifier, also accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Bars => "bars",
            Self::Circular => "circular",
            Self::Waveform => "waveform",
            Self::Particles => "particles",
        }
    }

    /// Human readable label suitable for a mode picker.
    pub fn label(self) -> &'static str {
        match self {
            Self::Bars => "Frequency Bars",
            Self::Circular => "Circular Spectrum",
            Self::Waveform => "Waveform",
            Self::Particles => "Particle Field",
        }
    }

    /// The mode after this one, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Self::Bars => Self::Circular,
            Self::Circular => Self::Waveform,
            Self::Waveform => Self::Particles,
            Self::Particles => Self::Bars,
        }
    }
}

impl fmt::Display for VisualizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisualizationMode {
    type Err = VisualiserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| VisualiserError::msg(format!("unknown visualization mode `{s}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!(
            "Circular".parse::<VisualizationMode>().unwrap(),
            VisualizationMode::Circular
        );
        assert_eq!(
            " particles ".parse::<VisualizationMode>().unwrap(),
            VisualizationMode::Particles
        );
    }

    #[test]
    fn rejects_unknown_modes() {
        let err = "spiral".parse::<VisualizationMode>().unwrap_err();
        assert!(format!("{err}").contains("spiral"));
    }

    #[test]
    fn next_cycles_through_every_mode() {
        let mut mode = VisualizationMode::Bars;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(mode, VisualizationMode::Bars);
        assert_eq!(seen, VisualizationMode::ALL.to_vec());
    }

    #[test]
    fn serialises_as_lowercase_name() {
        let json = serde_json::to_string(&VisualizationMode::Waveform).unwrap();
        assert_eq!(json, "\"waveform\"");
        let mode: VisualizationMode = serde_json::from_str("\"bars\"").unwrap();
        assert_eq!(mode, VisualizationMode::Bars);
    }
}
