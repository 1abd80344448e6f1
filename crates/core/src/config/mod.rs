use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Result, VisualizationMode, VisualiserError};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub surface: SurfaceConfig,
    pub signal: SignalConfig,
    pub mode: VisualizationMode,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.surface.validate()?;
        self.signal.validate()
    }
}

/// Configuration specific to the audio graph and its analysis tap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Transform size of the analysis node. Snapshots carry half as many bins.
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Master output gain. The analysis tap sits before it.
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            volume: 0.5,
        }
    }
}

impl AudioConfig {
    pub const MIN_FFT_SIZE: usize = 32;
    pub const MAX_FFT_SIZE: usize = 32_768;

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(VisualiserError::InvalidConfig(
                "sample rate must be positive".into(),
            ));
        }
        if !self.fft_size.is_power_of_two()
            || !(Self::MIN_FFT_SIZE..=Self::MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(VisualiserError::InvalidConfig(format!(
                "fft size {} must be a power of two between {} and {}",
                self.fft_size,
                Self::MIN_FFT_SIZE,
                Self::MAX_FFT_SIZE
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(VisualiserError::InvalidConfig(format!(
                "smoothing time constant {} is outside [0, 1]",
                self.smoothing_time_constant
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(VisualiserError::InvalidConfig(format!(
                "min decibels ({}) must be below max decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(VisualiserError::InvalidConfig(format!(
                "volume {} is outside [0, 1]",
                self.volume
            )));
        }
        Ok(())
    }
}

/// Logical size of the drawable surface handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 256,
        }
    }
}

impl SurfaceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(VisualiserError::InvalidConfig(format!(
                "surface {}x{} has no drawable area",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Which signal `play` attaches when the graph has no live source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalConfig {
    Demo(DemoToneConfig),
    File { path: PathBuf },
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self::Demo(DemoToneConfig::default())
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Demo(tone) => tone.validate(),
            Self::File { .. } => Ok(()),
        }
    }
}

/// Parameters of the self-terminating demo sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoToneConfig {
    pub base_hz: f32,
    pub peak_hz: f32,
    /// Length of each ramp leg (up, then back down).
    pub ramp_seconds: f32,
    pub gain: f32,
    pub duration_seconds: f32,
}

impl Default for DemoToneConfig {
    fn default() -> Self {
        Self {
            base_hz: 220.0,
            peak_hz: 880.0,
            ramp_seconds: 2.0,
            gain: 0.1,
            duration_seconds: 10.0,
        }
    }
}

impl DemoToneConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_hz <= 0.0 || self.peak_hz <= 0.0 {
            return Err(VisualiserError::InvalidConfig(
                "demo tone frequencies must be positive".into(),
            ));
        }
        if self.ramp_seconds <= 0.0 || self.duration_seconds <= 0.0 {
            return Err(VisualiserError::InvalidConfig(
                "demo tone timings must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.audio.bin_count(), 128);
        assert_eq!(config.surface, SurfaceConfig { width: 800, height: 256 });
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            AppConfig::from_json(r#"{ "audio": { "fft_size": 512 }, "mode": "waveform" }"#)
                .unwrap();
        assert_eq!(config.audio.bin_count(), 256);
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.mode, VisualizationMode::Waveform);
        assert!(matches!(config.signal, SignalConfig::Demo(_)));
    }

    #[test]
    fn parses_file_signal() {
        let config =
            AppConfig::from_json(r#"{ "signal": { "file": { "path": "song.wav" } } }"#).unwrap();
        match config.signal {
            SignalConfig::File { path } => assert_eq!(path, PathBuf::from("song.wav")),
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[test]
    fn rejects_non_power_of_two_fft() {
        let err = AppConfig::from_json(r#"{ "audio": { "fft_size": 300 } }"#).unwrap_err();
        assert!(matches!(err, VisualiserError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_inverted_decibel_range() {
        let audio = AudioConfig {
            min_decibels: -20.0,
            max_decibels: -30.0,
            ..AudioConfig::default()
        };
        assert!(audio.validate().is_err());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visualiser.json");
        std::fs::write(&path, r#"{ "surface": { "width": 320, "height": 120 } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.surface.width, 320);
        assert_eq!(config.surface.height, 120);
    }
}
