//! Rendering strategies and the per-tick dispatcher that feeds them.

mod bars;
mod circular;
mod particles;
mod surface;
mod waveform;

use std::time::Duration;

pub use surface::RasterSurface;

use crate::{AnalyserHandle, VisualizationMode};

pub(crate) mod palette {
    pub const GOLD: [u8; 3] = [212, 175, 55];
    pub const LIGHT_GOLD: [u8; 3] = [244, 208, 63];
    pub const BRIGHT_GOLD: [u8; 3] = [255, 215, 0];
}

/// Draws one frame of `snapshot` with the strategy selected by `mode`.
///
/// Every strategy accepts any snapshot length, including zero, and every
/// value range, including all zeros.
pub fn render_frame(
    mode: VisualizationMode,
    snapshot: &[u8],
    surface: &mut RasterSurface,
    timestamp: Duration,
) {
    match mode {
        VisualizationMode::Bars => bars::draw(snapshot, surface),
        VisualizationMode::Circular => circular::draw(snapshot, surface),
        VisualizationMode::Waveform => waveform::draw(snapshot, surface),
        VisualizationMode::Particles => particles::draw(snapshot, surface, timestamp),
    }
}

/// What a single animation tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A snapshot was polled and drawn with this mode.
    Rendered(VisualizationMode),
    /// No surface was attached, so nothing was polled or drawn.
    Skipped,
}

/// Polls the analyser into a reusable buffer and hands it to the current
/// strategy, once per tick.
#[derive(Debug)]
pub struct RenderDispatcher {
    mode: VisualizationMode,
    buffer: Vec<u8>,
    rendered: u64,
    skipped: u64,
}

impl RenderDispatcher {
    pub fn new(mode: VisualizationMode) -> Self {
        Self {
            mode,
            buffer: Vec::new(),
            rendered: 0,
            skipped: 0,
        }
    }

    pub fn mode(&self) -> VisualizationMode {
        self.mode
    }

    /// Takes effect on the next tick.
    pub fn set_mode(&mut self, mode: VisualizationMode) {
        self.mode = mode;
    }

    /// Snapshot drawn by the most recent rendered tick.
    pub fn snapshot(&self) -> &[u8] {
        &self.buffer
    }

    pub fn rendered_ticks(&self) -> u64 {
        self.rendered
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped
    }

    pub fn tick(
        &mut self,
        analyser: &AnalyserHandle,
        surface: Option<&mut RasterSurface>,
        timestamp: Duration,
    ) -> TickOutcome {
        let Some(surface) = surface else {
            self.skipped += 1;
            tracing::trace!("no surface attached, skipping tick");
            return TickOutcome::Skipped;
        };

        let mode = self.mode;
        if self.buffer.len() != analyser.bin_count() {
            self.buffer.resize(analyser.bin_count(), 0);
        }
        analyser.poll(&mut self.buffer);
        render_frame(mode, &self.buffer, surface, timestamp);
        self.rendered += 1;

        TickOutcome::Rendered(mode)
    }
}
