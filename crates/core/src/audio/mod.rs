//! Signal-processing graph: sources are mixed, tapped by the analyser and
//! handed to whatever output the host provides.

mod host;
mod source;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

pub use host::{AudioHost, CpalHost, HostStream, ManualHost, RealtimeHost};
pub use source::{DemoTone, FileSignal, QuantumContext, SignalSource, SourceStatus};

use crate::{AnalyserHandle, AudioConfig, Result, VisualiserError};

/// Number of frames rendered per graph pull.
pub const RENDER_QUANTUM: usize = 128;

/// Lifecycle of the processing graph as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Suspended,
    Running,
    Closed,
}

/// Shared handle to a processing graph.
///
/// The playback controller owns the graph through its session; hosts keep a
/// clone so their rendering thread can pull audio from it.
#[derive(Clone)]
pub struct ProcessingGraph {
    shared: Arc<Mutex<GraphCore>>,
    analyser: AnalyserHandle,
    sample_rate: u32,
}

struct GraphCore {
    state: GraphState,
    frames_rendered: u64,
    sources: Vec<Box<dyn SignalSource>>,
    sources_attached: u64,
    volume: f32,
    mix: Vec<f32>,
}

impl ProcessingGraph {
    /// Creates a suspended graph whose mix feeds `analyser`.
    pub fn new(config: &AudioConfig, analyser: AnalyserHandle) -> Self {
        let core = GraphCore {
            state: GraphState::Suspended,
            frames_rendered: 0,
            sources: Vec::new(),
            sources_attached: 0,
            volume: config.volume,
            mix: Vec::with_capacity(RENDER_QUANTUM),
        };

        Self {
            shared: Arc::new(Mutex::new(core)),
            analyser,
            sample_rate: config.sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn analyser(&self) -> &AnalyserHandle {
        &self.analyser
    }

    pub fn state(&self) -> Result<GraphState> {
        Ok(self.lock()?.state)
    }

    /// Moves the graph into `state`. Closing is permanent.
    pub fn set_state(&self, state: GraphState) -> Result<()> {
        let mut core = self.lock()?;
        if core.state == GraphState::Closed && state != GraphState::Closed {
            return Err(VisualiserError::GraphUnavailable(
                "graph has already been closed".into(),
            ));
        }
        if core.state != state {
            tracing::trace!(from = ?core.state, to = ?state, "graph state change");
        }
        core.state = state;
        if state == GraphState::Closed {
            core.sources.clear();
        }
        Ok(())
    }

    /// Seconds of audio rendered since the graph was created.
    pub fn current_time(&self) -> Result<f64> {
        let core = self.lock()?;
        Ok(core.frames_rendered as f64 / self.sample_rate as f64)
    }

    pub fn frames_rendered(&self) -> Result<u64> {
        Ok(self.lock()?.frames_rendered)
    }

    /// Adds a source to the mix. It starts contributing on the next quantum.
    pub fn connect(&self, source: Box<dyn SignalSource>) -> Result<()> {
        let mut core = self.lock()?;
        if core.state == GraphState::Closed {
            return Err(VisualiserError::GraphUnavailable(
                "cannot connect a source to a closed graph".into(),
            ));
        }
        core.sources.push(source);
        core.sources_attached += 1;
        Ok(())
    }

    /// Sources that have not finished yet.
    pub fn active_sources(&self) -> Result<usize> {
        Ok(self.lock()?.sources.len())
    }

    /// Total number of sources ever connected to this graph.
    pub fn sources_attached(&self) -> Result<u64> {
        Ok(self.lock()?.sources_attached)
    }

    pub fn volume(&self) -> Result<f32> {
        Ok(self.lock()?.volume)
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.lock()?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    /// Renders `output.len()` frames.
    ///
    /// Returns `false` and writes silence when the graph is not running.
    pub fn render_block(&self, output: &mut [f32]) -> Result<bool> {
        let mut core = self.lock()?;
        if core.state != GraphState::Running {
            output.fill(0.0);
            return Ok(false);
        }

        let GraphCore {
            frames_rendered,
            sources,
            volume,
            mix,
            ..
        } = &mut *core;

        mix.clear();
        mix.resize(output.len(), 0.0);

        let context = QuantumContext {
            start_frame: *frames_rendered,
            sample_rate: self.sample_rate,
        };
        sources.retain_mut(|source| {
            source.render(&context, &mut mix[..]) == SourceStatus::Active
        });

        self.analyser.push_samples(mix);

        for (out, sample) in output.iter_mut().zip(mix.iter()) {
            *out = sample * *volume;
        }
        *frames_rendered += output.len() as u64;

        Ok(true)
    }

    fn lock(&self) -> Result<MutexGuard<'_, GraphCore>> {
        self.shared
            .lock()
            .map_err(|_| VisualiserError::msg("processing graph has been poisoned"))
    }
}

impl fmt::Debug for ProcessingGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingGraph")
            .field("sample_rate", &self.sample_rate)
            .field("analyser", &self.analyser)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnalyserNode, DemoToneConfig};

    fn build_graph() -> ProcessingGraph {
        let config = AudioConfig::default();
        let analyser = AnalyserHandle::new(AnalyserNode::new(&config).unwrap());
        ProcessingGraph::new(&config, analyser)
    }

    fn demo_tone(graph: &ProcessingGraph) -> Box<dyn SignalSource> {
        let start = graph.current_time().unwrap();
        Box::new(DemoTone::new(&DemoToneConfig::default(), start))
    }

    #[test]
    fn suspended_graph_renders_silence() {
        let graph = build_graph();
        graph.connect(demo_tone(&graph)).unwrap();

        let mut block = [1.0_f32; RENDER_QUANTUM];
        assert!(!graph.render_block(&mut block).unwrap());
        assert!(block.iter().all(|sample| *sample == 0.0));
        assert_eq!(graph.frames_rendered().unwrap(), 0);
    }

    #[test]
    fn running_graph_mixes_sources_and_applies_volume() {
        let graph = build_graph();
        graph.connect(demo_tone(&graph)).unwrap();
        graph.set_state(GraphState::Running).unwrap();
        graph.set_volume(1.0).unwrap();

        let mut block = [0.0_f32; RENDER_QUANTUM];
        assert!(graph.render_block(&mut block).unwrap());
        let peak = block.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
        assert!(peak > 0.0 && peak <= 0.1 + f32::EPSILON);
        assert_eq!(graph.frames_rendered().unwrap(), RENDER_QUANTUM as u64);
    }

    #[test]
    fn volume_does_not_reach_the_analyser() {
        let graph = build_graph();
        graph.connect(demo_tone(&graph)).unwrap();
        graph.set_state(GraphState::Running).unwrap();
        graph.set_volume(0.0).unwrap();

        let mut block = [0.0_f32; RENDER_QUANTUM];
        for _ in 0..4 {
            graph.render_block(&mut block).unwrap();
        }
        assert!(block.iter().all(|sample| *sample == 0.0));

        let mut snapshot = vec![0u8; graph.analyser().bin_count()];
        graph.analyser().poll(&mut snapshot);
        assert!(snapshot.iter().any(|value| *value > 0));
    }

    #[test]
    fn finished_sources_leave_the_graph() {
        let graph = build_graph();
        let config = DemoToneConfig {
            duration_seconds: 0.001,
            ..DemoToneConfig::default()
        };
        graph.connect(Box::new(DemoTone::new(&config, 0.0))).unwrap();
        graph.set_state(GraphState::Running).unwrap();

        let mut block = [0.0_f32; RENDER_QUANTUM];
        graph.render_block(&mut block).unwrap();
        assert_eq!(graph.active_sources().unwrap(), 0);
        assert_eq!(graph.sources_attached().unwrap(), 1);
    }

    #[test]
    fn closed_graph_cannot_be_reopened() {
        let graph = build_graph();
        graph.set_state(GraphState::Closed).unwrap();
        assert!(graph.set_state(GraphState::Running).is_err());
        assert!(graph.connect(demo_tone(&graph)).is_err());
    }
}
