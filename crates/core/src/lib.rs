//! Core library for the Spectrum Visualiser.
//!
//! A [`Visualiser`] owns one audio session at a time: a processing graph
//! driven by an [`AudioHost`], tapped by an [`AnalyserNode`] whose byte
//! spectrum is polled once per display frame and drawn onto a
//! [`RasterSurface`] by the strategy selected through [`VisualizationMode`].

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod playback;
pub mod record;
pub mod render;
pub mod scene;
pub mod timeline;

pub use analysis::{AnalyserHandle, AnalyserNode};
pub use audio::{
    AudioHost, CpalHost, DemoTone, FileSignal, GraphState, HostStream, ManualHost,
    ProcessingGraph, QuantumContext, RealtimeHost, SignalSource, SourceStatus, RENDER_QUANTUM,
};
pub use config::{AppConfig, AudioConfig, DemoToneConfig, SignalConfig, SurfaceConfig};
pub use error::{Result, VisualiserError};
pub use playback::{
    AudioSession, PlaybackState, Visualiser, VisualiserCommand, VisualiserRemote,
};
pub use record::{FrameRecorder, RecordingSettings};
pub use render::{render_frame, RasterSurface, RenderDispatcher, TickOutcome};
pub use scene::VisualizationMode;
pub use timeline::{FrameRequestId, FrameScheduler, PlaybackClock};
