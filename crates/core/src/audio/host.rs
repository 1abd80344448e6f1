use std::{
    fmt,
    sync::{
        mpsc::{self, Receiver, Sender, SyncSender},
        Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::{GraphState, ProcessingGraph, RENDER_QUANTUM};
use crate::{Result, VisualiserError};

/// How often a suspended render thread checks for a state change.
const SUSPENDED_POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Falling further behind than this many quanta drops the backlog instead of
/// rendering it in a burst.
const MAX_RENDER_LAG_QUANTA: u32 = 8;

/// The platform that executes processing graphs.
pub trait AudioHost: Send {
    /// Attaches `graph` to an output. Fails when the platform refuses to
    /// construct the audio pipeline.
    fn open(&mut self, graph: ProcessingGraph) -> Result<Box<dyn HostStream>>;
}

/// Output attached to one graph.
pub trait HostStream: Send {
    /// Returns once the graph is running.
    fn resume(&mut self) -> Result<()>;
    fn suspend(&mut self) -> Result<()>;
    /// Releases the output. The graph cannot be resumed afterwards.
    fn close(&mut self);
}

/// Host that renders every graph on a dedicated thread paced by the wall
/// clock and discards the output. Used when no output device is available.
#[derive(Debug, Default)]
pub struct RealtimeHost;

impl RealtimeHost {
    pub fn new() -> Self {
        Self
    }
}

impl AudioHost for RealtimeHost {
    fn open(&mut self, graph: ProcessingGraph) -> Result<Box<dyn HostStream>> {
        let worker = graph.clone();
        let thread = thread::Builder::new()
            .name("audio-render".into())
            .spawn(move || run_render_thread(worker))
            .map_err(|err| {
                VisualiserError::GraphUnavailable(format!("failed to spawn render thread: {err}"))
            })?;

        Ok(Box::new(RealtimeStream {
            graph,
            thread: Some(thread),
        }))
    }
}

struct RealtimeStream {
    graph: ProcessingGraph,
    thread: Option<JoinHandle<()>>,
}

impl HostStream for RealtimeStream {
    fn resume(&mut self) -> Result<()> {
        if self.thread.as_ref().map_or(true, |thread| thread.is_finished()) {
            return Err(VisualiserError::GraphUnavailable(
                "render thread is no longer running".into(),
            ));
        }
        self.graph.set_state(GraphState::Running)
    }

    fn suspend(&mut self) -> Result<()> {
        self.graph.set_state(GraphState::Suspended)
    }

    fn close(&mut self) {
        if let Err(err) = self.graph.set_state(GraphState::Closed) {
            tracing::warn!(%err, "failed to close processing graph");
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("audio render thread panicked");
            }
        }
    }
}

impl Drop for RealtimeStream {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_render_thread(graph: ProcessingGraph) {
    let quantum = Duration::from_secs_f64(RENDER_QUANTUM as f64 / f64::from(graph.sample_rate()));
    let mut block = vec![0.0_f32; RENDER_QUANTUM];
    let mut deadline = Instant::now();

    tracing::debug!(sample_rate = graph.sample_rate(), "audio render thread started");

    loop {
        match graph.state() {
            Ok(GraphState::Running) => {}
            Ok(GraphState::Suspended) => {
                thread::sleep(SUSPENDED_POLL_INTERVAL);
                deadline = Instant::now();
                continue;
            }
            Ok(GraphState::Closed) => break,
            Err(err) => {
                tracing::warn!(%err, "stopping audio render thread");
                break;
            }
        }

        if let Err(err) = graph.render_block(&mut block) {
            tracing::warn!(%err, "stopping audio render thread");
            break;
        }

        deadline += quantum;
        let now = Instant::now();
        if deadline > now {
            thread::sleep(deadline - now);
        } else if now - deadline > quantum * MAX_RENDER_LAG_QUANTA {
            deadline = now;
        }
    }

    tracing::debug!("audio render thread stopped");
}

/// Host that plays every graph through the default output device.
///
/// `cpal` streams are not `Send` on every platform, so each opened graph gets
/// an `audio-output` thread that owns its stream and answers play, pause and
/// close requests.
#[derive(Debug, Default)]
pub struct CpalHost;

impl CpalHost {
    /// Returns a host if the platform has a default output device.
    pub fn probe() -> Option<Self> {
        cpal::default_host().default_output_device().map(|_| Self)
    }
}

impl AudioHost for CpalHost {
    fn open(&mut self, graph: ProcessingGraph) -> Result<Box<dyn HostStream>> {
        let (commands, receiver) = mpsc::channel();
        let (ready, built) = mpsc::sync_channel(1);
        let worker = graph.clone();
        let thread = thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || run_output_thread(worker, receiver, ready))
            .map_err(|err| {
                VisualiserError::GraphUnavailable(format!("failed to spawn output thread: {err}"))
            })?;

        let opened = built.recv().unwrap_or_else(|_| {
            Err(VisualiserError::GraphUnavailable(
                "audio output thread exited before building its stream".into(),
            ))
        });
        if let Err(err) = opened {
            if thread.join().is_err() {
                tracing::warn!("audio output thread panicked");
            }
            return Err(err);
        }

        Ok(Box::new(CpalStream {
            graph,
            commands,
            thread: Some(thread),
        }))
    }
}

enum OutputCommand {
    Play(SyncSender<Result<()>>),
    Pause(SyncSender<Result<()>>),
    Close,
}

struct CpalStream {
    graph: ProcessingGraph,
    commands: Sender<OutputCommand>,
    thread: Option<JoinHandle<()>>,
}

impl CpalStream {
    fn request(&self, command: fn(SyncSender<Result<()>>) -> OutputCommand) -> Result<()> {
        let lost = || VisualiserError::GraphUnavailable("audio output thread is gone".into());
        let (reply, response) = mpsc::sync_channel(1);
        self.commands.send(command(reply)).map_err(|_| lost())?;
        response.recv().map_err(|_| lost())?
    }
}

impl HostStream for CpalStream {
    fn resume(&mut self) -> Result<()> {
        self.graph.set_state(GraphState::Running)?;
        if let Err(err) = self.request(OutputCommand::Play) {
            self.graph.set_state(GraphState::Suspended)?;
            return Err(err);
        }
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        self.graph.set_state(GraphState::Suspended)?;
        // The graph already renders silence; a device that cannot pause
        // keeps pulling it.
        if let Err(err) = self.request(OutputCommand::Pause) {
            tracing::warn!(%err, "audio output did not pause");
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Err(err) = self.graph.set_state(GraphState::Closed) {
            tracing::warn!(%err, "failed to close processing graph");
        }
        let Some(thread) = self.thread.take() else {
            return;
        };
        let _ = self.commands.send(OutputCommand::Close);
        if thread.join().is_err() {
            tracing::warn!("audio output thread panicked");
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_output_thread(
    graph: ProcessingGraph,
    commands: Receiver<OutputCommand>,
    ready: SyncSender<Result<()>>,
) {
    let stream = match build_output_stream(graph) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    while let Ok(command) = commands.recv() {
        match command {
            OutputCommand::Play(reply) => {
                let result = stream.play().map_err(|err| {
                    VisualiserError::GraphUnavailable(format!("failed to start output: {err}"))
                });
                let _ = reply.send(result);
            }
            OutputCommand::Pause(reply) => {
                let result = stream.pause().map_err(|err| {
                    VisualiserError::GraphUnavailable(format!("failed to pause output: {err}"))
                });
                let _ = reply.send(result);
            }
            OutputCommand::Close => break,
        }
    }

    tracing::debug!("audio output thread stopped");
}

fn build_output_stream(graph: ProcessingGraph) -> Result<cpal::Stream> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| VisualiserError::GraphUnavailable("no audio output device".into()))?;
    let supported = device.default_output_config().map_err(|err| {
        VisualiserError::GraphUnavailable(format!("no default output config: {err}"))
    })?;

    let channels = supported.channels();
    let config = cpal::StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(graph.sample_rate()),
        buffer_size: cpal::BufferSize::Default,
    };

    tracing::info!(
        device = device.name().as_deref().unwrap_or("unknown"),
        channels,
        sample_rate = graph.sample_rate(),
        "opening audio output"
    );

    let mut feeder = QuantumFeeder::new(graph);
    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                feeder.fill(data, usize::from(channels));
            },
            |err| tracing::warn!(%err, "audio output error"),
            None,
        )
        .map_err(|err| {
            VisualiserError::GraphUnavailable(format!("failed to build output stream: {err}"))
        })
}

/// Adapts device buffers of any size to whole render quanta, copying the
/// mono mix onto every output channel.
struct QuantumFeeder {
    graph: ProcessingGraph,
    block: Vec<f32>,
    cursor: usize,
}

impl QuantumFeeder {
    fn new(graph: ProcessingGraph) -> Self {
        Self {
            graph,
            block: vec![0.0; RENDER_QUANTUM],
            cursor: RENDER_QUANTUM,
        }
    }

    fn fill(&mut self, output: &mut [f32], channels: usize) {
        for frame in output.chunks_mut(channels.max(1)) {
            if self.cursor == self.block.len() {
                if self.graph.render_block(&mut self.block).is_err() {
                    self.block.fill(0.0);
                }
                self.cursor = 0;
            }
            frame.fill(self.block[self.cursor]);
            self.cursor += 1;
        }
    }
}

/// Deterministic host whose rendering is advanced explicitly with
/// [`ManualHost::render`].
///
/// Clones share state, so a caller can hand one clone to the visualiser and
/// keep another to drive the audio clock.
#[derive(Clone, Default)]
pub struct ManualHost {
    shared: Arc<Mutex<ManualShared>>,
}

#[derive(Default)]
struct ManualShared {
    graph: Option<ProcessingGraph>,
    refuse_open: bool,
    refuse_resume: bool,
    opened: usize,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent [`AudioHost::open`] calls fail.
    pub fn set_refuse_open(&self, refuse: bool) -> Result<()> {
        self.lock()?.refuse_open = refuse;
        Ok(())
    }

    /// Makes subsequent [`HostStream::resume`] calls fail.
    pub fn set_refuse_resume(&self, refuse: bool) -> Result<()> {
        self.lock()?.refuse_resume = refuse;
        Ok(())
    }

    /// Number of graphs successfully opened on this host.
    pub fn graphs_opened(&self) -> Result<usize> {
        Ok(self.lock()?.opened)
    }

    /// The most recently opened graph, if any.
    pub fn graph(&self) -> Result<Option<ProcessingGraph>> {
        Ok(self.lock()?.graph.clone())
    }

    /// Renders `frames` frames (rounded up to whole quanta) on the most
    /// recently opened graph. Returns the number of frames actually rendered,
    /// which is zero while the graph is not running.
    pub fn render(&self, frames: usize) -> Result<usize> {
        let Some(graph) = self.graph()? else {
            return Ok(0);
        };

        let mut block = [0.0_f32; RENDER_QUANTUM];
        let mut rendered = 0;
        while rendered < frames {
            if !graph.render_block(&mut block)? {
                break;
            }
            rendered += RENDER_QUANTUM;
        }
        Ok(rendered)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ManualShared>> {
        self.shared
            .lock()
            .map_err(|_| VisualiserError::msg("manual host state has been poisoned"))
    }
}

impl AudioHost for ManualHost {
    fn open(&mut self, graph: ProcessingGraph) -> Result<Box<dyn HostStream>> {
        let mut shared = self.lock()?;
        if shared.refuse_open {
            return Err(VisualiserError::GraphUnavailable(
                "host refused to construct the audio graph".into(),
            ));
        }
        shared.graph = Some(graph.clone());
        shared.opened += 1;

        Ok(Box::new(ManualStream {
            graph,
            host: self.clone(),
        }))
    }
}

impl fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualHost").finish()
    }
}

struct ManualStream {
    graph: ProcessingGraph,
    host: ManualHost,
}

impl HostStream for ManualStream {
    fn resume(&mut self) -> Result<()> {
        if self.host.lock()?.refuse_resume {
            return Err(VisualiserError::GraphUnavailable(
                "host refused to resume the audio graph".into(),
            ));
        }
        self.graph.set_state(GraphState::Running)
    }

    fn suspend(&mut self) -> Result<()> {
        self.graph.set_state(GraphState::Suspended)
    }

    fn close(&mut self) {
        if let Err(err) = self.graph.set_state(GraphState::Closed) {
            tracing::warn!(%err, "failed to close processing graph");
        }
    }
}
