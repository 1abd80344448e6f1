//! Playback controller: owns the audio session, the lifecycle state machine
//! and the animation loop.
//!
//! `stop` tears the session down. A later `play` therefore builds a fresh
//! graph through `init`, while `play` after `pause` resumes the existing one
//! and keeps its signal source.

use std::{
    path::Path,
    sync::mpsc::{self, Receiver, Sender},
    time::Duration,
};

use crate::{
    AnalyserHandle, AnalyserNode, AppConfig, AudioConfig, AudioHost, DemoTone, DemoToneConfig,
    FileSignal, FrameRequestId, FrameScheduler, HostStream, PlaybackClock, ProcessingGraph,
    RasterSurface, RenderDispatcher, Result, SignalConfig, TickOutcome, VisualizationMode,
    VisualiserError,
};

/// Lifecycle of a [`Visualiser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Uninitialized,
    Ready,
    Playing,
    Paused,
    Stopped,
}

/// One initialisation of the processing graph together with its analysis tap.
pub struct AudioSession {
    id: u64,
    graph: ProcessingGraph,
    analyser: AnalyserHandle,
    stream: Box<dyn HostStream>,
}

impl AudioSession {
    fn open(host: &mut dyn AudioHost, config: &AudioConfig, id: u64) -> Result<Self> {
        let analyser = AnalyserHandle::new(AnalyserNode::new(config)?);
        let graph = ProcessingGraph::new(config, analyser.clone());
        let stream = host.open(graph.clone())?;

        Ok(Self {
            id,
            graph,
            analyser,
            stream,
        })
    }

    /// Sequence number of this session within its visualiser, starting at 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn graph(&self) -> &ProcessingGraph {
        &self.graph
    }

    pub fn analyser(&self) -> &AnalyserHandle {
        &self.analyser
    }

    /// Length of every snapshot polled during this session.
    pub fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    /// Starts the demo sweep at the graph's current time.
    pub fn attach_demo_signal(&mut self, config: &DemoToneConfig) -> Result<()> {
        let start = self.graph.current_time()?;
        self.graph.connect(Box::new(DemoTone::new(config, start)))?;
        tracing::debug!(session = self.id, start, "attached demo signal");
        Ok(())
    }

    pub fn attach_file_signal(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let signal = FileSignal::open(path)?;
        tracing::debug!(
            session = self.id,
            path = %path.display(),
            duration = signal.duration_seconds(),
            "attached file signal"
        );
        self.graph.connect(Box::new(signal))
    }

    pub fn attach_signal(&mut self, signal: &SignalConfig) -> Result<()> {
        match signal {
            SignalConfig::Demo(tone) => self.attach_demo_signal(tone),
            SignalConfig::File { path } => self.attach_file_signal(path),
        }
    }

    fn resume(&mut self) -> Result<()> {
        self.stream.resume()
    }

    fn suspend(&mut self) -> Result<()> {
        self.stream.suspend()
    }

    fn close(&mut self) {
        self.stream.close();
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSession")
            .field("id", &self.id)
            .field("graph", &self.graph)
            .finish()
    }
}

/// Control messages accepted through a [`VisualiserRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum VisualiserCommand {
    Init,
    Play,
    Pause,
    Stop,
    SelectMode(VisualizationMode),
    SetVolume(f32),
}

/// Cloneable, thread-safe sender for [`VisualiserCommand`]s.
///
/// Commands are queued and applied at the start of the next frame, before
/// that frame's tick reads any state.
#[derive(Debug, Clone)]
pub struct VisualiserRemote {
    sender: Sender<VisualiserCommand>,
}

impl VisualiserRemote {
    pub fn send(&self, command: VisualiserCommand) -> Result<()> {
        self.sender
            .send(command)
            .map_err(|_| VisualiserError::msg("visualiser has been dropped"))
    }

    pub fn init(&self) -> Result<()> {
        self.send(VisualiserCommand::Init)
    }

    pub fn play(&self) -> Result<()> {
        self.send(VisualiserCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(VisualiserCommand::Pause)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(VisualiserCommand::Stop)
    }

    pub fn select_mode(&self, mode: VisualizationMode) -> Result<()> {
        self.send(VisualiserCommand::SelectMode(mode))
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        self.send(VisualiserCommand::SetVolume(volume))
    }
}

/// Real-time audio visualiser.
///
/// The host calls [`Visualiser::on_frame`] once per display refresh; while
/// playing, each call runs exactly one tick of the animation loop.
pub struct Visualiser {
    config: AppConfig,
    host: Box<dyn AudioHost>,
    state: PlaybackState,
    session: Option<AudioSession>,
    sessions_created: u64,
    surface: Option<RasterSurface>,
    dispatcher: RenderDispatcher,
    frames: FrameScheduler,
    animation: Option<FrameRequestId>,
    clock: PlaybackClock,
    commands: Receiver<VisualiserCommand>,
    remote: Sender<VisualiserCommand>,
}

impl Visualiser {
    pub fn new(config: AppConfig, host: impl AudioHost + 'static) -> Result<Self> {
        config.validate()?;
        let surface = RasterSurface::from_config(&config.surface)?;
        let (remote, commands) = mpsc::channel();

        Ok(Self {
            dispatcher: RenderDispatcher::new(config.mode),
            config,
            host: Box::new(host),
            state: PlaybackState::Uninitialized,
            session: None,
            sessions_created: 0,
            surface: Some(surface),
            frames: FrameScheduler::new(),
            animation: None,
            clock: PlaybackClock::default(),
            commands,
            remote,
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&AudioSession> {
        self.session.as_ref()
    }

    pub fn mode(&self) -> VisualizationMode {
        self.dispatcher.mode()
    }

    pub fn dispatcher(&self) -> &RenderDispatcher {
        &self.dispatcher
    }

    /// Whether a tick is scheduled for the next frame.
    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.pending_len()
    }

    pub fn surface(&self) -> Option<&RasterSurface> {
        self.surface.as_ref()
    }

    pub fn attach_surface(&mut self, surface: RasterSurface) {
        self.surface = Some(surface);
    }

    /// Removes the surface; ticks are skipped until one is attached again.
    pub fn detach_surface(&mut self) -> Option<RasterSurface> {
        self.surface.take()
    }

    pub fn remote(&self) -> VisualiserRemote {
        VisualiserRemote {
            sender: self.remote.clone(),
        }
    }

    /// Builds the processing graph and its analyser.
    ///
    /// Does nothing while a session exists. On failure the error is logged
    /// and returned, and the state is left untouched so the call can be
    /// retried.
    pub fn init(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let id = self.sessions_created + 1;
        match AudioSession::open(self.host.as_mut(), &self.config.audio, id) {
            Ok(session) => {
                tracing::info!(
                    session = id,
                    bins = session.bin_count(),
                    sample_rate = session.graph().sample_rate(),
                    "audio session initialised"
                );
                self.sessions_created = id;
                self.session = Some(session);
                self.transition(PlaybackState::Ready);
                Ok(())
            }
            Err(err) => {
                tracing::error!(%err, "failed to initialise audio session");
                Err(err)
            }
        }
    }

    /// Initialises if needed, resumes the graph, makes sure a signal source
    /// is playing and starts the animation loop.
    ///
    /// Calling this while already playing changes nothing.
    pub fn play(&mut self) -> Result<()> {
        if self.state == PlaybackState::Playing {
            return Ok(());
        }

        self.init()?;
        let Some(session) = self.session.as_mut() else {
            return Err(VisualiserError::InvalidInput("no active audio session"));
        };

        if session.graph().active_sources()? == 0 {
            if let Err(err) = session.attach_signal(&self.config.signal) {
                tracing::error!(%err, "failed to attach signal source");
                return Err(err);
            }
        }

        // The loop must not start before the graph is running.
        if let Err(err) = session.resume() {
            tracing::error!(%err, "failed to resume audio graph");
            return Err(err);
        }

        if self.animation.is_none() {
            self.animation = Some(self.frames.request_frame());
        }
        self.transition(PlaybackState::Playing);
        Ok(())
    }

    /// Suspends audio and the animation loop, keeping the last frame on the
    /// surface. Only meaningful while playing.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }

        self.cancel_animation();
        if let Some(session) = self.session.as_mut() {
            if let Err(err) = session.suspend() {
                tracing::warn!(%err, "failed to suspend audio graph");
            }
        }
        self.transition(PlaybackState::Paused);
    }

    /// Cancels the animation loop, closes the session and blanks the surface.
    pub fn stop(&mut self) {
        if self.state == PlaybackState::Uninitialized {
            return;
        }

        self.cancel_animation();
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.suspend() {
                tracing::warn!(%err, "failed to suspend audio graph");
            }
            session.close();
        }
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
        self.clock.reset();
        self.transition(PlaybackState::Stopped);
    }

    /// Takes effect on the next tick.
    pub fn select_mode(&mut self, mode: VisualizationMode) {
        if mode != self.dispatcher.mode() {
            tracing::debug!(from = %self.dispatcher.mode(), to = %mode, "visualization mode change");
        }
        self.dispatcher.set_mode(mode);
        self.config.mode = mode;
    }

    /// Master output gain. Does not affect what the analyser sees.
    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        let volume = volume.clamp(0.0, 1.0);
        self.config.audio.volume = volume;
        if let Some(session) = self.session.as_ref() {
            session.graph().set_volume(volume)?;
        }
        Ok(())
    }

    /// Display refresh callback.
    ///
    /// Applies queued remote commands, then runs the animation tick if one
    /// was scheduled for this frame. Returns `None` when no tick ran.
    pub fn on_frame(&mut self, timestamp: Duration) -> Option<TickOutcome> {
        self.drain_commands();
        let now = self.clock.advance(timestamp);

        let mut outcome = None;
        for id in self.frames.take_due() {
            if self.animation != Some(id) {
                continue;
            }
            self.animation = None;
            outcome = Some(self.tick(now));

            if self.state == PlaybackState::Playing {
                self.animation = Some(self.frames.request_frame());
            }
        }
        outcome
    }

    fn tick(&mut self, now: Duration) -> TickOutcome {
        let Some(session) = self.session.as_ref() else {
            return TickOutcome::Skipped;
        };
        self.dispatcher.tick(session.analyser(), self.surface.as_mut(), now)
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: VisualiserCommand) {
        tracing::trace!(?command, "applying remote command");
        let result = match command {
            VisualiserCommand::Init => self.init(),
            VisualiserCommand::Play => self.play(),
            VisualiserCommand::Pause => {
                self.pause();
                Ok(())
            }
            VisualiserCommand::Stop => {
                self.stop();
                Ok(())
            }
            VisualiserCommand::SelectMode(mode) => {
                self.select_mode(mode);
                Ok(())
            }
            VisualiserCommand::SetVolume(volume) => self.set_volume(volume),
        };

        // init and play already log their own failures.
        if let Err(err) = result {
            tracing::debug!(%err, "remote command failed");
        }
    }

    fn cancel_animation(&mut self) {
        if let Some(id) = self.animation.take() {
            self.frames.cancel_frame(id);
        }
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "playback state change");
        }
        self.state = next;
    }
}

impl std::fmt::Debug for Visualiser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visualiser")
            .field("state", &self.state)
            .field("mode", &self.dispatcher.mode())
            .field("session", &self.session)
            .field("animating", &self.animation.is_some())
            .finish()
    }
}
