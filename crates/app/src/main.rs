use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use clap::{Args, Parser, Subcommand};
use spectrum_visualiser_core::{
    AppConfig, CpalHost, FrameRecorder, RealtimeHost, RecordingSettings, SignalConfig,
    TickOutcome, VisualizationMode, Visualiser, VisualiserError, VisualiserRemote,
};
use tracing_subscriber::EnvFilter;

fn main() -> spectrum_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Modes => {
            for mode in VisualizationMode::ALL {
                println!("{:<10} {}", mode.name(), mode.label());
            }
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&AppConfig::default())?);
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> spectrum_visualiser_core::Result<()> {
    let run_for = duration_arg("seconds", args.seconds)?;
    let cycle_every = args.cycle_every.map(cycle_interval).transpose()?;

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(input) = args.input {
        config.signal = SignalConfig::File { path: input };
    }
    if let Some(volume) = args.volume {
        config.audio.volume = volume;
    }

    tracing::info!(
        mode = %config.mode,
        fps = args.fps,
        seconds = args.seconds,
        "starting visualiser"
    );

    let mut visualiser = open_visualiser(config)?;
    let mut recorder = args.record_dir.map(|output_dir| {
        FrameRecorder::new(RecordingSettings {
            output_dir,
            every: args.record_every,
            max_frames: None,
        })
    });
    if let Some(recorder) = recorder.as_mut() {
        recorder.start()?;
    }

    visualiser.play()?;

    let cycler = cycle_every
        .map(|interval| ModeCycler::spawn(visualiser.remote(), visualiser.mode(), interval));

    let frame_interval = Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1)));
    let started = Instant::now();
    let mut next_frame = started;

    while started.elapsed() < run_for {
        if let Some(TickOutcome::Rendered(_)) = visualiser.on_frame(started.elapsed()) {
            if let (Some(recorder), Some(surface)) = (recorder.as_mut(), visualiser.surface()) {
                recorder.capture(surface)?;
            }
        }

        next_frame += frame_interval;
        let now = Instant::now();
        if next_frame > now {
            thread::sleep(next_frame - now);
        } else {
            next_frame = now;
        }
    }

    if let Some(cycler) = cycler {
        cycler.finish();
    }

    if let (Some(path), Some(surface)) = (&args.snapshot, visualiser.surface()) {
        surface.save_png(path)?;
        tracing::info!(path = %path.display(), "wrote final frame");
    }
    if let Some(recorder) = recorder.as_mut() {
        recorder.stop();
        tracing::info!(
            frames = recorder.frames_written(),
            dir = %recorder.output_dir().display(),
            "recorded frames"
        );
    }

    tracing::info!(
        ticks = visualiser.dispatcher().rendered_ticks(),
        skipped = visualiser.dispatcher().skipped_ticks(),
        mode = %visualiser.mode(),
        "stopping visualiser"
    );
    visualiser.stop();
    Ok(())
}

fn open_visualiser(config: AppConfig) -> spectrum_visualiser_core::Result<Visualiser> {
    match CpalHost::probe() {
        Some(host) => Visualiser::new(config, host),
        None => {
            tracing::warn!("no audio output device found, rendering to a null sink");
            Visualiser::new(config, RealtimeHost::new())
        }
    }
}

/// Converts a seconds argument, rejecting negative and non-finite values.
fn duration_arg(name: &str, seconds: f64) -> spectrum_visualiser_core::Result<Duration> {
    Duration::try_from_secs_f64(seconds).map_err(|_| {
        VisualiserError::InvalidConfig(format!(
            "--{name} must be a finite, non-negative number of seconds, got {seconds}"
        ))
    })
}

fn cycle_interval(seconds: f64) -> spectrum_visualiser_core::Result<Duration> {
    let interval = duration_arg("cycle-every", seconds)?;
    if interval.is_zero() {
        return Err(VisualiserError::InvalidConfig(
            "--cycle-every must be greater than zero".into(),
        ));
    }
    Ok(interval)
}

/// Background thread that steps through the visualization modes through the
/// visualiser's remote, the way a UI thread would.
struct ModeCycler {
    done: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl ModeCycler {
    fn spawn(remote: VisualiserRemote, start: VisualizationMode, interval: Duration) -> Self {
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();

        let thread = thread::spawn(move || {
            let mut mode = start;
            let mut next_switch = Instant::now() + interval;
            while !flag.load(Ordering::Acquire) {
                if Instant::now() < next_switch {
                    thread::sleep(Duration::from_millis(10));
                    continue;
                }

                mode = mode.next();
                if remote.select_mode(mode).is_err() {
                    break;
                }
                tracing::info!(%mode, "switched visualization mode");
                next_switch += interval;
            }
        });

        Self { done, thread }
    }

    fn finish(self) {
        self.done.store(true, Ordering::Release);
        if self.thread.join().is_err() {
            tracing::warn!("mode cycler thread panicked");
        }
    }
}

fn parse_mode(value: &str) -> Result<VisualizationMode, String> {
    value.parse().map_err(|err| format!("{err}"))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Real-time audio spectrum visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a signal and drive the visualiser headlessly.
    Run(RunArgs),
    /// List the available visualization modes.
    Modes,
    /// Print the default configuration as JSON.
    Config,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Visualization mode to start with.
    #[arg(short, long, value_parser = parse_mode)]
    mode: Option<VisualizationMode>,
    /// How long to run for, in seconds.
    #[arg(short, long, default_value_t = 5.0)]
    seconds: f64,
    /// Display refresh rate to simulate.
    #[arg(long, default_value_t = 60)]
    fps: u32,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// WAV file to visualise instead of the demo sweep.
    #[arg(short, long)]
    input: Option<PathBuf>,
    /// Master output volume between 0 and 1.
    #[arg(long)]
    volume: Option<f32>,
    /// Switch to the next mode every this many seconds.
    #[arg(long)]
    cycle_every: Option<f64>,
    /// Directory to write numbered PNG frames into.
    #[arg(long)]
    record_dir: Option<PathBuf>,
    /// Keep one recorded frame out of every N ticks.
    #[arg(long, default_value_t = 1)]
    record_every: u32,
    /// Write the last rendered frame to this PNG before stopping.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_length_rejects_negative_and_non_finite_seconds() {
        assert_eq!(duration_arg("seconds", 2.5).unwrap(), Duration::from_millis(2_500));
        assert_eq!(duration_arg("seconds", 0.0).unwrap(), Duration::ZERO);

        for seconds in [-1.0, f64::NAN, f64::INFINITY] {
            let err = duration_arg("seconds", seconds).unwrap_err();
            assert!(matches!(err, VisualiserError::InvalidConfig(_)));
        }
    }

    #[test]
    fn cycle_interval_must_be_positive() {
        assert_eq!(cycle_interval(1.0).unwrap(), Duration::from_secs(1));
        assert!(cycle_interval(0.0).is_err());
        assert!(cycle_interval(-2.0).is_err());
    }

    #[test]
    fn run_arguments_parse_with_defaults() {
        let cli = Cli::try_parse_from(["spectrum-visualiser", "run", "--mode", "circular"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(args.mode, Some(VisualizationMode::Circular));
        assert_eq!(args.seconds, 5.0);
        assert_eq!(args.fps, 60);
        assert!(args.cycle_every.is_none());
    }
}
