use std::{f64::consts::TAU, fmt, path::Path};

use crate::{DemoToneConfig, Result, VisualiserError};

/// Timing information for the block currently being rendered.
#[derive(Debug, Clone, Copy)]
pub struct QuantumContext {
    pub start_frame: u64,
    pub sample_rate: u32,
}

impl QuantumContext {
    /// Graph time, in seconds, of the `offset`-th frame in the block.
    pub fn time_at(&self, offset: usize) -> f64 {
        (self.start_frame + offset as u64) as f64 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Active,
    Finished,
}

/// Audio-producing node feeding the graph mix.
///
/// Implementations add their output onto `mix` rather than overwrite it.
pub trait SignalSource: Send {
    fn render(&mut self, context: &QuantumContext, mix: &mut [f32]) -> SourceStatus;
}

/// Self-terminating sine sweep used when no external media is available.
///
/// Ramps exponentially from the base to the peak frequency, back down again,
/// then holds the base frequency until the configured lifetime runs out.
pub struct DemoTone {
    base_hz: f64,
    peak_hz: f64,
    ramp_seconds: f64,
    gain: f32,
    start_time: f64,
    stop_time: f64,
    phase: f64,
}

impl DemoTone {
    pub fn new(config: &DemoToneConfig, start_time: f64) -> Self {
        Self {
            base_hz: f64::from(config.base_hz),
            peak_hz: f64::from(config.peak_hz),
            ramp_seconds: f64::from(config.ramp_seconds),
            gain: config.gain,
            start_time,
            stop_time: start_time + f64::from(config.duration_seconds),
            phase: 0.0,
        }
    }

    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    /// Instantaneous frequency `elapsed` seconds after the tone started.
    pub fn frequency_at(&self, elapsed: f64) -> f64 {
        if elapsed <= 0.0 {
            self.base_hz
        } else if elapsed <= self.ramp_seconds {
            exponential_ramp(self.base_hz, self.peak_hz, elapsed / self.ramp_seconds)
        } else if elapsed <= 2.0 * self.ramp_seconds {
            let progress = (elapsed - self.ramp_seconds) / self.ramp_seconds;
            exponential_ramp(self.peak_hz, self.base_hz, progress)
        } else {
            self.base_hz
        }
    }
}

impl SignalSource for DemoTone {
    fn render(&mut self, context: &QuantumContext, mix: &mut [f32]) -> SourceStatus {
        let sample_rate = f64::from(context.sample_rate);

        for (offset, slot) in mix.iter_mut().enumerate() {
            let time = context.time_at(offset);
            if time < self.start_time {
                continue;
            }
            if time >= self.stop_time {
                return SourceStatus::Finished;
            }

            *slot += self.gain * self.phase.sin() as f32;

            let frequency = self.frequency_at(time - self.start_time);
            self.phase = (self.phase + TAU * frequency / sample_rate) % TAU;
        }

        if context.time_at(mix.len()) >= self.stop_time {
            SourceStatus::Finished
        } else {
            SourceStatus::Active
        }
    }
}

impl fmt::Debug for DemoTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoTone")
            .field("base_hz", &self.base_hz)
            .field("peak_hz", &self.peak_hz)
            .field("start_time", &self.start_time)
            .field("stop_time", &self.stop_time)
            .finish()
    }
}

fn exponential_ramp(from: f64, to: f64, progress: f64) -> f64 {
    from * (to / from).powf(progress.clamp(0.0, 1.0))
}

/// WAV file decoded up front and played once through the graph.
pub struct FileSignal {
    samples: Vec<f32>,
    sample_rate: u32,
    position: f64,
}

impl FileSignal {
    /// Decodes `path`, folding every channel down to mono.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        tracing::debug!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            format = ?spec.sample_format,
            "decoding file signal"
        );

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = match spec.bits_per_sample {
                    8 => f32::from(i8::MAX),
                    16 => f32::from(i16::MAX),
                    24 => 8_388_607.0,
                    _ => i32::MAX as f32,
                };
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 / scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let channels = usize::from(spec.channels.max(1));
        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Self::from_samples(samples, spec.sample_rate)
    }

    /// Wraps already decoded mono samples.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VisualiserError::InvalidInput(
                "file signal requires a positive sample rate",
            ));
        }

        Ok(Self {
            samples,
            sample_rate,
            position: 0.0,
        })
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

impl SignalSource for FileSignal {
    fn render(&mut self, context: &QuantumContext, mix: &mut [f32]) -> SourceStatus {
        let step = f64::from(self.sample_rate) / f64::from(context.sample_rate);

        for slot in mix.iter_mut() {
            let index = self.position.floor() as usize;
            let Some(&current) = self.samples.get(index) else {
                return SourceStatus::Finished;
            };
            let next = self.samples.get(index + 1).copied().unwrap_or(current);
            let fraction = (self.position - index as f64) as f32;

            *slot += current + (next - current) * fraction;
            self.position += step;
        }

        if (self.position.floor() as usize) < self.samples.len() {
            SourceStatus::Active
        } else {
            SourceStatus::Finished
        }
    }
}

impl fmt::Debug for FileSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSignal")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("position", &self.position)
            .finish()
    }
}
