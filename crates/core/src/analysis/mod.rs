use std::{
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AudioConfig, Result};

/// Frequency-domain tap on the processing graph.
///
/// The node keeps the most recent `fft_size` samples routed into it and turns
/// them into `fft_size / 2` byte magnitudes on demand. A spectrum is computed
/// at most once per block of new input; polling again before more audio has
/// arrived returns the cached frame unchanged.
pub struct AnalyserNode {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    history: Vec<f32>,
    write_pos: usize,
    generation: u64,
    computed_generation: Option<u64>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    window: Vec<f32>,
    fft: FftResources,
    polls: u64,
}

impl AnalyserNode {
    /// Builds a node from an already validated audio configuration.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        config.validate()?;

        let fft_size = config.fft_size;
        let bins = config.bin_count();
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let fft = FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Ok(Self {
            fft_size,
            smoothing: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            history: vec![0.0; fft_size],
            write_pos: 0,
            generation: 0,
            computed_generation: None,
            smoothed: vec![0.0; bins],
            bytes: vec![0; bins],
            window: (0..fft_size).map(|i| blackman_value(i, fft_size)).collect(),
            fft,
            polls: 0,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of magnitude bins in every snapshot.
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Total number of [`AnalyserNode::poll`] calls served so far.
    pub fn poll_count(&self) -> u64 {
        self.polls
    }

    /// Appends a block of mono samples to the time-domain history.
    pub fn push_samples(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        for &sample in samples {
            self.history[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
        self.generation += 1;
    }

    /// Copies the latest byte spectrum into `buffer`.
    ///
    /// Only `min(buffer.len(), bin_count)` entries are written.
    pub fn poll(&mut self, buffer: &mut [u8]) {
        self.polls += 1;

        if self.computed_generation != Some(self.generation) {
            self.compute_spectrum();
            self.computed_generation = Some(self.generation);
        }

        let len = buffer.len().min(self.bytes.len());
        buffer[..len].copy_from_slice(&self.bytes[..len]);
    }

    fn compute_spectrum(&mut self) {
        let n = self.fft_size;
        for (i, slot) in self.fft.input.iter_mut().enumerate() {
            // Oldest sample first.
            *slot = self.history[(self.write_pos + i) % n] * self.window[i];
        }

        if let Err(err) = self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        ) {
            tracing::warn!(%err, "spectrum computation failed, keeping previous frame");
            return;
        }

        let scale = 1.0 / n as f32;
        let tau = self.smoothing;
        let range = self.max_decibels - self.min_decibels;

        for (k, bin) in self.fft.spectrum.iter().take(self.smoothed.len()).enumerate() {
            let magnitude = bin.norm() * scale;
            let mut value = tau * self.smoothed[k] + (1.0 - tau) * magnitude;
            if !value.is_finite() {
                value = 0.0;
            }
            self.smoothed[k] = value;

            let db = 20.0 * value.log10();
            let scaled = 255.0 * (db - self.min_decibels) / range;
            self.bytes[k] = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for AnalyserNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyserNode")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .field("generation", &self.generation)
            .field("polls", &self.polls)
            .finish()
    }
}

/// Shared, thread-safe view over an [`AnalyserNode`].
///
/// The audio-rendering side pushes samples through the same handle the render
/// loop polls from, so a poll never observes a half-written block.
#[derive(Clone)]
pub struct AnalyserHandle {
    shared: Arc<Mutex<AnalyserNode>>,
    bin_count: usize,
}

impl AnalyserHandle {
    pub fn new(node: AnalyserNode) -> Self {
        let bin_count = node.frequency_bin_count();
        Self {
            shared: Arc::new(Mutex::new(node)),
            bin_count,
        }
    }

    /// Fixed snapshot length for the lifetime of this node.
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Non-blocking with respect to the render loop and infallible.
    pub fn poll(&self, buffer: &mut [u8]) {
        self.lock().poll(buffer);
    }

    pub fn poll_count(&self) -> u64 {
        self.lock().poll_count()
    }

    pub(crate) fn push_samples(&self, samples: &[f32]) {
        self.lock().push_samples(samples);
    }

    // A panic while holding the lock cannot leave the node in a state that is
    // unsafe to read, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, AnalyserNode> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for AnalyserHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyserHandle")
            .field("bin_count", &self.bin_count)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    let x = index as f32 / len as f32;

    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_node(fft_size: usize) -> AnalyserNode {
        let config = AudioConfig {
            fft_size,
            ..AudioConfig::default()
        };
        AnalyserNode::new(&config).unwrap()
    }

    fn sine(len: usize, cycles_per_block: f32, block: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * cycles_per_block * i as f32 / block as f32).sin())
            .collect()
    }

    #[test]
    fn silence_polls_as_zero() {
        let mut node = build_node(256);
        node.push_samples(&[0.0; 256]);

        let mut buffer = vec![7u8; node.frequency_bin_count()];
        node.poll(&mut buffer);
        assert!(buffer.iter().all(|&value| value == 0));
    }

    #[test]
    fn snapshot_length_matches_bin_count() {
        let mut node = build_node(512);
        assert_eq!(node.frequency_bin_count(), 256);

        let mut buffer = vec![0u8; 256];
        for _ in 0..5 {
            node.push_samples(&sine(128, 8.0, 512, 0.5));
            node.poll(&mut buffer);
            assert_eq!(buffer.len(), node.frequency_bin_count());
        }
    }

    #[test]
    fn peak_lands_in_the_tone_bin() {
        let mut node = build_node(256);
        // 16 cycles across the window puts the energy in bin 16.
        let signal = sine(256, 16.0, 256, 0.05);
        let mut buffer = vec![0u8; 128];
        for _ in 0..8 {
            node.push_samples(&signal);
            node.poll(&mut buffer);
        }

        let value = buffer.iter().copied().max().unwrap();
        let peak = buffer.iter().position(|&v| v == value).unwrap();
        assert_eq!(peak, 16);
        assert!(value > 200);
        assert!(buffer[100] < value);
    }

    #[test]
    fn repeated_polls_without_new_audio_reuse_the_frame() {
        let mut node = build_node(256);
        node.push_samples(&sine(256, 10.0, 256, 0.5));

        let mut first = vec![0u8; 128];
        let mut second = vec![0u8; 128];
        node.poll(&mut first);
        node.poll(&mut second);

        assert_eq!(first, second);
        assert_eq!(node.poll_count(), 2);
    }

    #[test]
    fn smoothing_rises_towards_steady_state() {
        let mut node = build_node(256);
        let signal = sine(256, 16.0, 256, 0.5);
        let mut buffer = vec![0u8; 128];

        node.push_samples(&signal);
        node.poll(&mut buffer);
        let early = buffer[16];

        for _ in 0..10 {
            node.push_samples(&signal);
            node.poll(&mut buffer);
        }
        assert!(buffer[16] > early);
    }

    #[test]
    fn short_buffers_are_filled_partially() {
        let mut node = build_node(64);
        node.push_samples(&sine(64, 4.0, 64, 0.5));
        let mut buffer = vec![0u8; 8];
        node.poll(&mut buffer);
        assert_eq!(buffer[4], buffer.iter().copied().max().unwrap());
    }

    #[test]
    fn handle_shares_state_between_clones() {
        let handle = AnalyserHandle::new(build_node(128));
        let other = handle.clone();
        handle.push_samples(&[0.25; 128]);

        let mut buffer = vec![0u8; other.bin_count()];
        other.poll(&mut buffer);
        handle.poll(&mut buffer);
        assert_eq!(other.poll_count(), 2);
        assert_eq!(handle.bin_count(), 64);
    }
}
