//! Auto-gain envelope estimation.
//!
//! Each frame the estimator measures the level of both channels over the
//! whole snapshot and folds it into a decaying envelope. The decay runs on
//! audio time: a frame covering twice as much newly arrived audio decays the
//! envelope twice as far, whatever the display refresh rate.

use serde::{Deserialize, Serialize};

use crate::Snapshot;

/// Smallest gain the estimator will ever report.
pub const LOWER_AUTO_GAIN_BOUND: f32 = 1e-6;
/// Largest gain the estimator will ever report (+120 dB).
pub const HIGHER_AUTO_GAIN_BOUND: f32 = 1e6;

/// Chunk width of the level scan.
const LANES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnvelopeMode {
    /// Fixed unity gain.
    None,
    /// Mean-square level per frame.
    Rms,
    /// Squared absolute peak per frame.
    #[default]
    PeakDecay,
}

/// Persistent estimator state. Survives across frames until [`EnvelopeEstimator::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeState {
    /// Squared level per channel (left, right).
    pub envelope: [f32; 2],
    pub gain: f32,
}

impl Default for EnvelopeState {
    fn default() -> Self {
        Self {
            envelope: [0.0; 2],
            gain: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvelopeEstimator {
    mode: EnvelopeMode,
    sample_rate: f32,
    window_ms: f32,
    per_sample_decay: f64,
    state: EnvelopeState,
}

impl EnvelopeEstimator {
    pub fn new(sample_rate: f32, window_ms: f32) -> Self {
        let mut estimator = Self {
            mode: EnvelopeMode::PeakDecay,
            sample_rate,
            window_ms,
            per_sample_decay: 0.0,
            state: EnvelopeState::default(),
        };
        estimator.prepare();
        estimator
    }

    fn prepare(&mut self) {
        let window_samples = (self.window_ms as f64 * 0.001 * self.sample_rate as f64).max(1.0);
        self.per_sample_decay = (-1.0 / window_samples).exp();
    }

    pub fn mode(&self) -> EnvelopeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: EnvelopeMode) {
        if mode != self.mode {
            self.mode = mode;
            self.reset();
        }
    }

    /// Changes the decay time constant; the current envelope is kept.
    pub fn set_window_ms(&mut self, window_ms: f32) {
        self.window_ms = window_ms;
        self.prepare();
    }

    pub fn state(&self) -> &EnvelopeState {
        &self.state
    }

    pub fn gain(&self) -> f32 {
        match self.mode {
            EnvelopeMode::None => 1.0,
            _ => self.state.gain,
        }
    }

    pub fn reset(&mut self) {
        self.state = EnvelopeState::default();
    }

    /// Decay factor for a frame that advanced `elapsed_seconds` of audio.
    ///
    /// The exponent counts audio samples that arrived since the previous
    /// frame, capped at the snapshot length since no more than that can have
    /// been measured.
    pub fn decay_coefficient(&self, elapsed_seconds: f32, num_samples: usize) -> f64 {
        let elapsed = if elapsed_seconds.is_finite() {
            elapsed_seconds.max(0.0) as f64
        } else {
            0.0
        };
        let power = (elapsed * self.sample_rate as f64).min(num_samples as f64);
        self.per_sample_decay.powf(power)
    }

    /// Folds the snapshot into the envelope and returns the auto-gain.
    ///
    /// A silent history leaves the previous gain in place.
    pub fn update(&mut self, snapshot: &Snapshot, elapsed_seconds: f32) -> f32 {
        if self.mode == EnvelopeMode::None || snapshot.is_empty() {
            return self.gain();
        }

        let channels = [snapshot.left(), snapshot.right()];
        let levels = channels.map(|samples| match self.mode {
            EnvelopeMode::PeakDecay => {
                let peak = peak_level(samples) as f64;
                peak * peak
            }
            _ => mean_square(samples),
        });

        let coeff = self.decay_coefficient(elapsed_seconds, snapshot.len());
        for (envelope, level) in self.state.envelope.iter_mut().zip(levels) {
            let decayed = *envelope as f64 * coeff;
            let next = decayed.max(level) as f32;
            // levels beyond f32 range leave the envelope decaying
            *envelope = if next.is_finite() { next } else { decayed as f32 };
        }

        let loudest = self.state.envelope[0]
            .sqrt()
            .max(self.state.envelope[1].sqrt()) as f64;
        let raw_gain = 1.0 / loudest;
        if raw_gain.is_normal() {
            self.state.gain = (raw_gain as f32).clamp(LOWER_AUTO_GAIN_BOUND, HIGHER_AUTO_GAIN_BOUND);
        } else {
            tracing::trace!(raw_gain, "keeping previous auto-gain");
        }
        self.state.gain
    }
}

/// Largest absolute sample, scanned in `LANES`-wide chunks with a scalar
/// tail. `max` is exact, so the chunked and scalar scans agree bit for bit.
pub fn peak_level(samples: &[f32]) -> f32 {
    let mut lanes = [0.0_f32; LANES];
    let mut chunks = samples.chunks_exact(LANES);
    for chunk in &mut chunks {
        for (lane, sample) in lanes.iter_mut().zip(chunk) {
            *lane = lane.max(sample.abs());
        }
    }

    let mut peak = lanes.iter().copied().fold(0.0_f32, f32::max);
    for sample in chunks.remainder() {
        peak = peak.max(sample.abs());
    }
    peak
}

/// Mean of squared samples, accumulated the same chunked way as [`peak_level`].
pub fn mean_square(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut lanes = [0.0_f64; LANES];
    let mut chunks = samples.chunks_exact(LANES);
    for chunk in &mut chunks {
        for (lane, sample) in lanes.iter_mut().zip(chunk) {
            let sample = *sample as f64;
            *lane += sample * sample;
        }
    }

    let mut sum: f64 = lanes.iter().sum();
    for sample in chunks.remainder() {
        let sample = *sample as f64;
        sum += sample * sample;
    }
    sum / samples.len() as f64
}
