use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Frame times averaged for the diagnostics readout.
pub const FRAME_TIME_HISTORY: usize = 60;

/// Tracks time between rendered frames.
#[derive(Debug, Default, Clone)]
pub struct FrameClock {
    pub time_seconds: f64,
    last_tick: Option<Instant>,
    last_delta: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Seconds since the previous tick, measured on the wall clock. The first
    /// tick returns zero.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = self
            .last_tick
            .map(|last| now.duration_since(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        self.advance(delta)
    }

    /// Moves the clock forward by `delta` seconds without consulting the
    /// wall clock. Negative and non-finite deltas count as zero.
    pub fn advance(&mut self, delta: f32) -> f32 {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        self.time_seconds += delta as f64;
        self.last_delta = delta;
        delta
    }

    pub fn last_delta(&self) -> f32 {
        self.last_delta
    }
}

/// Running mean over the last `N` values.
#[derive(Debug, Clone)]
pub struct BoxFilter<const N: usize> {
    values: [f64; N],
    position: usize,
    filled: usize,
    sum: f64,
}

impl<const N: usize> Default for BoxFilter<N> {
    fn default() -> Self {
        Self {
            values: [0.0; N],
            position: 0,
            filled: 0,
            sum: 0.0,
        }
    }
}

impl<const N: usize> BoxFilter<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        if N == 0 || !value.is_finite() {
            return;
        }
        self.sum += value - self.values[self.position];
        self.values[self.position] = value;
        self.position = (self.position + 1) % N;
        self.filled = (self.filled + 1).min(N);
        if self.position == 0 {
            // exact resum once per lap
            self.sum = self.values.iter().sum();
        }
    }

    pub fn average(&self) -> f64 {
        if self.filled == 0 {
            0.0
        } else {
            self.sum / self.filled as f64
        }
    }

    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }
}

/// Per-frame performance figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Seconds, averaged over the last [`FRAME_TIME_HISTORY`] frames.
    pub average_frame_time: f64,
    pub fps: f64,
    /// Audio samples per channel arriving per second of wall time.
    pub samples_per_second: f64,
    pub frames_rendered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_ignores_bad_deltas() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.advance(0.5), 0.5);
        assert_eq!(clock.advance(-1.0), 0.0);
        assert_eq!(clock.advance(f32::NAN), 0.0);
        assert_eq!(clock.time_seconds, 0.5);
        clock.reset();
        assert_eq!(clock.time_seconds, 0.0);
    }

    #[test]
    fn first_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(), 0.0);
        assert!(clock.tick() >= 0.0);
    }

    #[test]
    fn box_filter_averages_the_last_values() {
        let mut filter = BoxFilter::<3>::new();
        assert!(filter.is_empty());
        assert_eq!(filter.average(), 0.0);

        filter.push(1.0);
        filter.push(2.0);
        assert_eq!(filter.average(), 1.5);

        filter.push(3.0);
        filter.push(10.0);
        assert_eq!(filter.len(), 3);
        assert_eq!(filter.average(), 5.0);

        filter.push(f64::NAN);
        assert_eq!(filter.average(), 5.0);
    }
}
