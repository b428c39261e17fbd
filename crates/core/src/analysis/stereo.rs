//! Balance and stereo-phase trackers feeding the meter overlay.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::Snapshot;

/// The slow trackers' time constant as a multiple of the quick ones'.
pub const SLOW_FILTER_FACTOR: f32 = 5.0;

const QUICK: usize = 0;
const SLOW: usize = 1;

/// Filtered meter values, all in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StereoReadout {
    /// -1 is fully left, 1 fully right.
    pub balance_quick: f32,
    pub balance_slow: f32,
    /// 1 is mono / in phase, -1 is fully out of phase.
    pub phase_quick: f32,
    pub phase_slow: f32,
}

/// One-pole filter outputs, indexed `[quick, slow]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BalancePhaseState {
    /// Channel energies `[left, right]` per speed.
    pub balance: [[f32; 2]; 2],
    pub phase: [f32; 2],
}

#[derive(Debug, Clone)]
pub struct StereoFilterBank {
    sample_rate: f32,
    window_ms: f32,
    coeffs: [f32; 2],
    state: BalancePhaseState,
    last_end: Option<u64>,
}

impl StereoFilterBank {
    pub fn new(sample_rate: f32, window_ms: f32) -> Self {
        let mut bank = Self {
            sample_rate,
            window_ms,
            coeffs: [0.0; 2],
            state: BalancePhaseState::default(),
            last_end: None,
        };
        bank.prepare();
        bank
    }

    fn prepare(&mut self) {
        let quick_samples = (self.window_ms * 0.001 * self.sample_rate).max(1.0);
        self.coeffs[QUICK] = (-1.0 / quick_samples).exp();
        self.coeffs[SLOW] = (-1.0 / (quick_samples * SLOW_FILTER_FACTOR)).exp();
    }

    pub fn set_window_ms(&mut self, window_ms: f32) {
        self.window_ms = window_ms;
        self.prepare();
    }

    pub fn state(&self) -> &BalancePhaseState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = BalancePhaseState::default();
        self.last_end = None;
    }

    /// Runs the samples that arrived since the previous update through the
    /// filters.
    ///
    /// The snapshot's stream position decides what is new: a frozen or
    /// repeated snapshot changes nothing, and a jump further than the
    /// snapshot length (or backwards) processes the whole snapshot. A
    /// snapshot without a stream position is processed whole.
    pub fn update(&mut self, snapshot: &Snapshot) -> StereoReadout {
        let len = snapshot.len();
        let end = snapshot.window_start(0).map(|start| start + len as u64);
        let fresh = match (self.last_end, end) {
            (Some(last), Some(end)) if end >= last => ((end - last) as usize).min(len),
            _ => len,
        };
        self.last_end = end;

        let start = len - fresh;
        let left = &snapshot.left()[start..];
        let right = &snapshot.right()[start..];
        for (&l, &r) in left.iter().zip(right) {
            self.process_sample(l, r);
        }

        self.outputs()
    }

    #[inline]
    fn process_sample(&mut self, left: f32, right: f32) {
        let l2 = left * left;
        let r2 = right * right;
        let energy = l2 + r2;
        let correlation = 2.0 * left * right / energy;

        for (speed, &coeff) in self.coeffs.iter().enumerate() {
            let balance = &mut self.state.balance[speed];
            balance[0] = l2 + coeff * (balance[0] - l2);
            balance[1] = r2 + coeff * (balance[1] - r2);

            // Silent samples carry no phase information.
            if energy.is_normal() && correlation.is_finite() {
                let phase = &mut self.state.phase[speed];
                *phase = correlation + coeff * (*phase - correlation);
            }
        }
    }

    pub fn outputs(&self) -> StereoReadout {
        StereoReadout {
            balance_quick: balance_position(self.state.balance[QUICK]),
            balance_slow: balance_position(self.state.balance[SLOW]),
            phase_quick: self.state.phase[QUICK].clamp(-1.0, 1.0),
            phase_slow: self.state.phase[SLOW].clamp(-1.0, 1.0),
        }
    }
}

/// Maps `[left, right]` energy onto `[-1, 1]` through `atan(right / left)`.
/// Two silent channels have no defined ratio and read as centred.
pub fn balance_position([left, right]: [f32; 2]) -> f32 {
    let position = (right / left).atan() / FRAC_PI_2 * 2.0 - 1.0;
    if position.is_finite() {
        position.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{AudioStream, SnapshotMode, StreamReader};

    #[test]
    fn balance_mapping_covers_extremes() {
        assert_eq!(balance_position([0.0, 0.0]), 0.0);
        assert_eq!(balance_position([1.0, 0.0]), -1.0);
        assert!((balance_position([0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!(balance_position([1.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn silence_reads_centred() {
        let mut bank = StereoFilterBank::new(48_000.0, 50.0);
        let readout = bank.update(&Snapshot::stereo(&[0.0; 256], &[0.0; 256]));
        assert_eq!(readout, StereoReadout::default());
    }

    #[test]
    fn mono_signal_converges_to_in_phase_centre() {
        let mut bank = StereoFilterBank::new(1000.0, 10.0);
        let signal: Vec<f32> = (0..2000).map(|i| (i as f32 * 0.1).sin()).collect();
        let readout = bank.update(&Snapshot::stereo(&signal, &signal));

        assert!(readout.balance_quick.abs() < 1e-3);
        assert!(readout.phase_quick > 0.99);
        assert!(readout.phase_slow > 0.9);
    }

    #[test]
    fn inverted_right_channel_reads_out_of_phase() {
        let mut bank = StereoFilterBank::new(1000.0, 10.0);
        let left: Vec<f32> = (0..2000).map(|i| (i as f32 * 0.1).sin()).collect();
        let right: Vec<f32> = left.iter().map(|s| -s).collect();
        let readout = bank.update(&Snapshot::stereo(&left, &right));
        assert!(readout.phase_quick < -0.99);
    }

    #[test]
    fn slow_tracker_lags_quick_tracker() {
        let mut bank = StereoFilterBank::new(1000.0, 10.0);
        let readout = bank.update(&Snapshot::stereo(&[0.0; 20], &[0.8; 20]));
        assert!(readout.balance_quick > 0.9);
        assert!(readout.balance_slow > 0.0);
        assert!(readout.phase_quick.abs() < 1e-6);

        let mut quick_only = bank.clone();
        quick_only.reset();
        quick_only.update(&Snapshot::stereo(&[0.5; 20], &[0.0; 20]));
        let state = quick_only.state();
        assert!(state.balance[QUICK][0] > state.balance[SLOW][0]);
    }

    #[test]
    fn repeated_stream_snapshot_is_not_processed_twice() {
        let stream = Arc::new(AudioStream::new(2, 1000.0, 64).unwrap());
        stream.append_samples(&[&[0.3; 16], &[0.1; 16]]).unwrap();
        let mut reader = StreamReader::new(stream.clone());
        let snapshot = reader.acquire_snapshot(SnapshotMode::Synced).unwrap().clone();

        let mut bank = StereoFilterBank::new(1000.0, 10.0);
        let first = bank.update(&snapshot);
        let second = bank.update(&snapshot);
        assert_eq!(first, second);

        stream.append_samples(&[&[0.0; 16], &[0.9; 16]]).unwrap();
        let next = reader.acquire_snapshot(SnapshotMode::Synced).unwrap();
        assert!(bank.update(next).balance_quick > first.balance_quick);
    }

    #[test]
    fn offline_snapshots_are_always_processed() {
        let mut bank = StereoFilterBank::new(1000.0, 10.0);
        let left_only = bank.update(&Snapshot::stereo(&[0.5; 64], &[0.0; 64]));
        assert!(left_only.balance_quick < -0.9);

        let right_only = bank.update(&Snapshot::stereo(&[0.0; 64], &[0.5; 64]));
        assert!(right_only.balance_quick > 0.9);
    }
}
