//! Per-frame analysis of a snapshot: auto-gain and stereo meters.
//!
//! Both analysers keep their state across frames and are owned by the
//! render thread, so neither needs any locking.

pub mod envelope;
pub mod stereo;

pub use envelope::{
    EnvelopeEstimator, EnvelopeMode, EnvelopeState, HIGHER_AUTO_GAIN_BOUND,
    LOWER_AUTO_GAIN_BOUND,
};
pub use stereo::{BalancePhaseState, StereoFilterBank, StereoReadout, SLOW_FILTER_FACTOR};
