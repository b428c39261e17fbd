//! Core library for the stereo vectorscope.
//!
//! An audio thread appends blocks into a shared [`AudioStream`]; once per
//! display tick the render thread's [`RenderFrameProducer`] snapshots the
//! history, updates the auto-gain and stereo meters, and projects the
//! samples into plot geometry for whatever [`RenderBackend`] draws it.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod geometry;
pub mod overlay;
pub mod render;
pub mod timeline;

pub use analysis::{
    BalancePhaseState, EnvelopeEstimator, EnvelopeMode, EnvelopeState, StereoFilterBank,
    StereoReadout,
};
pub use audio::{AudioStream, Snapshot, SnapshotMode, StreamInfo, StreamReader, MAX_CHANNELS};
pub use config::{ProjectionConfig, ScopeConfig};
pub use error::{Result, VectorScopeError};
pub use geometry::{
    project, ChannelLabel, OperationalMode, PlotGeometry, PrimitiveStyle, Rgba, Vertex, Wireframe,
};
pub use overlay::MeterOverlay;
pub use render::{FrameOutput, RenderBackend, RenderFrameProducer};
pub use timeline::{BoxFilter, Diagnostics, FrameClock};
