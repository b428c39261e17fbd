//! Per-frame orchestration: snapshot, analysis, projection, hand-off.

use serde::Serialize;

use crate::audio::ms_to_samples;
use crate::geometry::{channel_labels, project_into, wireframe, BATCH_WIDTH};
use crate::overlay::MeterQuad;
use crate::timeline::{BoxFilter, Diagnostics, FrameClock, FRAME_TIME_HISTORY};
use crate::{
    ChannelLabel, EnvelopeEstimator, MeterOverlay, PlotGeometry, Result, Rgba, ScopeConfig,
    SnapshotMode, StereoFilterBank, StereoReadout, StreamReader, Wireframe,
};

/// Consumer of finished frames, typically a GPU or 2D drawing layer.
pub trait RenderBackend {
    fn submit(&mut self, frame: &FrameOutput) -> Result<()>;
}

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FrameOutput {
    pub plot: PlotGeometry,
    pub primitive_size: f32,
    pub gain: f32,
    pub readout: StereoReadout,
    pub meters: Option<MeterOverlay>,
    pub meter_quads: Vec<MeterQuad>,
    pub wireframe: Option<Wireframe>,
    pub wire_color: Rgba,
    pub graph_color: Rgba,
    pub labels: Vec<ChannelLabel>,
    pub frozen: bool,
    /// Stream position of the plotted history's oldest sample.
    pub window_start: Option<u64>,
    pub diagnostics: Diagnostics,
}

impl FrameOutput {
    /// True when there is nothing to plot.
    pub fn is_empty(&self) -> bool {
        self.plot.is_empty()
    }

    fn clear(&mut self) {
        self.plot.vertices.clear();
        self.meters = None;
        self.meter_quads.clear();
        self.wireframe = None;
        self.labels.clear();
        self.window_start = None;
    }
}

/// Runs the vectorscope pipeline once per display tick on the render thread.
#[derive(Debug)]
pub struct RenderFrameProducer {
    reader: StreamReader,
    config: ScopeConfig,
    estimator: EnvelopeEstimator,
    filters: StereoFilterBank,
    frame: FrameOutput,
    height_to_width: f32,
    frame_times: BoxFilter<FRAME_TIME_HISTORY>,
    throughput: BoxFilter<FRAME_TIME_HISTORY>,
    last_samples_written: Option<u64>,
    frames_rendered: u64,
}

impl RenderFrameProducer {
    pub fn new(reader: StreamReader, config: ScopeConfig) -> Result<Self> {
        config.validate()?;

        let sample_rate = reader.stream().sample_rate();
        let mut estimator = EnvelopeEstimator::new(sample_rate, config.envelope_window_ms);
        estimator.set_mode(config.envelope_mode);
        let filters = StereoFilterBank::new(sample_rate, config.stereo_window_ms);

        let mut producer = Self {
            reader,
            config: config.clone(),
            estimator,
            filters,
            frame: FrameOutput::default(),
            height_to_width: 1.0,
            frame_times: BoxFilter::new(),
            throughput: BoxFilter::new(),
            last_samples_written: None,
            frames_rendered: 0,
        };
        producer.apply_freeze();
        if producer.reader.stream().capacity()?
            != ms_to_samples(sample_rate, config.history_capacity_ms)
        {
            producer
                .reader
                .stream()
                .request_capacity_ms(config.history_capacity_ms)?;
        }
        Ok(producer)
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    pub fn reader(&self) -> &StreamReader {
        &self.reader
    }

    pub fn estimator(&self) -> &EnvelopeEstimator {
        &self.estimator
    }

    pub fn filters(&self) -> &StereoFilterBank {
        &self.filters
    }

    /// The frame built by the most recent [`Self::render_frame`].
    pub fn last_frame(&self) -> &FrameOutput {
        &self.frame
    }

    /// Swaps in a new configuration. An invalid configuration is rejected
    /// and the current one stays in effect.
    pub fn set_config(&mut self, config: ScopeConfig) -> Result<()> {
        if let Err(err) = config.validate() {
            tracing::warn!(error = %err, "rejected vectorscope configuration");
            return Err(err);
        }

        if config.history_capacity_ms != self.config.history_capacity_ms {
            self.reader
                .stream()
                .request_capacity_ms(config.history_capacity_ms)?;
        }
        if config.envelope_window_ms != self.config.envelope_window_ms {
            self.estimator.set_window_ms(config.envelope_window_ms);
        }
        if config.stereo_window_ms != self.config.stereo_window_ms {
            self.filters.set_window_ms(config.stereo_window_ms);
        }
        self.estimator.set_mode(config.envelope_mode);

        tracing::debug!(mode = ?config.mode, frozen = config.is_frozen, "applied configuration");
        self.config = config;
        self.apply_freeze();
        Ok(())
    }

    /// Viewport height divided by width, used to place the channel captions.
    pub fn set_aspect_ratio(&mut self, height_to_width: f32) {
        if height_to_width.is_normal() && height_to_width > 0.0 {
            self.height_to_width = height_to_width;
        }
    }

    /// Builds one frame. `elapsed_seconds` is the time since the previous
    /// frame.
    ///
    /// A stream that has not received audio yet produces an empty frame.
    /// Gain and filter state carry over untouched into the next frame when
    /// this fails.
    pub fn render_frame(&mut self, elapsed_seconds: f32) -> Result<&FrameOutput> {
        self.apply_freeze();
        self.record_timing(elapsed_seconds)?;

        let mode = if self.config.synced {
            SnapshotMode::Synced
        } else {
            SnapshotMode::Live
        };
        self.frame.frozen = self.reader.is_frozen();
        self.frame.diagnostics = self.diagnostics();
        self.frame.primitive_size = self.config.primitive_size;
        self.frame.wire_color = self.config.wire_color;
        self.frame.graph_color = self.config.graph_color;

        let snapshot = self.reader.acquire_snapshot(mode)?;
        if snapshot.is_empty() {
            self.frame.clear();
            self.frame.gain = if self.config.normalize_gain {
                self.estimator.gain()
            } else {
                1.0
            };
            self.frame.readout = self.filters.outputs();
            return Ok(&self.frame);
        }

        let gain = if self.config.normalize_gain {
            self.estimator.update(snapshot, elapsed_seconds)
        } else {
            1.0
        };
        let readout = self.filters.update(snapshot);

        let projection = self.config.projection(gain);
        project_into::<BATCH_WIDTH>(snapshot, &projection, &mut self.frame.plot);
        self.frame.window_start = snapshot.window_start(0);
        self.frame.gain = gain;
        self.frame.readout = readout;

        self.frame.meter_quads.clear();
        if self.config.show_meters {
            let meters = MeterOverlay::from_readout(&readout);
            self.frame
                .meter_quads
                .extend(meters.quads(self.config.meter_color, self.config.graph_color));
            self.frame.meters = Some(meters);
        } else {
            self.frame.meters = None;
        }

        self.frame.labels.clear();
        if self.config.show_wireframe {
            self.frame.wireframe = Some(wireframe(self.config.mode));
            self.frame.labels.extend(channel_labels(
                self.config.mode,
                self.config.rotation,
                self.height_to_width,
            ));
        } else {
            self.frame.wireframe = None;
        }

        tracing::trace!(
            vertices = self.frame.plot.len(),
            gain,
            balance = readout.balance_slow,
            phase = readout.phase_slow,
            "built vectorscope frame"
        );
        Ok(&self.frame)
    }

    /// Advances the clock, renders and submits one frame.
    ///
    /// A frame that fails to build is submitted empty so the backend keeps
    /// its cadence; only backend errors are returned.
    pub fn tick(&mut self, clock: &mut FrameClock, backend: &mut dyn RenderBackend) -> Result<()> {
        let delta = clock.tick();
        self.render_and_submit(delta, backend)
    }

    /// Like [`Self::tick`] with an explicit frame delta.
    pub fn render_and_submit(
        &mut self,
        elapsed_seconds: f32,
        backend: &mut dyn RenderBackend,
    ) -> Result<()> {
        let built = self.render_frame(elapsed_seconds).map(|_| ());
        if let Err(err) = built {
            tracing::warn!(error = %err, "dropping vectorscope frame");
            self.frame.clear();
        }
        backend.submit(&self.frame)
    }

    fn apply_freeze(&mut self) {
        if self.config.is_frozen {
            self.reader.freeze();
        } else {
            self.reader.unfreeze();
        }
    }

    fn record_timing(&mut self, elapsed_seconds: f32) -> Result<()> {
        let written = self.reader.stream().samples_written()?;
        if elapsed_seconds.is_finite() && elapsed_seconds > 0.0 {
            self.frame_times.push(elapsed_seconds as f64);
            if let Some(previous) = self.last_samples_written {
                let arrived = written.saturating_sub(previous) as f64;
                self.throughput.push(arrived / elapsed_seconds as f64);
            }
        }
        self.last_samples_written = Some(written);
        self.frames_rendered += 1;
        Ok(())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let average_frame_time = self.frame_times.average();
        Diagnostics {
            average_frame_time,
            fps: if average_frame_time > 0.0 {
                1.0 / average_frame_time
            } else {
                0.0
            },
            samples_per_second: self.throughput.average(),
            frames_rendered: self.frames_rendered,
        }
    }
}
