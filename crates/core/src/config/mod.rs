use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EnvelopeMode, OperationalMode, PrimitiveStyle, Result, Rgba, VectorScopeError};

/// Longest audio history a stream may be configured to keep.
pub const MAX_HISTORY_MS: u32 = 60_000;

/// Top-level configuration consumed from external settings. Every field has a
/// default so partial JSON documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub mode: OperationalMode,
    /// Run the envelope estimator and scale the plot by its auto-gain.
    pub normalize_gain: bool,
    pub is_frozen: bool,
    /// Connect consecutive samples into a line strip instead of points.
    pub fill_path: bool,
    pub fade_history: bool,
    /// Plot rotation in full turns (1.0 = 360°), Lissajous mode only.
    pub rotation: f32,
    pub envelope_mode: EnvelopeMode,
    pub draw_color: Rgba,
    pub history_capacity_ms: u32,
    /// Lock all channels together while snapshotting.
    pub synced: bool,
    pub envelope_window_ms: f32,
    pub stereo_window_ms: f32,
    pub show_wireframe: bool,
    pub show_meters: bool,
    pub primitive_size: f32,
    pub meter_color: Rgba,
    pub wire_color: Rgba,
    pub graph_color: Rgba,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            mode: OperationalMode::Lissajous,
            normalize_gain: true,
            is_frozen: false,
            fill_path: true,
            fade_history: true,
            rotation: 0.0,
            envelope_mode: EnvelopeMode::PeakDecay,
            draw_color: Rgba::new(0.4, 1.0, 0.6, 1.0),
            history_capacity_ms: 1000,
            synced: true,
            envelope_window_ms: 1000.0,
            stereo_window_ms: 100.0,
            show_wireframe: true,
            show_meters: true,
            primitive_size: 0.1,
            meter_color: Rgba::new(0.9, 0.6, 0.2, 1.0),
            wire_color: Rgba::new(0.2, 0.2, 0.25, 1.0),
            graph_color: Rgba::new(0.5, 0.5, 0.55, 1.0),
        }
    }
}

impl ScopeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every field that could put the pipeline into an undefined
    /// state. Callers keep their previous configuration when this fails.
    pub fn validate(&self) -> Result<()> {
        if !self.rotation.is_finite() {
            return Err(VectorScopeError::invalid_config("rotation must be finite"));
        }
        if !self.primitive_size.is_finite() || self.primitive_size < 0.0 {
            return Err(VectorScopeError::invalid_config(
                "primitive size must be a non-negative number",
            ));
        }
        validate_window("envelope window", self.envelope_window_ms)?;
        validate_window("stereo window", self.stereo_window_ms)?;
        validate_history_ms(self.history_capacity_ms)?;
        for (name, color) in [
            ("draw colour", self.draw_color),
            ("meter colour", self.meter_color),
            ("wire colour", self.wire_color),
            ("graph colour", self.graph_color),
        ] {
            if !color.is_finite() {
                return Err(VectorScopeError::invalid_config(format!(
                    "{name} has non-finite components"
                )));
            }
        }
        Ok(())
    }

    /// Freezes the projection-relevant part of the configuration for one frame.
    pub fn projection(&self, gain: f32) -> ProjectionConfig {
        ProjectionConfig {
            mode: self.mode,
            rotation: self.rotation,
            gain,
            style: if self.fill_path {
                PrimitiveStyle::LineStrip
            } else {
                PrimitiveStyle::Points
            },
            fade_history: self.fade_history,
            draw_color: self.draw_color,
        }
    }
}

pub(crate) fn validate_history_ms(ms: u32) -> Result<()> {
    if ms == 0 {
        return Err(VectorScopeError::invalid_config(
            "history capacity must be at least 1 ms",
        ));
    }
    if ms > MAX_HISTORY_MS {
        return Err(VectorScopeError::invalid_config(format!(
            "history capacity of {ms} ms exceeds the {MAX_HISTORY_MS} ms limit"
        )));
    }
    Ok(())
}

fn validate_window(name: &str, ms: f32) -> Result<()> {
    if ms.is_finite() && ms > 0.0 {
        Ok(())
    } else {
        Err(VectorScopeError::invalid_config(format!(
            "{name} must be a positive number of milliseconds, got {ms}"
        )))
    }
}

/// Immutable per-frame projection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    pub mode: OperationalMode,
    pub rotation: f32,
    pub gain: f32,
    pub style: PrimitiveStyle,
    pub fade_history: bool,
    pub draw_color: Rgba,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ScopeConfig::default().projection(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ScopeConfig::default().validate().unwrap();
    }

    #[test]
    fn parses_partial_json() {
        let config =
            ScopeConfig::from_json_str(r#"{ "mode": "Polar", "rotation": 0.125 }"#).unwrap();
        assert_eq!(config.mode, OperationalMode::Polar);
        assert_eq!(config.rotation, 0.125);
        assert_eq!(config.history_capacity_ms, 1000);
    }

    #[test]
    fn rejects_out_of_range_history() {
        let err = ScopeConfig::from_json_str(r#"{ "history_capacity_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, VectorScopeError::InvalidConfig(_)));

        let config = ScopeConfig {
            history_capacity_ms: MAX_HISTORY_MS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_windows_and_rotation() {
        let config = ScopeConfig {
            envelope_window_ms: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ScopeConfig {
            rotation: f32::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_round_trip_preserves_values() {
        let config = ScopeConfig {
            fade_history: false,
            envelope_mode: EnvelopeMode::Rms,
            ..Default::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(ScopeConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn projection_reflects_fill_style() {
        let mut config = ScopeConfig::default();
        assert_eq!(config.projection(2.0).style, PrimitiveStyle::LineStrip);
        config.fill_path = false;
        let projection = config.projection(2.0);
        assert_eq!(projection.style, PrimitiveStyle::Points);
        assert_eq!(projection.gain, 2.0);
    }
}
