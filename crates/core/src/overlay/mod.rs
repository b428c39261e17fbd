//! Balance and correlation meter placement, in normalised device
//! coordinates (both axes span `[-1, 1]`).

use serde::{Deserialize, Serialize};

use crate::{Rgba, StereoReadout};

const BALANCE_X: f32 = -0.925;
const BALANCE_LENGTH: f32 = 1.8;
const STEREO_Y: f32 = -0.8;
const STEREO_LENGTH: f32 = 1.7;
const SIDE_SIZE: f32 = 0.05;
const INDICATOR_SIZE: f32 = 0.05;

const SLOW_BRIGHTNESS: f32 = 0.75;
const OUTLINE_BRIGHTNESS: f32 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, other: &Rect) -> bool {
        const SLACK: f32 = 1e-5;
        other.x >= self.x - SLACK
            && other.y >= self.y - SLACK
            && other.x + other.width <= self.x + self.width + SLACK
            && other.y + other.height <= self.y + self.height + SLACK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RectStyle {
    Fill,
    Outline,
}

/// A meter rectangle with its final colour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterQuad {
    pub bounds: Rect,
    pub color: Rgba,
    pub style: RectStyle,
}

/// One meter: a track with slow and quick needles and a centre mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Meter {
    pub outline: Rect,
    pub slow: Rect,
    pub quick: Rect,
    pub centre: Rect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeterOverlay {
    /// Horizontal, along the bottom edge.
    pub balance: Meter,
    /// Vertical, along the right edge.
    pub correlation: Meter,
}

impl MeterOverlay {
    pub fn from_readout(readout: &StereoReadout) -> Self {
        let balance_slow = to_fraction(readout.balance_slow);
        let balance_quick = to_fraction(readout.balance_quick);
        let phase_slow = to_fraction(readout.phase_slow);
        let phase_quick = to_fraction(readout.phase_quick);

        let quick_size = INDICATOR_SIZE * 0.25;
        // Centre marks end at the track midpoint instead of straddling it.
        let centre_size = INDICATOR_SIZE * 0.125;

        let balance = Meter {
            outline: Rect::new(BALANCE_X, BALANCE_X, BALANCE_LENGTH, SIDE_SIZE),
            slow: Rect::new(
                BALANCE_X + (BALANCE_LENGTH - INDICATOR_SIZE) * balance_slow,
                BALANCE_X,
                INDICATOR_SIZE,
                SIDE_SIZE,
            ),
            quick: Rect::new(
                BALANCE_X + (BALANCE_LENGTH - quick_size) * balance_quick,
                BALANCE_X,
                quick_size,
                SIDE_SIZE,
            ),
            centre: Rect::new(
                BALANCE_X + BALANCE_LENGTH * 0.5 - centre_size,
                BALANCE_X,
                centre_size,
                SIDE_SIZE,
            ),
        };

        let correlation_x = -BALANCE_X;
        let correlation = Meter {
            outline: Rect::new(correlation_x, STEREO_Y, SIDE_SIZE, STEREO_LENGTH),
            slow: Rect::new(
                correlation_x,
                STEREO_Y + (STEREO_LENGTH - INDICATOR_SIZE) * phase_slow,
                SIDE_SIZE,
                INDICATOR_SIZE,
            ),
            quick: Rect::new(
                correlation_x,
                STEREO_Y + (STEREO_LENGTH - quick_size) * phase_quick,
                SIDE_SIZE,
                quick_size,
            ),
            centre: Rect::new(
                correlation_x,
                STEREO_Y + STEREO_LENGTH * 0.5 - centre_size,
                SIDE_SIZE,
                centre_size,
            ),
        };

        Self {
            balance,
            correlation,
        }
    }

    /// Coloured rectangles in draw order. The centre marks use
    /// `centre_color`, which should contrast with the background.
    pub fn quads(&self, meter_color: Rgba, centre_color: Rgba) -> Vec<MeterQuad> {
        let mut quads = Vec::with_capacity(8);
        for meter in [&self.balance, &self.correlation] {
            quads.push(MeterQuad {
                bounds: meter.slow,
                color: meter_color.scaled(SLOW_BRIGHTNESS),
                style: RectStyle::Fill,
            });
            quads.push(MeterQuad {
                bounds: meter.quick,
                color: meter_color,
                style: RectStyle::Fill,
            });
        }
        for meter in [&self.balance, &self.correlation] {
            quads.push(MeterQuad {
                bounds: meter.outline,
                color: meter_color.scaled(OUTLINE_BRIGHTNESS),
                style: RectStyle::Outline,
            });
        }
        for meter in [&self.balance, &self.correlation] {
            quads.push(MeterQuad {
                bounds: meter.centre,
                color: centre_color,
                style: RectStyle::Fill,
            });
        }
        quads
    }
}

/// `[-1, 1]` meter value to a `[0, 1]` position along the track.
fn to_fraction(value: f32) -> f32 {
    if value.is_finite() {
        (value * 0.5 + 0.5).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readout(balance: f32, phase: f32) -> StereoReadout {
        StereoReadout {
            balance_quick: balance,
            balance_slow: balance,
            phase_quick: phase,
            phase_slow: phase,
        }
    }

    #[test]
    fn needles_stay_inside_their_tracks() {
        for value in [-1.0, -0.3, 0.0, 0.7, 1.0, f32::NAN, 5.0] {
            let overlay = MeterOverlay::from_readout(&readout(value, value));
            for meter in [overlay.balance, overlay.correlation] {
                assert!(meter.outline.contains(&meter.slow));
                assert!(meter.outline.contains(&meter.quick));
                assert!(meter.outline.contains(&meter.centre));
            }
        }
    }

    #[test]
    fn centred_readout_puts_needles_mid_track() {
        let overlay = MeterOverlay::from_readout(&StereoReadout::default());
        let balance = overlay.balance;
        let needle_mid = balance.slow.x + balance.slow.width * 0.5;
        let track_mid = balance.outline.x + balance.outline.width * 0.5;
        assert!((needle_mid - track_mid).abs() < 1e-5);
    }

    #[test]
    fn centre_marks_end_at_the_midpoint() {
        let overlay = MeterOverlay::from_readout(&StereoReadout::default());
        let balance = overlay.balance;
        let balance_mid = balance.outline.x + balance.outline.width * 0.5;
        assert!((balance.centre.x + balance.centre.width - balance_mid).abs() < 1e-6);

        let correlation = overlay.correlation;
        let correlation_mid = correlation.outline.y + correlation.outline.height * 0.5;
        assert!(
            (correlation.centre.y + correlation.centre.height - correlation_mid).abs() < 1e-6
        );
    }

    #[test]
    fn full_right_balance_reaches_track_end() {
        let overlay = MeterOverlay::from_readout(&readout(1.0, -1.0));
        let balance = overlay.balance;
        let end = balance.outline.x + balance.outline.width;
        assert!((balance.quick.x + balance.quick.width - end).abs() < 1e-5);
        assert!((overlay.correlation.slow.y - STEREO_Y).abs() < 1e-6);
    }

    #[test]
    fn quads_dim_slow_needles_and_outlines() {
        let color = Rgba::new(1.0, 0.5, 0.2, 1.0);
        let quads = MeterOverlay::from_readout(&readout(0.0, 0.0)).quads(color, Rgba::default());
        assert_eq!(quads.len(), 8);
        assert_eq!(quads[0].color, color.scaled(SLOW_BRIGHTNESS));
        assert_eq!(quads[1].color, color);
        assert_eq!(quads[4].style, RectStyle::Outline);
    }
}
