//! Static guide geometry drawn behind the plot: grid or half circles, the
//! axes, and where the channel captions go.

use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2, TAU};

use serde::{Deserialize, Serialize};

use super::{quarter_circle, OperationalMode};

const GRID_LINES: usize = 14;
const CIRCLE_RESOLUTION: usize = 128;
/// Captions sit just outside the unit circle.
const LABEL_RADIUS: f32 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub from: [f32; 3],
    pub to: [f32; 3],
}

impl LineSegment {
    fn new(from: [f32; 3], to: [f32; 3]) -> Self {
        Self { from, to }
    }
}

/// `grid` is drawn in the wire colour, `axes` in the graph colour.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wireframe {
    pub grid: Vec<LineSegment>,
    pub axes: Vec<LineSegment>,
}

pub fn wireframe(mode: OperationalMode) -> Wireframe {
    let grid = match mode {
        OperationalMode::Lissajous => rect_grid(),
        OperationalMode::Polar => polar_grid(),
    };
    let bottom = match mode {
        OperationalMode::Lissajous => -1.0,
        OperationalMode::Polar => 0.0,
    };
    let axes = vec![
        LineSegment::new([-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]),
        LineSegment::new([0.0, 1.0, 0.0], [0.0, bottom, 0.0]),
    ];
    Wireframe { grid, axes }
}

/// Square grids on the front (z = 0) and back (z = -1) planes.
fn rect_grid() -> Vec<LineSegment> {
    let step = 2.0 / GRID_LINES as f32;
    let mut lines = Vec::with_capacity((GRID_LINES + 1) * 4);
    for z in [0.0, -1.0] {
        for i in 0..=GRID_LINES {
            let offset = i as f32 * step - 1.0;
            lines.push(LineSegment::new([offset, -1.0, z], [offset, 1.0, z]));
            lines.push(LineSegment::new([-1.0, offset, z], [1.0, offset, z]));
        }
    }
    lines
}

/// Upper half circles on both planes, their diameters and the 45° lines
/// marking fully left / fully right content.
fn polar_grid() -> Vec<LineSegment> {
    let lut = quarter_circle(CIRCLE_RESOLUTION);
    let intervals = lut.size();
    let advance = 1.0 / intervals as f32;

    let mut lines = Vec::with_capacity(intervals * 4 + 6);
    let mut previous_y = 0.0;
    for i in 1..=intervals {
        let fraction = advance * i as f32;
        let y = lut.linear_lookup(fraction);
        let left_x = fraction - 1.0;
        let right_x = 1.0 - fraction;
        for z in [0.0, -1.0] {
            lines.push(LineSegment::new([left_x - advance, previous_y, z], [left_x, y, z]));
            lines.push(LineSegment::new([right_x + advance, previous_y, z], [right_x, y, z]));
        }
        previous_y = y;
    }

    for z in [0.0, -1.0] {
        lines.push(LineSegment::new([-1.0, 0.0, z], [1.0, 0.0, z]));
        lines.push(LineSegment::new([0.0, 0.0, z], [FRAC_1_SQRT_2, FRAC_1_SQRT_2, z]));
        lines.push(LineSegment::new([0.0, 0.0, z], [-FRAC_1_SQRT_2, FRAC_1_SQRT_2, z]));
    }
    lines
}

/// A caption and the lower-left corner of its box in plot space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelLabel {
    pub text: &'static str,
    pub position: [f32; 2],
}

/// Caption positions around the plot.
///
/// `height_to_width` is the viewport's aspect ratio; x positions are
/// pre-divided by it so captions stay on the circle once the renderer
/// squashes the x axis back.
pub fn channel_labels(
    mode: OperationalMode,
    rotation_turns: f32,
    height_to_width: f32,
) -> Vec<ChannelLabel> {
    let aspect = if height_to_width.is_normal() {
        height_to_width
    } else {
        1.0
    };
    let offset = 1.0 - LABEL_RADIUS;

    match mode {
        OperationalMode::Lissajous => {
            let rotation = -rotation_turns * TAU;
            ["+L", "+R", "-L", "-R"]
                .into_iter()
                .enumerate()
                .map(|(quadrant, text)| {
                    let (sin, cos) = (quadrant as f32 * FRAC_PI_2 + rotation).sin_cos();
                    ChannelLabel {
                        text,
                        position: [
                            sin * LABEL_RADIUS / aspect + offset,
                            cos * LABEL_RADIUS + offset,
                        ],
                    }
                })
                .collect()
        }
        OperationalMode::Polar => {
            let x = FRAC_1_SQRT_2 * LABEL_RADIUS / aspect + offset;
            let y = FRAC_1_SQRT_2 * LABEL_RADIUS + offset;
            vec![
                ChannelLabel {
                    text: "L",
                    position: [-x + offset, y],
                },
                ChannelLabel {
                    text: "C",
                    position: [offset * 0.5, 1.0],
                },
                ChannelLabel {
                    text: "R",
                    position: [x, y],
                },
            ]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_grid_has_front_and_back_planes() {
        let frame = wireframe(OperationalMode::Lissajous);
        assert_eq!(frame.grid.len(), (GRID_LINES + 1) * 4);
        assert!(frame.grid.iter().any(|l| l.from[2] == -1.0));
        assert_eq!(frame.axes[1].to, [0.0, -1.0, 0.0]);
    }

    #[test]
    fn polar_grid_stays_in_upper_half_unit_disc() {
        let frame = wireframe(OperationalMode::Polar);
        for line in &frame.grid {
            for point in [line.from, line.to] {
                assert!(point[1] >= 0.0);
                assert!(point[0].hypot(point[1]) <= 1.0 + 1e-3);
            }
        }
        assert_eq!(frame.axes[1].to, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn lissajous_labels_rotate_with_the_plot() {
        let labels = channel_labels(OperationalMode::Lissajous, 0.0, 1.0);
        assert_eq!(labels[0].text, "+L");
        assert!((labels[0].position[1] - 1.0).abs() < 1e-6);
        assert!((labels[1].position[0] - 1.0).abs() < 1e-6);

        let turned = channel_labels(OperationalMode::Lissajous, 0.25, 1.0);
        assert!((turned[1].position[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn polar_labels_are_mirrored() {
        let labels = channel_labels(OperationalMode::Polar, 0.0, 1.0);
        let texts: Vec<_> = labels.iter().map(|l| l.text).collect();
        assert_eq!(texts, ["L", "C", "R"]);
        assert_eq!(labels[0].position[1], labels[2].position[1]);
    }
}
