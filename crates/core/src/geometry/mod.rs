//! Turns a stereo snapshot into plot geometry.
//!
//! Vertices are emitted oldest sample first, which is the order a line strip
//! connects them in. The third coordinate encodes sample age: `-1` for the
//! oldest sample, approaching `0` for the newest.

mod kernel;
pub mod lut;
pub mod wireframe;

use serde::{Deserialize, Serialize};

use crate::{ProjectionConfig, Snapshot};
use kernel::{project_section, Fade, Kernel};

pub use lut::{quarter_circle, LookupTable};
pub use wireframe::{channel_labels, wireframe, ChannelLabel, LineSegment, Wireframe};

/// Lanes processed per batch by [`project`].
pub const BATCH_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationalMode {
    /// Right channel on x, left channel on y.
    #[default]
    Lissajous,
    /// Mid/side angle against max-channel magnitude, upper half plane.
    Polar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrimitiveStyle {
    #[default]
    LineStrip,
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Scales the colour channels, keeping alpha.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            r: self.r * factor,
            g: self.g * factor,
            b: self.b * factor,
            a: self.a,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.r, self.g, self.b, self.a].iter().all(|c| c.is_finite())
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Per-vertex colour when fade-history is on.
    pub color: Option<Rgba>,
}

/// Geometry for the main plot of one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotGeometry {
    pub mode: OperationalMode,
    pub style: PrimitiveStyle,
    /// Uniform colour, used for vertices without their own.
    pub color: Rgba,
    pub vertices: Vec<Vertex>,
}

impl PlotGeometry {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }
}

/// Upper bound on vertices [`project`] emits for a snapshot.
pub fn max_vertices(snapshot: &Snapshot) -> usize {
    snapshot.len()
}

/// Projects a snapshot using the batched kernel.
pub fn project(snapshot: &Snapshot, config: &ProjectionConfig) -> PlotGeometry {
    project_with_width::<BATCH_WIDTH>(snapshot, config)
}

/// Projects with an explicit batch width. `W = 1` runs every sample through
/// the lane kernel one at a time and `W = 0` uses only the scalar kernel.
pub fn project_with_width<const W: usize>(
    snapshot: &Snapshot,
    config: &ProjectionConfig,
) -> PlotGeometry {
    let mut geometry = PlotGeometry::default();
    project_into::<W>(snapshot, config, &mut geometry);
    geometry
}

/// Projects into an existing geometry buffer, reusing its allocation.
pub fn project_into<const W: usize>(
    snapshot: &Snapshot,
    config: &ProjectionConfig,
    geometry: &mut PlotGeometry,
) {
    geometry.mode = config.mode;
    geometry.style = config.style;
    geometry.color = config.draw_color;
    geometry.vertices.clear();

    let len = snapshot.len();
    if len == 0 {
        return;
    }
    geometry.vertices.reserve(len);

    let gain = if config.gain.is_finite() { config.gain } else { 1.0 };
    let kernel = match config.mode {
        OperationalMode::Lissajous => Kernel::lissajous(config.rotation, gain),
        OperationalMode::Polar => Kernel::polar(gain),
    };
    let fade = Fade {
        per_sample: 1.0 / len as f32,
        color: config.fade_history.then_some(config.draw_color),
    };

    let left = snapshot.left();
    let right = snapshot.right();
    let split = snapshot.split();
    for (start, end) in [(0, split), (split, len)] {
        project_section::<W>(
            &kernel,
            &fade,
            &left[start..end],
            &right[start..end],
            start,
            &mut geometry.vertices,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScopeConfig;

    fn pseudo_random(len: usize, seed: u32) -> Vec<f32> {
        let mut state = seed.wrapping_mul(747_796_405).wrapping_add(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }

    fn config(mode: OperationalMode, fade_history: bool) -> ProjectionConfig {
        ProjectionConfig {
            mode,
            fade_history,
            rotation: 0.1,
            gain: 1.5,
            ..ScopeConfig::default().projection(1.5)
        }
    }

    fn assert_same(a: &PlotGeometry, b: &PlotGeometry) {
        assert_eq!(a.len(), b.len());
        for (va, vb) in a.vertices.iter().zip(&b.vertices) {
            for axis in 0..3 {
                assert_eq!(va.position[axis].to_bits(), vb.position[axis].to_bits());
            }
            assert_eq!(va.color, vb.color);
        }
    }

    #[test]
    fn batched_and_scalar_paths_agree() {
        for mode in [OperationalMode::Lissajous, OperationalMode::Polar] {
            for fade in [false, true] {
                let config = config(mode, fade);
                for len in 0..40 {
                    let mut left = pseudo_random(len, len as u32);
                    let right = pseudo_random(len, len as u32 + 1000);
                    // sprinkle silent pairs at varied positions
                    for i in (0..len).step_by(3) {
                        left[i] = 0.0;
                    }
                    let snapshot = Snapshot::from_channels(&[left.as_slice(), right.as_slice()], len / 3);

                    let scalar = project_with_width::<0>(&snapshot, &config);
                    assert_same(&scalar, &project_with_width::<1>(&snapshot, &config));
                    assert_same(&scalar, &project_with_width::<4>(&snapshot, &config));
                    assert_same(&scalar, &project_with_width::<7>(&snapshot, &config));
                    assert_same(&scalar, &project_with_width::<16>(&snapshot, &config));
                }
            }
        }
    }

    #[test]
    fn lissajous_constant_scenario() {
        let snapshot = Snapshot::stereo(&[1.0; 4], &[-1.0; 4]);
        let config = ProjectionConfig {
            mode: OperationalMode::Lissajous,
            rotation: 0.0,
            gain: 1.0,
            ..Default::default()
        };
        let geometry = project(&snapshot, &config);
        assert_eq!(geometry.len(), 4);
        for vertex in &geometry.vertices {
            assert_eq!(vertex.position[0], -1.0);
            assert_eq!(vertex.position[1], 1.0);
        }
    }

    #[test]
    fn polar_constant_scenario() {
        let snapshot = Snapshot::stereo(&[1.0; 4], &[-1.0; 4]);
        let config = ProjectionConfig {
            mode: OperationalMode::Polar,
            gain: 1.0,
            ..Default::default()
        };
        let geometry = project(&snapshot, &config);
        assert_eq!(geometry.len(), 4);
        let first = geometry.vertices[0].position;
        for vertex in &geometry.vertices {
            assert_eq!(vertex.position[0], first[0]);
            assert_eq!(vertex.position[1], first[1]);
        }
        let magnitude = first[0].hypot(first[1]);
        assert!((magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_snapshot_projects_nothing() {
        for mode in [OperationalMode::Lissajous, OperationalMode::Polar] {
            let geometry = project(&Snapshot::default(), &config(mode, true));
            assert!(geometry.is_empty());
        }
    }

    #[test]
    fn polar_silence_is_finite_at_every_position() {
        let config = config(OperationalMode::Polar, true);
        for len in 1..24 {
            let silent = vec![0.0_f32; len];
            let snapshot = Snapshot::from_channels(&[silent.as_slice(), silent.as_slice()], len / 2);
            for geometry in [
                project_with_width::<0>(&snapshot, &config),
                project_with_width::<4>(&snapshot, &config),
                project_with_width::<8>(&snapshot, &config),
            ] {
                for vertex in &geometry.vertices {
                    assert_eq!(vertex.position[0], 0.0);
                    assert_eq!(vertex.position[1], 0.0);
                    assert!(vertex.position[2].is_finite());
                }
            }
        }
    }

    #[test]
    fn polar_tiny_samples_stay_finite() {
        let tiny = [f32::MIN_POSITIVE, 1e-45, -1e-45, 1e-40, 0.0, -0.0];
        let snapshot = Snapshot::stereo(&tiny, &[1e-45, 1e-45, 1e-45, -1e-40, -1e-45, 0.0]);
        let geometry = project(&snapshot, &config(OperationalMode::Polar, false));
        for vertex in &geometry.vertices {
            assert!(vertex.position.iter().all(|c| c.is_finite()));
        }
    }

    #[test]
    fn fade_is_continuous_across_the_wrap() {
        let len = 37;
        let left = pseudo_random(len, 3);
        let right = pseudo_random(len, 4);
        let snapshot = Snapshot::from_channels(&[left.as_slice(), right.as_slice()], 22);
        let config = config(OperationalMode::Polar, true);
        let geometry = project(&snapshot, &config);

        let step = 1.0 / len as f32;
        let fades: Vec<f32> = geometry
            .vertices
            .iter()
            .map(|vertex| vertex.color.unwrap().r / config.draw_color.r)
            .collect();

        // newest last: fade never decreases toward the newest sample
        for pair in fades.windows(2) {
            assert!(pair[1] >= pair[0]);
            assert!(pair[1] - pair[0] <= step + 1e-6);
        }
        for pair in geometry.vertices.windows(2) {
            let delta = pair[1].position[2] - pair[0].position[2];
            assert!(delta > 0.0 && delta <= step + 1e-6);
        }
    }

    #[test]
    fn uniform_colour_without_fade() {
        let snapshot = Snapshot::stereo(&[0.1, 0.2], &[0.3, 0.4]);
        let mut config = config(OperationalMode::Lissajous, false);
        config.style = PrimitiveStyle::Points;
        let geometry = project(&snapshot, &config);
        assert!(geometry.vertices.iter().all(|v| v.color.is_none()));
        assert_eq!(geometry.color, config.draw_color);
        assert_eq!(geometry.style, PrimitiveStyle::Points);
        assert!(geometry.len() <= max_vertices(&snapshot));
    }
}
