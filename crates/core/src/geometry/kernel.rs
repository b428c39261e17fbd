//! Per-sample projection arithmetic in two forms: a lane kernel over
//! `[f32; W]` arrays and a scalar kernel for chunk remainders.
//!
//! Both forms perform the same IEEE operations in the same order on each
//! sample, so for equal input they produce bit-identical output.

use std::f32::consts::{FRAC_1_SQRT_2, TAU};

use super::{Rgba, Vertex};

/// Rotates left/right by 135° so that a mono signal points straight up.
const ROTATION_COS: f32 = -FRAC_1_SQRT_2;
const ROTATION_SIN: f32 = FRAC_1_SQRT_2;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Kernel {
    Lissajous { cos: f32, sin: f32, gain: f32 },
    Polar { gain: f32 },
}

impl Kernel {
    pub(crate) fn lissajous(rotation_turns: f32, gain: f32) -> Self {
        let (sin, cos) = (rotation_turns * TAU).sin_cos();
        Self::Lissajous { cos, sin, gain }
    }

    pub(crate) fn polar(gain: f32) -> Self {
        Self::Polar { gain }
    }

    #[inline]
    pub(crate) fn point(&self, left: f32, right: f32) -> (f32, f32) {
        let left = sanitize(left);
        let right = sanitize(right);
        match *self {
            Self::Lissajous { cos, sin, gain } => {
                let x = right * cos - left * sin;
                let y = right * sin + left * cos;
                (x * gain, y * gain)
            }
            Self::Polar { gain } => {
                let length = left.abs().max(right.abs());
                let y = left * ROTATION_COS - right * ROTATION_SIN;
                let x = left * ROTATION_SIN + right * ROTATION_COS;
                let mut angle = (x / y).atan();
                if (left == 0.0 && right == 0.0) || angle.is_nan() {
                    angle = 0.0;
                }
                let (sin, cos) = angle.sin_cos();
                (sin * length * gain, cos * length * gain)
            }
        }
    }

    #[inline]
    pub(crate) fn lanes<const W: usize>(
        &self,
        left: &[f32; W],
        right: &[f32; W],
        out_x: &mut [f32; W],
        out_y: &mut [f32; W],
    ) {
        let mut l = [0.0_f32; W];
        let mut r = [0.0_f32; W];
        for n in 0..W {
            l[n] = sanitize(left[n]);
            r[n] = sanitize(right[n]);
        }

        match *self {
            Self::Lissajous { cos, sin, gain } => {
                for n in 0..W {
                    out_x[n] = (r[n] * cos - l[n] * sin) * gain;
                    out_y[n] = (r[n] * sin + l[n] * cos) * gain;
                }
            }
            Self::Polar { gain } => {
                let mut length = [0.0_f32; W];
                let mut angle = [0.0_f32; W];
                for n in 0..W {
                    length[n] = l[n].abs().max(r[n].abs());
                }
                for n in 0..W {
                    let y = l[n] * ROTATION_COS - r[n] * ROTATION_SIN;
                    let x = l[n] * ROTATION_SIN + r[n] * ROTATION_COS;
                    angle[n] = (x / y).atan();
                }
                // select: silent pairs and NaN quotients fall back to angle 0
                for n in 0..W {
                    let silent = l[n] == 0.0 && r[n] == 0.0;
                    if silent || angle[n].is_nan() {
                        angle[n] = 0.0;
                    }
                }
                for n in 0..W {
                    let (sin, cos) = angle[n].sin_cos();
                    out_x[n] = sin * length[n] * gain;
                    out_y[n] = cos * length[n] * gain;
                }
            }
        }
    }
}

#[inline]
fn sanitize(sample: f32) -> f32 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

/// Fade settings shared by every section of one projection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fade {
    pub(crate) per_sample: f32,
    pub(crate) color: Option<Rgba>,
}

impl Fade {
    #[inline]
    fn vertex(&self, index: usize, x: f32, y: f32) -> Vertex {
        let fade = index as f32 * self.per_sample;
        Vertex {
            position: [x, y, fade - 1.0],
            color: self.color.map(|color| color.scaled(fade)),
        }
    }
}

/// Projects one section. `base` is the global index of the section's first
/// sample so the fade continues across sections.
pub(crate) fn project_section<const W: usize>(
    kernel: &Kernel,
    fade: &Fade,
    left: &[f32],
    right: &[f32],
    base: usize,
    out: &mut Vec<Vertex>,
) {
    let len = left.len().min(right.len());
    let batched = match len.checked_rem(W) {
        Some(rem) => len - rem,
        None => 0,
    };

    let mut lanes_left = [0.0_f32; W];
    let mut lanes_right = [0.0_f32; W];
    let mut xs = [0.0_f32; W];
    let mut ys = [0.0_f32; W];

    let mut index = 0;
    while index < batched {
        lanes_left.copy_from_slice(&left[index..index + W]);
        lanes_right.copy_from_slice(&right[index..index + W]);
        kernel.lanes(&lanes_left, &lanes_right, &mut xs, &mut ys);
        for n in 0..W {
            out.push(fade.vertex(base + index + n, xs[n], ys[n]));
        }
        index += W;
    }

    for i in batched..len {
        let (x, y) = kernel.point(left[i], right[i]);
        out.push(fade.vertex(base + i, x, y));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polar_silence_maps_to_origin() {
        let kernel = Kernel::polar(1.0);
        let (x, y) = kernel.point(0.0, 0.0);
        assert_eq!((x, y), (0.0, 0.0));

        let mut xs = [f32::NAN; 4];
        let mut ys = [f32::NAN; 4];
        kernel.lanes(&[0.0, -0.0, 0.0, 0.0], &[0.0, 0.0, -0.0, 0.0], &mut xs, &mut ys);
        assert!(xs.iter().chain(&ys).all(|v| *v == 0.0));
    }

    #[test]
    fn polar_mono_points_up() {
        let (x, y) = Kernel::polar(1.0).point(0.5, 0.5);
        assert!(x.abs() < 1e-6);
        assert!((y.abs() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn non_finite_samples_are_silenced() {
        for kernel in [Kernel::polar(1.0), Kernel::lissajous(0.1, 2.0)] {
            let (x, y) = kernel.point(f32::NAN, f32::INFINITY);
            assert!(x.is_finite() && y.is_finite());
        }
    }

    #[test]
    fn quarter_turn_rotates_lissajous() {
        let (x, y) = Kernel::lissajous(0.25, 1.0).point(0.0, 1.0);
        assert!(x.abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
    }
}
