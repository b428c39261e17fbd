/// Piecewise-linear interpolation table over `[0, 1]`.
///
/// Holds `size + 1` points so that a lookup at exactly 1.0 still has a right
/// neighbour.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    table: Vec<f32>,
}

impl LookupTable {
    /// Samples `f` at `size + 1` evenly spaced points in `[0, 1]`.
    pub fn from_fn(size: usize, f: impl Fn(f32) -> f32) -> Self {
        let size = size.max(1);
        let table = (0..=size).map(|i| f(i as f32 / size as f32)).collect();
        Self { table }
    }

    pub fn from_points(table: Vec<f32>) -> Option<Self> {
        (table.len() >= 2).then_some(Self { table })
    }

    /// Number of intervals in the table.
    pub fn size(&self) -> usize {
        self.table.len() - 1
    }

    /// Interpolated value at `dx`, clamped to `[0, 1]`.
    pub fn linear_lookup(&self, dx: f32) -> f32 {
        let size = self.size();
        let scaled = if dx.is_finite() {
            dx.clamp(0.0, 1.0) * size as f32
        } else {
            0.0
        };
        let x1 = (scaled as usize).min(size - 1);
        let fraction = scaled - x1 as f32;
        self.table[x1] * (1.0 - fraction) + self.table[x1 + 1] * fraction
    }
}

/// Upper-left quarter of the unit circle: height above the x axis at
/// horizontal distance `t` from the circle's leftmost point.
pub fn quarter_circle(size: usize) -> LookupTable {
    LookupTable::from_fn(size, |t| (1.0 - t).acos().sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_between_points() {
        let table = LookupTable::from_points(vec![0.0, 1.0, 4.0]).unwrap();
        assert_eq!(table.size(), 2);
        assert_eq!(table.linear_lookup(0.25), 0.5);
        assert_eq!(table.linear_lookup(0.75), 2.5);
        assert_eq!(table.linear_lookup(1.0), 4.0);
        assert_eq!(table.linear_lookup(7.0), 4.0);
        assert_eq!(table.linear_lookup(f32::NAN), 0.0);
    }

    #[test]
    fn rejects_degenerate_tables() {
        assert!(LookupTable::from_points(vec![1.0]).is_none());
    }

    #[test]
    fn quarter_circle_stays_on_the_circle() {
        let lut = quarter_circle(128);
        assert!(lut.linear_lookup(0.0).abs() < 1e-6);
        assert!((lut.linear_lookup(1.0) - 1.0).abs() < 1e-6);
        for i in 1..10 {
            let t = i as f32 / 10.0;
            let x = t - 1.0;
            let expected = (1.0 - x * x).sqrt();
            assert!((lut.linear_lookup(t) - expected).abs() < 0.01);
        }
    }
}
