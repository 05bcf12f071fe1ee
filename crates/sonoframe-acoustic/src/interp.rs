//! Interpolation on regular 2D grids.

use std::f64::consts::PI;

use crate::error::{Result, SolverError};

/// Bilinear interpolation over a rectilinear `(u, v)` grid with a fill value outside.
///
/// Values are stored with `v` fastest: `values[i * v.len() + j]` sits at
/// `(u[i], v[j])`. Both axes must be strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct GridInterpolator2 {
    u: Vec<f64>,
    v: Vec<f64>,
    values: Vec<f64>,
    fill: f64,
}

fn check_axis(name: &str, axis: &[f64]) -> Result<()> {
    if axis.is_empty() || axis.windows(2).any(|w| !(w[1] > w[0])) {
        return Err(SolverError::invalid(name, "interpolation axis must be non-empty and strictly increasing"));
    }
    Ok(())
}

/// Bracketing index and weight of `x` on `axis`, or `None` outside.
fn locate(axis: &[f64], x: f64) -> Option<(usize, f64)> {
    let first = *axis.first()?;
    let last = *axis.last()?;
    if !(x >= first && x <= last) {
        return None;
    }
    if axis.len() == 1 {
        return Some((0, 0.0));
    }
    let hi = axis.partition_point(|&a| a <= x).min(axis.len() - 1).max(1);
    let lo = hi - 1;
    Some((lo, (x - axis[lo]) / (axis[hi] - axis[lo])))
}

impl GridInterpolator2 {
    /// Wrap `values` sampled on `u × v`.
    pub fn new(u: Vec<f64>, v: Vec<f64>, values: Vec<f64>, fill: f64) -> Result<Self> {
        check_axis("interpolation u axis", &u)?;
        check_axis("interpolation v axis", &v)?;
        if values.len() != u.len() * v.len() {
            return Err(SolverError::ShapeMismatch {
                field: "interpolation grid".to_string(),
                expected: u.len() * v.len(),
                found: values.len(),
            });
        }
        Ok(Self { u, v, values, fill })
    }

    fn at(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.v.len() + j]
    }

    /// Interpolated value at `(u, v)`.
    pub fn sample(&self, u: f64, v: f64) -> f64 {
        let (Some((i, wu)), Some((j, wv))) = (locate(&self.u, u), locate(&self.v, v)) else {
            return self.fill;
        };
        let i1 = (i + 1).min(self.u.len() - 1);
        let j1 = (j + 1).min(self.v.len() - 1);
        let a = self.at(i, j) * (1.0 - wv) + self.at(i, j1) * wv;
        let b = self.at(i1, j) * (1.0 - wv) + self.at(i1, j1) * wv;
        a * (1.0 - wu) + b * wu
    }
}

/// `n` evenly spaced values from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| if i == n - 1 { end } else { start + step * i as f64 }).collect()
        }
    }
}

/// Remove `2π` jumps between consecutive samples, like `numpy.unwrap`.
pub fn unwrap_phase(phase: &mut [f64]) {
    let mut offset = 0.0;
    for i in 1..phase.len() {
        let raw = phase[i];
        let d = raw + offset - phase[i - 1];
        let mut dd = (d + PI).rem_euclid(2.0 * PI) - PI;
        if dd == -PI && d > 0.0 {
            dd = PI;
        }
        if d.abs() >= PI {
            offset += dd - d;
        }
        phase[i] = raw + offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bilinear_and_fill() {
        // f(u, v) = u + 10 v on a 2 × 3 grid.
        let u = vec![0.0, 1.0];
        let v = vec![0.0, 1.0, 2.0];
        let values = vec![0.0, 10.0, 20.0, 1.0, 11.0, 21.0];
        let f = GridInterpolator2::new(u, v, values, -1.0).unwrap();
        assert_relative_eq!(f.sample(0.5, 1.5), 15.5);
        assert_relative_eq!(f.sample(1.0, 2.0), 21.0);
        assert_eq!(f.sample(1.5, 0.0), -1.0);
        assert_eq!(f.sample(0.0, -0.1), -1.0);
    }

    #[test]
    fn test_rejects_bad_axes() {
        assert!(GridInterpolator2::new(vec![1.0, 0.0], vec![0.0], vec![0.0, 0.0], 0.0).is_err());
        assert!(GridInterpolator2::new(vec![0.0], vec![0.0], vec![], 0.0).is_err());
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(-1.0, 1.0, 5), vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_unwrap_phase() {
        let mut p = vec![3.0, -3.0, 3.1, -3.1];
        unwrap_phase(&mut p);
        assert_relative_eq!(p[1], -3.0 + 2.0 * PI, epsilon = 1e-12);
        assert_relative_eq!(p[2], 3.1, epsilon = 1e-12);
        assert_relative_eq!(p[3], -3.1 + 2.0 * PI, epsilon = 1e-12);
    }
}
