//! Single-frequency amplitude and phase of recorded time series.

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::engine::RecordedField;
use crate::error::{Result, SolverError, SolverOutputError};

/// Amplitude and phase of every sensor point at one frequency bin.
#[derive(Debug, Clone, PartialEq)]
pub struct AmpPhase {
    /// Peak amplitude per point.
    pub amplitude: Vec<f64>,
    /// Phase per point, radians in `(-π, π]`.
    pub phase: Vec<f64>,
    /// Frequency of the extracted bin.
    pub frequency: f64,
}

/// Index of the one-sided DFT bin closest to `f0`.
pub fn nearest_bin(n: usize, fs: f64, f0: f64) -> usize {
    let half = n / 2;
    (0..=half)
        .min_by(|&a, &b| {
            let da = (a as f64 * fs / n as f64 - f0).abs();
            let db = (b as f64 * fs / n as f64 - f0).abs();
            da.total_cmp(&db)
        })
        .unwrap_or(0)
}

fn dft_bin(series: &[f64], k: usize) -> Complex64 {
    let n = series.len() as f64;
    series
        .iter()
        .enumerate()
        .map(|(t, &x)| x * Complex64::from_polar(1.0, -2.0 * PI * k as f64 * t as f64 / n))
        .sum()
}

/// Rectangular-window spectrum of each point's series at the bin nearest `f0`.
///
/// `amplitude = 2|X_k| / N` and `phase = arg X_k`. Non-finite samples fail
/// the whole extraction.
pub fn extract_amp_phase(field: &RecordedField, dt: f64, f0: f64) -> Result<AmpPhase> {
    if field.values.len() != field.points * field.steps {
        return Err(SolverError::ShapeMismatch {
            field: "p".to_string(),
            expected: field.points * field.steps,
            found: field.values.len(),
        });
    }
    if field.values.iter().any(|v| !v.is_finite()) {
        return Err(SolverOutputError { field: "p".to_string() }.into());
    }
    if field.steps == 0 {
        return Err(SolverError::invalid("record_periods", "no recorded time steps"));
    }
    let fs = 1.0 / dt;
    let k = nearest_bin(field.steps, fs, f0);
    let frequency = k as f64 * fs / field.steps as f64;
    let scale = 2.0 / field.steps as f64;

    let (amplitude, phase): (Vec<f64>, Vec<f64>) = (0..field.points)
        .into_par_iter()
        .map(|p| {
            let x = dft_bin(field.series(p), k);
            (scale * x.norm(), x.arg())
        })
        .unzip();

    Ok(AmpPhase { amplitude, phase, frequency })
}
