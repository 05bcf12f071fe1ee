//! Driving a Cartesian solve with a solved axisymmetric field.

use rayon::prelude::*;
use tracing::debug;

use crate::axisymmetric::AxisymmetricField;
use crate::error::Result;
use crate::grid::SimGrid;
use crate::source::PlaneSource;

/// Plane source at axial index `z_index` of a Cartesian `grid`.
///
/// Each plane point `(x, y)` takes the axisymmetric amplitude and phase at
/// `(√(x² + y²), axial_position)`. Points are ordered x fastest. Points
/// outside the axisymmetric domain get zero drive.
pub fn coupled_plane_source(
    field: &AxisymmetricField,
    grid: &SimGrid,
    z_index: usize,
    axial_position: f64,
) -> Result<PlaneSource> {
    let amplitude_at = field.amplitude_interpolator()?;
    let phase_at = field.phase_interpolator()?;
    let x = grid.axis_vec(0);
    let y = grid.axis_vec(1);
    let (amplitude, phase): (Vec<f64>, Vec<f64>) = y
        .iter()
        .flat_map(|&yv| x.iter().map(move |&xv| (xv * xv + yv * yv).sqrt()))
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|r| (amplitude_at.sample(r, axial_position), phase_at.sample(r, axial_position)))
        .unzip();
    debug!(points = amplitude.len(), z_index, axial_position, "coupled source plane interpolated");
    Ok(PlaneSource {
        z_index,
        frequency: field.frequency,
        amplitude,
        phase,
    })
}
