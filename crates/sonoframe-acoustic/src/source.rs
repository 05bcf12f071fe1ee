//! Sources and sensors.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};
use crate::grid::SimGrid;
use crate::params::{SimulationParameters, SolverKind};

/// Continuous-wave drive `amp · sin(2π f t + phase)` sampled at `t`.
pub fn cw_signal(t: &[f64], frequency: f64, amplitude: f64, phase: f64) -> Vec<f64> {
    t.iter()
        .map(|&ti| amplitude * (2.0 * PI * frequency * ti + phase).sin())
        .collect()
}

/// Surface area of a spherical cap of radius of curvature `roc` and aperture `diameter`.
pub fn bowl_area(roc: f64, diameter: f64) -> f64 {
    2.0 * PI * roc * (roc - (roc * roc - (diameter / 2.0).powi(2)).sqrt())
}

/// Peak source pressure.
///
/// `source_amp` wins when set. Otherwise the acoustic power `source_ac_pwr`
/// is spread over the bowl surface in the coupling medium:
/// `p = √2 · √(P · ρ · c / A)`.
pub fn source_amplitude(params: &SimulationParameters) -> Result<f64> {
    if let Some(amp) = params.optional_number("source_amp")? {
        return Ok(amp);
    }
    let Some(power) = params.optional_number("source_ac_pwr")? else {
        return Err(SolverError::NoSourceAmplitude);
    };
    let roc = params.positive("source_roc")?;
    let diameter = params.positive("source_diameter")?;
    if diameter > 2.0 * roc {
        return Err(SolverError::invalid("source_diameter", "aperture wider than the bowl's sphere"));
    }
    let rho = params.number("rho_tx_coupling_medium")?;
    let c = params.number("c_tx_coupling_medium")?;
    let area = bowl_area(roc, diameter);
    Ok(2f64.sqrt() * (power * rho * c / area).sqrt())
}

/// Focused bowl transducer.
///
/// Positions are grid coordinates. For the axisymmetric solver they are
/// `(axial, radial)` and the bowl is an arc element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BowlSource {
    /// Bowl apex.
    pub position: Vec<f64>,
    /// Geometric focus.
    pub focus: Vec<f64>,
    /// Radius of curvature in meters.
    pub roc: f64,
    /// Aperture diameter in meters.
    pub diameter: f64,
    /// Peak pressure in pascals.
    pub amplitude: f64,
    /// Phase in radians.
    pub phase: f64,
    /// Drive frequency in hertz.
    pub frequency: f64,
    /// Off-grid source truncation tolerance.
    pub bli_tolerance: f64,
    /// Integration points per grid point.
    pub upsampling_rate: f64,
}

impl BowlSource {
    /// Bowl derived from `params` on `grid`, offset `source_z_offset` points from the axial start.
    pub fn from_params(params: &SimulationParameters, grid: &SimGrid) -> Result<Self> {
        let offset = params.count("source_z_offset")? as f64;
        let roc = params.positive("source_roc")?;
        let (position, focus) = match params.kind() {
            SolverKind::Axisymmetric => {
                let axial = grid.axis_vec(0);
                let start = axial.first().copied().unwrap_or(0.0);
                let end = axial.last().copied().unwrap_or(0.0);
                (vec![start + offset * grid.dx, 0.0], vec![end, 0.0])
            }
            SolverKind::Cartesian => {
                let z0 = grid.axis_vec(2).first().copied().unwrap_or(0.0) + offset * grid.dx;
                (vec![0.0, 0.0, z0], vec![0.0, 0.0, z0 + roc])
            }
        };
        Ok(Self {
            position,
            focus,
            roc,
            diameter: params.positive("source_diameter")?,
            amplitude: source_amplitude(params)?,
            phase: params.number("source_phase")?,
            frequency: params.positive("source_f0")?,
            bli_tolerance: params.number("bli_tolerance")?,
            upsampling_rate: params.number("upsampling_rate")?,
        })
    }

    /// Drive signal over the grid's time axis.
    pub fn signal(&self, grid: &SimGrid) -> Vec<f64> {
        cw_signal(&grid.t_array(), self.frequency, self.amplitude, self.phase)
    }
}

/// A plane of grid points driven individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaneSource {
    /// Axial index of the plane.
    pub z_index: usize,
    /// Drive frequency in hertz.
    pub frequency: f64,
    /// Amplitude per plane point, first dimension fastest.
    pub amplitude: Vec<f64>,
    /// Phase per plane point.
    pub phase: Vec<f64>,
}

impl PlaneSource {
    /// Drive signal of plane point `i`.
    pub fn signal(&self, i: usize, t: &[f64]) -> Vec<f64> {
        match (self.amplitude.get(i), self.phase.get(i)) {
            (Some(&a), Some(&p)) => cw_signal(t, self.frequency, a, p),
            _ => vec![0.0; t.len()],
        }
    }

    /// Drive signals of every plane point.
    pub fn signals(&self, t: &[f64]) -> Vec<Vec<f64>> {
        (0..self.amplitude.len()).map(|i| self.signal(i, t)).collect()
    }
}

/// Source handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Source {
    /// Focused bowl.
    Bowl(BowlSource),
    /// Interpolated drive plane.
    Plane(PlaneSource),
}

/// Which grid points are recorded, and from when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    /// Axial index of the first recorded plane. Everything beyond it is recorded too.
    pub first_axial_index: usize,
    /// Recorded quantities.
    pub record: Vec<String>,
    /// One-based time step at which recording starts.
    pub record_start_index: usize,
}

impl Sensor {
    /// Record the last `record_periods` periods beyond the source plane.
    ///
    /// The axisymmetric sensor skips the source plane itself.
    pub fn from_params(params: &SimulationParameters, grid: &SimGrid) -> Result<Self> {
        let offset = params.count("source_z_offset")?;
        let periods = params.count("record_periods")?;
        let recorded = periods * grid.ppp;
        if recorded == 0 || recorded > grid.nt {
            return Err(SolverError::invalid(
                "record_periods",
                format!("{} steps recorded out of {}", recorded, grid.nt),
            ));
        }
        let first_axial_index = match params.kind() {
            SolverKind::Axisymmetric => offset + 1,
            SolverKind::Cartesian => offset,
        };
        Ok(Self {
            first_axial_index,
            record: vec!["p".to_string(), "u".to_string()],
            record_start_index: grid.nt - recorded + 1,
        })
    }

    /// Number of recorded time steps.
    pub fn num_steps(&self, grid: &SimGrid) -> usize {
        grid.nt + 1 - self.record_start_index
    }

    /// Number of recorded grid points.
    pub fn num_points(&self, grid: &SimGrid) -> usize {
        let axial_dim = match grid.dims.len() {
            2 => 0,
            _ => 2,
        };
        let total = grid.num_points();
        let axial = grid.dims[axial_dim];
        total / axial * axial.saturating_sub(self.first_axial_index)
    }
}
