//! Computational grids.

use serde::{Deserialize, Serialize};
use sonoframe_math::round_half_even;

use crate::error::{Result, SolverError};
use crate::params::{SimulationParameters, SolverKind};

/// Round up to the next even integer.
pub fn ceil_even(x: f64) -> usize {
    (2.0 * (x / 2.0).ceil()).max(0.0) as usize
}

/// Regular grid in space and time.
///
/// For the axisymmetric solver the first dimension is axial (z) and the
/// second radial (r). Cartesian grids are (x, y, z).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimGrid {
    /// Spacing in meters, equal along every axis.
    pub dx: f64,
    /// Points per dimension.
    pub dims: Vec<usize>,
    /// Time steps per source period.
    pub ppp: usize,
    /// Time step in seconds.
    pub dt: f64,
    /// Number of time steps.
    pub nt: usize,
}

impl SimGrid {
    /// Derive the grid for `params`.
    ///
    /// `dx = c_0 / (ppw · f0)`. Axial size gains `source_z_offset` and
    /// `domain_z_extension` points. `t_end` comes from the parameters,
    /// else from `n_reflections` traversals of the axial extent.
    pub fn from_params(params: &SimulationParameters) -> Result<Self> {
        let c0 = params.positive("c_0")?;
        let ppw = params.positive("ppw")?;
        let f0 = params.positive("source_f0")?;
        let cfl = params.positive("cfl")?;
        let dx = c0 / (ppw * f0);

        let offset = params.count("source_z_offset")?;
        let extension = match params.get("domain_z_extension") {
            Some(_) => params.count("domain_z_extension")?,
            None => 0,
        };
        let dims = match params.kind() {
            SolverKind::Axisymmetric => vec![
                ceil_even(params.number("AS_domain_z_size")?.abs() / dx) + offset + extension,
                ceil_even(params.number("AS_domain_r_size")?.abs() / dx),
            ],
            SolverKind::Cartesian => vec![
                ceil_even(params.number("threeD_domain_x_size")?.abs() / dx),
                ceil_even(params.number("threeD_domain_y_size")?.abs() / dx),
                ceil_even(params.number("threeD_domain_z_size")?.abs() / dx) + offset + extension,
            ],
        };
        if dims.iter().any(|&n| n == 0) {
            return Err(SolverError::invalid("domain size", "grid has an empty dimension"));
        }

        let ppp = round_half_even(ppw / cfl) as usize;
        if ppp == 0 {
            return Err(SolverError::invalid("cfl", "less than one time step per period"));
        }
        let dt = 1.0 / (ppp as f64 * f0);

        let axial = match params.kind() {
            SolverKind::Axisymmetric => dims[0],
            SolverKind::Cartesian => dims[2],
        };
        let t_end = match params.optional_number("t_end")? {
            Some(t) => t,
            None => match params.optional_number("n_reflections")? {
                Some(n) => axial as f64 * dx * n / c0,
                None => return Err(SolverError::NoDuration),
            },
        };
        let nt = round_half_even(t_end / dt) as usize;

        Ok(Self { dx, dims, ppp, dt, nt })
    }

    /// Total number of spatial points.
    pub fn num_points(&self) -> usize {
        self.dims.iter().product()
    }

    /// Centred coordinates along `dim`: `(i - ⌊N/2⌋) · dx`.
    pub fn axis_vec(&self, dim: usize) -> Vec<f64> {
        let n = self.dims.get(dim).copied().unwrap_or(0);
        let half = (n / 2) as f64;
        (0..n).map(|i| (i as f64 - half) * self.dx).collect()
    }

    /// Sample times `i · dt`.
    pub fn t_array(&self) -> Vec<f64> {
        (0..self.nt).map(|i| i as f64 * self.dt).collect()
    }

    /// Achieved points per wavelength for `c0` at `f0`.
    pub fn ppw(&self, c0: f64, f0: f64) -> f64 {
        c0 / (self.dx * f0)
    }

    /// Achieved CFL number for `c0`.
    pub fn cfl(&self, c0: f64) -> f64 {
        c0 * self.dt / self.dx
    }
}
