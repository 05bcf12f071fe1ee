//! The axisymmetric (z, r) solver.

use std::f64::consts::PI;
use std::path::Path;

use rayon::prelude::*;
use sonoframe_ir::{Memo, ParamValue, SolverConfig, VolumeRenderConfig};
use sonoframe_math::Transform;
use sonoframe_mesh::{cylinder_extrusion, TriangleMesh};
use tracing::debug;

use crate::engine::{SensorData, SimulationJob, SolverEngine};
use crate::error::{Result, SolverError};
use crate::grid::SimGrid;
use crate::interp::{linspace, unwrap_phase, GridInterpolator2};
use crate::medium::{MaterialProperties, Medium};
use crate::params::{SimulationParameters, SolverKind};
use crate::run::{execution_options, resolve_cache_dir, run_cached, RunOutcome, SolveResult};
use crate::source::{BowlSource, Sensor, Source};
use crate::spectral::extract_amp_phase;
use crate::volume::{render_volume, FieldVolume, VolumeData};

/// Amplitude and phase over the axisymmetric sensor region.
///
/// `z` starts one point beyond the source plane. Samples are stored with
/// `z` fastest: `amplitude[ir * z.len() + iz]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisymmetricField {
    /// Axial distance from the source plane.
    pub z: Vec<f64>,
    /// Radial distance from the axis.
    pub r: Vec<f64>,
    /// Peak pressure.
    pub amplitude: Vec<f64>,
    /// Phase in radians.
    pub phase: Vec<f64>,
    /// Frequency of the extracted bin.
    pub frequency: f64,
}

impl AxisymmetricField {
    /// Amplitude at `(iz, ir)`, or `None` outside the grid.
    pub fn amplitude_at(&self, iz: usize, ir: usize) -> Option<f64> {
        if iz >= self.z.len() || ir >= self.r.len() {
            return None;
        }
        self.amplitude.get(ir * self.z.len() + iz).copied()
    }

    /// Bilinear amplitude over `(r, z)`, zero outside.
    pub fn amplitude_interpolator(&self) -> Result<GridInterpolator2> {
        GridInterpolator2::new(self.r.clone(), self.z.clone(), self.amplitude.clone(), 0.0)
    }

    /// Bilinear phase over `(r, z)`, zero outside.
    ///
    /// The phase is shifted by `-π/2` (cosine to sine reference) and
    /// unwrapped along `r` at each `z`.
    pub fn phase_interpolator(&self) -> Result<GridInterpolator2> {
        let nz = self.z.len();
        let mut shifted: Vec<f64> = self.phase.iter().map(|p| p - PI / 2.0).collect();
        let mut line = Vec::with_capacity(self.r.len());
        for iz in 0..nz {
            line.clear();
            line.extend((0..self.r.len()).map(|ir| shifted[ir * nz + iz]));
            unwrap_phase(&mut line);
            for (ir, v) in line.iter().enumerate() {
                shifted[ir * nz + iz] = *v;
            }
        }
        GridInterpolator2::new(self.r.clone(), self.z.clone(), shifted, 0.0)
    }

    /// Revolve the amplitude around the axis onto a Cartesian grid.
    ///
    /// x and y span `±r_max` with `2·Nr − 1` points; z keeps the axial samples.
    pub fn revolve(&self) -> Result<FieldVolume> {
        let interp = self.amplitude_interpolator()?;
        let r_max = self.r.last().copied().unwrap_or(0.0);
        let n = (2 * self.r.len()).saturating_sub(1);
        let x = linspace(-r_max, r_max, n);
        let y = x.clone();
        let plane = n * n;
        let values: Vec<f64> = self
            .z
            .par_iter()
            .flat_map_iter(|&z| {
                let x = &x;
                let interp = &interp;
                y.iter()
                    .flat_map(move |&yv| x.iter().map(move |&xv| interp.sample((xv * xv + yv * yv).sqrt(), z)))
                    .collect::<Vec<_>>()
            })
            .collect();
        debug_assert_eq!(values.len(), plane * self.z.len());
        FieldVolume::new(x, y, self.z.clone(), values)
    }
}

/// Axisymmetric solve of a focused bowl in a homogeneous medium.
///
/// Derived quantities are memoized under the parameter hash; any
/// parameter change that alters the hash drops them.
#[derive(Debug, Clone)]
pub struct AxisymmetricSolver {
    params: SimulationParameters,
    grid: Memo<SimGrid>,
    sensor_data: Memo<SensorData>,
    field: Memo<AxisymmetricField>,
    field_xyz: Memo<FieldVolume>,
    last_outcome: Option<RunOutcome>,
}

impl AxisymmetricSolver {
    /// Solver over `params`.
    pub fn new(params: SimulationParameters) -> Self {
        Self {
            params,
            grid: Memo::new(),
            sensor_data: Memo::new(),
            field: Memo::new(),
            field_xyz: Memo::new(),
            last_outcome: None,
        }
    }

    /// Solver with the default table layered under `config`.
    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(SimulationParameters::layered(SolverKind::Axisymmetric, config))
    }

    /// Current parameters.
    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Set one parameter. Returns true and drops derived data when the hash changes.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<ParamValue>) -> bool {
        let changed = self.params.set_parameter(name, value);
        if changed {
            self.clear_derived();
        }
        changed
    }

    /// Replace the whole parameter set.
    pub fn set_params(&mut self, params: SimulationParameters) -> bool {
        if params.hash() == self.params.hash() {
            return false;
        }
        self.params = params;
        self.clear_derived();
        true
    }

    fn clear_derived(&mut self) {
        debug!(hash = %self.params.short_hash(), "axisymmetric parameters changed, derived data dropped");
        self.grid.clear();
        self.sensor_data.clear();
        self.field.clear();
        self.field_xyz.clear();
        self.last_outcome = None;
    }

    /// Computational grid.
    pub fn grid(&mut self) -> Result<&SimGrid> {
        let params = &self.params;
        self.grid.try_get_or_compute(params.hash(), || SimGrid::from_params(params))
    }

    /// Engine job for the current parameters.
    pub fn build_job(&self) -> Result<SimulationJob> {
        let params = &self.params;
        let grid = SimGrid::from_params(params)?;
        let f0 = params.positive("source_f0")?;
        let alpha_mode = params.text("alpha_mode").unwrap_or("stokes");
        let medium = Medium::homogeneous(&MaterialProperties::lookup(params, 0)?, f0, alpha_mode);
        let source = Source::Bowl(BowlSource::from_params(params, &grid)?);
        let sensor = Sensor::from_params(params, &grid)?;
        Ok(SimulationJob {
            kind: SolverKind::Axisymmetric,
            hash: params.short_hash(),
            grid,
            medium,
            source,
            sensor,
            options: execution_options(params)?,
        })
    }

    /// Solve without touching `self`. Safe to run on a worker thread.
    pub fn solve(&self, engine: &dyn SolverEngine, cache_dir: Option<&Path>) -> Result<SolveResult> {
        let dir = resolve_cache_dir(&self.params, cache_dir);
        run_cached(&self.params, dir.as_deref(), engine, || {
            Ok((self.build_job()?, Default::default()))
        })
    }

    /// Take a finished solve. Results for a stale hash are dropped.
    pub fn accept(&mut self, result: SolveResult) -> bool {
        if result.hash != self.params.hash() {
            debug!("stale axisymmetric result dropped");
            return false;
        }
        self.field.clear();
        self.field_xyz.clear();
        match result.data {
            Some(data) => self.sensor_data.set(result.hash, data),
            None => self.sensor_data.clear(),
        }
        self.last_outcome = Some(result.outcome);
        true
    }

    /// Solve and keep the result. Returns true when fields are available.
    pub fn run_simulation(&mut self, engine: &dyn SolverEngine, cache_dir: Option<&Path>) -> Result<bool> {
        let result = self.solve(engine, cache_dir)?;
        let success = result.is_success();
        self.accept(result);
        Ok(success)
    }

    /// How the last accepted run ended.
    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        self.last_outcome.as_ref()
    }

    /// True when recorded fields exist for the current parameters.
    pub fn is_solved(&self) -> bool {
        self.sensor_data.is_current(&self.params.hash())
    }

    /// Amplitude and phase over `(z, r)`.
    pub fn field_zr(&mut self) -> Result<&AxisymmetricField> {
        let hash = self.params.hash();
        let params = &self.params;
        let data = self.sensor_data.get(&hash).ok_or(SolverError::NotSolved)?;
        self.field.try_get_or_compute(hash, || extract_field(params, data))
    }

    /// Amplitude revolved onto a Cartesian grid.
    pub fn p_amp_xyz(&mut self) -> Result<&FieldVolume> {
        let hash = self.params.hash();
        if !self.field_xyz.is_current(&hash) {
            let volume = self.field_zr()?.revolve()?;
            self.field_xyz.set(hash, volume);
        }
        self.field_xyz.get(&hash).ok_or(SolverError::NotSolved)
    }

    /// Render volume, masked to `z < |AS_domain_z_size|`.
    pub fn render_volume(&mut self, config: &VolumeRenderConfig, end: &Transform) -> Result<VolumeData> {
        let z_max = self.params.number("AS_domain_z_size")?.abs();
        let dx = SimGrid::from_params(&self.params)?.dx;
        let volume = self.p_amp_xyz()?.below_z(z_max);
        render_volume(&volume, config, dx, end)
    }

    /// Cylinder of the domain radius and axial size, for preview.
    pub fn domain_mesh(&self) -> Result<TriangleMesh> {
        let radius = self.params.number("AS_domain_r_size")?.abs();
        let height = self.params.number("AS_domain_z_size")?.abs();
        Ok(cylinder_extrusion(radius, height, 32)?)
    }
}

fn extract_field(params: &SimulationParameters, data: &SensorData) -> Result<AxisymmetricField> {
    let grid = SimGrid::from_params(params)?;
    let offset = params.count("source_z_offset")?;
    let pressure = data.pressure().ok_or(SolverError::MissingPressure)?;
    let (nx, ny) = (grid.dims[0], grid.dims[1]);
    let nz = nx.saturating_sub(offset + 1);
    if pressure.points != nz * ny {
        return Err(SolverError::ShapeMismatch {
            field: "p".to_string(),
            expected: nz * ny,
            found: pressure.points,
        });
    }
    let spectrum = extract_amp_phase(pressure, grid.dt, params.positive("source_f0")?)?;
    Ok(AxisymmetricField {
        z: (1..=nz).map(|i| i as f64 * grid.dx).collect(),
        r: (0..ny).map(|i| i as f64 * grid.dx).collect(),
        amplitude: spectrum.amplitude,
        phase: spectrum.phase,
        frequency: spectrum.frequency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn constant_field(value: f64) -> AxisymmetricField {
        let z = vec![1.0, 2.0, 3.0];
        let r = vec![0.0, 1.0];
        AxisymmetricField {
            amplitude: vec![value; 6],
            phase: vec![0.0; 6],
            z,
            r,
            frequency: 1e6,
        }
    }

    #[test]
    fn test_amplitude_at_outside_grid() {
        let mut field = constant_field(1.0);
        field.amplitude[5] = 4.0;
        assert_eq!(field.amplitude_at(2, 1), Some(4.0));
        assert_eq!(field.amplitude_at(3, 0), None);
        assert_eq!(field.amplitude_at(0, 2), None);
        field.amplitude.truncate(4);
        assert_eq!(field.amplitude_at(2, 1), None);
    }

    #[test]
    fn test_revolve_constant_field() {
        let field = constant_field(2.5);
        let vol = field.revolve().unwrap();
        assert_eq!(vol.dims(), [3, 3, 3]);
        assert_eq!(vol.x, vec![-1.0, 0.0, 1.0]);
        // On axis and at r = 1 the value holds; the corners sit at r = √2, outside.
        assert_eq!(vol.get(1, 1, 0), 2.5);
        assert_eq!(vol.get(2, 1, 2), 2.5);
        assert_eq!(vol.get(0, 0, 1), 0.0);
    }

    #[test]
    fn test_phase_interpolator_unwraps_along_r() {
        let mut field = constant_field(1.0);
        // Phases at z = 1 across r jump by nearly 2π after the shift.
        field.phase[0] = 3.0;
        field.phase[3] = -3.0;
        let phase = field.phase_interpolator().unwrap();
        assert_relative_eq!(phase.sample(0.0, 1.0), 3.0 - PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(phase.sample(1.0, 1.0), -3.0 - PI / 2.0 + 2.0 * PI, epsilon = 1e-12);
        assert_eq!(phase.sample(5.0, 1.0), 0.0);
    }

    #[test]
    fn test_parameter_change_clears_derived() {
        let mut solver = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));
        assert_eq!(solver.grid().unwrap().dims, vec![142, 34]);
        assert!(!solver.set_parameter("ppw", 5.0));
        assert!(solver.set_parameter("ppw", 6.0));
        assert_ne!(solver.grid().unwrap().dims, vec![142, 34]);
        assert!(matches!(solver.field_zr(), Err(SolverError::NotSolved)));
    }

    #[test]
    fn test_domain_mesh_bounds() {
        let solver = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));
        let b = solver.domain_mesh().unwrap().bounds();
        assert_relative_eq!(b.max.z, 30e-3, epsilon = 1e-12);
        assert_relative_eq!(b.max.x, 10e-3, epsilon = 1e-12);
    }
}
