//! The 3D Cartesian solver.

use std::collections::BTreeMap;
use std::path::Path;

use sonoframe_ir::{Memo, ParamValue, SolverConfig, SourceModel, VolumeRenderConfig};
use sonoframe_math::{Point3, Transform};
use sonoframe_mesh::TriangleMesh;
use tracing::debug;

use crate::axisymmetric::AxisymmetricField;
use crate::coupling::coupled_plane_source;
use crate::engine::{SensorData, SimulationJob, SolverEngine};
use crate::error::{Result, SolverError};
use crate::grid::SimGrid;
use crate::material::assign_materials;
use crate::medium::{MaterialGrid, MaterialProperties, Medium};
use crate::params::{SimulationParameters, SolverKind};
use crate::run::{execution_options, resolve_cache_dir, run_cached, RunOutcome, SolveResult};
use crate::source::{BowlSource, Sensor, Source};
use crate::spectral::extract_amp_phase;
use crate::volume::{render_volume, FieldVolume, VolumeData};

/// Meshes painted into the medium and the frame they are expressed against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DomainGeometry {
    /// Processed meshes in world coordinates, each with its material index.
    pub meshes: Vec<TriangleMesh>,
    /// World transform of the solver domain.
    pub end: Transform,
}

/// Amplitude and phase over the Cartesian sensor region, x fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct CartesianField {
    /// Peak pressure.
    pub amplitude: FieldVolume,
    /// Phase in radians, same layout.
    pub phase: Vec<f64>,
    /// Frequency of the extracted bin.
    pub frequency: f64,
}

/// Cartesian solve with a heterogeneous medium and a bowl or coupled source.
#[derive(Debug, Clone)]
pub struct CartesianSolver {
    params: SimulationParameters,
    source_model: SourceModel,
    geometry: DomainGeometry,
    coupling: Option<AxisymmetricField>,
    grid: Memo<SimGrid>,
    coords: Memo<Vec<Point3>>,
    sensor_data: Memo<SensorData>,
    field: Memo<CartesianField>,
    voxel_centers: BTreeMap<usize, Vec<Point3>>,
    last_outcome: Option<RunOutcome>,
}

impl CartesianSolver {
    /// Solver over `params` driven by `source_model`.
    pub fn new(params: SimulationParameters, source_model: SourceModel) -> Self {
        Self {
            params,
            source_model,
            geometry: DomainGeometry::default(),
            coupling: None,
            grid: Memo::new(),
            coords: Memo::new(),
            sensor_data: Memo::new(),
            field: Memo::new(),
            voxel_centers: BTreeMap::new(),
            last_outcome: None,
        }
    }

    /// Solver with the default table layered under `config`.
    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(SimulationParameters::layered(SolverKind::Cartesian, config), config.source)
    }

    /// Current parameters.
    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Source model.
    pub fn source_model(&self) -> SourceModel {
        self.source_model
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
        debug!(hash = %self.params.short_hash(), "cartesian inputs changed, derived data dropped");
        self.grid.clear();
        self.coords.clear();
        self.sensor_data.clear();
        self.field.clear();
        self.voxel_centers.clear();
        self.last_outcome = None;
    }

    /// Set the meshes and domain frame used for material assignment.
    ///
    /// A different geometry drops the solved fields, which described the old domain.
    pub fn set_geometry(&mut self, geometry: DomainGeometry) {
        if geometry != self.geometry {
            self.geometry = geometry;
            self.clear_derived();
        }
    }

    /// Domain geometry.
    pub fn geometry(&self) -> &DomainGeometry {
        &self.geometry
    }

    /// Provide the axisymmetric field for a coupled source.
    ///
    /// A different field drops the solved fields, as for [`CartesianSolver::set_geometry`].
    pub fn set_coupling(&mut self, field: Option<AxisymmetricField>) {
        if field != self.coupling {
            self.coupling = field;
            self.clear_derived();
        }
    }

    /// Computational grid.
    pub fn grid(&mut self) -> Result<&SimGrid> {
        let params = &self.params;
        self.grid.try_get_or_compute(params.hash(), || SimGrid::from_params(params))
    }

    /// Grid point positions in the domain frame, x fastest.
    ///
    /// The source plane at `source_z_offset` sits at `z = AS_domain_z_size`.
    pub fn kgrid_coords(&mut self) -> Result<&[Point3]> {
        let params = &self.params;
        let coords = self.coords.try_get_or_compute(params.hash(), || {
            let grid = SimGrid::from_params(params)?;
            grid_coords(params, &grid)
        })?;
        Ok(coords.as_slice())
    }

    fn build_medium(&self, grid: &SimGrid) -> Result<(Medium, BTreeMap<usize, Vec<Point3>>)> {
        let params = &self.params;
        let f0 = params.positive("source_f0")?;
        let alpha_mode = params.text("alpha_mode").unwrap_or("stokes");
        if self.geometry.meshes.is_empty() {
            let water = MaterialProperties::lookup(params, 0)?;
            return Ok((Medium::homogeneous(&water, f0, alpha_mode), BTreeMap::new()));
        }
        let world_to_domain = self
            .geometry
            .end
            .inverse()
            .ok_or_else(|| SolverError::invalid("domain transform", "not invertible"))?;
        let coords = grid_coords(params, grid)?;
        let mut materials = MaterialGrid::background(coords.len(), params)?;
        let centers = assign_materials(
            &mut materials,
            &coords,
            &self.geometry.meshes,
            &world_to_domain,
            grid.dx,
            params,
        )?;
        Ok((materials.to_medium(f0, alpha_mode), centers))
    }

    fn build_source(&self, grid: &SimGrid) -> Result<Source> {
        match self.source_model {
            SourceModel::Bowl => Ok(Source::Bowl(BowlSource::from_params(&self.params, grid)?)),
            SourceModel::Coupled => {
                let field = self.coupling.as_ref().ok_or(SolverError::CouplingUnavailable)?;
                let z_index = self.params.count("source_z_offset")?;
                let axial = self.params.number("AS_domain_z_size")?;
                Ok(Source::Plane(coupled_plane_source(field, grid, z_index, axial)?))
            }
        }
    }

    /// Engine job for the current parameters, plus voxel centres per material.
    pub fn build_job(&self) -> Result<(SimulationJob, BTreeMap<usize, Vec<Point3>>)> {
        let params = &self.params;
        let grid = SimGrid::from_params(params)?;
        let source = self.build_source(&grid)?;
        let (medium, centers) = self.build_medium(&grid)?;
        let sensor = Sensor::from_params(params, &grid)?;
        let job = SimulationJob {
            kind: SolverKind::Cartesian,
            hash: params.short_hash(),
            grid,
            medium,
            source,
            sensor,
            options: execution_options(params)?,
        };
        Ok((job, centers))
    }

    /// Solve without touching `self`. Safe to run on a worker thread.
    pub fn solve(&self, engine: &dyn SolverEngine, cache_dir: Option<&Path>) -> Result<SolveResult> {
        let dir = resolve_cache_dir(&self.params, cache_dir);
        run_cached(&self.params, dir.as_deref(), engine, || self.build_job())
    }

    /// Take a finished solve. Results for a stale hash are dropped.
    pub fn accept(&mut self, result: SolveResult) -> bool {
        if result.hash != self.params.hash() {
            debug!("stale cartesian result dropped");
            return false;
        }
        self.field.clear();
        match result.data {
            Some(data) => self.sensor_data.set(result.hash, data),
            None => self.sensor_data.clear(),
        }
        if !result.voxel_centers.is_empty() {
            self.voxel_centers = result.voxel_centers;
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

    /// Voxel centres per material from the last medium build.
    pub fn voxel_centers(&self) -> &BTreeMap<usize, Vec<Point3>> {
        &self.voxel_centers
    }

    /// Amplitude and phase beyond the source plane.
    pub fn field_xyz(&mut self) -> Result<&CartesianField> {
        let hash = self.params.hash();
        let params = &self.params;
        let data = self.sensor_data.get(&hash).ok_or(SolverError::NotSolved)?;
        self.field.try_get_or_compute(hash, || extract_field(params, data))
    }

    /// Render volume of the amplitude.
    pub fn render_volume(&mut self, config: &VolumeRenderConfig, end: &Transform) -> Result<VolumeData> {
        let dx = SimGrid::from_params(&self.params)?.dx;
        let field = self.field_xyz()?;
        render_volume(&field.amplitude, config, dx, end)
    }
}

fn grid_coords(params: &SimulationParameters, grid: &SimGrid) -> Result<Vec<Point3>> {
    let offset = params.count("source_z_offset")? as f64;
    let as_z = params.number("AS_domain_z_size")?;
    let (x, y, z) = (grid.axis_vec(0), grid.axis_vec(1), grid.axis_vec(2));
    let z0 = z.first().copied().unwrap_or(0.0);
    let mut out = Vec::with_capacity(grid.num_points());
    for &zv in &z {
        let zc = zv - z0 + as_z - offset * grid.dx;
        for &yv in &y {
            for &xv in &x {
                out.push(Point3::new(xv, yv, zc));
            }
        }
    }
    Ok(out)
}

fn extract_field(params: &SimulationParameters, data: &SensorData) -> Result<CartesianField> {
    let grid = SimGrid::from_params(params)?;
    let offset = params.count("source_z_offset")?;
    let pressure = data.pressure().ok_or(SolverError::MissingPressure)?;
    let (nx, ny) = (grid.dims[0], grid.dims[1]);
    let nz = grid.dims[2].saturating_sub(offset);
    if pressure.points != nx * ny * nz {
        return Err(SolverError::ShapeMismatch {
            field: "p".to_string(),
            expected: nx * ny * nz,
            found: pressure.points,
        });
    }
    let spectrum = extract_amp_phase(pressure, grid.dt, params.positive("source_f0")?)?;
    let as_z = params.number("AS_domain_z_size")?;
    let z: Vec<f64> = (0..nz).map(|k| k as f64 * grid.dx + as_z - grid.dx / 2.0).collect();
    let amplitude = FieldVolume::new(grid.axis_vec(0), grid.axis_vec(1), z, spectrum.amplitude)?;
    Ok(CartesianField {
        amplitude,
        phase: spectrum.phase,
        frequency: spectrum.frequency,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kgrid_coords_layout() {
        let mut solver = CartesianSolver::new(SimulationParameters::defaults(SolverKind::Cartesian), SourceModel::Bowl);
        solver.set_parameter("AS_domain_z_size", 0.03);
        let dx = solver.grid().unwrap().dx;
        let coords = solver.kgrid_coords().unwrap().to_vec();
        assert_eq!(coords.len(), 28 * 28 * 64);
        assert_relative_eq!(coords[0].x, -14.0 * dx, max_relative = 1e-12);
        assert_relative_eq!(coords[1].x, -13.0 * dx, max_relative = 1e-12);
        assert_relative_eq!(coords[28].y, -13.0 * dx, max_relative = 1e-12);
        // The source plane sits at the axisymmetric domain depth.
        assert_relative_eq!(coords[10 * 28 * 28].z, 0.03, max_relative = 1e-12);
    }

    #[test]
    fn test_coupled_source_needs_field() {
        let solver = CartesianSolver::new(SimulationParameters::defaults(SolverKind::Cartesian), SourceModel::Coupled);
        assert!(matches!(solver.build_job(), Err(SolverError::CouplingUnavailable)));
    }

    #[test]
    fn test_homogeneous_without_geometry() {
        let solver = CartesianSolver::new(SimulationParameters::defaults(SolverKind::Cartesian), SourceModel::Bowl);
        let (job, centers) = solver.build_job().unwrap();
        assert!(job.medium.is_homogeneous());
        assert!(centers.is_empty());
        assert!(matches!(job.source, Source::Bowl(_)));
        assert_eq!(job.options.engine, "OMP");
    }

    fn solved(solver: &mut CartesianSolver) {
        let mut data = SensorData::default();
        data.fields
            .insert("p".into(), crate::engine::RecordedField::new(1, 2, vec![1.0, -1.0]).unwrap());
        let mut centers = BTreeMap::new();
        centers.insert(1, vec![Point3::origin()]);
        let hash = solver.params().hash();
        assert!(solver.accept(SolveResult {
            hash,
            outcome: RunOutcome::Computed,
            data: Some(data),
            voxel_centers: centers,
        }));
        assert!(solver.is_solved());
    }

    #[test]
    fn test_new_geometry_drops_solution() {
        let mut solver = CartesianSolver::new(SimulationParameters::defaults(SolverKind::Cartesian), SourceModel::Bowl);
        solved(&mut solver);

        // Same geometry again keeps the solution.
        solver.set_geometry(DomainGeometry::default());
        assert!(solver.is_solved());

        solver.set_geometry(DomainGeometry {
            meshes: Vec::new(),
            end: Transform::translation_xyz(0.0, 0.0, 1e-3),
        });
        assert!(!solver.is_solved());
        assert!(solver.last_outcome().is_none());
        assert!(solver.voxel_centers().is_empty());
        assert!(matches!(solver.field_xyz(), Err(SolverError::NotSolved)));
    }

    #[test]
    fn test_new_coupling_drops_solution() {
        let mut solver = CartesianSolver::new(SimulationParameters::defaults(SolverKind::Cartesian), SourceModel::Coupled);
        solved(&mut solver);
        solver.set_coupling(None);
        assert!(solver.is_solved());
        solver.set_coupling(Some(AxisymmetricField {
            z: vec![0.0],
            r: vec![0.0],
            amplitude: vec![1.0],
            phase: vec![0.0],
            frequency: 1e6,
        }));
        assert!(!solver.is_solved());
    }
}
