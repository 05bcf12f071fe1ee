//! End-to-end solver runs against a synthetic engine.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use approx::assert_relative_eq;
use sonoframe_acoustic::{
    cw_signal, AxisymmetricSolver, CartesianSolver, DomainGeometry, RecordedField, RunOutcome, SensorData,
    SimulationJob, SimulationParameters, SolverEngine, SolverError, SolverKind, Source, Worker,
};
use sonoframe_ir::SourceModel;
use sonoframe_math::Transform;
use sonoframe_mesh::box_extrusion;

/// Records a CW pressure at every sensor point: amplitude `base + slope·p`, phase 0.
struct SyntheticEngine {
    base: f64,
    slope: f64,
    /// Poison the first pressure sample with NaN.
    nan: bool,
    calls: AtomicUsize,
    last_job: Mutex<Option<SimulationJob>>,
}

impl SyntheticEngine {
    fn new(base: f64, slope: f64) -> Self {
        Self {
            base,
            slope,
            nan: false,
            calls: AtomicUsize::new(0),
            last_job: Mutex::new(None),
        }
    }

    fn nan() -> Self {
        Self {
            nan: true,
            ..Self::new(1.0, 0.0)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SolverEngine for SyntheticEngine {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn run(&self, job: &SimulationJob) -> sonoframe_acoustic::Result<SensorData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_job.lock().unwrap() = Some(job.clone());
        let grid = &job.grid;
        let points = job.sensor.num_points(grid);
        let steps = job.sensor.num_steps(grid);
        let start = job.sensor.record_start_index - 1;
        let t: Vec<f64> = (start..start + steps).map(|i| i as f64 * grid.dt).collect();
        let f0 = match &job.source {
            Source::Bowl(b) => b.frequency,
            Source::Plane(p) => p.frequency,
        };
        let mut values = Vec::with_capacity(points * steps);
        for p in 0..points {
            values.extend(cw_signal(&t, f0, self.base + self.slope * p as f64, 0.0));
        }
        if self.nan {
            values[0] = f64::NAN;
        }
        let mut data = SensorData::default();
        data.fields.insert("p".into(), RecordedField::new(points, steps, values)?);
        Ok(data)
    }
}

#[test]
fn test_output_artifact_prevents_second_engine_call() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SyntheticEngine::new(1000.0, 1.0);

    let mut first = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));
    assert!(first.run_simulation(&engine, Some(dir.path())).unwrap());
    assert_eq!(engine.calls(), 1);
    assert_eq!(first.last_outcome(), Some(&RunOutcome::Computed));

    let mut second = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));
    assert!(second.run_simulation(&engine, Some(dir.path())).unwrap());
    assert_eq!(engine.calls(), 1);
    let short = second.params().short_hash();
    match second.last_outcome() {
        Some(RunOutcome::Cached(path)) => {
            assert_eq!(
                path.file_name().unwrap().to_str().unwrap(),
                format!("axisymmetric_output_{}.h5", short)
            );
        }
        other => panic!("expected a cache hit, got {:?}", other),
    }

    // 121 axial by 34 radial sensor points, axial fastest.
    let field = second.field_zr().unwrap();
    assert_eq!(field.z.len(), 121);
    assert_eq!(field.r.len(), 34);
    assert_relative_eq!(field.frequency, 1e6, max_relative = 1e-12);
    assert_relative_eq!(field.amplitude_at(0, 0).unwrap(), 1000.0, max_relative = 1e-9);
    assert_relative_eq!(field.amplitude_at(5, 2).unwrap(), 1000.0 + 2.0 * 121.0 + 5.0, max_relative = 1e-9);
    assert_relative_eq!(field.z[0], field.r[1], max_relative = 1e-12);

    // A parameter edit changes the hash and misses the cache.
    assert!(second.set_parameter("record_periods", 2.0));
    assert!(!second.is_solved());
    assert!(second.run_simulation(&engine, Some(dir.path())).unwrap());
    assert_eq!(engine.calls(), 2);
}

#[test]
fn test_non_finite_output_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SyntheticEngine::nan();
    let mut solver = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));

    match solver.run_simulation(&engine, Some(dir.path())) {
        Err(SolverError::Output(e)) => assert_eq!(e.field, "p"),
        other => panic!("expected an output error, got {:?}", other),
    }
    assert_eq!(engine.calls(), 1);
    assert!(!solver.is_solved());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_truncated_cache_artifact_is_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SyntheticEngine::new(10.0, 0.0);
    let mut solver = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));
    let output = dir
        .path()
        .join(format!("axisymmetric_output_{}.h5", solver.params().short_hash()));
    std::fs::write(&output, b"{\"fields\": {\"p\": {\"points\"").unwrap();

    assert!(solver.run_simulation(&engine, Some(dir.path())).unwrap());
    assert_eq!(engine.calls(), 1);
    assert_eq!(solver.last_outcome(), Some(&RunOutcome::Computed));

    // The rewritten artifact now serves the next run.
    let mut again = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));
    assert!(again.run_simulation(&engine, Some(dir.path())).unwrap());
    assert_eq!(engine.calls(), 1);
    assert_eq!(again.last_outcome(), Some(&RunOutcome::Cached(output)));
}

#[test]
fn test_panicking_solve_on_worker_reports_job_error() {
    let mut worker: Worker<sonoframe_acoustic::Result<()>> = Worker::new();
    worker
        .dispatch("axisymmetric", || -> sonoframe_acoustic::Result<()> { panic!("engine crashed") })
        .unwrap();
    let done = worker.wait_all();
    assert_eq!(done.len(), 1);
    assert_eq!(worker.in_flight(), 0);
    let err: SolverError = done.into_iter().next().unwrap().value.unwrap_err().into();
    match err {
        SolverError::Job(panic) => {
            assert_eq!(panic.label, "axisymmetric");
            assert_eq!(panic.message, "engine crashed");
        }
        other => panic!("expected a job error, got {:?}", other),
    }
}

#[test]
fn test_external_execution_writes_input_only() {
    let dir = tempfile::tempdir().unwrap();
    let engine = SyntheticEngine::new(1.0, 0.0);
    let mut solver = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));
    solver.set_parameter("run_through_external_cpp_solvers", true);

    assert!(matches!(
        solver.run_simulation(&engine, None),
        Err(SolverError::CacheDirRequired)
    ));

    assert!(!solver.run_simulation(&engine, Some(dir.path())).unwrap());
    assert_eq!(engine.calls(), 0);
    match solver.last_outcome() {
        Some(RunOutcome::Pending { input, command }) => {
            assert!(input.is_file());
            assert!(command.contains(&solver.params().short_hash()));
            assert!(command.contains("$t_sensor_start = 2791"));
            assert!(command.contains("kspaceFirstOrder-OMP"));
        }
        other => panic!("expected a pending run, got {:?}", other),
    }
    assert!(matches!(solver.field_zr(), Err(SolverError::NotSolved)));
}

#[test]
fn test_coupled_source_from_solved_field() {
    let engine = SyntheticEngine::new(2000.0, 0.0);
    let mut axisymmetric = AxisymmetricSolver::new(SimulationParameters::defaults(SolverKind::Axisymmetric));
    assert!(axisymmetric.run_simulation(&engine, None).unwrap());
    let field = axisymmetric.field_zr().unwrap().clone();

    let mut cartesian = CartesianSolver::new(SimulationParameters::defaults(SolverKind::Cartesian), SourceModel::Coupled);
    cartesian.set_parameter("AS_domain_z_size", 0.02);
    cartesian.set_coupling(Some(field));
    let (job, _) = cartesian.build_job().unwrap();
    let Source::Plane(plane) = &job.source else {
        panic!("expected a plane source");
    };
    assert_eq!(plane.z_index, 10);
    assert_eq!(plane.amplitude.len(), 28 * 28);
    assert_relative_eq!(plane.frequency, 1e6, max_relative = 1e-12);
    for &a in &plane.amplitude {
        assert_relative_eq!(a, 2000.0, max_relative = 1e-9);
    }
}

#[test]
fn test_cartesian_solve_on_worker_with_bone() {
    let engine = std::sync::Arc::new(SyntheticEngine::new(500.0, 0.0));
    let mut solver = CartesianSolver::new(SimulationParameters::defaults(SolverKind::Cartesian), SourceModel::Bowl);
    let bone = box_extrusion(4e-3, 4e-3, 3e-3).unwrap().with_material(1);
    solver.set_geometry(DomainGeometry {
        meshes: vec![bone],
        end: Transform::identity(),
    });

    let mut worker = Worker::new();
    let snapshot = solver.clone();
    let job_engine = engine.clone();
    worker
        .dispatch("cartesian", move || snapshot.solve(job_engine.as_ref(), None))
        .unwrap();
    let done = worker.wait_all();
    assert_eq!(done.len(), 1);
    let result = done.into_iter().next().unwrap().value.unwrap().unwrap();
    assert!(solver.accept(result));
    assert!(solver.is_solved());
    assert_eq!(solver.voxel_centers().keys().copied().collect::<Vec<_>>(), vec![1]);

    let job = engine.last_job.lock().unwrap().clone().unwrap();
    assert!(!job.medium.is_homogeneous());
    assert_eq!(job.medium.sound_speed.len(), 28 * 28 * 64);
    assert!(job.medium.sound_speed.iter().any(|&c| c == 2400.0));
    assert!(job.medium.sound_speed.iter().any(|&c| c == 1482.3));

    let field = solver.field_xyz().unwrap();
    assert_eq!(field.amplitude.dims(), [28, 28, 54]);
    assert_relative_eq!(field.amplitude.max(), 500.0, max_relative = 1e-9);
}
