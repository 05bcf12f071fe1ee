//! Frame orchestration: boolean operations, hulls, background solves and persistence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use approx::assert_relative_eq;
use sonoframe::{presets, Drawable, Frame, FrameError, RecordingRenderer};
use sonoframe_acoustic::{
    cw_signal, RecordedField, RunOutcome, SensorData, SimulationJob, SolverEngine, SolverError, SolverKind, Source,
    UnavailableEngine,
};
use sonoframe_chain::ArgPath;
use sonoframe_ir::{
    ArgValue, AttachmentConfig, Axis, BooleanMaskConfig, BooleanOperations, ChainConfig, ConvexHullConfig,
    DomainShape, FrameDocument, HierarchyNode, JointConfig, JsonFileSettings, MemorySettings, MeshConfig,
    SettingsStore, ShapeDimension, SolverConfig, SubTransformConfig,
};
use sonoframe_mesh::{box_extrusion, BooleanEngine, BooleanOp, MeshError, TriangleMesh};

// =============================================================================
// Test engines
// =============================================================================

/// Returns the first operand unchanged and remembers what it was asked.
#[derive(Default)]
struct RecordingBooleans {
    calls: Mutex<Vec<(BooleanOp, usize)>>,
    hulls: AtomicUsize,
}

impl RecordingBooleans {
    fn calls(&self) -> Vec<(BooleanOp, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

impl BooleanEngine for RecordingBooleans {
    fn apply(&self, op: BooleanOp, meshes: &[TriangleMesh]) -> Result<TriangleMesh, MeshError> {
        self.calls.lock().unwrap().push((op, meshes.len()));
        meshes.first().cloned().ok_or_else(|| MeshError::NoOperands(op.to_string()))
    }

    /// Bounding box, which is a hull of sorts.
    fn convex_hull(&self, mesh: &TriangleMesh) -> Result<TriangleMesh, MeshError> {
        self.hulls.fetch_add(1, Ordering::SeqCst);
        let b = mesh.bounds();
        let size = b.max - b.min;
        Ok(box_extrusion(size.x, size.y, size.z)?.transformed(&sonoframe_math::Transform::translation_xyz(
            (b.min.x + b.max.x) / 2.0,
            (b.min.y + b.max.y) / 2.0,
            b.min.z,
        )))
    }
}

/// Records a constant CW pressure at every sensor point.
#[derive(Default)]
struct ConstantEngine {
    calls: AtomicUsize,
}

impl SolverEngine for ConstantEngine {
    fn name(&self) -> &str {
        "constant"
    }

    fn run(&self, job: &SimulationJob) -> sonoframe_acoustic::Result<SensorData> {
        self.calls.fetch_add(1, Ordering::SeqCst);
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
        for _ in 0..points {
            values.extend(cw_signal(&t, f0, 2e5, 0.0));
        }
        let mut data = SensorData::default();
        data.fields.insert("p".into(), RecordedField::new(points, steps, values)?);
        Ok(data)
    }
}

/// Panics inside the worker thread.
struct PanickingEngine;

impl SolverEngine for PanickingEngine {
    fn name(&self) -> &str {
        "panicking"
    }

    fn run(&self, _job: &SimulationJob) -> sonoframe_acoustic::Result<SensorData> {
        panic!("solver blew up")
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn box_mask(x: f64, y: f64, z: f64, operations: Option<BooleanOperations>) -> AttachmentConfig {
    AttachmentConfig::BooleanMask(BooleanMaskConfig {
        shape: DomainShape::Box {
            x_size: ShapeDimension::fixed(x),
            y_size: ShapeDimension::fixed(y),
            z_size: ShapeDimension::fixed(z),
        },
        transform: None,
        operations,
    })
}

fn ops(op: &str, names: &[&str]) -> Option<BooleanOperations> {
    Some(BooleanOperations::Single(
        op.to_string(),
        names.iter().map(|n| n.to_string()).collect(),
    ))
}

fn skull(operations: Option<BooleanOperations>) -> ChainConfig {
    let mut chain = ChainConfig::new("skull");
    chain.joints = vec![JointConfig::new(
        "offset",
        vec![SubTransformConfig::translation(Axis::X, 0.01).editable(sonoframe_ir::EditableMeta::new(1e-3, "x"))],
    )];
    chain.attachments = vec![
        AttachmentConfig::Mesh(MeshConfig {
            mesh: "cube".into(),
            transform: None,
        }),
        box_mask(0.005, 0.005, 0.005, operations),
    ];
    chain
}

fn frame_with(chains: Vec<ChainConfig>, booleans: Arc<RecordingBooleans>) -> Frame {
    let doc = FrameDocument {
        chains,
        ..FrameDocument::default()
    };
    let mut frame = Frame::from_document(&doc, Arc::new(UnavailableEngine))
        .unwrap()
        .with_boolean_engine(booleans);
    frame.insert_mesh("cube", box_extrusion(0.02, 0.02, 0.02).unwrap());
    frame
}

// =============================================================================
// Boolean operations and hulls
// =============================================================================

#[test]
fn test_boolean_result_replaces_mesh_until_chain_moves() {
    let booleans = Arc::new(RecordingBooleans::default());
    let mut frame = frame_with(vec![skull(ops("difference", &["_stl_mesh", "_boolean_mask"]))], booleans.clone());

    assert_eq!(frame.apply_boolean_operations("skull").unwrap(), 1);
    assert_eq!(booleans.calls(), vec![(BooleanOp::Difference, 2)]);

    let processed = frame.processed_meshes("skull").unwrap().unwrap();
    assert_eq!(processed.len(), 1);
    assert_eq!(processed[0].material_index, 0);
    // Operands are in world coordinates: the cube follows the 10 mm offset.
    assert_relative_eq!(processed[0].bounds().min.x, 0.0, epsilon = 1e-12);

    let mut scene = RecordingRenderer::new();
    assert!(frame.update_render(&mut scene).is_empty());
    assert_eq!(
        scene.names(),
        vec!["skull/boolean_mask", "skull/chain", "skull/processed/0"]
    );
    match scene.get("skull/processed/0") {
        Some(Drawable::Mesh { transform, .. }) => assert!(transform.approx_eq(&sonoframe_math::Transform::identity(), 1e-15)),
        other => panic!("expected a mesh, got {:?}", other),
    }

    frame.nudge("skull", &ArgPath::new("offset", 0), 1.0).unwrap();
    assert!(frame.processed_meshes("skull").unwrap().is_none());
    frame.update_render(&mut scene);
    assert_eq!(scene.names(), vec!["skull/boolean_mask", "skull/chain", "skull/mesh"]);
}

#[test]
fn test_unknown_operand_lists_available_meshes() {
    let booleans = Arc::new(RecordingBooleans::default());
    let mut sim = ChainConfig::new("sim");
    sim.attachments = vec![box_mask(0.01, 0.01, 0.01, ops("intersection", &["Skul", "_boolean_mask"]))];
    let mut frame = frame_with(
        vec![skull(ops("difference", &["_stl_mesh", "_boolean_mask"])), sim],
        booleans.clone(),
    );
    frame.apply_boolean_operations("skull").unwrap();

    match frame.apply_boolean_operations("sim") {
        Err(FrameError::BooleanOperation { message, available }) => {
            assert!(message.contains("Skul"));
            assert_eq!(available, vec!["_stl_mesh", "_boolean_mask", "skull"]);
        }
        other => panic!("expected a boolean error, got {:?}", other),
    }
    assert!(frame.processed_meshes("sim").unwrap().is_none());
    assert_eq!(frame.processed_meshes("skull").unwrap().map(|m| m.len()), Some(1));
    assert_eq!(booleans.calls().len(), 1);
}

#[test]
fn test_operand_rules() {
    let booleans = Arc::new(RecordingBooleans::default());

    // A chain whose library mesh is not loaded is skipped.
    let mut ghost = ChainConfig::new("ghost");
    ghost.attachments = vec![AttachmentConfig::Mesh(MeshConfig {
        mesh: "not loaded".into(),
        transform: None,
    })];
    let mut sim = ChainConfig::new("sim");
    sim.attachments = vec![box_mask(0.01, 0.01, 0.01, ops("union", &["ghost", "_boolean_mask"]))];
    // A chain without any mesh cannot be an operand.
    let mut bad = ChainConfig::new("bad");
    bad.attachments = vec![box_mask(0.01, 0.01, 0.01, ops("union", &["plain", "_boolean_mask"]))];
    // Processed results make a chain usable as an operand.
    let mut reuse = ChainConfig::new("reuse");
    reuse.attachments = vec![box_mask(0.01, 0.01, 0.01, ops("intersection", &["sim", "_boolean_mask"]))];
    let mut typo = ChainConfig::new("typo");
    typo.attachments = vec![box_mask(0.01, 0.01, 0.01, ops("xor", &["_boolean_mask"]))];
    let mut frame = frame_with(
        vec![ghost, sim, bad, reuse, typo, ChainConfig::new("plain")],
        booleans.clone(),
    );

    assert_eq!(frame.apply_boolean_operations("sim").unwrap(), 1);
    assert_eq!(booleans.calls(), vec![(BooleanOp::Union, 1)]);
    assert_eq!(frame.apply_boolean_operations("reuse").unwrap(), 1);
    assert_eq!(booleans.calls()[1], (BooleanOp::Intersection, 2));

    match frame.apply_boolean_operations("bad") {
        Err(FrameError::BooleanOperation { message, .. }) => assert!(message.contains("'plain'")),
        other => panic!("expected a boolean error, got {:?}", other),
    }
    assert!(matches!(
        frame.apply_boolean_operations("typo"),
        Err(FrameError::BooleanOperation { .. })
    ));
    assert!(matches!(
        frame.apply_boolean_operations("plain"),
        Err(FrameError::MissingAttachment { .. })
    ));
    let mut frame = frame_with(vec![skull(None)], booleans);
    assert!(matches!(
        frame.apply_boolean_operations("skull"),
        Err(FrameError::NoBooleanOperations(_))
    ));
    frame.set_boolean_engine(None);
    assert!(matches!(frame.compute_convex_hull("skull"), Err(FrameError::NoBooleanEngine)));
}

#[test]
fn test_hull_of_other_chain() {
    let booleans = Arc::new(RecordingBooleans::default());
    let mut brain = ChainConfig::new("brain");
    brain.attachments = vec![AttachmentConfig::ConvexHull(ConvexHullConfig {
        source: "skull".into(),
        material_index: 1,
    })];
    let mut frame = frame_with(
        vec![skull(ops("difference", &["_stl_mesh", "_boolean_mask"])), brain],
        booleans.clone(),
    );

    frame.compute_convex_hull("brain").unwrap();
    let hull = frame.processed_meshes("brain").unwrap().unwrap();
    assert_eq!(hull.len(), 1);
    assert_eq!(hull[0].material_index, 1);
    let b = hull[0].bounds();
    assert_relative_eq!(b.min.x, 0.0, epsilon = 1e-12);
    assert_relative_eq!(b.max.x, 0.02, epsilon = 1e-12);
    assert_eq!(booleans.hulls.load(Ordering::SeqCst), 1);

    let mut wrong = ChainConfig::new("wrong");
    wrong.attachments = vec![AttachmentConfig::ConvexHull(ConvexHullConfig {
        source: "nowhere".into(),
        material_index: 0,
    })];
    frame.add_chain(wrong, None).unwrap();
    assert!(matches!(
        frame.compute_convex_hull("wrong"),
        Err(FrameError::BooleanOperation { .. })
    ));
}

#[test]
fn test_mask_edit_redraws() {
    let mut frame = Frame::from_document(&presets::default_frame(), Arc::new(UnavailableEngine)).unwrap();
    let mut scene = RecordingRenderer::new();
    frame.update_render(&mut scene);
    scene.take_events();

    let y = frame
        .nudge_mask_dimension(presets::SIMULATION_3D, "y_size", 2.0)
        .unwrap();
    assert_relative_eq!(y, 0.021, epsilon = 1e-12);
    assert!(matches!(
        frame.nudge_mask_dimension(presets::SIMULATION_3D, "radius", 1.0),
        Err(FrameError::UnknownParameter(_))
    ));
    frame.update_render(&mut scene);
    let events = scene.take_events();
    assert!(events.contains(&sonoframe::RenderEvent::Update(format!(
        "{}/boolean_mask",
        presets::SIMULATION_3D
    ))));
}

// =============================================================================
// Background solves
// =============================================================================

fn solver_frame(engine: Arc<ConstantEngine>, cache: &std::path::Path) -> Frame {
    let mut chain = presets::axisymmetric_solver_chain("AS");
    for attachment in &mut chain.attachments {
        if let AttachmentConfig::AxisymmetricSolver(config) = attachment {
            config.cache_dir = Some(cache.to_path_buf());
        }
    }
    let doc = FrameDocument {
        chains: vec![chain],
        ..FrameDocument::default()
    };
    Frame::from_document(&doc, engine).unwrap()
}

#[test]
fn test_simulation_runs_in_background() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(ConstantEngine::default());
    let mut frame = solver_frame(engine.clone(), dir.path());

    frame.run_simulation("AS", SolverKind::Axisymmetric).unwrap();
    assert!(matches!(
        frame.run_simulation("AS", SolverKind::Axisymmetric),
        Err(FrameError::SimulationInFlight { .. })
    ));
    assert!(matches!(
        frame.run_simulation("AS", SolverKind::Cartesian),
        Err(FrameError::MissingAttachment { .. })
    ));

    let reports = frame.wait_simulations();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.chain, "AS");
    assert!(report.accepted);
    assert!(matches!(report.result, Ok(true)));
    assert_eq!(report.outcome, Some(RunOutcome::Computed));
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(frame.simulations_in_flight(), 0);

    let mut scene = RecordingRenderer::new();
    assert!(frame.update_render(&mut scene).is_empty());
    assert!(scene.names().contains(&"AS/as_field"));
    assert!(scene.names().contains(&"AS/as_domain"));

    // Same parameters again: the artifact answers.
    frame.run_simulation("AS", SolverKind::Axisymmetric).unwrap();
    let reports = frame.wait_simulations();
    assert!(matches!(reports[0].outcome, Some(RunOutcome::Cached(_))));
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_result_for_old_parameters_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(ConstantEngine::default());
    let mut frame = solver_frame(engine, dir.path());

    frame.run_simulation("AS", SolverKind::Axisymmetric).unwrap();
    let f0 = frame
        .nudge_solver_parameter("AS", SolverKind::Axisymmetric, "source_f0", 1.0)
        .unwrap();
    assert_relative_eq!(f0, 1.5e6);

    let reports = frame.wait_simulations();
    assert!(!reports[0].accepted);
    assert!(matches!(reports[0].result, Ok(true)));

    let mut scene = RecordingRenderer::new();
    frame.update_render(&mut scene);
    assert!(!scene.names().contains(&"AS/as_field"));
}

#[test]
fn test_engine_failure_is_reported() {
    let doc = FrameDocument {
        chains: vec![presets::axisymmetric_solver_chain("AS")],
        ..FrameDocument::default()
    };
    let mut frame = Frame::from_document(&doc, Arc::new(UnavailableEngine)).unwrap();
    frame.run_simulation("AS", SolverKind::Axisymmetric).unwrap();
    let reports = frame.wait_simulations();
    assert!(matches!(
        reports[0].result,
        Err(FrameError::Solver(SolverError::Engine(_)))
    ));
    // A failed run leaves the chain free for another try.
    assert!(frame.run_simulation("AS", SolverKind::Axisymmetric).is_ok());
    frame.wait_simulations();
}

#[test]
fn test_panicking_engine_is_reported() {
    let doc = FrameDocument {
        chains: vec![presets::axisymmetric_solver_chain("AS")],
        ..FrameDocument::default()
    };
    let mut frame = Frame::from_document(&doc, Arc::new(PanickingEngine)).unwrap();
    frame.run_simulation("AS", SolverKind::Axisymmetric).unwrap();
    let reports = frame.wait_simulations();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].chain, "AS");
    match &reports[0].result {
        Err(FrameError::Solver(SolverError::Job(panic))) => assert_eq!(panic.message, "solver blew up"),
        other => panic!("expected a job panic, got {:?}", other),
    }
    assert_eq!(frame.simulations_in_flight(), 0);
    assert!(frame.run_simulation("AS", SolverKind::Axisymmetric).is_ok());
    frame.wait_simulations();
}

#[test]
fn test_coupled_solve_needs_axisymmetric_field() {
    let doc = FrameDocument {
        chains: vec![presets::coupled_solver_chain("coupled")],
        ..FrameDocument::default()
    };
    let mut frame = Frame::from_document(&doc, Arc::new(UnavailableEngine)).unwrap();
    assert!(matches!(
        frame.run_simulation("coupled", SolverKind::Cartesian),
        Err(FrameError::Solver(SolverError::CouplingUnavailable))
    ));
    assert_eq!(frame.simulations_in_flight(), 0);
    assert!(frame
        .set_solver_parameter("coupled", SolverKind::Cartesian, "source_f0", 2e6)
        .unwrap());
    assert!(matches!(
        frame.set_solver_parameter("coupled", SolverKind::Cartesian, "ppw", 3.0),
        Err(FrameError::UnknownParameter(_))
    ));
}

// =============================================================================
// Persistence and documents
// =============================================================================

#[test]
fn test_settings_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let knob = ArgPath::new("AP knob", 0);

    let mut edited = Frame::from_document(&presets::default_frame(), Arc::new(UnavailableEngine)).unwrap();
    edited.nudge(presets::MAIN_FRAME, &knob, 4.0).unwrap();
    edited.set_visible(presets::SKULL_WINDOW, true).unwrap();
    edited.set_constant(presets::MAIN_FRAME, "L2", 0.05).unwrap();
    edited.set_parent(presets::BRAIN_HULL, Some(presets::MAIN_FRAME)).unwrap();
    let mut store = JsonFileSettings::open(&path).unwrap();
    edited.save_settings(&mut store).unwrap();
    store.save().unwrap();

    let mut restored = Frame::from_document(&presets::default_frame(), Arc::new(UnavailableEngine)).unwrap();
    let store = JsonFileSettings::open(&path).unwrap();
    assert_eq!(restored.restore_settings(&store), 5);

    let expected = edited.end_transform(presets::SIMULATION_3D).unwrap();
    let got = restored.end_transform(presets::SIMULATION_3D).unwrap();
    assert!(got.approx_eq(&expected, 1e-12));
    assert_eq!(restored.chain(presets::MAIN_FRAME).unwrap().constants().get("L2"), Some(&0.05));
    assert_eq!(
        restored.chains().parent(restored.chains().id_of(presets::BRAIN_HULL).unwrap()),
        restored.chains().id_of(presets::MAIN_FRAME)
    );
    assert_eq!(store.children("armature").len(), 4);
}

#[test]
fn test_bad_settings_are_skipped() {
    let mut store = MemorySettings::new();
    store.set_value("armature.Mainframe.visible", serde_json::json!("yes"));
    store.set_value("armature.Mainframe.glline_width", serde_json::json!(2.0));
    store.set_value("armature.Mainframe.joints", serde_json::json!({"not": "joints"}));
    store.set_value("stereotaxic_frame.hierarchy", serde_json::json!(42));

    let mut frame = Frame::from_document(&presets::default_frame(), Arc::new(UnavailableEngine)).unwrap();
    assert_eq!(frame.restore_settings(&store), 1);
    let chain = frame.chain(presets::MAIN_FRAME).unwrap();
    assert!(chain.visible());
    assert_eq!(chain.config().line_width, 2.0);
    assert_eq!(chain.config().joints.len(), 5);
}

#[test]
fn test_document_snapshot_keeps_edits() {
    let mut frame = Frame::from_document(&presets::default_frame(), Arc::new(UnavailableEngine)).unwrap();
    frame
        .set_argument(presets::MAIN_FRAME, &ArgPath::new("ML knob", 0), ArgValue::Number(-0.04))
        .unwrap();
    frame.nudge_mask_dimension(presets::SIMULATION_3D, "z_size", -4.0).unwrap();

    let doc = frame.document();
    assert_eq!(
        doc.hierarchy.iter().map(|n| n.name.as_str()).collect::<Vec<_>>().len(),
        3
    );
    assert!(doc
        .hierarchy
        .contains(&HierarchyNode::with_children(presets::MAIN_FRAME, vec![HierarchyNode::leaf(presets::SIMULATION_3D)])));

    let json = doc.to_json().unwrap();
    let reloaded = FrameDocument::from_json(&json).unwrap();
    let mut copy = Frame::from_document(&reloaded, Arc::new(UnavailableEngine)).unwrap();
    let a = frame.end_transform(presets::SIMULATION_3D).unwrap();
    let b = copy.end_transform(presets::SIMULATION_3D).unwrap();
    assert!(a.approx_eq(&b, 1e-12));

    let sim = reloaded.chain(presets::SIMULATION_3D).unwrap();
    let z = sim.attachments.iter().find_map(|a| match a {
        AttachmentConfig::BooleanMask(m) => m.shape.dimensions().iter().find(|(n, _)| *n == "z_size").map(|(_, d)| d.value.clone()),
        _ => None,
    });
    match z {
        Some(ArgValue::Number(v)) => assert_relative_eq!(v, 0.028, epsilon = 1e-12),
        other => panic!("expected an edited z size, got {:?}", other),
    }
    assert!(matches!(
        sim.attachments.last(),
        Some(AttachmentConfig::CartesianSolver(SolverConfig { .. }))
    ));
}

#[test]
fn test_sample_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../configs/frame.json");
    let doc = FrameDocument::load(path).unwrap();
    let mut frame = Frame::from_document(&doc, Arc::new(UnavailableEngine)).unwrap();
    assert_eq!(frame.chain_names(), vec!["Main frame".to_string(), "kWave AS simulation".to_string()]);

    let main = frame.end_transform("Main frame").unwrap().origin();
    assert_relative_eq!(main.x, -0.005, epsilon = 1e-12);
    // The mount only lifts the solver along its own flipped z axis.
    let solver = frame.end_transform("kWave AS simulation").unwrap().origin();
    assert_relative_eq!((solver - main).norm(), 2.01e-3, epsilon = 1e-9);

    let values = frame.editable_values("Main frame").unwrap();
    assert_eq!(values.len(), 4);
}
