//! Built-in frame and solver chains.

use std::collections::BTreeMap;

use sonoframe_ir::{
    ArgValue, AttachmentConfig, Axis, BooleanMaskConfig, BooleanOperations, BooleanStep, ChainConfig,
    ConvexHullConfig, DomainShape, EditableMeta, EditableParam, FrameDocument, HierarchyNode, JointConfig,
    MeshConfig, ParamValue, ShapeDimension, SolverConfig, SourceModel, SubTransformConfig, VolumeRenderConfig,
};

/// Library key of the default skull mesh.
pub const SKULL_MESH: &str = "skull";

/// Name of the stereotaxic frame chain.
pub const MAIN_FRAME: &str = "Main frame";
/// Name of the skull chain.
pub const SKULL_WINDOW: &str = "Skull acoustic window";
/// Name of the brain hull chain.
pub const BRAIN_HULL: &str = "Brain mesh (skull convex Hull)";
/// Name of the 3D simulation chain.
pub const SIMULATION_3D: &str = "kWave 3D simulation";

const AXISYMMETRIC_MOUNT: &str = "Rx180deg Tz2.01mm";
const CARTESIAN_MOUNT: &str = "Rx180deg";

fn editable_dim(value: impl Into<ArgValue>, increment: f64, label: &str) -> ShapeDimension {
    ShapeDimension {
        value: value.into(),
        editable: Some(EditableMeta::new(increment, label).with_unit("m")),
    }
}

fn params(entries: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
    entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn source_f0(value: f64) -> BTreeMap<String, EditableParam> {
    let mut editable = BTreeMap::new();
    editable.insert(
        "source_f0".to_string(),
        EditableParam {
            value,
            meta: EditableMeta::new(5e5, "Source f0").with_unit("Hz"),
        },
    );
    editable
}

/// The stereotaxic frame: AP, DV and ML knobs ending in a holder rod.
pub fn main_frame() -> ChainConfig {
    let mut chain = ChainConfig::new(MAIN_FRAME);
    chain.constants.insert("L1".into(), 0.02);
    chain.constants.insert("L2".into(), 0.04);
    chain.joints = vec![
        JointConfig::new(
            "ML_offset_1",
            vec![SubTransformConfig::translation(Axis::Y, "csts['L1']*2")],
        ),
        JointConfig::new(
            "AP knob",
            vec![
                SubTransformConfig::translation(Axis::X, -0.005)
                    .editable(EditableMeta::new(5e-4, "AP knob").with_unit("m").with_color("x_RED").with_slot(0)),
                SubTransformConfig::rotation(Axis::X, 4.0).editable(EditableMeta::new(1.0, "AP tilt").with_unit("deg")),
            ],
        ),
        JointConfig::new(
            "DV knob",
            vec![
                SubTransformConfig::translation(Axis::Z, 0.05)
                    .editable(EditableMeta::new(5e-4, "DV knob").with_unit("m").with_color("z_BLUE").with_slot(1)),
                SubTransformConfig::rotation(Axis::Z, 0.0).editable(EditableMeta::new(1.0, "DV tilt").with_unit("deg")),
            ],
        ),
        JointConfig::new(
            "ML knob",
            vec![SubTransformConfig::translation(Axis::Y, -0.043)
                .editable(EditableMeta::new(5e-4, "ML knob").with_unit("m").with_color("y_GREEN").with_slot(2))],
        ),
        JointConfig::new(
            "holder_rod",
            vec![SubTransformConfig::translation(Axis::Z, "-csts['L2']")],
        ),
    ];
    chain
}

/// Skull mesh with a craniotomy window cut out of it.
///
/// The window is a box spanning `c_AP..a_AP` and `b_ML..d_ML`, extruded by
/// `extrude` and lifted 2 mm.
pub fn skull_window() -> ChainConfig {
    let mut chain = ChainConfig::new(SKULL_WINDOW);
    chain.visible = false;
    for (k, v) in [
        ("a_AP", 0.0673),
        ("c_AP", 0.06),
        ("b_ML", 0.0144),
        ("d_ML", 0.0185),
        ("extrude", 0.004),
    ] {
        chain.constants.insert(k.into(), v);
    }
    chain.attachments = vec![
        AttachmentConfig::Mesh(MeshConfig {
            mesh: SKULL_MESH.into(),
            transform: Some("S.11 Rz90deg Tz-31.9mm Tx46mm Ry3.7deg".into()),
        }),
        AttachmentConfig::BooleanMask(BooleanMaskConfig {
            shape: DomainShape::Box {
                x_size: ShapeDimension {
                    value: "a_AP - c_AP".into(),
                    editable: None,
                },
                y_size: ShapeDimension {
                    value: "d_ML - b_ML".into(),
                    editable: None,
                },
                z_size: ShapeDimension {
                    value: "extrude".into(),
                    editable: None,
                },
            },
            transform: Some("Tz2mm".into()),
            operations: Some(BooleanOperations::Single(
                "difference".into(),
                vec!["_stl_mesh".into(), "_boolean_mask".into()],
            )),
        }),
    ];
    chain
}

/// Convex hull of the skull, standing in for the brain.
pub fn brain_hull() -> ChainConfig {
    let mut chain = ChainConfig::new(BRAIN_HULL);
    chain.visible = false;
    chain.attachments = vec![AttachmentConfig::ConvexHull(ConvexHullConfig {
        source: SKULL_WINDOW.into(),
        material_index: 1,
    })];
    chain
}

/// Axisymmetric solver with the default bowl transducer.
pub fn axisymmetric_solver_chain(name: &str) -> ChainConfig {
    let mut chain = ChainConfig::new(name);
    chain.mount = Some(AXISYMMETRIC_MOUNT.into());
    chain.attachments = vec![AttachmentConfig::AxisymmetricSolver(SolverConfig {
        editable: source_f0(1e6),
        ..SolverConfig::default()
    })];
    chain
}

fn cartesian_config(source: SourceModel) -> SolverConfig {
    SolverConfig {
        parameters: params(&[
            ("c_0", 1482.3.into()),
            ("rho_0", 994.04.into()),
            ("alpha_0", 0.0022.into()),
            ("alpha_power_0", 1.0.into()),
            ("c_1", 1546.0.into()),
            ("rho_1", 1045.0.into()),
            ("alpha_1", 0.208.into()),
            ("alpha_power_1", 1.3.into()),
            ("c_2", 2400.0.into()),
            ("rho_2", 1850.0.into()),
            ("alpha_2", 2.693.into()),
            ("alpha_power_2", 1.18.into()),
            ("source_f0", 1e6.into()),
            ("source_roc", 0.015.into()),
            ("source_diameter", 0.015.into()),
            ("source_amp", 1e5.into()),
            ("threeD_domain_x_size", 0.01.into()),
            ("threeD_domain_y_size", 0.01.into()),
            ("threeD_domain_z_size", 0.02.into()),
            ("ppw", 5.0.into()),
            ("t_end", 4e-5.into()),
            ("cfl", 0.1.into()),
            ("source_z_offset", 10.0.into()),
            ("cpp_engine", "CUDA".into()),
        ]),
        editable: source_f0(1e6),
        source,
        render: VolumeRenderConfig {
            p_max_viz: Some(5e5),
            ..VolumeRenderConfig::default()
        },
        ..SolverConfig::default()
    }
}

/// 3D solver over the skull and brain, masked by an editable box.
pub fn cartesian_solver_chain(name: &str) -> ChainConfig {
    let mut chain = ChainConfig::new(name);
    chain.mount = Some(CARTESIAN_MOUNT.into());
    chain.attachments = vec![
        AttachmentConfig::BooleanMask(BooleanMaskConfig {
            shape: DomainShape::Box {
                x_size: editable_dim(0.02, 5e-4, "Mask x"),
                y_size: editable_dim(0.02, 5e-4, "Mask y"),
                z_size: editable_dim(0.03, 5e-4, "Mask z"),
            },
            transform: None,
            operations: Some(BooleanOperations::Ordered(vec![
                BooleanStep {
                    material_index: 1,
                    op: "intersection".into(),
                    meshes: vec![BRAIN_HULL.into(), "_boolean_mask".into()],
                },
                BooleanStep {
                    material_index: 2,
                    op: "intersection".into(),
                    meshes: vec![SKULL_WINDOW.into(), "_boolean_mask".into()],
                },
            ])),
        }),
        AttachmentConfig::CartesianSolver(cartesian_config(SourceModel::Bowl)),
    ];
    chain
}

/// Axisymmetric solve feeding a 3D solve through a source plane.
///
/// The 3D domain starts where the axisymmetric one ends, 10 mm below the bowl.
pub fn coupled_solver_chain(name: &str) -> ChainConfig {
    let mut chain = cartesian_solver_chain(name);
    chain.mount = Some(AXISYMMETRIC_MOUNT.into());
    let mut cartesian = cartesian_config(SourceModel::Coupled);
    cartesian.parameters.insert("AS_domain_z_size".into(), 0.01.into());
    let mut axisymmetric = SolverConfig {
        editable: source_f0(1e6),
        ..SolverConfig::default()
    };
    axisymmetric.parameters.insert("AS_domain_z_size".into(), 0.01.into());
    for attachment in &mut chain.attachments {
        if let AttachmentConfig::CartesianSolver(config) = attachment {
            *config = cartesian.clone();
        }
    }
    chain.attachments.push(AttachmentConfig::AxisymmetricSolver(axisymmetric));
    chain
}

/// The default stereotaxic frame with a 3D simulation on the holder rod.
pub fn default_frame() -> FrameDocument {
    FrameDocument {
        chains: vec![
            main_frame(),
            cartesian_solver_chain(SIMULATION_3D),
            skull_window(),
            brain_hull(),
        ],
        hierarchy: vec![
            HierarchyNode::with_children(MAIN_FRAME, vec![HierarchyNode::leaf(SIMULATION_3D)]),
            HierarchyNode::leaf(SKULL_WINDOW),
            HierarchyNode::leaf(BRAIN_HULL),
        ],
        ..FrameDocument::default()
    }
}
