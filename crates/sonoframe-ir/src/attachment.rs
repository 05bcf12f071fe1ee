//! Attachment configurations: what a chain carries besides its joints.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ArgValue, EditableMeta, ParamValue};

/// Something mounted on a chain's end effector.
///
/// A chain carries at most one attachment of each kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttachmentConfig {
    /// A mesh from the host's mesh library (the chain's `_stl_mesh`).
    Mesh(MeshConfig),
    /// A parametric domain shape combined with other meshes by boolean operations.
    BooleanMask(BooleanMaskConfig),
    /// Convex hull of another mesh.
    ConvexHull(ConvexHullConfig),
    /// Axisymmetric acoustic solver.
    AxisymmetricSolver(SolverConfig),
    /// 3-D Cartesian acoustic solver.
    CartesianSolver(SolverConfig),
}

impl AttachmentConfig {
    /// Short kind name, used for drawable and log labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AttachmentConfig::Mesh(_) => "mesh",
            AttachmentConfig::BooleanMask(_) => "boolean_mask",
            AttachmentConfig::ConvexHull(_) => "convex_hull",
            AttachmentConfig::AxisymmetricSolver(_) => "axisymmetric_solver",
            AttachmentConfig::CartesianSolver(_) => "cartesian_solver",
        }
    }
}

/// Mesh attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Key into the mesh library.
    pub mesh: String,
    /// Placement relative to the end effector, in transform notation.
    #[serde(default)]
    pub transform: Option<String>,
}

/// One dimension of a domain shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDimension {
    /// Size in meters, literal or expression.
    pub value: ArgValue,
    /// Present when the dimension is user-editable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<EditableMeta>,
}

impl ShapeDimension {
    /// Fixed literal dimension.
    pub fn fixed(value: f64) -> Self {
        Self {
            value: ArgValue::Number(value),
            editable: None,
        }
    }
}

/// Parametric solid used as a boolean mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainShape {
    /// Rectangle centred on the axis, extruded from z = 0 to `z_size`.
    Box {
        /// Width along x.
        x_size: ShapeDimension,
        /// Width along y.
        y_size: ShapeDimension,
        /// Extrusion height along z.
        z_size: ShapeDimension,
    },
    /// Circle centred on the axis, extruded from z = 0 to `height`.
    Cylinder {
        /// Radius.
        radius: ShapeDimension,
        /// Extrusion height along z.
        height: ShapeDimension,
        /// Segments around the circumference.
        #[serde(default = "default_segments")]
        segments: u32,
    },
}

fn default_segments() -> u32 {
    16
}

impl DomainShape {
    /// Named dimensions, in declaration order.
    pub fn dimensions(&self) -> Vec<(&'static str, &ShapeDimension)> {
        match self {
            DomainShape::Box { x_size, y_size, z_size } => {
                vec![("x_size", x_size), ("y_size", y_size), ("z_size", z_size)]
            }
            DomainShape::Cylinder { radius, height, .. } => vec![("radius", radius), ("height", height)],
        }
    }

    /// Mutable access to a dimension by name.
    pub fn dimension_mut(&mut self, name: &str) -> Option<&mut ShapeDimension> {
        match (self, name) {
            (DomainShape::Box { x_size, .. }, "x_size") => Some(x_size),
            (DomainShape::Box { y_size, .. }, "y_size") => Some(y_size),
            (DomainShape::Box { z_size, .. }, "z_size") => Some(z_size),
            (DomainShape::Cylinder { radius, .. }, "radius") => Some(radius),
            (DomainShape::Cylinder { height, .. }, "height") => Some(height),
            _ => None,
        }
    }
}

/// One boolean step: combine `meshes` with `op` and tag the result with `material_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanStep {
    /// Material assigned to the result when it is used by a solver.
    pub material_index: usize,
    /// `difference`, `intersection` or `union`.
    pub op: String,
    /// Operand names: `_stl_mesh`, `_boolean_mask`, or another chain's name.
    pub meshes: Vec<String>,
}

/// Boolean instructions, either one `[op, names]` pair or an ordered list of steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BooleanOperations {
    /// Single operation; its result gets material index 0.
    Single(String, Vec<String>),
    /// Ordered steps, each with its own material index.
    Ordered(Vec<BooleanStep>),
}

impl BooleanOperations {
    /// Normalise to an ordered list of steps.
    pub fn steps(&self) -> Vec<BooleanStep> {
        match self {
            BooleanOperations::Single(op, meshes) => vec![BooleanStep {
                material_index: 0,
                op: op.clone(),
                meshes: meshes.clone(),
            }],
            BooleanOperations::Ordered(steps) => steps.clone(),
        }
    }
}

/// Boolean mask attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanMaskConfig {
    /// Mask solid.
    pub shape: DomainShape,
    /// Placement relative to the end effector, in transform notation.
    #[serde(default)]
    pub transform: Option<String>,
    /// Operations run on demand; results replace the chain's processed meshes.
    #[serde(default)]
    pub operations: Option<BooleanOperations>,
}

/// Convex hull attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvexHullConfig {
    /// `_stl_mesh` or another chain's name.
    pub source: String,
    /// Material index carried by the hull.
    #[serde(default)]
    pub material_index: usize,
}

/// A solver parameter the user can edit in place. Overrides the configured value by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableParam {
    /// Current value.
    pub value: f64,
    /// Editing metadata.
    #[serde(default)]
    pub meta: EditableMeta,
}

/// How a Cartesian solve is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceModel {
    /// Focused bowl transducer.
    #[default]
    Bowl,
    /// Source plane driven by the chain's solved axisymmetric field.
    Coupled,
}

/// Volume rendering options for solved fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRenderConfig {
    /// Pressure mapped to the top of the colour scale; field maximum when unset.
    #[serde(default)]
    pub p_max_viz: Option<f64>,
    /// Keep every `stride`-th sample along each axis.
    #[serde(default = "default_stride")]
    pub stride: usize,
    /// Alpha multiplier applied to the normalised field.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_stride() -> usize {
    1
}

fn default_opacity() -> f64 {
    20.0
}

impl Default for VolumeRenderConfig {
    fn default() -> Self {
        Self {
            p_max_viz: None,
            stride: default_stride(),
            opacity: default_opacity(),
        }
    }
}

/// Solver attachment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Parameters layered over the solver defaults.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
    /// Editable parameters, applied last.
    #[serde(default)]
    pub editable: BTreeMap<String, EditableParam>,
    /// Source model (Cartesian solver only).
    #[serde(default)]
    pub source: SourceModel,
    /// Directory holding solver input/output artifacts.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Field rendering options.
    #[serde(default)]
    pub render: VolumeRenderConfig,
}
