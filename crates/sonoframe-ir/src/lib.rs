#![warn(missing_docs)]

//! Declarative frame documents for sonoframe.
//!
//! A [`FrameDocument`] lists kinematic chains (joints, constants, mount and
//! attachments) plus the hierarchy that parents them. Documents are plain
//! serde types and load from JSON or TOML. Evaluation happens elsewhere;
//! nothing here knows about matrices beyond the axis names.
//!
//! The crate also hosts the small shared primitives the rest of the workspace
//! builds on: content hashing with [`Memo`], and the [`SettingsStore`] used to
//! persist frame state between sessions.

mod attachment;
mod error;
mod hash;
mod settings;
mod values;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use attachment::{
    AttachmentConfig, BooleanMaskConfig, BooleanOperations, BooleanStep, ConvexHullConfig, DomainShape,
    EditableParam, MeshConfig, ShapeDimension, SolverConfig, SourceModel, VolumeRenderConfig,
};
pub use error::{IrError, Result};
pub use hash::{ContentHash, ContentHasher, Memo};
pub use settings::{clean_name, settings_path, JsonFileSettings, MemorySettings, SettingsStore};
pub use sonoframe_math::Axis;
pub use values::{ArgValue, ParamValue};

/// Named scalar constants available to a chain's expressions.
pub type Constants = BTreeMap<String, f64>;

/// Sub-transform kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Translation along an axis, in meters.
    Translation,
    /// Rotation about an axis.
    Rotation,
}

/// Editing metadata for a user-adjustable value.
///
/// Purely presentational apart from `increment`; none of it enters render or
/// parameter hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditableMeta {
    /// Whether the value is currently offered for editing.
    #[serde(default = "default_true")]
    pub editable: bool,
    /// Step applied by one nudge.
    #[serde(default = "default_increment")]
    pub increment: f64,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Display unit annotation.
    #[serde(default)]
    pub unit: Option<String>,
    /// Display colour name.
    #[serde(default)]
    pub color: Option<String>,
    /// Preferred position in a parameter panel.
    #[serde(default)]
    pub slot: Option<u32>,
}

fn default_true() -> bool {
    true
}

fn default_increment() -> f64 {
    1e-3
}

impl Default for EditableMeta {
    fn default() -> Self {
        Self {
            editable: true,
            increment: default_increment(),
            label: None,
            unit: None,
            color: None,
            slot: None,
        }
    }
}

impl EditableMeta {
    /// Metadata with an increment and label.
    pub fn new(increment: f64, label: impl Into<String>) -> Self {
        Self {
            increment,
            label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Set the display unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Set the display colour.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the panel slot.
    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }
}

/// One translate or rotate step of a joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTransformConfig {
    /// Translation or rotation.
    pub kind: TransformKind,
    /// Axis.
    pub axis: Axis,
    /// Distance or angle.
    pub value: ArgValue,
    /// Angle unit for rotations (`degrees` when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Present when the value is user-editable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<EditableMeta>,
}

impl SubTransformConfig {
    /// Translation step.
    pub fn translation(axis: Axis, value: impl Into<ArgValue>) -> Self {
        Self {
            kind: TransformKind::Translation,
            axis,
            value: value.into(),
            unit: None,
            editable: None,
        }
    }

    /// Rotation step in degrees.
    pub fn rotation(axis: Axis, degrees: impl Into<ArgValue>) -> Self {
        Self {
            kind: TransformKind::Rotation,
            axis,
            value: degrees.into(),
            unit: None,
            editable: None,
        }
    }

    /// Set the angle unit.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Mark as editable.
    pub fn editable(mut self, meta: EditableMeta) -> Self {
        self.editable = Some(meta);
        self
    }

    /// True when metadata offers this value for editing.
    pub fn is_editable(&self) -> bool {
        self.editable.as_ref().is_some_and(|m| m.editable)
    }
}

/// A named joint: an ordered group of sub-transforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointConfig {
    /// Joint name, unique within its chain.
    pub name: String,
    /// Sub-transforms, applied in order.
    #[serde(default)]
    pub transforms: Vec<SubTransformConfig>,
}

impl JointConfig {
    /// Joint with the given sub-transforms.
    pub fn new(name: impl Into<String>, transforms: Vec<SubTransformConfig>) -> Self {
        Self {
            name: name.into(),
            transforms,
        }
    }
}

/// A kinematic chain and everything mounted on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Display name, unique within a document.
    pub name: String,
    /// Drawn when true.
    #[serde(default = "default_true")]
    pub visible: bool,
    /// Drawn emphasised when true.
    #[serde(default)]
    pub highlighted: bool,
    /// Free-form note, not hashed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Line colour as RGBA in 0..1.
    #[serde(default = "default_color")]
    pub color: [f64; 4],
    /// Line width in pixels.
    #[serde(default = "default_line_width")]
    pub line_width: f64,
    /// Constants visible to expressions.
    #[serde(default)]
    pub constants: Constants,
    /// Joints, in order from the parent outward.
    #[serde(default)]
    pub joints: Vec<JointConfig>,
    /// Transform notation composed in front of the joint-derived end effector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,
    /// Attachments, at most one of each kind.
    #[serde(default)]
    pub attachments: Vec<AttachmentConfig>,
}

fn default_color() -> [f64; 4] {
    [0.6, 0.6, 0.6, 0.7]
}

fn default_line_width() -> f64 {
    5.0
}

impl ChainConfig {
    /// Visible chain with no joints or attachments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            highlighted: false,
            description: None,
            color: default_color(),
            line_width: default_line_width(),
            constants: Constants::new(),
            joints: Vec::new(),
            mount: None,
            attachments: Vec::new(),
        }
    }

    /// Look up a joint by name.
    pub fn joint(&self, name: &str) -> Option<&JointConfig> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// Mutable joint lookup.
    pub fn joint_mut(&mut self, name: &str) -> Option<&mut JointConfig> {
        self.joints.iter_mut().find(|j| j.name == name)
    }
}

/// A node of the parenting tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Chain name.
    pub name: String,
    /// Chains mounted on this one.
    #[serde(default)]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Leaf node.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Node with children.
    pub fn with_children(name: impl Into<String>, children: Vec<HierarchyNode>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

/// A chain's place in the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyEntry {
    /// Chain name.
    pub name: String,
    /// Parent chain, `None` at the root.
    pub parent: Option<String>,
    /// Distance from the root level.
    pub depth: usize,
}

/// Flatten a hierarchy into entries sorted by depth, so parents always precede children.
///
/// A name listed more than once keeps its last position, matching how a
/// nested mapping would overwrite it.
pub fn flatten_hierarchy(roots: &[HierarchyNode]) -> Vec<HierarchyEntry> {
    fn walk(nodes: &[HierarchyNode], parent: Option<&str>, depth: usize, out: &mut Vec<HierarchyEntry>) {
        for node in nodes {
            out.retain(|e| e.name != node.name);
            out.push(HierarchyEntry {
                name: node.name.clone(),
                parent: parent.map(str::to_string),
                depth,
            });
            walk(&node.children, Some(&node.name), depth + 1, out);
        }
    }
    let mut out = Vec::new();
    walk(roots, None, 0, &mut out);
    out.sort_by_key(|e| e.depth);
    out
}

/// A complete frame: chains plus their parenting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDocument {
    /// Format version string.
    #[serde(default = "default_version")]
    pub version: String,
    /// Chains, in declaration order.
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    /// Parenting tree. Chains missing from it are roots.
    #[serde(default)]
    pub hierarchy: Vec<HierarchyNode>,
}

fn default_version() -> String {
    "0.1".to_string()
}

impl Default for FrameDocument {
    fn default() -> Self {
        Self {
            version: default_version(),
            chains: Vec::new(),
            hierarchy: Vec::new(),
        }
    }
}

impl FrameDocument {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from TOML string.
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load a `.json` or `.toml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| IrError::io(path, e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Self::from_json(&text)?),
            Some("toml") => Ok(Self::from_toml(&text)?),
            _ => Err(IrError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Write as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|e| IrError::io(path, e))
    }

    /// Look up a chain by name.
    pub fn chain(&self, name: &str) -> Option<&ChainConfig> {
        self.chains.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_hierarchy_orders_by_depth() {
        let roots = vec![
            HierarchyNode::with_children(
                "Main frame",
                vec![HierarchyNode::with_children(
                    "Holder",
                    vec![HierarchyNode::leaf("Transducer")],
                )],
            ),
            HierarchyNode::leaf("Skull"),
        ];
        let flat = flatten_hierarchy(&roots);
        let names: Vec<_> = flat.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Main frame", "Skull", "Holder", "Transducer"]);
        assert_eq!(flat[2].parent.as_deref(), Some("Main frame"));
        assert_eq!(flat[3].depth, 2);
        assert_eq!(flat[1].parent, None);
    }

    #[test]
    fn test_chain_defaults() {
        let chain: ChainConfig = serde_json::from_str(r#"{"name": "Rod"}"#).unwrap();
        assert!(chain.visible);
        assert!(!chain.highlighted);
        assert!(chain.joints.is_empty());
        assert_eq!(chain.line_width, 5.0);
    }

    #[test]
    fn test_sub_transform_json() {
        let t: SubTransformConfig = serde_json::from_str(
            r#"{"kind": "rotation", "axis": "x", "value": 4, "unit": "degrees",
                "editable": {"increment": 0.5, "label": "AP angle"}}"#,
        )
        .unwrap();
        assert_eq!(t.kind, TransformKind::Rotation);
        assert_eq!(t.axis, Axis::X);
        assert!(t.is_editable());
        assert_eq!(t.editable.as_ref().unwrap().increment, 0.5);

        let bad = serde_json::from_str::<SubTransformConfig>(r#"{"kind": "rotation", "axis": "w", "value": 1}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let mut doc = FrameDocument::new();
        let mut chain = ChainConfig::new("Main frame");
        chain.constants.insert("L1".into(), 0.02);
        chain.joints.push(JointConfig::new(
            "offset",
            vec![SubTransformConfig::translation(Axis::Y, "csts['L1']*2")],
        ));
        doc.chains.push(chain);
        doc.hierarchy.push(HierarchyNode::leaf("Main frame"));
        let back = FrameDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(back, doc);
        assert!(back.chain("Main frame").is_some());
    }
}
