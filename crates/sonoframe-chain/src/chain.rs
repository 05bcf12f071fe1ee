//! Kinematic chains: joint folding, end effector and render gating.

use sonoframe_ir::{ArgValue, ChainConfig, Constants, ContentHash, ContentHasher, EditableMeta, Memo};
use sonoframe_math::{compose, parse_transforms, parse_transforms_strict, Point3, Transform};
use tracing::debug;

use crate::error::{ArgPath, ChainError, ExpressionError, Result};
use crate::joint::{evaluate_arg, evaluate_joints, EvaluatedJoint};

/// Joint endpoints and absolute transforms of an evaluated chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainPose {
    /// Parent end effector, identity for a root chain.
    pub origin: Transform,
    /// Origin of the chain followed by each joint's endpoint.
    pub endpoints: Vec<Point3>,
    /// Absolute transform of each joint.
    pub absolute: Vec<Transform>,
}

impl ChainPose {
    /// Absolute transform of the last joint.
    ///
    /// A chain without joints ends where it starts: identity for a root
    /// chain, the parent end effector otherwise.
    pub fn last(&self) -> Transform {
        self.absolute.last().cloned().unwrap_or_else(|| self.origin.clone())
    }
}

/// Fold joints from `parent` outward.
///
/// Each joint's steps compose left to right into `J`; its absolute transform
/// is `J @ running`, which then becomes the running parent. Endpoints are the
/// translation rows.
pub fn compute_chain(joints: &[EvaluatedJoint], parent: Option<&Transform>) -> ChainPose {
    let origin = parent.cloned().unwrap_or_else(Transform::identity);
    let mut running = origin.clone();
    let mut endpoints = vec![running.origin()];
    let mut absolute = Vec::with_capacity(joints.len());
    for joint in joints {
        running = joint.transform().then(&running);
        endpoints.push(running.origin());
        absolute.push(running.clone());
    }
    ChainPose {
        origin,
        endpoints,
        absolute,
    }
}

/// Scene state that affects how every chain is drawn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    /// Normal of the active slicing plane, if any.
    pub slicing_plane_normal: Option<[f64; 3]>,
    /// Calibration transform applied to the whole scene, if any.
    pub calibration: Option<Transform>,
}

/// An editable sub-transform value.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableValue {
    /// Location in the chain.
    pub path: ArgPath,
    /// Current evaluated value.
    pub value: f64,
    /// Editing metadata.
    pub meta: EditableMeta,
}

#[derive(Debug, Clone)]
struct Evaluation {
    joints: Vec<EvaluatedJoint>,
    errors: Vec<ExpressionError>,
}

/// A kinematic chain built from a [`ChainConfig`].
#[derive(Debug, Clone)]
pub struct KinematicChain {
    config: ChainConfig,
    parent_transform: Option<Transform>,
    evaluation: Memo<Evaluation>,
    pose: Memo<ChainPose>,
    accepted_render: Option<ContentHash>,
}

impl KinematicChain {
    /// Wrap a configuration.
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            parent_transform: None,
            evaluation: Memo::new(),
            pose: Memo::new(),
            accepted_render: None,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Mutable configuration. Derived values recompute on next access.
    pub fn config_mut(&mut self) -> &mut ChainConfig {
        &mut self.config
    }

    /// Constants visible to expressions.
    pub fn constants(&self) -> &Constants {
        &self.config.constants
    }

    /// Set or add a constant.
    pub fn set_constant(&mut self, name: impl Into<String>, value: f64) {
        self.config.constants.insert(name.into(), value);
    }

    /// Visibility flag.
    pub fn visible(&self) -> bool {
        self.config.visible
    }

    /// Show or hide.
    pub fn set_visible(&mut self, visible: bool) {
        self.config.visible = visible;
    }

    /// Highlight flag.
    pub fn highlighted(&self) -> bool {
        self.config.highlighted
    }

    /// Toggle highlighting.
    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.config.highlighted = highlighted;
    }

    /// Parent end effector, `None` for a root chain.
    pub fn parent_transform(&self) -> Option<&Transform> {
        self.parent_transform.as_ref()
    }

    /// Replace the parent end effector.
    pub fn set_parent_transform(&mut self, parent: Option<Transform>) {
        self.parent_transform = parent;
    }

    fn evaluation_key(&self) -> ContentHash {
        let mut hasher = ContentHasher::new();
        hasher.update_json(&self.config.joints).update_json(&self.config.constants);
        hasher.finish()
    }

    fn evaluation(&mut self) -> &Evaluation {
        let key = self.evaluation_key();
        let name = self.config.name.clone();
        let joints = &self.config.joints;
        let constants = &self.config.constants;
        self.evaluation.get_or_compute(key, || {
            let (joints, errors) = evaluate_joints(&name, joints, constants);
            Evaluation { joints, errors }
        })
    }

    /// Evaluated joints. Arguments that failed are left out.
    pub fn evaluated_joints(&mut self) -> Vec<EvaluatedJoint> {
        self.evaluation().joints.clone()
    }

    /// Argument failures from the latest evaluation.
    pub fn expression_errors(&mut self) -> Vec<ExpressionError> {
        self.evaluation().errors.clone()
    }

    fn pose_key(&mut self) -> ContentHash {
        let mut hasher = ContentHasher::new();
        for joint in &self.evaluation().joints {
            hasher.update_str(&joint.name);
            for step in &joint.steps {
                step.hash_into(&mut hasher);
            }
        }
        let parent = self.parent_transform.as_ref().map(|t| t.to_rows().concat());
        hasher.update_floats(parent.as_deref());
        hasher.finish()
    }

    /// Pose under the current parent. Cached until joints, constants or parent change.
    pub fn pose(&mut self) -> ChainPose {
        let key = self.pose_key();
        let joints = self.evaluation().joints.clone();
        let parent = self.parent_transform.clone();
        self.pose
            .get_or_compute(key, || compute_chain(&joints, parent.as_ref()))
            .clone()
    }

    /// Mount notation composed, malformed tokens dropped.
    pub fn mount_transform(&self) -> Transform {
        compose(&parse_transforms(self.config.mount.as_deref()))
    }

    /// Mount notation composed, failing on malformed tokens.
    pub fn mount_transform_strict(&self) -> Result<Transform> {
        Ok(compose(&parse_transforms_strict(self.config.mount.as_deref())?))
    }

    /// End effector: `mount @ last_joint_absolute`.
    pub fn end_transform(&mut self) -> Transform {
        self.mount_transform().then(&self.pose().last())
    }

    /// Digest of everything that affects how this chain is drawn.
    ///
    /// Descriptions, colours and editing metadata are not part of it.
    pub fn render_hash(&mut self, ctx: &RenderContext) -> ContentHash {
        let pose_key = self.pose_key();
        let mut hasher = ContentHasher::new();
        hasher
            .update_bool(self.config.visible)
            .update_bool(self.config.highlighted)
            .update_bytes(pose_key.as_bytes());
        hasher.update_json(&self.config.constants);
        hasher.update_str(self.config.mount.as_deref().unwrap_or(""));
        hasher.update_floats(ctx.slicing_plane_normal.as_ref().map(|n| &n[..]));
        let calibration = ctx.calibration.as_ref().map(|t| t.to_rows().concat());
        hasher.update_floats(calibration.as_deref());
        hasher.finish()
    }

    /// True when the drawn state is stale for `ctx`.
    pub fn needs_render(&mut self, ctx: &RenderContext) -> bool {
        let hash = self.render_hash(ctx);
        self.accepted_render != Some(hash)
    }

    /// Record that the current state has been drawn.
    pub fn accept_render(&mut self, ctx: &RenderContext) {
        let hash = self.render_hash(ctx);
        debug!(chain = %self.config.name, %hash, "render accepted");
        self.accepted_render = Some(hash);
    }

    /// Forget the drawn state, forcing the next update.
    pub fn invalidate_render(&mut self) {
        self.accepted_render = None;
    }

    /// Editable sub-transforms with their current values.
    pub fn editable_values(&self) -> Vec<EditableValue> {
        let mut out = Vec::new();
        for joint in &self.config.joints {
            for (index, step) in joint.transforms.iter().enumerate() {
                let Some(meta) = step.editable.as_ref().filter(|m| m.editable) else {
                    continue;
                };
                let path = ArgPath::new(&joint.name, index);
                if let Ok(value) = evaluate_arg(&step.value, &self.config.constants, &path.to_string()) {
                    out.push(EditableValue {
                        path,
                        value,
                        meta: meta.clone(),
                    });
                }
            }
        }
        out
    }

    fn step_mut(&mut self, path: &ArgPath) -> Result<&mut sonoframe_ir::SubTransformConfig> {
        self.config
            .joint_mut(&path.joint)
            .and_then(|j| j.transforms.get_mut(path.index))
            .ok_or_else(|| ChainError::UnknownArgument(path.clone()))
    }

    /// Replace an argument. Any sub-transform can be set; editability gates nudging only.
    pub fn set_argument(&mut self, path: &ArgPath, value: ArgValue) -> Result<()> {
        self.step_mut(path)?.value = value;
        Ok(())
    }

    /// Add `steps × increment` to an editable argument and store the result as a literal.
    pub fn nudge(&mut self, path: &ArgPath, steps: f64) -> Result<f64> {
        let constants = self.config.constants.clone();
        let step = self.step_mut(path)?;
        let increment = match step.editable.as_ref().filter(|m| m.editable) {
            Some(meta) => meta.increment,
            None => return Err(ChainError::NotEditable(path.clone())),
        };
        let current = evaluate_arg(&step.value, &constants, &path.to_string()).map_err(|e| ChainError::NotNumeric {
            path: path.clone(),
            message: e.message,
        })?;
        let next = current + steps * increment;
        step.value = ArgValue::Number(next);
        Ok(next)
    }
}
