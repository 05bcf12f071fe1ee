//! Joint argument evaluation.

use sonoframe_expr::Expression;
use sonoframe_ir::{ArgValue, Constants, ContentHasher, JointConfig, TransformKind};
use sonoframe_math::{compose, AngleUnit, Axis, Transform};
use tracing::warn;

use crate::error::{ArgPath, ExpressionError};

/// Evaluate one argument against the chain constants.
///
/// Numbers pass through, booleans map to 1/0, strings are parsed and
/// evaluated as expressions. Anything else is an error.
pub fn evaluate_arg(value: &ArgValue, constants: &Constants, path: &str) -> Result<f64, ExpressionError> {
    match value {
        ArgValue::Number(v) => Ok(*v),
        ArgValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        ArgValue::Expr(source) => Expression::parse(source)
            .and_then(|e| e.eval(constants))
            .map_err(|e| ExpressionError::new(path, format!("'{}': {}", source, e))),
        ArgValue::Other(v) => Err(ExpressionError::new(
            path,
            format!("{} is neither a number nor an expression", v),
        )),
    }
}

/// A sub-transform with its argument resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatedStep {
    /// Translation or rotation.
    pub kind: TransformKind,
    /// Axis.
    pub axis: Axis,
    /// Meters for translations, `unit` for rotations.
    pub value: f64,
    /// Angle unit.
    pub unit: AngleUnit,
}

impl EvaluatedStep {
    /// Matrix for this step.
    pub fn to_transform(&self) -> Transform {
        match self.kind {
            TransformKind::Translation => Transform::translation(self.axis, self.value),
            TransformKind::Rotation => Transform::rotation(self.axis, self.value, self.unit),
        }
    }

    pub(crate) fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher
            .update_bool(self.kind == TransformKind::Rotation)
            .update_f64(self.axis.index() as f64)
            .update_f64(self.value)
            .update_bool(self.unit == AngleUnit::Radians);
    }
}

/// A joint with every evaluable step resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedJoint {
    /// Joint name.
    pub name: String,
    /// Steps that evaluated, in order. Failed steps are left out.
    pub steps: Vec<EvaluatedStep>,
}

impl EvaluatedJoint {
    /// Steps folded left to right.
    pub fn transform(&self) -> Transform {
        let parts: Vec<Transform> = self.steps.iter().map(EvaluatedStep::to_transform).collect();
        compose(&parts)
    }
}

fn evaluate_step(
    chain: &str,
    path: &ArgPath,
    step: &sonoframe_ir::SubTransformConfig,
    constants: &Constants,
) -> Result<EvaluatedStep, ExpressionError> {
    let label = format!("{}/{}", chain, path);
    let value = evaluate_arg(&step.value, constants, &label)?;
    let unit = match step.unit.as_deref() {
        None => AngleUnit::Degrees,
        Some(u) => u
            .parse::<AngleUnit>()
            .map_err(|e| ExpressionError::new(&label, e.to_string()))?,
    };
    Ok(EvaluatedStep {
        kind: step.kind,
        axis: step.axis,
        value,
        unit,
    })
}

/// Evaluate every joint, collecting failures instead of stopping at the first.
pub fn evaluate_joints(
    chain: &str,
    joints: &[JointConfig],
    constants: &Constants,
) -> (Vec<EvaluatedJoint>, Vec<ExpressionError>) {
    let mut errors = Vec::new();
    let evaluated = joints
        .iter()
        .map(|joint| {
            let steps = joint
                .transforms
                .iter()
                .enumerate()
                .filter_map(|(index, step)| {
                    let path = ArgPath::new(&joint.name, index);
                    match evaluate_step(chain, &path, step, constants) {
                        Ok(s) => Some(s),
                        Err(err) => {
                            warn!(%err, "skipping joint argument");
                            errors.push(err);
                            None
                        }
                    }
                })
                .collect();
            EvaluatedJoint {
                name: joint.name.clone(),
                steps,
            }
        })
        .collect();
    (evaluated, errors)
}

/// Evaluate every joint, failing on the first bad argument.
pub fn evaluate_joints_strict(
    chain: &str,
    joints: &[JointConfig],
    constants: &Constants,
) -> Result<Vec<EvaluatedJoint>, ExpressionError> {
    joints
        .iter()
        .map(|joint| {
            let steps = joint
                .transforms
                .iter()
                .enumerate()
                .map(|(index, step)| evaluate_step(chain, &ArgPath::new(&joint.name, index), step, constants))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(EvaluatedJoint {
                name: joint.name.clone(),
                steps,
            })
        })
        .collect()
}
