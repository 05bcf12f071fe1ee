#![warn(missing_docs)]

//! Kinematic chains for sonoframe.
//!
//! A [`KinematicChain`] evaluates the joints of a [`ChainConfig`] against its
//! constants and folds them into absolute transforms. Poses are memoized on a
//! digest of the evaluated joints and the parent transform, and a separate
//! render hash tells the host when a chain's drawables are stale.
//!
//! Chains live in a [`ChainArena`], which owns the parent links and resolves
//! parent end effectors into children in depth order.
//!
//! [`ChainConfig`]: sonoframe_ir::ChainConfig

mod arena;
mod chain;
mod error;
mod joint;

pub use arena::{ChainArena, ChainId};
pub use chain::{compute_chain, ChainPose, EditableValue, KinematicChain, RenderContext};
pub use error::{ArgPath, ChainError, ExpressionError, Result};
pub use joint::{evaluate_arg, evaluate_joints, evaluate_joints_strict, EvaluatedJoint, EvaluatedStep};
