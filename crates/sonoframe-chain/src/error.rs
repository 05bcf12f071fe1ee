//! Error types for chain evaluation and the chain arena.

use std::fmt;
use thiserror::Error;

use sonoframe_math::TransformParseError;

/// Location of a sub-transform argument: joint name plus position in the joint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgPath {
    /// Joint name.
    pub joint: String,
    /// Index of the sub-transform within the joint.
    pub index: usize,
}

impl ArgPath {
    /// Path to sub-transform `index` of `joint`.
    pub fn new(joint: impl Into<String>, index: usize) -> Self {
        Self {
            joint: joint.into(),
            index,
        }
    }
}

impl fmt::Display for ArgPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.joint, self.index)
    }
}

/// An argument failed to evaluate. Other arguments keep evaluating.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{path}: {message}")]
pub struct ExpressionError {
    /// `chain/joint[index]` or `chain/shape.dimension`.
    pub path: String,
    /// What went wrong.
    pub message: String,
}

impl ExpressionError {
    /// Create an expression error.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by chains and the arena.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// Argument evaluation failed.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// Mount notation is malformed (strict parsing only).
    #[error(transparent)]
    Transform(#[from] TransformParseError),

    /// No chain with this name.
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    /// A chain with this name already exists.
    #[error("Duplicate chain name: {0}")]
    DuplicateChain(String),

    /// Reparenting would close a loop.
    #[error("Parenting {child} under {parent} would create a cycle")]
    Cycle {
        /// Chain being reparented.
        child: String,
        /// Requested parent.
        parent: String,
    },

    /// No sub-transform at this path.
    #[error("No argument at {0}")]
    UnknownArgument(ArgPath),

    /// The argument is not offered for editing.
    #[error("Argument {0} is not editable")]
    NotEditable(ArgPath),

    /// Nudging needs a value that evaluates to a number.
    #[error("Argument {path} cannot be nudged: {message}")]
    NotNumeric {
        /// Argument location.
        path: ArgPath,
        /// Evaluation failure.
        message: String,
    },
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, ChainError>;
