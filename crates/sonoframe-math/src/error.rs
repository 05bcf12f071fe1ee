//! Error types for transform construction and parsing.

use thiserror::Error;

/// Errors raised by the transform builders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    /// Axis name is not one of `x`, `y`, `z`.
    #[error("Unknown axis '{0}': use x, y or z")]
    InvalidAxis(String),

    /// Angular unit is neither degrees nor radians.
    #[error("Unknown angular unit '{0}': use degrees or radians")]
    InvalidUnit(String),
}

/// A transform-notation token that could not be parsed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid transform token '{token}': {message}")]
pub struct TransformParseError {
    /// The offending token.
    pub token: String,
    /// What was wrong with it.
    pub message: String,
}

impl TransformParseError {
    /// Create a parse error for `token`.
    pub fn new(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            message: message.into(),
        }
    }
}
