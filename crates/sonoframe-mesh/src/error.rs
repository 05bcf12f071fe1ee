//! Error types for mesh processing.

use thiserror::Error;

/// Errors raised by mesh construction, voxelization and boolean engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// Operator is not `difference`, `intersection` or `union`.
    #[error("Unknown boolean operator '{0}' (expected difference, intersection or union)")]
    UnknownOperator(String),

    /// Boolean operation needs at least one operand.
    #[error("Boolean {0} needs at least one mesh")]
    NoOperands(String),

    /// Mesh has no triangles.
    #[error("Mesh has no triangles")]
    EmptyMesh,

    /// Voxel pitch must be finite and positive.
    #[error("Invalid voxel pitch: {0}")]
    InvalidPitch(f64),

    /// Shape dimension must be finite and positive.
    #[error("Invalid shape dimension {name}: {value}")]
    InvalidDimension {
        /// Dimension name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// The boolean engine reported a failure.
    #[error("Boolean engine failed: {0}")]
    Engine(String),
}
