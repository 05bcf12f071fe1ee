//! Error types for frame orchestration.

use thiserror::Error;

use sonoframe_acoustic::{SolverError, SolverKind};
use sonoframe_chain::{ChainError, ExpressionError};
use sonoframe_ir::IrError;
use sonoframe_mesh::MeshError;

/// Errors raised by a [`Frame`](crate::Frame).
///
/// Every operation that fails leaves the frame as it was before the call.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Chain lookup, hierarchy or argument editing failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A shape dimension did not evaluate.
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    /// Document or settings I/O failed.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// Mesh construction or the boolean engine failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// A solver run failed.
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// A boolean step names an operator or mesh that does not exist.
    #[error("{message}; available meshes: {}", available.join(", "))]
    BooleanOperation {
        /// What went wrong.
        message: String,
        /// Operand names that would have resolved.
        available: Vec<String>,
    },

    /// The chain has no attachment of this kind.
    #[error("Chain '{chain}' has no {kind} attachment")]
    MissingAttachment {
        /// Chain name.
        chain: String,
        /// Attachment kind.
        kind: &'static str,
    },

    /// No editable shape dimension or solver parameter by this name.
    #[error("No editable parameter '{0}'")]
    UnknownParameter(String),

    /// The boolean mask has no operations configured.
    #[error("Chain '{0}' has no boolean operations configured")]
    NoBooleanOperations(String),

    /// Boolean and hull operations need an engine.
    #[error("No boolean engine installed")]
    NoBooleanEngine,

    /// A run of this solver is already in flight.
    #[error("A {kind} simulation of chain '{chain}' is already running")]
    SimulationInFlight {
        /// Chain name.
        chain: String,
        /// Solver kind.
        kind: SolverKind,
    },

    /// The background thread could not be started.
    #[error("Failed to start solver thread: {0}")]
    Worker(#[from] std::io::Error),
}

impl FrameError {
    /// Boolean operation failure listing the operands that exist.
    pub fn boolean(message: impl Into<String>, available: Vec<String>) -> Self {
        Self::BooleanOperation {
            message: message.into(),
            available,
        }
    }

    /// Missing attachment of `kind` on `chain`.
    pub fn missing(chain: impl Into<String>, kind: &'static str) -> Self {
        Self::MissingAttachment {
            chain: chain.into(),
            kind,
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, FrameError>;
