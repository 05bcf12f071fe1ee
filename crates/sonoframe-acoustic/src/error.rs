//! Error types for solver orchestration.

use std::path::PathBuf;

use sonoframe_mesh::MeshError;
use thiserror::Error;

use crate::worker::JobPanic;

/// A solved field holds NaN or infinite samples.
///
/// Fatal to the run. The suggested fix is never applied automatically.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{field} field contains non-finite values: recompute with higher CFL and/or points per wavelength")]
pub struct SolverOutputError {
    /// Which field failed the check.
    pub field: String,
}

/// Errors raised while preparing, running or post-processing a solve.
#[derive(Error, Debug)]
pub enum SolverError {
    /// A required parameter is absent.
    #[error("Missing simulation parameter '{0}'")]
    MissingParameter(String),

    /// A parameter has the wrong type or an unusable value.
    #[error("Invalid simulation parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// Neither `t_end` nor `n_reflections` is set.
    #[error("Either t_end or n_reflections must be defined in the simulation parameters")]
    NoDuration,

    /// Neither `source_amp` nor `source_ac_pwr` is set.
    #[error("Either source_amp or source_ac_pwr must be defined in the simulation parameters")]
    NoSourceAmplitude,

    /// Material properties for an index are not declared.
    #[error("No {property} value for material #{index}; declare it as {key}")]
    MissingMaterial {
        /// Human name of the property.
        property: &'static str,
        /// Material index.
        index: usize,
        /// Parameter key that would hold it.
        key: String,
    },

    /// External execution needs a directory for the artifacts.
    #[error("External solver execution requires an artifact directory")]
    CacheDirRequired,

    /// The coupled source needs a solved axisymmetric field first.
    #[error("Run the axisymmetric simulation first to perform axisymmetric to 3D coupling")]
    CouplingUnavailable,

    /// No solved data yet.
    #[error("No solver output available")]
    NotSolved,

    /// The engine finished without a pressure record.
    #[error("Solver output has no pressure field 'p'")]
    MissingPressure,

    /// Recorded data does not match the grid.
    #[error("Recorded field '{field}' has {found} values, expected {expected}")]
    ShapeMismatch {
        /// Field name.
        field: String,
        /// Expected number of values.
        expected: usize,
        /// Number found.
        found: usize,
    },

    /// Non-finite output.
    #[error(transparent)]
    Output(#[from] SolverOutputError),

    /// Voxelization or mesh handling failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// The engine reported a failure.
    #[error("Solver engine failed: {0}")]
    Engine(String),

    /// The background job running the solve panicked.
    #[error(transparent)]
    Job(#[from] JobPanic),

    /// Artifact could not be read or written.
    #[error("Artifact I/O error at {path}: {source}")]
    Io {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Artifact body is malformed.
    #[error("Artifact {path} is malformed: {source}")]
    Artifact {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

impl SolverError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SolverError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        SolverError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, SolverError>;
