//! Error types for document loading and settings persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing frame documents and settings.
#[derive(Error, Debug)]
pub enum IrError {
    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Filesystem access failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// File extension is neither `.json` nor `.toml`.
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A settings file does not hold a JSON object at its root.
    #[error("Settings file {0} must contain a JSON object")]
    InvalidSettings(PathBuf),
}

impl IrError {
    /// Wrap an I/O error with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, IrError>;
