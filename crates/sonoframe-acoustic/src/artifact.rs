//! Solver artifacts on disk, named by parameter hash.
//!
//! `{axisymmetric|3d}_{input|output}_{hash}.h5`. Bodies are JSON. An output
//! artifact for the current hash is proof of a completed solve.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::engine::{SensorData, SimulationJob};
use crate::error::{Result, SolverError};
use crate::params::SolverKind;

/// Input and output artifact paths for one parameter hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Job written for external execution.
    pub input: PathBuf,
    /// Recorded fields.
    pub output: PathBuf,
}

impl ArtifactPaths {
    /// Paths in `dir` for `kind` and the short `hash`.
    pub fn new(dir: impl AsRef<Path>, kind: SolverKind, hash: &str) -> Self {
        let dir = dir.as_ref();
        let tag = kind.file_tag();
        Self {
            input: dir.join(format!("{}_input_{}.h5", tag, hash)),
            output: dir.join(format!("{}_output_{}.h5", tag, hash)),
        }
    }

    /// True when the output exists.
    pub fn has_output(&self) -> bool {
        self.output.is_file()
    }

    /// Read recorded fields back.
    pub fn read_output(&self) -> Result<SensorData> {
        read_json(&self.output)
    }

    /// Store recorded fields.
    pub fn write_output(&self, data: &SensorData) -> Result<()> {
        write_json(&self.output, data)
    }

    /// Store a job for an external engine.
    pub fn write_input(&self, job: &SimulationJob) -> Result<()> {
        write_json(&self.input, job)
    }

    /// Read a job written by [`ArtifactPaths::write_input`].
    pub fn read_input(&self) -> Result<SimulationJob> {
        read_json(&self.input)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| SolverError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| SolverError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a temporary file in the same directory, then rename into
/// place. Readers see either no artifact or a complete one.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| SolverError::io(parent, e))?;
    let text = serde_json::to_string(value).map_err(|source| SolverError::Artifact {
        path: path.to_path_buf(),
        source,
    })?;
    let mut file = tempfile::NamedTempFile::new_in(parent).map_err(|e| SolverError::io(parent, e))?;
    file.write_all(text.as_bytes()).map_err(|e| SolverError::io(file.path(), e))?;
    file.as_file().sync_all().map_err(|e| SolverError::io(file.path(), e))?;
    file.persist(path).map_err(|e| SolverError::io(path, e.error))?;
    debug!(path = %path.display(), "artifact written");
    Ok(())
}
