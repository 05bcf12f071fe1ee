//! Cached solver runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sonoframe_ir::ContentHash;
use sonoframe_math::Point3;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactPaths;
use crate::engine::{external_command, ExecutionOptions, SensorData, SimulationJob, SolverEngine};
use crate::error::{Result, SolverError};
use crate::params::SimulationParameters;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The engine ran.
    Computed,
    /// An output artifact for the current hash was read back.
    Cached(PathBuf),
    /// The input artifact was written for an external engine.
    Pending {
        /// Written input artifact.
        input: PathBuf,
        /// Script that runs the external engine on it.
        command: String,
    },
}

/// Result of a solve, produced on the worker and accepted on the owner.
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Parameter hash the solve ran under.
    pub hash: ContentHash,
    /// How it ended.
    pub outcome: RunOutcome,
    /// Recorded fields, absent when pending.
    pub data: Option<SensorData>,
    /// Voxel centres per material painted into the medium.
    pub voxel_centers: BTreeMap<usize, Vec<Point3>>,
}

impl SolveResult {
    /// True when fields are available.
    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }
}

/// Artifact directory: the explicit one, else `cpp_io_files_directory_path`.
pub fn resolve_cache_dir(params: &SimulationParameters, explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| params.text("cpp_io_files_directory_path").map(PathBuf::from))
}

/// Engine flavour and options from the parameters.
pub fn execution_options(params: &SimulationParameters) -> Result<ExecutionOptions> {
    let use_gpu = params.flag("use_gpu");
    let engine = match params.text("cpp_engine") {
        Some(e) => e.to_string(),
        None if use_gpu => "CUDA".to_string(),
        None => "OMP".to_string(),
    };
    let verbose_level = match params.get("verbose_level") {
        Some(_) => params.count("verbose_level")? as u32,
        None => 0,
    };
    Ok(ExecutionOptions {
        engine,
        use_gpu,
        verbose_level,
    })
}

/// Run a solve under `params`, reusing an existing output artifact.
///
/// `build_job` is only called when no usable artifact exists; a cached
/// output that does not parse or fails validation is recomputed. Engine
/// output must carry a finite pressure record before it is written. With
/// `run_through_external_cpp_solvers` set, the job is written out and the
/// engine is not called.
pub fn run_cached(
    params: &SimulationParameters,
    cache_dir: Option<&Path>,
    engine: &dyn SolverEngine,
    build_job: impl FnOnce() -> Result<(SimulationJob, BTreeMap<usize, Vec<Point3>>)>,
) -> Result<SolveResult> {
    let hash = params.hash();
    let short = params.short_hash();
    let paths = cache_dir.map(|dir| ArtifactPaths::new(dir, params.kind(), &short));

    if let Some(paths) = paths.as_ref().filter(|p| p.has_output()) {
        info!(kind = %params.kind(), hash = %short, path = %paths.output.display(), "cache hit, reading solver output");
        match paths.read_output().and_then(|data| data.validate().map(|_| data)) {
            Ok(data) => {
                return Ok(SolveResult {
                    hash,
                    outcome: RunOutcome::Cached(paths.output.clone()),
                    data: Some(data),
                    voxel_centers: BTreeMap::new(),
                })
            }
            Err(e) => {
                warn!(path = %paths.output.display(), error = %e, "unusable cached output, recomputing");
            }
        }
    } else {
        debug!(kind = %params.kind(), hash = %short, "cache miss");
    }

    let external = params.flag("run_through_external_cpp_solvers");
    if external && paths.is_none() {
        return Err(SolverError::CacheDirRequired);
    }

    let (job, voxel_centers) = build_job()?;

    if let (true, Some(paths), Some(dir)) = (external, paths.as_ref(), cache_dir) {
        paths.write_input(&job)?;
        let command = external_command(
            params.kind(),
            &short,
            job.sensor.record_start_index,
            &dir.display().to_string(),
            &job.options.engine,
        );
        info!(kind = %params.kind(), hash = %short, path = %paths.input.display(), "input written for external solver");
        return Ok(SolveResult {
            hash,
            outcome: RunOutcome::Pending {
                input: paths.input.clone(),
                command,
            },
            data: None,
            voxel_centers,
        });
    }

    info!(kind = %params.kind(), hash = %short, engine = engine.name(), "running solver engine");
    let data = engine.run(&job)?;
    // Nothing is cached for a failed or non-finite solve.
    data.validate()?;
    if let Some(paths) = paths.as_ref() {
        paths.write_output(&data)?;
    }
    Ok(SolveResult {
        hash,
        outcome: RunOutcome::Computed,
        data: Some(data),
        voxel_centers,
    })
}
