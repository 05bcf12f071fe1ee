//! The solver engine seam and the data crossing it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError, SolverOutputError};
use crate::grid::SimGrid;
use crate::medium::Medium;
use crate::params::SolverKind;
use crate::source::{Sensor, Source};

/// How the engine should run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    /// Engine flavour, `OMP` (CPU) or `CUDA` (GPU).
    pub engine: String,
    /// Run on the GPU.
    pub use_gpu: bool,
    /// Engine log verbosity.
    pub verbose_level: u32,
}

/// Everything an engine needs for one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationJob {
    /// Solver kind.
    pub kind: SolverKind,
    /// Short parameter hash.
    pub hash: String,
    /// Grid.
    pub grid: SimGrid,
    /// Medium.
    pub medium: Medium,
    /// Source.
    pub source: Source,
    /// Sensor.
    pub sensor: Sensor,
    /// Execution options.
    pub options: ExecutionOptions,
}

/// Time series recorded at a set of sensor points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedField {
    /// Number of sensor points.
    pub points: usize,
    /// Number of recorded time steps.
    pub steps: usize,
    /// Samples, point-major: `values[p * steps + t]`.
    pub values: Vec<f64>,
}

impl RecordedField {
    /// Wrap samples, checking the length.
    pub fn new(points: usize, steps: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != points * steps {
            return Err(SolverError::ShapeMismatch {
                field: "recorded".to_string(),
                expected: points * steps,
                found: values.len(),
            });
        }
        Ok(Self { points, steps, values })
    }

    /// Time series of point `p`.
    pub fn series(&self, p: usize) -> &[f64] {
        let start = (p * self.steps).min(self.values.len());
        let end = ((p + 1) * self.steps).min(self.values.len());
        &self.values[start..end]
    }
}

/// Fields recorded by a solve, keyed by quantity name (`p`, `u`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    /// Recorded quantities.
    pub fields: BTreeMap<String, RecordedField>,
}

impl SensorData {
    /// Recorded pressure, the field a successful solve must have.
    pub fn pressure(&self) -> Option<&RecordedField> {
        self.fields.get("p")
    }

    /// Check that a pressure record exists and every recorded sample is finite.
    pub fn validate(&self) -> Result<()> {
        if self.pressure().is_none() {
            return Err(SolverError::MissingPressure);
        }
        for (name, field) in &self.fields {
            if field.values.iter().any(|v| !v.is_finite()) {
                return Err(SolverOutputError { field: name.clone() }.into());
            }
        }
        Ok(())
    }
}

/// A full-wave solver backend.
///
/// The engine is opaque: it receives a complete job and returns what the
/// sensor recorded. It runs on the simulation worker thread.
pub trait SolverEngine: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Run `job` to completion.
    fn run(&self, job: &SimulationJob) -> Result<SensorData>;
}

/// Engine used when no local solver is installed. Every run fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEngine;

impl SolverEngine for UnavailableEngine {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn run(&self, job: &SimulationJob) -> Result<SensorData> {
        Err(SolverError::Engine(format!(
            "no local solver engine for {} job {}; enable external execution or load a cached output",
            job.kind, job.hash
        )))
    }
}

/// Shell script that runs the external solver on a written input artifact.
pub fn external_command(kind: SolverKind, hash: &str, record_start_index: usize, io_dir: &str, engine: &str) -> String {
    let tag = kind.file_tag();
    format!(
        "$params_hash = '{hash}'\n\
         $t_sensor_start = {record_start_index}\n\
         $io_dirpath = '{io_dir}'\n\
         $input_fpath = Join-Path $io_dirpath ('{tag}_input_' + $params_hash + '.h5')\n\
         $output_fpath = Join-Path $io_dirpath ('{tag}_output_' + $params_hash + '.h5')\n\
         kspaceFirstOrder-{engine} -i $input_fpath -o $output_fpath -s $t_sensor_start --p_final --p_max -p -u"
    )
}
