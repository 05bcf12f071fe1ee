#![warn(missing_docs)]

//! Acoustic solver orchestration for sonoframe.
//!
//! Turns layered simulation parameters into a grid, medium, source and
//! sensor, hands them to an opaque [`SolverEngine`], and post-processes the
//! recorded pressure into amplitude and phase fields.
//!
//! Two solvers are provided. [`AxisymmetricSolver`] runs a focused bowl in a
//! homogeneous (z, r) domain. [`CartesianSolver`] runs a 3D domain whose
//! medium is painted from voxelized meshes and whose source is either a bowl
//! or a plane driven by a solved axisymmetric field.
//!
//! Every run is keyed by the short parameter hash. An output artifact with
//! that hash in the cache directory is read back instead of solving again.
//! Solves can run on a [`Worker`] thread: [`AxisymmetricSolver::solve`] and
//! [`CartesianSolver::solve`] only borrow the solver, and the owner applies
//! the [`SolveResult`] afterwards.

mod artifact;
mod axisymmetric;
mod cartesian;
mod coupling;
mod engine;
mod error;
mod grid;
mod interp;
mod material;
mod medium;
mod params;
mod run;
mod source;
mod spectral;
mod volume;
mod worker;

pub use artifact::ArtifactPaths;
pub use axisymmetric::{AxisymmetricField, AxisymmetricSolver};
pub use cartesian::{CartesianField, CartesianSolver, DomainGeometry};
pub use coupling::coupled_plane_source;
pub use engine::{
    external_command, ExecutionOptions, RecordedField, SensorData, SimulationJob, SolverEngine, UnavailableEngine,
};
pub use error::{Result, SolverError, SolverOutputError};
pub use grid::{ceil_even, SimGrid};
pub use interp::{linspace, unwrap_phase, GridInterpolator2};
pub use material::{assign_materials, points_near_voxels};
pub use medium::{alpha_corrected, MaterialGrid, MaterialProperties, Medium, STOKES_ALPHA_POWER};
pub use params::{SimulationParameters, SolverKind};
pub use run::{execution_options, resolve_cache_dir, run_cached, RunOutcome, SolveResult};
pub use source::{bowl_area, cw_signal, source_amplitude, BowlSource, PlaneSource, Sensor, Source};
pub use spectral::{extract_amp_phase, nearest_bin, AmpPhase};
pub use volume::{render_volume, viridis, FieldVolume, VolumeData};
pub use worker::{Completion, JobPanic, Worker, COMPLETION_CAPACITY};
