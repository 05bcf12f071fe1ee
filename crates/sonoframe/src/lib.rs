#![warn(missing_docs)]

//! sonoframe: kinematic frames driving acoustic simulations
//!
//! A [`Frame`] holds kinematic chains parented into a tree. Each chain can
//! carry attachments: a library mesh, a boolean mask, a convex hull, and
//! axisymmetric or 3D acoustic solvers mounted at its end effector. The
//! frame keeps a host [`Renderer`] in sync with the chains and runs solves
//! on background threads.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sonoframe::{presets, Frame, RecordingRenderer};
//! use sonoframe_acoustic::UnavailableEngine;
//! use sonoframe_chain::ArgPath;
//!
//! let mut frame = Frame::from_document(&presets::default_frame(), Arc::new(UnavailableEngine)).unwrap();
//! frame.nudge(presets::MAIN_FRAME, &ArgPath::new("AP knob", 0), 2.0).unwrap();
//!
//! let mut scene = RecordingRenderer::new();
//! for error in frame.update_render(&mut scene) {
//!     eprintln!("{error}");
//! }
//! println!("{:?}", frame.end_transform(presets::SIMULATION_3D).unwrap().origin());
//! ```

mod attachment;
mod error;
mod frame;
mod persist;
pub mod presets;
mod render;
mod solver;

pub use attachment::{
    AttachContext, Attachment, BooleanMaskAttachment, ChainAttachment, ConvexHullAttachment, EditableDimension,
    MeshAttachment, MeshLibrary,
};
pub use error::{FrameError, Result};
pub use frame::{Frame, SimulationReport};
pub use persist::stored_chain_value;
pub use render::{DrawSet, Drawable, RecordingRenderer, RenderEvent, Renderer};
pub use solver::{AxisymmetricAttachment, CartesianAttachment};
