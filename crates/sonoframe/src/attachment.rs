//! Attachments: what a chain carries on its end effector.
//!
//! Every attachment implements [`Attachment`], and the frame drives them all
//! the same way: `add` when the chain is first drawn, `update` whenever the
//! chain's render hash changes, `remove` when it is hidden or deleted.
//! [`ChainAttachment`] selects the implementation from an
//! [`AttachmentConfig`].

use std::collections::BTreeMap;

use sonoframe_chain::{evaluate_arg, ExpressionError};
use sonoframe_ir::{
    ArgValue, AttachmentConfig, BooleanMaskConfig, Constants, ConvexHullConfig, DomainShape, EditableMeta, MeshConfig,
};
use sonoframe_math::{compose, parse_transforms, Transform};
use sonoframe_mesh::{box_extrusion, cylinder_extrusion, TriangleMesh};
use tracing::debug;

use crate::error::{FrameError, Result};
use crate::render::{DrawSet, Drawable, Renderer};
use crate::solver::{AxisymmetricAttachment, CartesianAttachment};

/// Meshes the host has loaded, by name.
pub type MeshLibrary = BTreeMap<String, TriangleMesh>;

const MESH_COLOR: [f64; 4] = [0.9, 0.9, 0.9, 0.7];
const MASK_COLOR: [f64; 4] = [0.5, 0.0, 0.0, 1.0];

/// What an attachment sees of its chain while drawing.
#[derive(Debug, Clone, Copy)]
pub struct AttachContext<'a> {
    /// Chain name, prefix of every drawable name.
    pub chain: &'a str,
    /// Chain end effector.
    pub end: &'a Transform,
    /// Anatomical calibration applied after placement.
    pub calibration: Option<&'a Transform>,
    /// Chain constants, for shape expressions.
    pub constants: &'a Constants,
    /// Host mesh library.
    pub library: &'a MeshLibrary,
    /// True when boolean or hull results stand in for the chain's mesh.
    pub has_processed: bool,
}

impl AttachContext<'_> {
    /// `compose(local) @ end`, then calibration.
    pub fn place(&self, local: Option<&str>) -> Transform {
        let placed = compose(&parse_transforms(local)).then(self.end);
        match self.calibration {
            Some(c) => placed.then(c),
            None => placed,
        }
    }

    /// Drawable name for `part` of this chain.
    pub fn drawable(&self, part: &str) -> String {
        format!("{}/{}", self.chain, part)
    }
}

/// Uniform interface of everything mounted on a chain.
pub trait Attachment {
    /// Short kind name.
    fn kind(&self) -> &'static str;

    /// Draw for the first time.
    fn add(&mut self, ctx: &AttachContext<'_>, renderer: &mut dyn Renderer) -> Result<()>;

    /// Redraw after the chain changed.
    fn update(&mut self, ctx: &AttachContext<'_>, renderer: &mut dyn Renderer) -> Result<()> {
        self.add(ctx, renderer)
    }

    /// Remove every drawable this attachment owns.
    fn remove(&mut self, renderer: &mut dyn Renderer);
}

// =============================================================================
// Mesh
// =============================================================================

/// A library mesh placed at `compose(transform) @ end`.
#[derive(Debug, Clone)]
pub struct MeshAttachment {
    config: MeshConfig,
    draw: DrawSet,
}

impl MeshAttachment {
    /// Attachment for `config`.
    pub fn new(config: MeshConfig) -> Self {
        Self {
            config,
            draw: DrawSet::new(),
        }
    }

    /// Configuration.
    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    /// Local to world.
    pub fn placement(&self, ctx: &AttachContext<'_>) -> Transform {
        ctx.place(self.config.transform.as_deref())
    }

    /// The library mesh in world coordinates, if the library has it.
    pub fn world_mesh(&self, ctx: &AttachContext<'_>) -> Option<TriangleMesh> {
        ctx.library
            .get(&self.config.mesh)
            .map(|m| m.transformed(&self.placement(ctx)))
    }
}

impl Attachment for MeshAttachment {
    fn kind(&self) -> &'static str {
        "mesh"
    }

    fn add(&mut self, ctx: &AttachContext<'_>, renderer: &mut dyn Renderer) -> Result<()> {
        let name = ctx.drawable("mesh");
        match ctx.library.get(&self.config.mesh) {
            Some(mesh) if !ctx.has_processed => {
                let drawable = Drawable::Mesh {
                    mesh: mesh.clone(),
                    transform: self.placement(ctx),
                    color: MESH_COLOR,
                };
                self.draw.show(renderer, name, drawable);
            }
            Some(_) => self.draw.hide(renderer, &name),
            None => {
                debug!(chain = ctx.chain, mesh = %self.config.mesh, "mesh not in library; nothing to draw");
                self.draw.hide(renderer, &name);
            }
        }
        Ok(())
    }

    fn remove(&mut self, renderer: &mut dyn Renderer) {
        self.draw.clear(renderer);
    }
}

// =============================================================================
// Boolean mask
// =============================================================================

/// A parametric domain shape, and the boolean operations that use it.
///
/// Dimensions are expressions over the chain constants. The operations
/// themselves run through the frame, which can see other chains' meshes.
#[derive(Debug, Clone)]
pub struct BooleanMaskAttachment {
    config: BooleanMaskConfig,
    draw: DrawSet,
}

/// A shape dimension offered for editing.
#[derive(Debug, Clone, PartialEq)]
pub struct EditableDimension {
    /// Dimension name (`x_size`, `radius`, ...).
    pub name: &'static str,
    /// Current value in meters.
    pub value: f64,
    /// Editing metadata.
    pub meta: EditableMeta,
}

impl BooleanMaskAttachment {
    /// Attachment for `config`.
    pub fn new(config: BooleanMaskConfig) -> Self {
        Self {
            config,
            draw: DrawSet::new(),
        }
    }

    /// Configuration.
    pub fn config(&self) -> &BooleanMaskConfig {
        &self.config
    }

    /// Evaluate every dimension, in declaration order.
    pub fn dimensions(&self, chain: &str, constants: &Constants) -> std::result::Result<Vec<(&'static str, f64)>, ExpressionError> {
        self.config
            .shape
            .dimensions()
            .into_iter()
            .map(|(name, dim)| {
                let path = format!("{}/shape.{}", chain, name);
                evaluate_arg(&dim.value, constants, &path).map(|v| (name, v))
            })
            .collect()
    }

    /// Mask solid in its own coordinates.
    pub fn local_mesh(&self, chain: &str, constants: &Constants) -> Result<TriangleMesh> {
        let dims = self.dimensions(chain, constants)?;
        let value = |name: &str| dims.iter().find(|(n, _)| *n == name).map_or(0.0, |(_, v)| *v);
        let mesh = match &self.config.shape {
            DomainShape::Box { .. } => box_extrusion(value("x_size"), value("y_size"), value("z_size"))?,
            DomainShape::Cylinder { segments, .. } => cylinder_extrusion(value("radius"), value("height"), *segments)?,
        };
        Ok(mesh)
    }

    /// Local to world.
    pub fn placement(&self, ctx: &AttachContext<'_>) -> Transform {
        ctx.place(self.config.transform.as_deref())
    }

    /// Mask solid in world coordinates.
    pub fn world_mesh(&self, ctx: &AttachContext<'_>) -> Result<TriangleMesh> {
        Ok(self.local_mesh(ctx.chain, ctx.constants)?.transformed(&self.placement(ctx)))
    }

    /// Dimensions marked editable, with their current values.
    pub fn editable_dimensions(&self, constants: &Constants) -> Vec<EditableDimension> {
        self.config
            .shape
            .dimensions()
            .into_iter()
            .filter_map(|(name, dim)| {
                let meta = dim.editable.as_ref().filter(|m| m.editable)?;
                let value = evaluate_arg(&dim.value, constants, name).ok()?;
                Some(EditableDimension {
                    name,
                    value,
                    meta: meta.clone(),
                })
            })
            .collect()
    }

    /// Replace a dimension.
    pub fn set_dimension(&mut self, name: &str, value: ArgValue) -> Result<()> {
        let dim = self
            .config
            .shape
            .dimension_mut(name)
            .ok_or_else(|| FrameError::UnknownParameter(name.to_string()))?;
        dim.value = value;
        Ok(())
    }

    /// Add `steps × increment` to an editable dimension.
    pub fn nudge_dimension(&mut self, name: &str, steps: f64, constants: &Constants) -> Result<f64> {
        let dim = self
            .config
            .shape
            .dimension_mut(name)
            .filter(|d| d.editable.as_ref().is_some_and(|m| m.editable))
            .ok_or_else(|| FrameError::UnknownParameter(name.to_string()))?;
        let increment = dim.editable.as_ref().map_or(0.0, |m| m.increment);
        let current = evaluate_arg(&dim.value, constants, name)?;
        let next = current + steps * increment;
        dim.value = ArgValue::Number(next);
        Ok(next)
    }
}

impl Attachment for BooleanMaskAttachment {
    fn kind(&self) -> &'static str {
        "boolean_mask"
    }

    fn add(&mut self, ctx: &AttachContext<'_>, renderer: &mut dyn Renderer) -> Result<()> {
        let name = ctx.drawable("boolean_mask");
        match self.local_mesh(ctx.chain, ctx.constants) {
            Ok(mesh) => {
                let drawable = Drawable::Mesh {
                    mesh,
                    transform: self.placement(ctx),
                    color: MASK_COLOR,
                };
                self.draw.show(renderer, name, drawable);
                Ok(())
            }
            Err(e) => {
                self.draw.hide(renderer, &name);
                Err(e)
            }
        }
    }

    fn remove(&mut self, renderer: &mut dyn Renderer) {
        self.draw.clear(renderer);
    }
}

// =============================================================================
// Convex hull
// =============================================================================

/// Convex hull of a named source mesh.
///
/// Holds configuration only. The hull is computed on demand by the frame and
/// drawn with the chain's other processed meshes.
#[derive(Debug, Clone)]
pub struct ConvexHullAttachment {
    config: ConvexHullConfig,
}

impl ConvexHullAttachment {
    /// Attachment for `config`.
    pub fn new(config: ConvexHullConfig) -> Self {
        Self { config }
    }

    /// Configuration.
    pub fn config(&self) -> &ConvexHullConfig {
        &self.config
    }
}

impl Attachment for ConvexHullAttachment {
    fn kind(&self) -> &'static str {
        "convex_hull"
    }

    fn add(&mut self, _ctx: &AttachContext<'_>, _renderer: &mut dyn Renderer) -> Result<()> {
        Ok(())
    }

    fn remove(&mut self, _renderer: &mut dyn Renderer) {}
}

// =============================================================================
// Dispatch
// =============================================================================

/// Any attachment, selected by configuration.
#[derive(Debug, Clone)]
pub enum ChainAttachment {
    /// Library mesh.
    Mesh(MeshAttachment),
    /// Domain shape plus boolean operations.
    BooleanMask(BooleanMaskAttachment),
    /// Convex hull of another mesh.
    ConvexHull(ConvexHullAttachment),
    /// Axisymmetric solver.
    Axisymmetric(AxisymmetricAttachment),
    /// 3D Cartesian solver.
    Cartesian(CartesianAttachment),
}

impl ChainAttachment {
    /// Build the attachment `config` describes.
    pub fn from_config(config: &AttachmentConfig) -> Self {
        match config {
            AttachmentConfig::Mesh(c) => ChainAttachment::Mesh(MeshAttachment::new(c.clone())),
            AttachmentConfig::BooleanMask(c) => ChainAttachment::BooleanMask(BooleanMaskAttachment::new(c.clone())),
            AttachmentConfig::ConvexHull(c) => ChainAttachment::ConvexHull(ConvexHullAttachment::new(c.clone())),
            AttachmentConfig::AxisymmetricSolver(c) => {
                ChainAttachment::Axisymmetric(AxisymmetricAttachment::new(c.clone()))
            }
            AttachmentConfig::CartesianSolver(c) => ChainAttachment::Cartesian(CartesianAttachment::new(c.clone())),
        }
    }

    /// Current configuration, including edits made since loading.
    pub fn to_config(&self) -> AttachmentConfig {
        match self {
            ChainAttachment::Mesh(a) => AttachmentConfig::Mesh(a.config().clone()),
            ChainAttachment::BooleanMask(a) => AttachmentConfig::BooleanMask(a.config().clone()),
            ChainAttachment::ConvexHull(a) => AttachmentConfig::ConvexHull(a.config().clone()),
            ChainAttachment::Axisymmetric(a) => AttachmentConfig::AxisymmetricSolver(a.config().clone()),
            ChainAttachment::Cartesian(a) => AttachmentConfig::CartesianSolver(a.config().clone()),
        }
    }

    fn inner(&mut self) -> &mut dyn Attachment {
        match self {
            ChainAttachment::Mesh(a) => a,
            ChainAttachment::BooleanMask(a) => a,
            ChainAttachment::ConvexHull(a) => a,
            ChainAttachment::Axisymmetric(a) => a,
            ChainAttachment::Cartesian(a) => a,
        }
    }
}

impl Attachment for ChainAttachment {
    fn kind(&self) -> &'static str {
        match self {
            ChainAttachment::Mesh(a) => a.kind(),
            ChainAttachment::BooleanMask(a) => a.kind(),
            ChainAttachment::ConvexHull(a) => a.kind(),
            ChainAttachment::Axisymmetric(a) => a.kind(),
            ChainAttachment::Cartesian(a) => a.kind(),
        }
    }

    fn add(&mut self, ctx: &AttachContext<'_>, renderer: &mut dyn Renderer) -> Result<()> {
        self.inner().add(ctx, renderer)
    }

    fn update(&mut self, ctx: &AttachContext<'_>, renderer: &mut dyn Renderer) -> Result<()> {
        self.inner().update(ctx, renderer)
    }

    fn remove(&mut self, renderer: &mut dyn Renderer) {
        self.inner().remove(renderer)
    }
}
