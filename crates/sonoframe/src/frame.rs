//! The frame: every chain, what hangs off it, and the solves in flight.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use slotmap::SecondaryMap;
use sonoframe_acoustic::{
    Completion, DomainGeometry, RunOutcome, SolveResult, SolverEngine, SolverError, SolverKind, UnavailableEngine,
    Worker,
};
use sonoframe_chain::{ArgPath, ChainArena, ChainError, ChainId, EditableValue, KinematicChain, RenderContext};
use sonoframe_ir::{
    flatten_hierarchy, ArgValue, ChainConfig, ContentHash, ContentHasher, FrameDocument, HierarchyNode, Memo,
    SourceModel,
};
use sonoframe_math::Transform;
use sonoframe_mesh::{BooleanEngine, BooleanOp, MeshError, TriangleMesh};
use tracing::{debug, info, warn};

use crate::attachment::{AttachContext, Attachment, ChainAttachment, MeshLibrary};
use crate::error::{FrameError, Result};
use crate::render::{DrawSet, Drawable, Renderer};
use crate::solver::{AxisymmetricAttachment, CartesianAttachment};

const PROCESSED_COLOR: [f64; 4] = [0.83, 0.33, 0.0, 0.6];
const OWN_MESH: &str = "_stl_mesh";
const OWN_MASK: &str = "_boolean_mask";

/// Per-chain state that is not part of the chain itself.
#[derive(Debug, Default)]
struct ChainSlot {
    attachments: Vec<ChainAttachment>,
    /// Boolean or hull results in world coordinates, keyed by the placement they were computed under.
    processed: Memo<Vec<TriangleMesh>>,
    draw: DrawSet,
    drawn: bool,
}

impl ChainSlot {
    fn new(config: &ChainConfig) -> Self {
        let mut attachments: Vec<ChainAttachment> = Vec::new();
        for a in &config.attachments {
            if attachments.iter().any(|b| b.kind() == a.kind()) {
                warn!(chain = %config.name, kind = a.kind(), "duplicate attachment ignored");
                continue;
            }
            attachments.push(ChainAttachment::from_config(a));
        }
        Self {
            attachments,
            ..Self::default()
        }
    }

    fn hide(&mut self, renderer: &mut dyn Renderer) {
        self.draw.clear(renderer);
        for a in &mut self.attachments {
            a.remove(renderer);
        }
        self.drawn = false;
    }

    fn has_kind(&self, kind: &str) -> bool {
        self.attachments.iter().any(|a| a.kind() == kind)
    }
}

/// Digest of where a chain's meshes sit; processed meshes are only valid under it.
fn placement_key(end: &Transform, calibration: Option<&Transform>) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.update_floats(Some(&end.to_rows().concat()));
    let calibration = calibration.map(|t| t.to_rows().concat());
    hasher.update_floats(calibration.as_deref());
    hasher.finish()
}

enum SolverSlot<'a> {
    Axisymmetric(&'a mut AxisymmetricAttachment),
    Cartesian(&'a mut CartesianAttachment),
}

type SolveOutput = sonoframe_acoustic::Result<SolveResult>;

/// What happened to one background solve.
#[derive(Debug)]
pub struct SimulationReport {
    /// Chain the solver is mounted on.
    pub chain: String,
    /// Which solver ran.
    pub kind: SolverKind,
    /// Whether fields are available, or why the run failed.
    pub result: Result<bool>,
    /// False when the parameters changed while the solve ran and the result was dropped.
    pub accepted: bool,
    /// How the accepted run ended.
    pub outcome: Option<RunOutcome>,
}

/// Chains, attachments, meshes and solver runs.
///
/// The frame owns everything and is driven from one thread. Solves run on
/// background threads against snapshots of their solvers; their results
/// come back through [`Frame::poll_simulations`], which is the only place
/// solver state changes after a dispatch.
///
/// Every fallible operation leaves the frame unchanged when it fails.
pub struct Frame {
    chains: ChainArena,
    slots: SecondaryMap<ChainId, ChainSlot>,
    library: MeshLibrary,
    boolean_engine: Option<Arc<dyn BooleanEngine>>,
    solver_engine: Arc<dyn SolverEngine>,
    worker: Worker<SolveOutput>,
    /// Dispatch label to the chain and solver it runs for.
    in_flight: HashMap<String, (String, SolverKind)>,
    context: RenderContext,
}

impl Default for Frame {
    fn default() -> Self {
        Self::new(Arc::new(UnavailableEngine))
    }
}

impl Frame {
    /// Empty frame solving with `engine`.
    pub fn new(engine: Arc<dyn SolverEngine>) -> Self {
        Self {
            chains: ChainArena::new(),
            slots: SecondaryMap::new(),
            library: MeshLibrary::new(),
            boolean_engine: None,
            solver_engine: engine,
            worker: Worker::new(),
            in_flight: HashMap::new(),
            context: RenderContext::default(),
        }
    }

    /// Build every chain of `doc` and link the hierarchy.
    pub fn from_document(doc: &FrameDocument, engine: Arc<dyn SolverEngine>) -> Result<Self> {
        let mut frame = Self::new(engine);
        for config in &doc.chains {
            frame.insert(config.clone())?;
        }
        frame.chains.apply_hierarchy(&flatten_hierarchy(&doc.hierarchy))?;
        frame.chains.resolve_transforms();
        info!(chains = frame.chains.len(), "frame loaded");
        Ok(frame)
    }

    /// Install the CSG backend used by boolean and hull operations.
    pub fn with_boolean_engine(mut self, engine: Arc<dyn BooleanEngine>) -> Self {
        self.boolean_engine = Some(engine);
        self
    }

    /// Replace the CSG backend.
    pub fn set_boolean_engine(&mut self, engine: Option<Arc<dyn BooleanEngine>>) {
        self.boolean_engine = engine;
    }

    /// Replace the solver engine used by later runs.
    pub fn set_solver_engine(&mut self, engine: Arc<dyn SolverEngine>) {
        self.solver_engine = engine;
    }

    fn insert(&mut self, config: ChainConfig) -> Result<ChainId> {
        let slot = ChainSlot::new(&config);
        let id = self.chains.insert(KinematicChain::new(config))?;
        self.slots.insert(id, slot);
        Ok(id)
    }

    // =========================================================================
    // Chains
    // =========================================================================

    /// The chain arena.
    pub fn chains(&self) -> &ChainArena {
        &self.chains
    }

    /// Chain by name.
    pub fn chain(&self, name: &str) -> Option<&KinematicChain> {
        self.chains.id_of(name).and_then(|id| self.chains.get(id))
    }

    /// Chain names, parents before children.
    pub fn chain_names(&self) -> Vec<String> {
        self.chains
            .depth_order()
            .into_iter()
            .filter_map(|id| self.chains.get(id).map(|c| c.name().to_string()))
            .collect()
    }

    pub(crate) fn chain_mut(&mut self, name: &str) -> Result<&mut KinematicChain> {
        let id = self.chains.require(name)?;
        self.chains
            .get_mut(id)
            .ok_or_else(|| ChainError::UnknownChain(name.to_string()).into())
    }

    /// Add a chain, optionally under `parent`.
    pub fn add_chain(&mut self, config: ChainConfig, parent: Option<&str>) -> Result<()> {
        let parent = parent.map(|p| self.chains.require(p)).transpose()?;
        let id = self.insert(config)?;
        if let Err(e) = self.chains.set_parent(id, parent) {
            self.chains.remove(id);
            self.slots.remove(id);
            return Err(e.into());
        }
        Ok(())
    }

    /// Remove a chain and its drawables. Its children become roots.
    pub fn remove_chain(&mut self, name: &str, renderer: &mut dyn Renderer) -> Result<()> {
        let id = self.chains.require(name)?;
        if let Some(mut slot) = self.slots.remove(id) {
            slot.hide(renderer);
        }
        self.chains.remove(id);
        for other in self.chains.iter().map(|(id, _)| id).collect::<Vec<_>>() {
            if let Some(c) = self.chains.get_mut(other) {
                c.invalidate_render();
            }
        }
        debug!(chain = name, "chain removed");
        Ok(())
    }

    /// Move `child` under `parent`, or to the root with `None`.
    pub fn set_parent(&mut self, child: &str, parent: Option<&str>) -> Result<()> {
        let child = self.chains.require(child)?;
        let parent = parent.map(|p| self.chains.require(p)).transpose()?;
        self.chains.set_parent(child, parent)?;
        Ok(())
    }

    /// Show or hide a chain. Hidden chains lose their drawables on the next render.
    pub fn set_visible(&mut self, name: &str, visible: bool) -> Result<()> {
        self.chain_mut(name)?.set_visible(visible);
        Ok(())
    }

    /// Emphasise a chain.
    pub fn set_highlighted(&mut self, name: &str, highlighted: bool) -> Result<()> {
        self.chain_mut(name)?.set_highlighted(highlighted);
        Ok(())
    }

    /// Set one of a chain's constants.
    pub fn set_constant(&mut self, chain: &str, key: &str, value: f64) -> Result<()> {
        self.chain_mut(chain)?.set_constant(key, value);
        Ok(())
    }

    /// Replace a joint argument.
    pub fn set_argument(&mut self, chain: &str, path: &ArgPath, value: ArgValue) -> Result<()> {
        self.chain_mut(chain)?.set_argument(path, value)?;
        Ok(())
    }

    /// Nudge an editable joint argument by `steps` increments.
    pub fn nudge(&mut self, chain: &str, path: &ArgPath, steps: f64) -> Result<f64> {
        Ok(self.chain_mut(chain)?.nudge(path, steps)?)
    }

    /// Editable joint arguments of a chain.
    pub fn editable_values(&self, chain: &str) -> Result<Vec<EditableValue>> {
        let id = self.chains.require(chain)?;
        Ok(self.chains.get(id).map(|c| c.editable_values()).unwrap_or_default())
    }

    /// End effector of a chain with every parent resolved.
    pub fn end_transform(&mut self, name: &str) -> Result<Transform> {
        self.chains.resolve_transforms();
        Ok(self.chain_mut(name)?.end_transform())
    }

    /// Attachments of a chain.
    pub fn attachments(&self, chain: &str) -> Result<&[ChainAttachment]> {
        let id = self.chains.require(chain)?;
        Ok(self.slots.get(id).map(|s| s.attachments.as_slice()).unwrap_or_default())
    }

    /// Mutable attachments of a chain. The chain is redrawn on the next render.
    pub fn attachments_mut(&mut self, chain: &str) -> Result<&mut [ChainAttachment]> {
        let id = self.chains.require(chain)?;
        if let Some(c) = self.chains.get_mut(id) {
            c.invalidate_render();
        }
        self.slots
            .get_mut(id)
            .map(|s| s.attachments.as_mut_slice())
            .ok_or_else(|| ChainError::UnknownChain(chain.to_string()).into())
    }

    /// Nudge an editable dimension of a chain's boolean mask.
    pub fn nudge_mask_dimension(&mut self, chain: &str, name: &str, steps: f64) -> Result<f64> {
        let id = self.chains.require(chain)?;
        let (Some(c), Some(slot)) = (self.chains.get_mut(id), self.slots.get_mut(id)) else {
            return Err(ChainError::UnknownChain(chain.to_string()).into());
        };
        let mask = slot
            .attachments
            .iter_mut()
            .find_map(|a| match a {
                ChainAttachment::BooleanMask(m) => Some(m),
                _ => None,
            })
            .ok_or_else(|| FrameError::missing(chain, "boolean_mask"))?;
        let value = mask.nudge_dimension(name, steps, c.constants())?;
        c.invalidate_render();
        Ok(value)
    }

    /// Set an editable parameter of the `kind` solver on `chain`. Returns true when its hash changed.
    pub fn set_solver_parameter(&mut self, chain: &str, kind: SolverKind, name: &str, value: f64) -> Result<bool> {
        let changed = match self.solver_attachment(chain, kind)? {
            SolverSlot::Axisymmetric(a) => a.set_editable(name, value)?,
            SolverSlot::Cartesian(a) => a.set_editable(name, value)?,
        };
        if changed {
            self.chain_mut(chain)?.invalidate_render();
        }
        Ok(changed)
    }

    /// Nudge an editable parameter of the `kind` solver on `chain`.
    pub fn nudge_solver_parameter(&mut self, chain: &str, kind: SolverKind, name: &str, steps: f64) -> Result<f64> {
        let value = match self.solver_attachment(chain, kind)? {
            SolverSlot::Axisymmetric(a) => a.nudge_editable(name, steps)?,
            SolverSlot::Cartesian(a) => a.nudge_editable(name, steps)?,
        };
        self.chain_mut(chain)?.invalidate_render();
        Ok(value)
    }

    fn solver_attachment(&mut self, chain: &str, kind: SolverKind) -> Result<SolverSlot<'_>> {
        let id = self.chains.require(chain)?;
        let missing = match kind {
            SolverKind::Axisymmetric => "axisymmetric_solver",
            SolverKind::Cartesian => "cartesian_solver",
        };
        self.slots
            .get_mut(id)
            .and_then(|s| {
                s.attachments.iter_mut().find_map(|a| match (kind, a) {
                    (SolverKind::Axisymmetric, ChainAttachment::Axisymmetric(a)) => Some(SolverSlot::Axisymmetric(a)),
                    (SolverKind::Cartesian, ChainAttachment::Cartesian(a)) => Some(SolverSlot::Cartesian(a)),
                    _ => None,
                })
            })
            .ok_or_else(|| FrameError::missing(chain, missing))
    }

    /// Snapshot of the frame as a document, edits included.
    pub fn document(&self) -> FrameDocument {
        fn node(chains: &ChainArena, id: ChainId) -> Option<HierarchyNode> {
            let name = chains.get(id)?.name().to_string();
            let mut children: Vec<HierarchyNode> =
                chains.children(id).into_iter().filter_map(|c| node(chains, c)).collect();
            children.sort_by(|a, b| a.name.cmp(&b.name));
            Some(HierarchyNode::with_children(name, children))
        }

        let order = self.chains.depth_order();
        let chains = order
            .iter()
            .filter_map(|&id| {
                let mut config = self.chains.get(id)?.config().clone();
                if let Some(slot) = self.slots.get(id) {
                    config.attachments = slot.attachments.iter().map(ChainAttachment::to_config).collect();
                }
                Some(config)
            })
            .collect();
        let hierarchy = order
            .iter()
            .filter(|&&id| self.chains.parent(id).is_none())
            .filter_map(|&id| node(&self.chains, id))
            .collect();
        FrameDocument {
            chains,
            hierarchy,
            ..FrameDocument::default()
        }
    }

    // =========================================================================
    // Meshes
    // =========================================================================

    /// Add or replace a library mesh. Every chain is redrawn.
    pub fn insert_mesh(&mut self, name: impl Into<String>, mesh: TriangleMesh) {
        let name = name.into();
        debug!(mesh = %name, triangles = mesh.num_triangles(), "library mesh stored");
        self.library.insert(name, mesh);
        for id in self.chains.depth_order() {
            if let Some(c) = self.chains.get_mut(id) {
                c.invalidate_render();
            }
        }
    }

    /// The mesh library.
    pub fn library(&self) -> &MeshLibrary {
        &self.library
    }

    fn placement(&mut self, id: ChainId) -> Option<(Transform, ContentHash)> {
        let end = self.chains.get_mut(id)?.end_transform();
        let key = placement_key(&end, self.context.calibration.as_ref());
        Some((end, key))
    }

    /// Boolean or hull results of a chain that are valid at its current placement.
    pub fn processed_meshes(&mut self, chain: &str) -> Result<Option<Vec<TriangleMesh>>> {
        let id = self.chains.require(chain)?;
        self.chains.resolve_transforms();
        let Some((_, key)) = self.placement(id) else {
            return Ok(None);
        };
        Ok(self.slots.get(id).and_then(|s| s.processed.get(&key)).cloned())
    }

    /// Library mesh of a chain's mesh attachment, placed in world coordinates.
    fn own_mesh(&mut self, id: ChainId) -> Option<TriangleMesh> {
        let (end, _) = self.placement(id)?;
        let chain = self.chains.get(id)?;
        let slot = self.slots.get(id)?;
        let ctx = AttachContext {
            chain: chain.name(),
            end: &end,
            calibration: self.context.calibration.as_ref(),
            constants: chain.constants(),
            library: &self.library,
            has_processed: false,
        };
        slot.attachments.iter().find_map(|a| match a {
            ChainAttachment::Mesh(m) => m.world_mesh(&ctx),
            _ => None,
        })
    }

    /// Mask solid of a chain's boolean mask, in world coordinates.
    fn own_mask(&mut self, id: ChainId) -> Result<Option<TriangleMesh>> {
        let Some((end, _)) = self.placement(id) else {
            return Ok(None);
        };
        let (Some(chain), Some(slot)) = (self.chains.get(id), self.slots.get(id)) else {
            return Ok(None);
        };
        let ctx = AttachContext {
            chain: chain.name(),
            end: &end,
            calibration: self.context.calibration.as_ref(),
            constants: chain.constants(),
            library: &self.library,
            has_processed: false,
        };
        for a in &slot.attachments {
            if let ChainAttachment::BooleanMask(m) = a {
                return Ok(Some(m.world_mesh(&ctx)?));
            }
        }
        Ok(None)
    }

    /// A chain's mesh as other chains see it: processed results when current, else its placed library mesh.
    fn chain_meshes(&mut self, id: ChainId) -> Option<Vec<TriangleMesh>> {
        let (_, key) = self.placement(id)?;
        if let Some(processed) = self.slots.get(id).and_then(|s| s.processed.get(&key)) {
            return Some(processed.clone());
        }
        self.own_mesh(id).map(|m| vec![m])
    }

    /// Operand names `chain` could use.
    fn available_meshes(&self, chain: ChainId) -> Vec<String> {
        let mut out = vec![OWN_MESH.to_string(), OWN_MASK.to_string()];
        for id in self.chains.depth_order() {
            if id == chain {
                continue;
            }
            let has_mesh = self
                .slots
                .get(id)
                .is_some_and(|s| s.has_kind("mesh") || s.processed.latest().is_some());
            if let (true, Some(c)) = (has_mesh, self.chains.get(id)) {
                out.push(c.name().to_string());
            }
        }
        out
    }

    /// Resolve one operand name. `Ok(None)` means it exists but has no mesh yet.
    fn operand(&mut self, id: ChainId, name: &str) -> Result<Option<Vec<TriangleMesh>>> {
        match name {
            OWN_MESH => Ok(self.own_mesh(id).map(|m| vec![m])),
            OWN_MASK => Ok(self.own_mask(id)?.map(|m| vec![m])),
            other => match self.chains.id_of(other).filter(|&o| o != id) {
                Some(o) if self.slots.get(o).is_some_and(|s| s.has_kind("mesh") || s.processed.latest().is_some()) => {
                    Ok(self.chain_meshes(o))
                }
                Some(_) => Err(FrameError::boolean(
                    format!("Unsupported boolean mesh from chain '{}'", other),
                    self.available_meshes(id),
                )),
                None => Err(FrameError::boolean(
                    format!("Unsupported boolean mesh '{}'", other),
                    self.available_meshes(id),
                )),
            },
        }
    }

    /// Run the boolean operations of a chain's mask. Returns the number of result meshes.
    ///
    /// Results carry their step's material index and replace the chain's
    /// mesh until the chain moves.
    pub fn apply_boolean_operations(&mut self, chain: &str) -> Result<usize> {
        let engine = self.boolean_engine.clone().ok_or(FrameError::NoBooleanEngine)?;
        let id = self.chains.require(chain)?;
        let operations = self
            .slots
            .get(id)
            .and_then(|s| {
                s.attachments.iter().find_map(|a| match a {
                    ChainAttachment::BooleanMask(m) => Some(m.config().operations.clone()),
                    _ => None,
                })
            })
            .ok_or_else(|| FrameError::missing(chain, "boolean_mask"))?
            .ok_or_else(|| FrameError::NoBooleanOperations(chain.to_string()))?;
        self.chains.resolve_transforms();

        let mut results = Vec::new();
        for step in operations.steps() {
            let op: BooleanOp = step
                .op
                .parse()
                .map_err(|e: MeshError| FrameError::boolean(e.to_string(), self.available_meshes(id)))?;
            let mut meshes = Vec::new();
            for name in &step.meshes {
                match self.operand(id, name)? {
                    Some(found) => meshes.extend(found),
                    None => warn!(chain, operand = %name, "skipping boolean operand with no mesh loaded"),
                }
            }
            if meshes.is_empty() {
                return Err(MeshError::NoOperands(op.to_string()).into());
            }
            let result = engine.apply(op, &meshes)?.with_material(step.material_index);
            debug!(chain, %op, material = step.material_index, triangles = result.num_triangles(), "boolean step done");
            results.push(result);
        }

        let count = results.len();
        self.store_processed(id, results);
        info!(chain, meshes = count, "boolean operations applied");
        Ok(count)
    }

    /// Compute the convex hull a chain's hull attachment names.
    pub fn compute_convex_hull(&mut self, chain: &str) -> Result<()> {
        let engine = self.boolean_engine.clone().ok_or(FrameError::NoBooleanEngine)?;
        let id = self.chains.require(chain)?;
        let config = self
            .slots
            .get(id)
            .and_then(|s| {
                s.attachments.iter().find_map(|a| match a {
                    ChainAttachment::ConvexHull(h) => Some(h.config().clone()),
                    _ => None,
                })
            })
            .ok_or_else(|| FrameError::missing(chain, "convex_hull"))?;
        self.chains.resolve_transforms();

        let source = match config.source.as_str() {
            OWN_MESH => self.own_mesh(id).map(|m| vec![m]),
            other => match self.chains.id_of(other).filter(|&o| o != id) {
                Some(o) => self.chain_meshes(o),
                None => None,
            },
        };
        let Some(source) = source else {
            return Err(FrameError::boolean(
                format!("Convex hull: unsupported mesh '{}'", config.source),
                self.available_meshes(id),
            ));
        };
        let mut merged = TriangleMesh::new();
        for m in &source {
            merged.merge(m);
        }
        let hull = engine.convex_hull(&merged)?.with_material(config.material_index);
        self.store_processed(id, vec![hull]);
        info!(chain, source = %config.source, "convex hull computed");
        Ok(())
    }

    fn store_processed(&mut self, id: ChainId, meshes: Vec<TriangleMesh>) {
        let Some((_, key)) = self.placement(id) else {
            return;
        };
        if let Some(slot) = self.slots.get_mut(id) {
            slot.processed.set(key, meshes);
        }
        if let Some(c) = self.chains.get_mut(id) {
            c.invalidate_render();
        }
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Current render context.
    pub fn render_context(&self) -> &RenderContext {
        &self.context
    }

    /// Change the slicing plane or calibration. Affected chains redraw on the next render.
    pub fn set_render_context(&mut self, context: RenderContext) {
        self.context = context;
    }

    /// Redraw every chain whose render hash changed.
    ///
    /// Attachment failures are logged and returned; the remaining chains and
    /// attachments are still drawn.
    pub fn update_render(&mut self, renderer: &mut dyn Renderer) -> Vec<FrameError> {
        self.chains.resolve_transforms();
        let mut errors = Vec::new();
        for id in self.chains.depth_order() {
            let Some(chain) = self.chains.get_mut(id) else {
                continue;
            };
            if !chain.needs_render(&self.context) {
                continue;
            }
            let Some(slot) = self.slots.get_mut(id) else {
                continue;
            };
            if !chain.visible() {
                slot.hide(renderer);
                chain.accept_render(&self.context);
                continue;
            }

            let end = chain.end_transform();
            let endpoints = chain.pose().endpoints;
            let name = chain.name().to_string();
            let key = placement_key(&end, self.context.calibration.as_ref());
            if slot.processed.latest().is_some() && !slot.processed.is_current(&key) {
                debug!(chain = %name, "chain moved; processed meshes dropped");
                slot.processed.clear();
            }

            let config = chain.config();
            let width = if chain.highlighted() {
                2.0 * config.line_width
            } else {
                config.line_width
            };
            slot.draw.show(
                renderer,
                format!("{}/chain", name),
                Drawable::Polyline {
                    points: endpoints,
                    color: config.color,
                    width,
                },
            );

            let processed = slot.processed.get(&key).cloned().unwrap_or_default();
            let prefix = format!("{}/processed/", name);
            slot.draw.hide_prefixed(renderer, &prefix);
            for (i, mesh) in processed.iter().enumerate() {
                slot.draw.show(
                    renderer,
                    format!("{}{}", prefix, i),
                    Drawable::Mesh {
                        mesh: mesh.clone(),
                        transform: Transform::identity(),
                        color: PROCESSED_COLOR,
                    },
                );
            }

            let ctx = AttachContext {
                chain: &name,
                end: &end,
                calibration: self.context.calibration.as_ref(),
                constants: chain.constants(),
                library: &self.library,
                has_processed: !processed.is_empty(),
            };
            let first = !slot.drawn;
            for attachment in &mut slot.attachments {
                let drawn = if first {
                    attachment.add(&ctx, renderer)
                } else {
                    attachment.update(&ctx, renderer)
                };
                if let Err(e) = drawn {
                    warn!(chain = %name, kind = attachment.kind(), error = %e, "attachment not drawn");
                    errors.push(e);
                }
            }
            slot.drawn = true;
            chain.accept_render(&self.context);
        }
        errors
    }

    /// Remove every drawable of every chain, leaving the chains themselves.
    pub fn clear_render(&mut self, renderer: &mut dyn Renderer) {
        for (id, slot) in self.slots.iter_mut() {
            slot.hide(renderer);
            if let Some(c) = self.chains.get_mut(id) {
                c.invalidate_render();
            }
        }
    }

    // =========================================================================
    // Simulations
    // =========================================================================

    /// Start a background solve of the `kind` solver on `chain`.
    ///
    /// A Cartesian solve takes the chain's current processed meshes and end
    /// effector as its geometry, and a coupled one the chain's solved
    /// axisymmetric field. Poll for the result with
    /// [`Frame::poll_simulations`].
    pub fn run_simulation(&mut self, chain: &str, kind: SolverKind) -> Result<()> {
        let id = self.chains.require(chain)?;
        let label = format!("{}-{}", chain, kind);
        if self.in_flight.contains_key(&label) {
            return Err(FrameError::SimulationInFlight {
                chain: chain.to_string(),
                kind,
            });
        }
        self.chains.resolve_transforms();
        let (end, key) = self
            .placement(id)
            .ok_or_else(|| ChainError::UnknownChain(chain.to_string()))?;
        let slot = self
            .slots
            .get_mut(id)
            .ok_or_else(|| ChainError::UnknownChain(chain.to_string()))?;
        let engine = self.solver_engine.clone();
        let name = chain.to_string();

        let job: Box<dyn FnOnce() -> SolveOutput + Send> = match kind {
            SolverKind::Axisymmetric => {
                let att = slot
                    .attachments
                    .iter()
                    .find_map(|a| match a {
                        ChainAttachment::Axisymmetric(s) => Some(s),
                        _ => None,
                    })
                    .ok_or_else(|| FrameError::missing(chain, "axisymmetric_solver"))?;
                let snapshot = att.solver().clone();
                let dir = att.cache_dir().map(Path::to_path_buf);
                Box::new(move || snapshot.solve(engine.as_ref(), dir.as_deref()))
            }
            SolverKind::Cartesian => {
                let coupled_field = slot.attachments.iter_mut().find_map(|a| match a {
                    ChainAttachment::Axisymmetric(s) => s.solver_mut().field_zr().ok().cloned(),
                    _ => None,
                });
                let meshes = slot.processed.get(&key).cloned().unwrap_or_default();
                let att = slot
                    .attachments
                    .iter_mut()
                    .find_map(|a| match a {
                        ChainAttachment::Cartesian(s) => Some(s),
                        _ => None,
                    })
                    .ok_or_else(|| FrameError::missing(chain, "cartesian_solver"))?;
                if att.solver().source_model() == SourceModel::Coupled && coupled_field.is_none() {
                    return Err(SolverError::CouplingUnavailable.into());
                }
                debug!(chain, meshes = meshes.len(), "cartesian geometry captured");
                let solver = att.solver_mut();
                solver.set_geometry(DomainGeometry { meshes, end });
                solver.set_coupling(coupled_field);
                let snapshot = solver.clone();
                let dir: Option<PathBuf> = att.cache_dir().map(Path::to_path_buf);
                Box::new(move || snapshot.solve(engine.as_ref(), dir.as_deref()))
            }
        };

        self.worker.dispatch(label.clone(), job)?;
        info!(chain, %kind, "simulation dispatched");
        self.in_flight.insert(label, (name, kind));
        Ok(())
    }

    /// Solves dispatched and not yet collected.
    pub fn simulations_in_flight(&self) -> usize {
        self.worker.in_flight()
    }

    /// Apply every solve that has finished, without blocking.
    pub fn poll_simulations(&mut self) -> Vec<SimulationReport> {
        let done = self.worker.drain();
        done.into_iter().filter_map(|c| self.complete(c)).collect()
    }

    /// Block until every dispatched solve has finished, then apply them.
    pub fn wait_simulations(&mut self) -> Vec<SimulationReport> {
        let done = self.worker.wait_all();
        done.into_iter().filter_map(|c| self.complete(c)).collect()
    }

    fn complete(&mut self, completion: Completion<SolveOutput>) -> Option<SimulationReport> {
        let Some((chain, kind)) = self.in_flight.remove(&completion.label) else {
            warn!(label = %completion.label, "completion for an unknown dispatch");
            return None;
        };
        // A panicking job surfaces as a failed run.
        let result = completion.value.unwrap_or_else(|panic| Err(panic.into()));
        let mut report = SimulationReport {
            chain,
            kind,
            result: Ok(false),
            accepted: false,
            outcome: None,
        };
        let solved = match result {
            Ok(solved) => solved,
            Err(e) => {
                warn!(chain = %report.chain, %kind, error = %e, "simulation failed");
                report.result = Err(e.into());
                return Some(report);
            }
        };
        let success = solved.is_success();
        let Some(id) = self.chains.id_of(&report.chain) else {
            warn!(chain = %report.chain, "simulation finished for a removed chain");
            return Some(report);
        };
        let Some(slot) = self.slots.get_mut(id) else {
            return Some(report);
        };
        for attachment in &mut slot.attachments {
            match (kind, attachment) {
                (SolverKind::Axisymmetric, ChainAttachment::Axisymmetric(a)) => {
                    report.accepted = a.solver_mut().accept(solved);
                    report.outcome = a.solver().last_outcome().cloned();
                    break;
                }
                (SolverKind::Cartesian, ChainAttachment::Cartesian(a)) => {
                    report.accepted = a.solver_mut().accept(solved);
                    report.outcome = a.solver().last_outcome().cloned();
                    break;
                }
                _ => {}
            }
        }
        if report.accepted {
            if let Some(c) = self.chains.get_mut(id) {
                c.invalidate_render();
            }
        }
        report.result = Ok(success);
        info!(chain = %report.chain, %kind, success, accepted = report.accepted, "simulation completed");
        Some(report)
    }
}
