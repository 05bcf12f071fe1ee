//! The renderer seam.
//!
//! A frame never draws anything itself. It hands named [`Drawable`]s to a
//! [`Renderer`] and tells it when they change or go away. Names are
//! `chain/part`, unique across the scene.

use std::collections::{BTreeMap, BTreeSet};

use sonoframe_acoustic::VolumeData;
use sonoframe_math::{Point3, Transform};
use sonoframe_mesh::TriangleMesh;

/// Something the host can draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    /// Connected line through chain joint endpoints.
    Polyline {
        /// Vertices in world coordinates.
        points: Vec<Point3>,
        /// RGBA in 0..1.
        color: [f64; 4],
        /// Line width in pixels.
        width: f64,
    },
    /// Triangle mesh drawn through `transform`.
    Mesh {
        /// Mesh in its own coordinates.
        mesh: TriangleMesh,
        /// Local to world.
        transform: Transform,
        /// RGBA in 0..1.
        color: [f64; 4],
    },
    /// Colour-mapped voxel volume.
    Volume(VolumeData),
    /// Point cloud in world coordinates.
    Points {
        /// Positions.
        points: Vec<Point3>,
        /// RGBA in 0..1.
        color: [f64; 4],
        /// Point size in pixels.
        size: f64,
    },
}

impl Drawable {
    /// Short type name.
    pub fn kind(&self) -> &'static str {
        match self {
            Drawable::Polyline { .. } => "polyline",
            Drawable::Mesh { .. } => "mesh",
            Drawable::Volume(_) => "volume",
            Drawable::Points { .. } => "points",
        }
    }
}

/// A 3D scene that accepts named drawables.
pub trait Renderer {
    /// Add a new drawable.
    fn add(&mut self, name: &str, drawable: Drawable);

    /// Replace an existing drawable.
    fn update(&mut self, name: &str, drawable: Drawable);

    /// Remove a drawable. Unknown names are ignored.
    fn remove(&mut self, name: &str);
}

/// Names one owner has put into a renderer.
///
/// [`DrawSet::show`] adds the first time and updates afterwards, so owners
/// never need to track which call applies.
#[derive(Debug, Clone, Default)]
pub struct DrawSet {
    names: BTreeSet<String>,
}

impl DrawSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update `name`.
    pub fn show(&mut self, renderer: &mut dyn Renderer, name: String, drawable: Drawable) {
        if self.names.contains(&name) {
            renderer.update(&name, drawable);
        } else {
            renderer.add(&name, drawable);
            self.names.insert(name);
        }
    }

    /// Remove `name` if it was shown.
    pub fn hide(&mut self, renderer: &mut dyn Renderer, name: &str) {
        if self.names.remove(name) {
            renderer.remove(name);
        }
    }

    /// Remove every shown name starting with `prefix`.
    pub fn hide_prefixed(&mut self, renderer: &mut dyn Renderer, prefix: &str) {
        let stale: Vec<String> = self.names.iter().filter(|n| n.starts_with(prefix)).cloned().collect();
        for name in stale {
            self.hide(renderer, &name);
        }
    }

    /// Remove everything.
    pub fn clear(&mut self, renderer: &mut dyn Renderer) {
        for name in std::mem::take(&mut self.names) {
            renderer.remove(&name);
        }
    }

    /// True when `name` is shown.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Shown names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// One call received by a [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// `add(name)`.
    Add(String),
    /// `update(name)`.
    Update(String),
    /// `remove(name)`.
    Remove(String),
}

/// Renderer that keeps the scene in memory and logs every call.
///
/// Used headless by the CLI and by tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    items: BTreeMap<String, Drawable>,
    events: Vec<RenderEvent>,
}

impl RecordingRenderer {
    /// Empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drawable by name.
    pub fn get(&self, name: &str) -> Option<&Drawable> {
        self.items.get(name)
    }

    /// Every drawable name, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.items.keys().map(String::as_str).collect()
    }

    /// Number of drawables.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is drawn.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Calls received since the last [`RecordingRenderer::take_events`].
    pub fn events(&self) -> &[RenderEvent] {
        &self.events
    }

    /// Drain the call log.
    pub fn take_events(&mut self) -> Vec<RenderEvent> {
        std::mem::take(&mut self.events)
    }
}

impl Renderer for RecordingRenderer {
    fn add(&mut self, name: &str, drawable: Drawable) {
        self.events.push(RenderEvent::Add(name.to_string()));
        self.items.insert(name.to_string(), drawable);
    }

    fn update(&mut self, name: &str, drawable: Drawable) {
        self.events.push(RenderEvent::Update(name.to_string()));
        self.items.insert(name.to_string(), drawable);
    }

    fn remove(&mut self, name: &str) {
        self.events.push(RenderEvent::Remove(name.to_string()));
        self.items.remove(name);
    }
}
