//! Arena of chains with an acyclic parent relation.

use std::collections::HashMap;

use slotmap::{new_key_type, SlotMap};
use sonoframe_ir::HierarchyEntry;
use tracing::{debug, warn};

use crate::chain::KinematicChain;
use crate::error::{ChainError, Result};

new_key_type! {
    /// Opaque handle to a chain in a [`ChainArena`].
    pub struct ChainId;
}

#[derive(Debug)]
struct Node {
    chain: KinematicChain,
    parent: Option<ChainId>,
}

/// Owns every chain of a frame and the parent links between them.
///
/// Parents are stored as ids, never as references. [`ChainArena::set_parent`]
/// refuses links that would close a loop, so walking parents always ends.
#[derive(Debug, Default)]
pub struct ChainArena {
    nodes: SlotMap<ChainId, Node>,
    by_name: HashMap<String, ChainId>,
}

impl ChainArena {
    /// Empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chains.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena holds no chains.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a root chain. Names are unique.
    pub fn insert(&mut self, chain: KinematicChain) -> Result<ChainId> {
        let name = chain.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(ChainError::DuplicateChain(name));
        }
        let id = self.nodes.insert(Node { chain, parent: None });
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Remove a chain. Its children become roots.
    pub fn remove(&mut self, id: ChainId) -> Option<KinematicChain> {
        let node = self.nodes.remove(id)?;
        self.by_name.remove(node.chain.name());
        for other in self.nodes.values_mut() {
            if other.parent == Some(id) {
                other.parent = None;
                other.chain.set_parent_transform(None);
            }
        }
        Some(node.chain)
    }

    /// Chain by id.
    pub fn get(&self, id: ChainId) -> Option<&KinematicChain> {
        self.nodes.get(id).map(|n| &n.chain)
    }

    /// Mutable chain by id.
    pub fn get_mut(&mut self, id: ChainId) -> Option<&mut KinematicChain> {
        self.nodes.get_mut(id).map(|n| &mut n.chain)
    }

    /// Id of the chain called `name`.
    pub fn id_of(&self, name: &str) -> Option<ChainId> {
        self.by_name.get(name).copied()
    }

    /// Id of the chain called `name`, or [`ChainError::UnknownChain`].
    pub fn require(&self, name: &str) -> Result<ChainId> {
        self.id_of(name)
            .ok_or_else(|| ChainError::UnknownChain(name.to_string()))
    }

    /// All chains, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ChainId, &KinematicChain)> {
        self.nodes.iter().map(|(id, n)| (id, &n.chain))
    }

    /// Parent of `id`.
    pub fn parent(&self, id: ChainId) -> Option<ChainId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Direct children of `id`.
    pub fn children(&self, id: ChainId) -> Vec<ChainId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(id))
            .map(|(child, _)| child)
            .collect()
    }

    fn name_of(&self, id: ChainId) -> String {
        self.get(id)
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| format!("{:?}", id))
    }

    /// Link `child` under `parent`, or make it a root with `None`.
    pub fn set_parent(&mut self, child: ChainId, parent: Option<ChainId>) -> Result<()> {
        if !self.nodes.contains_key(child) {
            return Err(ChainError::UnknownChain(format!("{:?}", child)));
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(p) {
                return Err(ChainError::UnknownChain(format!("{:?}", p)));
            }
            // Walk up from the new parent; meeting the child means a loop.
            let mut cursor = Some(p);
            while let Some(c) = cursor {
                if c == child {
                    return Err(ChainError::Cycle {
                        child: self.name_of(child),
                        parent: self.name_of(p),
                    });
                }
                cursor = self.parent(c);
            }
        }
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = parent;
            if parent.is_none() {
                node.chain.set_parent_transform(None);
            }
        }
        Ok(())
    }

    /// Number of ancestors of `id`.
    pub fn depth(&self, id: ChainId) -> usize {
        let mut depth = 0;
        let mut cursor = self.parent(id);
        while let Some(c) = cursor {
            depth += 1;
            cursor = self.parent(c);
        }
        depth
    }

    /// Every chain, parents before children. Ties keep name order.
    pub fn depth_order(&self) -> Vec<ChainId> {
        let mut ids: Vec<(usize, &str, ChainId)> = self
            .nodes
            .iter()
            .map(|(id, n)| (self.depth(id), n.chain.name(), id))
            .collect();
        ids.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
        ids.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Push every parent's end effector into its children, in one pass by depth.
    pub fn resolve_transforms(&mut self) {
        for id in self.depth_order() {
            let parent_end = match self.parent(id) {
                Some(p) => self.nodes.get_mut(p).map(|n| n.chain.end_transform()),
                None => None,
            };
            if let Some(node) = self.nodes.get_mut(id) {
                node.chain.set_parent_transform(parent_end);
            }
        }
    }

    /// Apply flattened hierarchy entries. Names missing from the arena are skipped.
    pub fn apply_hierarchy(&mut self, entries: &[HierarchyEntry]) -> Result<()> {
        for entry in entries {
            let Some(child) = self.id_of(&entry.name) else {
                warn!(chain = %entry.name, "hierarchy names an unknown chain");
                continue;
            };
            let parent = match entry.parent.as_deref() {
                None => None,
                Some(name) => match self.id_of(name) {
                    Some(p) => Some(p),
                    None => {
                        warn!(chain = %entry.name, parent = name, "hierarchy parent is unknown");
                        None
                    }
                },
            };
            self.set_parent(child, parent)?;
            debug!(chain = %entry.name, parent = ?entry.parent, depth = entry.depth, "linked");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonoframe_ir::{ChainConfig, JointConfig, SubTransformConfig};
    use sonoframe_math::Axis;

    fn chain(name: &str, dx: f64) -> KinematicChain {
        let mut cfg = ChainConfig::new(name);
        cfg.joints = vec![JointConfig::new("j", vec![SubTransformConfig::translation(Axis::X, dx)])];
        KinematicChain::new(cfg)
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut arena = ChainArena::new();
        arena.insert(chain("a", 1.0)).unwrap();
        assert_eq!(
            arena.insert(chain("a", 2.0)).unwrap_err(),
            ChainError::DuplicateChain("a".into())
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let mut arena = ChainArena::new();
        let a = arena.insert(chain("a", 1.0)).unwrap();
        let b = arena.insert(chain("b", 1.0)).unwrap();
        let c = arena.insert(chain("c", 1.0)).unwrap();
        arena.set_parent(b, Some(a)).unwrap();
        arena.set_parent(c, Some(b)).unwrap();
        let err = arena.set_parent(a, Some(c)).unwrap_err();
        assert_eq!(
            err,
            ChainError::Cycle {
                child: "a".into(),
                parent: "c".into()
            }
        );
        assert!(matches!(arena.set_parent(a, Some(a)), Err(ChainError::Cycle { .. })));
        assert_eq!(arena.parent(a), None);
    }

    #[test]
    fn test_resolve_transforms_by_depth() {
        let mut arena = ChainArena::new();
        // Inserted child-first so slot order differs from depth order.
        let c = arena.insert(chain("c", 3.0)).unwrap();
        let b = arena.insert(chain("b", 2.0)).unwrap();
        let a = arena.insert(chain("a", 1.0)).unwrap();
        arena.set_parent(b, Some(a)).unwrap();
        arena.set_parent(c, Some(b)).unwrap();
        assert_eq!(arena.depth_order(), vec![a, b, c]);
        arena.resolve_transforms();
        let end = arena.get_mut(c).unwrap().end_transform();
        assert!((end.origin().x - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_remove_orphans_children() {
        let mut arena = ChainArena::new();
        let a = arena.insert(chain("a", 1.0)).unwrap();
        let b = arena.insert(chain("b", 2.0)).unwrap();
        arena.set_parent(b, Some(a)).unwrap();
        arena.resolve_transforms();
        assert!(arena.get(b).unwrap().parent_transform().is_some());
        arena.remove(a).unwrap();
        assert_eq!(arena.parent(b), None);
        assert!(arena.get(b).unwrap().parent_transform().is_none());
        assert_eq!(arena.id_of("a"), None);
        assert_eq!(arena.children(b), Vec::<ChainId>::new());
    }
}
