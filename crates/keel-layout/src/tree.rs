//! Entity hierarchy.
//!
//! The manager never owns the entity tree. `split` only needs to enumerate
//! the children of an entity, which is what [`EntityTree`] provides.

use std::collections::HashMap;

use indexmap::IndexSet;
use keel_core::EntityId;

/// Read-only view of a tree of entities.
pub trait EntityTree {
    /// Direct children of `entity`, in order. Unknown entities have none.
    fn children(&self, entity: EntityId) -> Vec<EntityId>;

    /// `root` followed by every descendant, in depth-first pre-order.
    ///
    /// Walks with an explicit stack so deep trees cannot overflow. Each
    /// entity is reported once even if the relation is not a strict tree.
    fn subtree(&self, root: EntityId) -> IndexSet<EntityId> {
        let mut seen = IndexSet::new();
        let mut stack = vec![root];
        while let Some(entity) = stack.pop() {
            if !seen.insert(entity) {
                continue;
            }
            // Reverse so the first child is visited first.
            stack.extend(self.children(entity).into_iter().rev());
        }
        seen
    }
}

impl EntityTree for HashMap<EntityId, Vec<EntityId>> {
    fn children(&self, entity: EntityId) -> Vec<EntityId> {
        self.get(&entity).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
struct Node {
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

/// A plain parent/children map of entities.
#[derive(Debug, Clone, Default)]
pub struct EntityHierarchy {
    nodes: HashMap<EntityId, Node>,
    roots: Vec<EntityId>,
}

impl EntityHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parentless entity. Does nothing if it is already known.
    pub fn add_root(&mut self, entity: EntityId) {
        if self.nodes.contains_key(&entity) {
            return;
        }
        self.nodes.insert(entity, Node::default());
        self.roots.push(entity);
    }

    /// Attach `child` under `parent`, detaching it from wherever it was.
    ///
    /// `parent` is added as a root if it is unknown. Attaching an entity
    /// below itself or one of its descendants is ignored.
    pub fn add_child(&mut self, parent: EntityId, child: EntityId) {
        if self.subtree(child).contains(&parent) {
            return;
        }
        self.add_root(parent);
        self.detach(child);
        self.roots.retain(|&root| root != child);
        self.nodes.entry(child).or_default().parent = Some(parent);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }

    /// Make `entity` a root, cutting it from its parent. Its own children
    /// stay attached.
    pub fn detach(&mut self, entity: EntityId) {
        let Some(parent) = self.nodes.get_mut(&entity).and_then(|node| node.parent.take()) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|&c| c != entity);
        }
        self.roots.push(entity);
    }

    /// Forget `entity` and its whole subtree.
    pub fn remove(&mut self, entity: EntityId) {
        self.detach(entity);
        for removed in self.subtree(entity) {
            self.nodes.remove(&removed);
        }
        self.roots.retain(|&root| root != entity);
    }

    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.nodes.get(&entity).and_then(|node| node.parent)
    }

    pub fn roots(&self) -> &[EntityId] {
        &self.roots
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.nodes.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl EntityTree for EntityHierarchy {
    fn children(&self, entity: EntityId) -> Vec<EntityId> {
        self.nodes
            .get(&entity)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }
}
