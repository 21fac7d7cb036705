// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The scene graph: an ordered node collection keyed by id.

use crate::ids::{GraphId, IdMinter, NodeId};
use crate::node::Node;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised by [`SceneGraph`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// A node with this id already exists in the graph.
    #[error("node already exists: {0}")]
    DuplicateId(NodeId),
    /// No node with this id exists in the graph.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
}

/// Change notifications emitted to the registered [`SceneObserver`].
///
/// This is the scene graph's "canvas collaborator": the graph itself has
/// no idea a renderer exists, it just calls this trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    /// A node was added.
    Added(NodeId),
    /// A node was removed.
    Removed(NodeId),
    /// A node's fields changed in place.
    Updated(NodeId),
    /// A node's id was rewritten (temp id resolved to a real id).
    Remapped {
        /// Previous id.
        old: NodeId,
        /// New id.
        new: NodeId,
    },
}

/// Observer hook for scene mutations. Implemented by the renderer/embedder;
/// the scene graph crate carries no rendering concerns itself.
pub trait SceneObserver {
    /// Called synchronously after every mutation.
    fn on_scene_event(&mut self, event: SceneEvent);
}

/// Ordered node collection with z-order, selection, and id-remap support.
///
/// Holds the authoritative node table; nodes address it only through
/// [`NodeId`], never a direct reference, so serializing a node can never
/// walk back into the graph that owns it.
pub struct SceneGraph {
    id: GraphId,
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    selection: BTreeSet<NodeId>,
    minter: IdMinter,
    observer: Option<Box<dyn SceneObserver>>,
}

impl SceneGraph {
    /// Create an empty scene graph with the given graph id.
    pub fn new(id: GraphId) -> Self {
        Self {
            id,
            nodes: Vec::new(),
            index: HashMap::new(),
            selection: BTreeSet::new(),
            minter: IdMinter::new(),
            observer: None,
        }
    }

    /// This graph's id (the value nodes' `graph_id` back-pointer holds).
    pub fn id(&self) -> GraphId {
        self.id
    }

    /// Install an observer to receive [`SceneEvent`] notifications.
    pub fn set_observer(&mut self, observer: Box<dyn SceneObserver>) {
        self.observer = Some(observer);
    }

    /// Remove any installed observer.
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    fn notify(&mut self, event: SceneEvent) {
        if let Some(obs) = self.observer.as_mut() {
            obs.on_scene_event(event);
        }
    }

    /// Mint the next monotonic real id, for components that need to
    /// pre-reserve one (e.g. an embedded authority layer).
    pub fn next_real_id(&mut self) -> NodeId {
        self.minter.next_real_id()
    }

    /// Mint a `temp_{n}` id for an optimistic node.
    pub fn mint_temp_id(&mut self) -> NodeId {
        self.minter.next_temp_id()
    }

    /// Mint a `_temp_group_{n}` id.
    pub fn mint_temp_group_id(&mut self) -> NodeId {
        self.minter.next_temp_group_id()
    }

    /// Insert a node. The node's `base.id` must already be set (commands
    /// mint ids via [`SceneGraph::mint_temp_id`]/`next_real_id` before
    /// constructing the node). Assigns `z_index = max(existing) + 1` when
    /// the node didn't already carry one, and sets the back-pointer.
    pub fn add(&mut self, mut node: Node) -> Result<NodeId, SceneError> {
        let id = node.base.id.clone();
        if self.index.contains_key(&id) {
            return Err(SceneError::DuplicateId(id));
        }
        if node.base.z_index.is_none() {
            let max = self.nodes.iter().filter_map(|n| n.base.z_index).max();
            node.base.z_index = Some(max.map_or(0, |m| m + 1));
        }
        node.base.graph_id = Some(self.id);
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(node);
        self.notify(SceneEvent::Added(id.clone()));
        Ok(id)
    }

    /// Remove a node by id, clearing the back-pointer and returning the
    /// removed node (callers use this for delete-command snapshots).
    pub fn remove(&mut self, id: &NodeId) -> Result<Node, SceneError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| SceneError::NodeNotFound(id.clone()))?;
        let mut node = self.nodes.swap_remove(idx);
        node.base.graph_id = None;
        self.index.remove(id);
        // swap_remove moved the last element into `idx`; fix its index.
        if idx < self.nodes.len() {
            let moved_id = self.nodes[idx].base.id.clone();
            self.index.insert(moved_id, idx);
        }
        self.selection.remove(id);
        self.notify(SceneEvent::Removed(id.clone()));
        Ok(node)
    }

    /// Look up a node by id.
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Look up a node by id, mutably.
    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        let idx = *self.index.get(id)?;
        Some(&mut self.nodes[idx])
    }

    /// Call after mutating a node in place via [`SceneGraph::get_mut`] to
    /// notify the observer. Cheap no-op when there's no observer installed.
    pub fn mark_updated(&mut self, id: &NodeId) {
        self.notify(SceneEvent::Updated(id.clone()));
    }

    /// All nodes, in insertion order (not z-order).
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All nodes, sorted by ascending z-index (paint order).
    pub fn nodes_in_z_order(&self) -> Vec<&Node> {
        let mut v: Vec<&Node> = self.nodes.iter().collect();
        v.sort_by_key(|n| n.base.z_index.unwrap_or(0));
        v
    }

    /// Number of nodes currently in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current selection set.
    pub fn selection(&self) -> &BTreeSet<NodeId> {
        &self.selection
    }

    /// Replace the selection set.
    pub fn select(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        self.selection = ids.into_iter().collect();
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// `true` if `id` is currently selected.
    pub fn is_selected(&self, id: &NodeId) -> bool {
        self.selection.contains(id)
    }

    /// Rewrite `old` to `new` everywhere in this graph: the node table key,
    /// the node's own `base.id`, the selection set, and every group's
    /// `child_nodes` set. Pointer identity of the underlying [`Node`] is
    /// preserved — this is a rekey, not a delete+recreate, so animation
    /// state and rendering caches keyed by object identity survive.
    ///
    /// Callers outside this crate (pending-op tables, the undo stack) must
    /// perform their own matching rewrite in the same maintenance sweep;
    /// see `canvas-sync`'s `StateSyncManager::reconcile_id`.
    pub fn remap(&mut self, old: &NodeId, new: NodeId) -> Result<(), SceneError> {
        let idx = *self
            .index
            .get(old)
            .ok_or_else(|| SceneError::NodeNotFound(old.clone()))?;
        if self.index.contains_key(&new) {
            return Err(SceneError::DuplicateId(new));
        }

        self.nodes[idx].base.id = new.clone();
        self.index.remove(old);
        self.index.insert(new.clone(), idx);

        if self.selection.remove(old) {
            self.selection.insert(new.clone());
        }

        for node in &mut self.nodes {
            if node.base.parent_group.as_ref() == Some(old) {
                node.base.parent_group = Some(new.clone());
            }
            if let Some(group) = node.variant.as_group_mut() {
                if group.child_nodes.remove(old) {
                    group.child_nodes.insert(new.clone());
                }
            }
        }

        self.notify(SceneEvent::Remapped {
            old: old.clone(),
            new,
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::node::NodeVariant;

    fn shape(id: NodeId) -> Node {
        Node::new(id, NodeVariant::Shape)
    }

    #[test]
    fn add_assigns_increasing_z_index() {
        let mut g = SceneGraph::new(GraphId(1));
        let a = g.add(shape(NodeId::Real(1))).unwrap();
        let b = g.add(shape(NodeId::Real(2))).unwrap();
        assert_eq!(g.get(&a).unwrap().base.z_index, Some(0));
        assert_eq!(g.get(&b).unwrap().base.z_index, Some(1));
    }

    #[test]
    fn add_sets_back_pointer_remove_clears_it() {
        let mut g = SceneGraph::new(GraphId(7));
        let id = g.add(shape(NodeId::Real(1))).unwrap();
        assert_eq!(g.get(&id).unwrap().base.graph_id, Some(GraphId(7)));
        let removed = g.remove(&id).unwrap();
        assert_eq!(removed.base.graph_id, None);
        assert!(g.get(&id).is_none());
    }

    #[test]
    fn add_duplicate_id_errors() {
        let mut g = SceneGraph::new(GraphId(1));
        g.add(shape(NodeId::Real(1))).unwrap();
        let err = g.add(shape(NodeId::Real(1))).unwrap_err();
        assert_eq!(err, SceneError::DuplicateId(NodeId::Real(1)));
    }

    #[test]
    fn remove_missing_errors() {
        let mut g = SceneGraph::new(GraphId(1));
        let err = g.remove(&NodeId::Real(99)).unwrap_err();
        assert_eq!(err, SceneError::NodeNotFound(NodeId::Real(99)));
    }

    #[test]
    fn remove_fixes_up_swap_removed_index() {
        let mut g = SceneGraph::new(GraphId(1));
        let a = g.add(shape(NodeId::Real(1))).unwrap();
        let b = g.add(shape(NodeId::Real(2))).unwrap();
        let c = g.add(shape(NodeId::Real(3))).unwrap();
        g.remove(&a).unwrap();
        // b and c must both still be reachable after the swap_remove shuffle.
        assert!(g.get(&b).is_some());
        assert!(g.get(&c).is_some());
    }

    #[test]
    fn remap_rewrites_id_selection_and_group_membership() {
        let mut g = SceneGraph::new(GraphId(1));
        let temp = g.mint_temp_id();
        let child = g.add(shape(temp.clone())).unwrap();
        g.select([child.clone()]);

        let mut group_node = Node::new(NodeId::Real(100), NodeVariant::Group(Default::default()));
        if let Some(grp) = group_node.variant.as_group_mut() {
            grp.child_nodes.insert(child.clone());
        }
        g.add(group_node).unwrap();

        let real = NodeId::Real(42);
        g.remap(&child, real.clone()).unwrap();

        assert!(g.get(&child).is_none());
        assert!(g.get(&real).is_some());
        assert!(g.selection().contains(&real));
        let group = g.get(&NodeId::Real(100)).unwrap().variant.as_group().unwrap();
        assert!(group.child_nodes.contains(&real));
        assert!(!group.child_nodes.contains(&child));
    }

    #[test]
    fn nodes_in_z_order_sorts_ascending() {
        let mut g = SceneGraph::new(GraphId(1));
        let mut n2 = shape(NodeId::Real(2));
        n2.base.z_index = Some(-5);
        g.add(shape(NodeId::Real(1))).unwrap();
        g.add(n2).unwrap();
        let ordered = g.nodes_in_z_order();
        assert_eq!(ordered[0].base.id, NodeId::Real(2));
    }
}
