// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Group bounds, auto-parent, and alignment-protection bookkeeping.
//! `childNodes` membership and the cascading delta on
//! `group_move` are already owned by the `group_*` command family in
//! `canvas-commands`; this crate is the policy layer around them — it
//! decides *when* a group's frame needs to grow to fit its children and
//! *which* group a freshly-combined selection should auto-parent into, but
//! it never mutates membership itself.

#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

use canvas_align::{GROUP_PADDING, GROUP_TITLE_BAR_HEIGHT};
use canvas_app_core::Cooldown;
use canvas_scene::{NodeId, SceneGraph};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How long a group's bounds recompute is suppressed after an alignment
/// animation finishes on its children, so the animation's final frame
/// isn't immediately overwritten by a bounds recompute racing the same
/// tick.
pub const ALIGNMENT_PROTECTION_WINDOW: Duration = Duration::from_secs(1);

/// Tracks per-group alignment-protection windows and performs bounds
/// recompute / auto-parent lookups against a [`SceneGraph`].
///
/// Holds no reference to the graph itself — every method takes one
/// explicitly, matching the rest of this workspace's ownership style.
#[derive(Debug, Default)]
pub struct GroupManager {
    protection: HashMap<NodeId, Cooldown>,
}

impl GroupManager {
    /// Construct an empty manager.
    pub fn new() -> Self {
        Self {
            protection: HashMap::new(),
        }
    }

    /// Mark `group_id` as having just finished an alignment animation on
    /// its children, arming the protection window as of `now`. Also sets
    /// the node's own `alignment_just_completed` flag for renderers that
    /// read it directly.
    pub fn mark_alignment_completed(&mut self, graph: &mut SceneGraph, group_id: &NodeId, now: Instant) {
        self.protection
            .entry(group_id.clone())
            .or_insert_with(|| Cooldown::new(ALIGNMENT_PROTECTION_WINDOW))
            .trigger(now);
        if let Some(fields) = graph.get_mut(group_id).and_then(|n| n.variant.as_group_mut()) {
            fields.alignment_just_completed = true;
        }
    }

    /// `true` if `group_id`'s protection window is still active as of `now`.
    pub fn is_protected(&self, group_id: &NodeId, now: Instant) -> bool {
        self.protection.get(group_id).is_some_and(|cd| !cd.ready(now))
    }

    /// Recompute `group_id`'s frame from its children's current
    /// positions/sizes, padded by [`GROUP_PADDING`] and
    /// [`GROUP_TITLE_BAR_HEIGHT`], and write it directly to the graph.
    ///
    /// Returns `false` (no write) if the group is still protected, has no
    /// children, or doesn't exist/isn't a group. With `expand_only`, the
    /// frame only grows to cover children that moved outside it — it never
    /// shrinks or shifts its near corner inward, which is what the
    /// `group_resize` the caller sends afterward should reflect: size
    /// growth only, never a `group_move`.
    pub fn update_bounds(&mut self, graph: &mut SceneGraph, group_id: &NodeId, now: Instant, expand_only: bool) -> bool {
        if self.is_protected(group_id, now) {
            return false;
        }
        if let Some(fields) = graph.get_mut(group_id).and_then(|n| n.variant.as_group_mut()) {
            fields.alignment_just_completed = false;
        }
        let Some((position, size)) = bounds_with_padding(graph, group_id) else {
            return false;
        };
        let (position, size) = if expand_only {
            let Some(node) = graph.get(group_id) else {
                return false;
            };
            expand_to_cover(node.base.position, node.base.size, position, size)
        } else {
            (position, size)
        };
        let Some(node) = graph.get_mut(group_id) else {
            return false;
        };
        node.base.position = position;
        node.base.size = size;
        graph.mark_updated(group_id);
        true
    }

    /// For every non-group node in `selection` that isn't already parented
    /// to a group in `selection`, find the nearest selected group by
    /// center-to-center distance. Returns `(node_id, group_id)` pairs the
    /// caller should issue `group_add_node` commands for before starting a
    /// combined alignment.
    pub fn auto_parent_assignments(graph: &SceneGraph, selection: &[NodeId]) -> Vec<(NodeId, NodeId)> {
        let selected_groups: Vec<NodeId> = selection
            .iter()
            .filter(|id| graph.get(id).is_some_and(|n| n.variant.as_group().is_some()))
            .cloned()
            .collect();
        if selected_groups.is_empty() {
            return Vec::new();
        }

        let mut assignments = Vec::new();
        for id in selection {
            let Some(node) = graph.get(id) else { continue };
            if node.variant.as_group().is_some() {
                continue;
            }
            let already_parented_to_selection = node
                .base
                .parent_group
                .as_ref()
                .is_some_and(|parent| selected_groups.contains(parent));
            if already_parented_to_selection {
                continue;
            }
            let center = center_of(node.base.position, node.base.size);
            let nearest = selected_groups.iter().min_by(|a, b| {
                let da = graph.get(a).map_or(f64::MAX, |g| dist(center, center_of(g.base.position, g.base.size)));
                let db = graph.get(b).map_or(f64::MAX, |g| dist(center, center_of(g.base.position, g.base.size)));
                da.total_cmp(&db)
            });
            if let Some(group) = nearest {
                assignments.push((id.clone(), group.clone()));
            }
        }
        assignments
    }
}

fn bounds_with_padding(graph: &SceneGraph, group_id: &NodeId) -> Option<([f64; 2], [f64; 2])> {
    let node = graph.get(group_id)?;
    let fields = node.variant.as_group()?;
    if fields.child_nodes.is_empty() {
        return None;
    }
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
    let mut any = false;
    for child in &fields.child_nodes {
        let Some(child_node) = graph.get(child) else { continue };
        min_x = min_x.min(child_node.base.position[0]);
        max_x = max_x.max(child_node.base.position[0] + child_node.base.size[0]);
        min_y = min_y.min(child_node.base.position[1]);
        max_y = max_y.max(child_node.base.position[1] + child_node.base.size[1]);
        any = true;
    }
    if !any {
        return None;
    }
    let position = [min_x - GROUP_PADDING, min_y - GROUP_PADDING - GROUP_TITLE_BAR_HEIGHT];
    let size = [
        (max_x - min_x) + GROUP_PADDING * 2.0,
        (max_y - min_y) + GROUP_PADDING * 2.0 + GROUP_TITLE_BAR_HEIGHT,
    ];
    Some((position, size))
}

fn expand_to_cover(current_pos: [f64; 2], current_size: [f64; 2], pos: [f64; 2], size: [f64; 2]) -> ([f64; 2], [f64; 2]) {
    let min_x = current_pos[0].min(pos[0]);
    let min_y = current_pos[1].min(pos[1]);
    let max_x = (current_pos[0] + current_size[0]).max(pos[0] + size[0]);
    let max_y = (current_pos[1] + current_size[1]).max(pos[1] + size[1]);
    ([min_x, min_y], [max_x - min_x, max_y - min_y])
}

fn center_of(position: [f64; 2], size: [f64; 2]) -> [f64; 2] {
    [position[0] + size[0] / 2.0, position[1] + size[1] / 2.0]
}

fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use canvas_scene::{GraphId, GroupFields, Node, NodeVariant};
    use std::collections::BTreeSet;

    fn leaf(graph: &mut SceneGraph, id: u64, pos: [f64; 2], size: [f64; 2]) -> NodeId {
        let node_id = NodeId::Real(id);
        let mut node = Node::new(node_id.clone(), NodeVariant::Shape);
        node.base.position = pos;
        node.base.size = size;
        graph.add(node).unwrap();
        node_id
    }

    fn group(graph: &mut SceneGraph, id: u64, children: &[NodeId], pos: [f64; 2], size: [f64; 2]) -> NodeId {
        let node_id = NodeId::Real(id);
        let mut fields = GroupFields::default();
        fields.child_nodes = children.iter().cloned().collect::<BTreeSet<_>>();
        let mut node = Node::new(node_id.clone(), NodeVariant::Group(fields));
        node.base.position = pos;
        node.base.size = size;
        graph.add(node).unwrap();
        for child in children {
            if let Some(n) = graph.get_mut(child) {
                n.base.parent_group = Some(node_id.clone());
            }
        }
        node_id
    }

    #[test]
    fn update_bounds_pads_around_children() {
        let mut graph = SceneGraph::new(GraphId(1));
        let a = leaf(&mut graph, 1, [0.0, 0.0], [50.0, 50.0]);
        let b = leaf(&mut graph, 2, [100.0, 0.0], [50.0, 50.0]);
        let grp = group(&mut graph, 3, &[a, b], [0.0, 0.0], [10.0, 10.0]);

        let mut manager = GroupManager::new();
        let now = Instant::now();
        assert!(manager.update_bounds(&mut graph, &grp, now, false));

        let node = graph.get(&grp).unwrap();
        assert_eq!(node.base.position, [-GROUP_PADDING, -GROUP_PADDING - GROUP_TITLE_BAR_HEIGHT]);
        assert_eq!(
            node.base.size,
            [150.0 + GROUP_PADDING * 2.0, 50.0 + GROUP_PADDING * 2.0 + GROUP_TITLE_BAR_HEIGHT]
        );
    }

    #[test]
    fn protection_window_blocks_recompute_until_elapsed() {
        let mut graph = SceneGraph::new(GraphId(1));
        let a = leaf(&mut graph, 1, [0.0, 0.0], [50.0, 50.0]);
        let grp = group(&mut graph, 2, &[a], [0.0, 0.0], [100.0, 100.0]);

        let mut manager = GroupManager::new();
        let start = Instant::now();
        manager.mark_alignment_completed(&mut graph, &grp, start);
        assert!(graph.get(&grp).unwrap().variant.as_group().unwrap().alignment_just_completed);

        assert!(!manager.update_bounds(&mut graph, &grp, start + Duration::from_millis(500), false));
        assert!(manager.update_bounds(&mut graph, &grp, start + Duration::from_secs(2), false));
        assert!(!graph.get(&grp).unwrap().variant.as_group().unwrap().alignment_just_completed);
    }

    #[test]
    fn expand_only_never_shrinks_the_frame() {
        let mut graph = SceneGraph::new(GraphId(1));
        let a = leaf(&mut graph, 1, [500.0, 500.0], [10.0, 10.0]);
        let grp = group(&mut graph, 2, &[a], [0.0, 0.0], [1000.0, 1000.0]);

        let mut manager = GroupManager::new();
        let now = Instant::now();
        assert!(manager.update_bounds(&mut graph, &grp, now, true));
        let node = graph.get(&grp).unwrap();
        assert_eq!(node.base.position, [0.0, 0.0]);
        assert_eq!(node.base.size, [1000.0, 1000.0]);
    }

    #[test]
    fn auto_parent_assigns_nearest_selected_group() {
        let mut graph = SceneGraph::new(GraphId(1));
        let near_group = group(&mut graph, 1, &[], [0.0, 0.0], [100.0, 100.0]);
        let far_group = group(&mut graph, 2, &[], [1000.0, 1000.0], [100.0, 100.0]);
        let loose = leaf(&mut graph, 3, [10.0, 10.0], [20.0, 20.0]);

        let selection = vec![near_group.clone(), far_group.clone(), loose.clone()];
        let assignments = GroupManager::auto_parent_assignments(&graph, &selection);
        assert_eq!(assignments, vec![(loose, near_group)]);
    }

    #[test]
    fn auto_parent_skips_nodes_already_in_a_selected_group() {
        let mut graph = SceneGraph::new(GraphId(1));
        let a = leaf(&mut graph, 1, [0.0, 0.0], [20.0, 20.0]);
        let grp = group(&mut graph, 2, &[a.clone()], [0.0, 0.0], [100.0, 100.0]);

        let selection = vec![grp, a];
        assert!(GroupManager::auto_parent_assignments(&graph, &selection).is_empty());
    }
}
