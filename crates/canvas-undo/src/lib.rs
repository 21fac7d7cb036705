// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounded undo/redo stack for the collaborative canvas edit engine.
//!
//! A drag-style gesture (move/resize/rotate/align) spans many incremental
//! command applications but should collapse into one undo entry anchored
//! to the state *before* the gesture started. [`UndoManager::begin_interaction`]
//! snapshots that starting state; [`UndoManager::end_interaction`] hands it
//! to the final command's `prepare_undo` before pushing, so undo restores
//! the pre-gesture state rather than the next-to-last increment.
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

use canvas_commands::{Command, CommandContext, InteractionSnapshot, MediaResidencyCheck};
use canvas_scene::NodeId;
use std::collections::VecDeque;

/// Distance, in scene units/radians, within which a finished interaction's
/// positions/sizes/rotations are treated as unchanged from the snapshot
/// taken at `begin_interaction`.
const NO_OP_TOLERANCE: f64 = 2.0;

fn interaction_is_no_op(ctx: &CommandContext<'_>, snapshot: &InteractionSnapshot) -> bool {
    let positions_unchanged = snapshot.positions.iter().all(|(id, pos)| match ctx.graph.get(id) {
        Some(node) => {
            let dx = node.base.position[0] - pos[0];
            let dy = node.base.position[1] - pos[1];
            dx.hypot(dy) <= NO_OP_TOLERANCE
        }
        None => true,
    });
    let sizes_unchanged = snapshot.sizes.iter().all(|(id, size)| match ctx.graph.get(id) {
        Some(node) => {
            let dw = node.base.size[0] - size[0];
            let dh = node.base.size[1] - size[1];
            dw.hypot(dh) <= NO_OP_TOLERANCE
        }
        None => true,
    });
    let rotations_unchanged = snapshot.rotations.iter().all(|(id, rotation)| match ctx.graph.get(id) {
        Some(node) => (node.base.rotation - rotation).abs() <= NO_OP_TOLERANCE,
        None => true,
    });
    positions_unchanged && sizes_unchanged && rotations_unchanged
}

/// Push/undo/redo stack with interaction-scoped snapshotting and merge
/// support. Holds no reference to the scene graph; every mutating call
/// takes a [`CommandContext`] for the duration of the call only.
pub struct UndoManager {
    undo_stack: VecDeque<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
    max_depth: usize,
    active: Option<InteractionSnapshot>,
}

impl UndoManager {
    /// Construct a manager retaining at most `max_depth` undo entries.
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            active: None,
        }
    }

    /// `true` if a gesture is currently open.
    pub fn in_interaction(&self) -> bool {
        self.active.is_some()
    }

    /// Snapshot the given nodes' positions/sizes/rotations from `graph`,
    /// opening an interaction. A second call before `end_interaction` or
    /// `cancel_interaction` replaces the snapshot (the prior gesture is
    /// abandoned, matching last-writer-wins for overlapping drags).
    pub fn begin_interaction(&mut self, graph: &canvas_scene::SceneGraph, node_ids: &[NodeId]) {
        let mut snapshot = InteractionSnapshot::default();
        for id in node_ids {
            if let Some(node) = graph.get(id) {
                snapshot.positions.insert(id.clone(), node.base.position);
                snapshot.sizes.insert(id.clone(), node.base.size);
                snapshot.rotations.insert(id.clone(), node.base.rotation);
            }
        }
        self.active = Some(snapshot);
    }

    /// Close the open interaction without pushing an undo entry, and
    /// restore every snapshotted node to its pre-interaction state. Used
    /// when a gesture is aborted (e.g. Escape during a drag).
    pub fn cancel_interaction(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(snapshot) = self.active.take() else {
            return;
        };
        for (id, pos) in &snapshot.positions {
            if let Some(node) = ctx.graph.get_mut(id) {
                node.base.position = *pos;
            }
        }
        for (id, size) in &snapshot.sizes {
            if let Some(node) = ctx.graph.get_mut(id) {
                node.base.size = *size;
            }
        }
        for (id, rotation) in &snapshot.rotations {
            if let Some(node) = ctx.graph.get_mut(id) {
                node.base.rotation = *rotation;
            }
        }
    }

    /// Close the open interaction, letting `cmd` capture undo state
    /// against the snapshot taken at `begin_interaction` rather than the
    /// now-mutated graph, then push it (merging with the top entry when
    /// possible). If every snapshotted node's position/size/rotation is
    /// unchanged within tolerance, the interaction is dropped instead of
    /// pushed, same as `cancel_interaction`.
    pub fn end_interaction(
        &mut self,
        ctx: &CommandContext<'_>,
        mut cmd: Box<dyn Command>,
        media_resident: MediaResidencyCheck<'_>,
    ) {
        let snapshot = self.active.take();
        if let Some(snapshot) = &snapshot {
            if interaction_is_no_op(ctx, snapshot) {
                return;
            }
        }
        cmd.prepare_undo(ctx, snapshot.as_ref(), media_resident);
        self.push(cmd);
    }

    /// Push a fully-prepared command onto the undo stack, merging with the
    /// top entry when it reports `can_merge_with`, clearing the redo
    /// stack, and trimming to `max_depth`.
    pub fn push(&mut self, cmd: Box<dyn Command>) {
        if let Some(top) = self.undo_stack.back_mut() {
            if top.can_merge_with(cmd.as_ref()) {
                top.merge_with(cmd);
                self.redo_stack.clear();
                return;
            }
        }
        self.undo_stack.push_back(cmd);
        self.redo_stack.clear();
        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }

    /// `true` if there is an entry to undo.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// `true` if there is an entry to redo.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo the most recent entry, moving it to the redo stack.
    pub fn undo(&mut self, ctx: &mut CommandContext<'_>) -> bool {
        let Some(mut cmd) = self.undo_stack.pop_back() else {
            return false;
        };
        cmd.undo(ctx);
        tracing::debug!(command_type = cmd.command_type(), "undo applied");
        self.redo_stack.push(cmd);
        true
    }

    /// Redo the most recently undone entry, re-applying it and moving it
    /// back onto the undo stack. A redo that fails to execute (e.g. a
    /// referenced node was since deleted by a remote peer) is dropped
    /// rather than pushed back onto either stack.
    pub fn redo(&mut self, ctx: &mut CommandContext<'_>) -> bool {
        let Some(mut cmd) = self.redo_stack.pop() else {
            return false;
        };
        match cmd.execute(ctx) {
            Ok(()) => {
                tracing::debug!(command_type = cmd.command_type(), "redo applied");
                self.undo_stack.push_back(cmd);
                true
            }
            Err(err) => {
                tracing::debug!(command_type = cmd.command_type(), %err, "redo failed, dropped");
                false
            }
        }
    }

    /// Number of entries currently on the undo stack.
    pub fn depth(&self) -> usize {
        self.undo_stack.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use canvas_commands::{MoveNode, Origin};
    use canvas_scene::{GraphId, Node, NodeId, NodeVariant, SceneGraph};

    fn no_media(_hash: &str) -> bool {
        false
    }

    fn graph_with_node() -> (SceneGraph, NodeId) {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph
            .add(Node::new(NodeId::Real(1), NodeVariant::Shape))
            .unwrap();
        (graph, id)
    }

    #[test]
    fn interaction_anchors_undo_to_pre_gesture_state() {
        let (mut graph, id) = graph_with_node();
        let mut mgr = UndoManager::new(10);
        mgr.begin_interaction(&graph, std::slice::from_ref(&id));

        // Two incremental moves during the same drag; only the final one
        // is handed to end_interaction.
        {
            let mut ctx = CommandContext::new(&mut graph, Origin::Local);
            let mut step1 = MoveNode::new(vec![id.clone()], vec![[5.0, 0.0]], Origin::Local);
            step1.execute(&mut ctx).unwrap();
        }
        let mut final_cmd = MoveNode::new(vec![id.clone()], vec![[10.0, 0.0]], Origin::Local);
        {
            let mut ctx = CommandContext::new(&mut graph, Origin::Local);
            final_cmd.execute(&mut ctx).unwrap();
        }
        {
            let ctx = CommandContext::new(&mut graph, Origin::Local);
            mgr.end_interaction(&ctx, Box::new(final_cmd), &no_media);
        }

        assert_eq!(graph.get(&id).unwrap().base.position, [10.0, 0.0]);
        let mut ctx = CommandContext::new(&mut graph, Origin::Local);
        assert!(mgr.undo(&mut ctx));
        assert_eq!(
            ctx.graph.get(&id).unwrap().base.position,
            [0.0, 0.0],
            "undo should restore the pre-interaction position, not the mid-drag one"
        );
    }

    #[test]
    fn cancel_interaction_restores_snapshot_without_pushing_undo_entry() {
        let (mut graph, id) = graph_with_node();
        let mut mgr = UndoManager::new(10);
        mgr.begin_interaction(&graph, std::slice::from_ref(&id));
        {
            let mut ctx = CommandContext::new(&mut graph, Origin::Local);
            let mut step = MoveNode::new(vec![id.clone()], vec![[99.0, 99.0]], Origin::Local);
            step.execute(&mut ctx).unwrap();
            mgr.cancel_interaction(&mut ctx);
        }
        assert_eq!(graph.get(&id).unwrap().base.position, [0.0, 0.0]);
        assert!(!mgr.can_undo());
    }

    #[test]
    fn end_interaction_drops_no_op_gesture_instead_of_pushing() {
        let (mut graph, id) = graph_with_node();
        let mut mgr = UndoManager::new(10);
        mgr.begin_interaction(&graph, std::slice::from_ref(&id));

        // Mouse down, no movement, mouse up: the node is still at the
        // position snapshotted by begin_interaction.
        let cmd = MoveNode::new(vec![id.clone()], vec![[0.0, 0.0]], Origin::Local);
        let ctx = CommandContext::new(&mut graph, Origin::Local);
        mgr.end_interaction(&ctx, Box::new(cmd), &no_media);

        assert!(!mgr.can_undo());
        assert_eq!(graph.get(&id).unwrap().base.position, [0.0, 0.0]);
    }

    #[test]
    fn redo_reapplies_after_undo() {
        let (mut graph, id) = graph_with_node();
        let mut mgr = UndoManager::new(10);
        let mut cmd = MoveNode::new(vec![id.clone()], vec![[3.0, 4.0]], Origin::Local);
        {
            let mut ctx = CommandContext::new(&mut graph, Origin::Local);
            cmd.execute(&mut ctx).unwrap();
            mgr.end_interaction(&ctx, Box::new(cmd), &no_media);
        }
        let mut ctx = CommandContext::new(&mut graph, Origin::Local);
        assert!(mgr.undo(&mut ctx));
        assert_eq!(ctx.graph.get(&id).unwrap().base.position, [0.0, 0.0]);
        assert!(mgr.redo(&mut ctx));
        assert_eq!(ctx.graph.get(&id).unwrap().base.position, [3.0, 4.0]);
    }

    #[test]
    fn push_clears_redo_stack() {
        let (mut graph, id) = graph_with_node();
        let other = graph
            .add(Node::new(NodeId::Real(2), NodeVariant::Shape))
            .unwrap();
        let mut mgr = UndoManager::new(10);
        let mut cmd = MoveNode::new(vec![id.clone()], vec![[1.0, 1.0]], Origin::Local);
        {
            let mut ctx = CommandContext::new(&mut graph, Origin::Local);
            cmd.execute(&mut ctx).unwrap();
            mgr.end_interaction(&ctx, Box::new(cmd), &no_media);
        }
        {
            let mut ctx = CommandContext::new(&mut graph, Origin::Local);
            mgr.undo(&mut ctx);
        }
        assert!(mgr.can_redo());

        // A different node set so this entry cannot merge with anything,
        // isolating push's own redo-clearing behavior.
        let mut cmd2 = MoveNode::new(vec![other], vec![[2.0, 2.0]], Origin::Local);
        let mut ctx = CommandContext::new(&mut graph, Origin::Local);
        cmd2.execute(&mut ctx).unwrap();
        mgr.push(Box::new(cmd2));
        assert!(!mgr.can_redo());
    }

    #[test]
    fn exceeding_max_depth_drops_oldest_entry() {
        let mut graph = SceneGraph::new(GraphId(1));
        let mut mgr = UndoManager::new(2);
        for i in 0..3u64 {
            // Distinct nodes per push so moves never merge, to exercise
            // capacity trimming in isolation.
            let id = graph
                .add(Node::new(NodeId::Real(i + 1), NodeVariant::Shape))
                .unwrap();
            let mut cmd = MoveNode::new(vec![id], vec![[1.0, 0.0]], Origin::Local);
            let mut ctx = CommandContext::new(&mut graph, Origin::Local);
            cmd.execute(&mut ctx).unwrap();
            mgr.end_interaction(&ctx, Box::new(cmd), &no_media);
        }
        assert_eq!(mgr.depth(), 2);
    }
}
