// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Top-level façade wiring the whole collaborative canvas edit engine for
//! an embedder. Data flows one way, end to end:
//!
//! ```text
//! user gesture → AlignmentEngine or direct command → OperationPipeline →
//!   {optimistic local apply; pipeline sends to server} →
//!   StateSyncManager awaits ACK/broadcast → reconciles →
//!   SceneGraph notifies renderer
//! ```
//!
//! [`CanvasEngine`] owns one instance of every component and exposes
//! the handful of cross-cutting flows that need more than one component at
//! once — dispatching a command, finishing an alignment interaction. Every
//! component is also reachable directly through an accessor, since most of
//! an embedder's work (building commands, driving the render loop, talking
//! to a transport) has no business living in this crate.

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

use canvas_align::AlignmentEngine;
use canvas_app_core::{CanvasConfig, CanvasError, NotificationService};
use canvas_commands::{Command, CommandContext, CommandError, Origin, ValidationError};
use canvas_groups::GroupManager;
use canvas_media::{ImageResourceCache, UploadCoordinator};
use canvas_pipeline::{OperationPipeline, PipelineError};
use canvas_scene::{GraphId, NodeId, SceneGraph};
use canvas_sync::StateSyncManager;
use canvas_undo::UndoManager;
use std::time::Instant;

/// Notification queue capacity, matching [`canvas_app_core::notify`]'s own
/// test default rather than a new config knob.
pub const NOTIFICATION_CAPACITY: usize = 20;

/// The whole engine: one [`SceneGraph`] plus every component that mutates
/// or observes it.
pub struct CanvasEngine {
    graph: SceneGraph,
    pipeline: OperationPipeline,
    sync: StateSyncManager,
    undo: UndoManager,
    media_cache: ImageResourceCache,
    uploads: UploadCoordinator,
    align: AlignmentEngine,
    groups: GroupManager,
    notifications: NotificationService,
    config: CanvasConfig,
}

impl CanvasEngine {
    /// Construct an engine over a fresh graph identified by `graph_id`,
    /// tuned by `config`.
    pub fn new(graph_id: GraphId, config: CanvasConfig) -> Self {
        Self {
            graph: SceneGraph::new(graph_id),
            pipeline: OperationPipeline::new(),
            sync: StateSyncManager::new(&config),
            undo: UndoManager::new(config.undo_stack_depth),
            media_cache: ImageResourceCache::new(),
            uploads: UploadCoordinator::new(&config),
            align: AlignmentEngine::new(),
            groups: GroupManager::new(),
            notifications: NotificationService::new(NOTIFICATION_CAPACITY),
            config,
        }
    }

    /// The scene graph.
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// The scene graph, mutably.
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// The operation pipeline.
    pub fn pipeline_mut(&mut self) -> &mut OperationPipeline {
        &mut self.pipeline
    }

    /// The state sync manager.
    pub fn sync_mut(&mut self) -> &mut StateSyncManager {
        &mut self.sync
    }

    /// The undo/redo stack.
    pub fn undo_mut(&mut self) -> &mut UndoManager {
        &mut self.undo
    }

    /// The image resource cache.
    pub fn media_cache_mut(&mut self) -> &mut ImageResourceCache {
        &mut self.media_cache
    }

    /// The upload coordinator.
    pub fn uploads_mut(&mut self) -> &mut UploadCoordinator {
        &mut self.uploads
    }

    /// The alignment engine.
    pub fn align_mut(&mut self) -> &mut AlignmentEngine {
        &mut self.align
    }

    /// The group manager.
    pub fn groups_mut(&mut self) -> &mut GroupManager {
        &mut self.groups
    }

    /// The notification queue.
    pub fn notifications_mut(&mut self) -> &mut NotificationService {
        &mut self.notifications
    }

    /// The tunable configuration this engine was constructed with.
    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    /// Dispatch a locally-issued command: optimistically applies it (unless
    /// its command type is authority-only, e.g. `group_create`) then
    /// records it as pending under `op_id` awaiting server resolution.
    ///
    /// `node_ids` are the ids the command touches, used for the pipeline's
    /// per-node ordering guard and the sync manager's pending-table entry.
    pub fn dispatch_local(
        &mut self,
        op_id: u64,
        mut cmd: Box<dyn Command>,
        node_ids: Vec<NodeId>,
        now: Instant,
    ) -> Result<(), CanvasError> {
        if self.sync.is_optimistic(cmd.command_type()) {
            let mut ctx = CommandContext::new(&mut self.graph, Origin::Local);
            ctx.alignment_animating = self.align.is_active();
            self.pipeline
                .apply_local(&mut ctx, &mut cmd, &node_ids)
                .map_err(pipeline_error_to_canvas_error)?;
        }
        self.sync.submit(op_id, cmd.command_type(), node_ids, now);
        Ok(())
    }

    /// Apply a remotely-broadcast command at server sequence `op_seq`.
    /// Returns `Ok(false)` without mutating state if `op_seq` was rejected
    /// by the global sequence guard or the pipeline's per-node generation
    /// guard (a stale reordering); `Ok(true)` once applied.
    pub fn apply_remote(
        &mut self,
        mut cmd: Box<dyn Command>,
        node_ids: Vec<NodeId>,
        op_seq: u64,
    ) -> Result<bool, CanvasError> {
        if !self.sync.accept_seq(op_seq) {
            return Ok(false);
        }
        let mut ctx = CommandContext::new(&mut self.graph, Origin::Remote);
        self.pipeline
            .apply_remote(&mut ctx, &mut cmd, &node_ids, op_seq)
            .map_err(pipeline_error_to_canvas_error)
    }

    /// Open an interaction-scoped undo snapshot over `node_ids`.
    pub fn begin_interaction(&mut self, node_ids: &[NodeId]) {
        self.undo.begin_interaction(&self.graph, node_ids);
    }

    /// Abandon the open interaction, restoring every snapshotted node.
    pub fn cancel_interaction(&mut self) {
        let mut ctx = CommandContext::new(&mut self.graph, Origin::Local);
        self.undo.cancel_interaction(&mut ctx);
    }

    /// Advance the alignment engine's springs by `dt`. No-op if nothing is
    /// armed.
    pub fn tick_alignment(&mut self, dt: std::time::Duration) {
        self.align.tick(dt);
    }

    /// Finish the armed alignment interaction: builds its `node_align`
    /// command, applies it through the pipeline, hands it to
    /// `UndoManager::end_interaction`, records it as pending, and recomputes
    /// bounds (expand-only) for any parent group that wasn't itself part of
    /// the interaction but contains a moved child — modeled here as a direct
    /// bounds write rather than a second round-tripped command, since it's
    /// derived bookkeeping rather than user intent.
    ///
    /// Returns `false` if nothing was armed or the interaction never
    /// committed to an axis.
    pub fn finish_alignment(&mut self, op_id: u64, now: Instant) -> bool {
        let externals = self.align.external_parent_groups(&self.graph);
        let Some(outcome) = self.align.finish() else {
            return false;
        };
        let node_ids = outcome.node_ids.clone();
        let mut cmd: Box<dyn Command> = Box::new(outcome.into_command());

        {
            let mut ctx = CommandContext::new(&mut self.graph, Origin::Local);
            if let Err(err) = self.pipeline.apply_local(&mut ctx, &mut cmd, &node_ids) {
                tracing::debug!(%err, "node_align apply failed");
            }
        }
        {
            let ctx = CommandContext::new(&mut self.graph, Origin::Local);
            let cache = &self.media_cache;
            self.undo.end_interaction(&ctx, cmd, &|hash| cache.has(hash));
        }
        self.sync.submit(op_id, "node_align", node_ids, now);

        for group_id in externals {
            self.groups.update_bounds(&mut self.graph, &group_id, now, true);
        }
        true
    }

    /// Undo the most recent entry.
    pub fn undo(&mut self) -> bool {
        let mut ctx = CommandContext::new(&mut self.graph, Origin::Local);
        self.undo.undo(&mut ctx)
    }

    /// Redo the most recently undone entry.
    pub fn redo(&mut self) -> bool {
        let mut ctx = CommandContext::new(&mut self.graph, Origin::Local);
        self.undo.redo(&mut ctx)
    }
}

fn pipeline_error_to_canvas_error(err: PipelineError) -> CanvasError {
    match err {
        PipelineError::Validation(ValidationError(msg)) => CanvasError::Validation(msg),
        PipelineError::Command(CommandError::NodeNotFound(id)) => {
            CanvasError::NodeNotFound(id.to_string())
        }
        PipelineError::Command(CommandError::InvalidType { command, id }) => {
            CanvasError::Validation(format!("invalid node type for {command}: {id}"))
        }
        PipelineError::Command(CommandError::Validation(msg)) => CanvasError::Validation(msg),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use canvas_commands::MoveNode;
    use canvas_scene::{Node, NodeVariant};

    fn engine() -> CanvasEngine {
        CanvasEngine::new(GraphId(1), CanvasConfig::default())
    }

    #[test]
    fn dispatch_local_applies_optimistic_commands_immediately() {
        let mut eng = engine();
        let id = eng.graph_mut().add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();

        let cmd = MoveNode::new(vec![id.clone()], vec![[10.0, 5.0]], Origin::Local);
        eng.dispatch_local(1, Box::new(cmd), vec![id.clone()], Instant::now()).unwrap();

        assert_eq!(eng.graph().get(&id).unwrap().base.position, [10.0, 5.0]);
        assert!(eng.sync_mut().is_pending(1));
    }

    #[test]
    fn finish_alignment_commits_positions_and_pushes_one_undo_entry() {
        let mut eng = engine();
        let a = eng.graph_mut().add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();
        let b = eng.graph_mut().add(Node::new(NodeId::Real(2), NodeVariant::Shape)).unwrap();
        if let Some(node) = eng.graph_mut().get_mut(&b) {
            node.base.position = [100.0, 0.0];
        }

        assert!(eng.align_mut().start_linear(&eng.graph, &[a.clone(), b.clone()]));
        eng.align_mut().update_linear([canvas_align::ANIMATION_THRESHOLD + 5.0, 0.0]);
        for _ in 0..600 {
            eng.tick_alignment(std::time::Duration::from_millis(16));
        }

        let now = Instant::now();
        assert!(eng.finish_alignment(7, now));
        assert!(eng.undo_mut().can_undo());
        assert!(eng.sync_mut().is_pending(7));
    }

    #[test]
    fn apply_remote_rejects_stale_sequence() {
        let mut eng = engine();
        let id = eng.graph_mut().add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();

        let first = MoveNode::new(vec![id.clone()], vec![[1.0, 0.0]], Origin::Remote);
        assert!(eng.apply_remote(Box::new(first), vec![id.clone()], 5).unwrap());

        let stale = MoveNode::new(vec![id.clone()], vec![[99.0, 0.0]], Origin::Remote);
        assert!(!eng.apply_remote(Box::new(stale), vec![id.clone()], 5).unwrap());
        assert_eq!(eng.graph().get(&id).unwrap().base.position, [1.0, 0.0]);
    }
}
