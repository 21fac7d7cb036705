// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Operation pipeline: the single entry point for scene mutations.
//!
//! `OperationPipeline` owns command validation/execution and a per-node
//! generation counter that guards against out-of-order remote application
//! on the same node, so commands keep applying in the order they're
//! dispatched for any given node. It has no notion of a server
//! connection, pending operations, or ACKs — that bookkeeping belongs to
//! `canvas-sync`, which calls into this crate to actually apply a command.
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

use canvas_commands::{Command, CommandContext, CommandError, ValidationError};
use canvas_scene::NodeId;
use std::collections::HashMap;
use thiserror::Error;

/// Failure from dispatching a command through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The command's precondition check failed; no state was mutated.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// The command failed during `execute`.
    #[error("command failed: {0}")]
    Command(#[from] CommandError),
}

/// Single entry point for mutations: validate, execute-if-optimistic,
/// guard per-node ordering. Holds no reference to the scene graph; every
/// call takes a [`CommandContext`] for its duration only.
#[derive(Default)]
pub struct OperationPipeline {
    generations: HashMap<NodeId, u64>,
}

impl OperationPipeline {
    /// Construct a pipeline with no recorded node generations.
    pub fn new() -> Self {
        Self {
            generations: HashMap::new(),
        }
    }

    /// Pure precondition check; never mutates `ctx`.
    pub fn validate(
        &self,
        ctx: &CommandContext<'_>,
        cmd: &dyn Command,
    ) -> Result<(), PipelineError> {
        cmd.validate(ctx).map_err(PipelineError::from)
    }

    /// Validate then execute a locally-originated command, recording the
    /// touched nodes' generations as the command's `command_type` name with
    /// no explicit sequence (local commands always apply; only remote
    /// reorderings are guarded).
    pub fn apply_local(
        &mut self,
        ctx: &mut CommandContext<'_>,
        cmd: &mut Box<dyn Command>,
        node_ids: &[NodeId],
    ) -> Result<(), PipelineError> {
        cmd.validate(ctx)?;
        cmd.execute(ctx)?;
        tracing::debug!(command_type = cmd.command_type(), "local command applied");
        let next = self.max_generation(node_ids) + 1;
        self.record_generations(node_ids, next);
        Ok(())
    }

    /// Validate then execute a remote (broadcast) command unconditionally,
    /// unless `op_seq` is stale relative to every touched node's recorded
    /// generation — a late-arriving reordering of a command already
    /// superseded locally. Returns `Ok(false)` without mutating state when
    /// the command was rejected as stale, `Ok(true)` when it was applied.
    pub fn apply_remote(
        &mut self,
        ctx: &mut CommandContext<'_>,
        cmd: &mut Box<dyn Command>,
        node_ids: &[NodeId],
        op_seq: u64,
    ) -> Result<bool, PipelineError> {
        if !node_ids.is_empty() && op_seq <= self.max_generation(node_ids) {
            tracing::debug!(
                command_type = cmd.command_type(),
                op_seq,
                "rejected stale remote reordering"
            );
            return Ok(false);
        }
        cmd.validate(ctx)?;
        cmd.execute(ctx)?;
        tracing::debug!(command_type = cmd.command_type(), op_seq, "remote command applied");
        self.record_generations(node_ids, op_seq);
        Ok(true)
    }

    /// Current generation recorded for `id`, `0` if never touched.
    pub fn generation(&self, id: &NodeId) -> u64 {
        self.generations.get(id).copied().unwrap_or(0)
    }

    /// Rekey a node's generation entry after a temp-id remap, so the
    /// ordering guard survives id resolution.
    pub fn remap_generation(&mut self, old: &NodeId, new: NodeId) {
        if let Some(gen) = self.generations.remove(old) {
            self.generations.insert(new, gen);
        }
    }

    fn max_generation(&self, node_ids: &[NodeId]) -> u64 {
        node_ids
            .iter()
            .map(|id| self.generation(id))
            .max()
            .unwrap_or(0)
    }

    fn record_generations(&mut self, node_ids: &[NodeId], gen: u64) {
        for id in node_ids {
            self.generations.insert(id.clone(), gen);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use canvas_commands::{MoveNode, Origin};
    use canvas_scene::{GraphId, Node, NodeVariant, SceneGraph};

    fn graph_with_node(id: NodeId) -> SceneGraph {
        let mut graph = SceneGraph::new(GraphId(1));
        graph.add(Node::new(id, NodeVariant::Shape)).unwrap();
        graph
    }

    #[test]
    fn apply_local_executes_and_bumps_generation() {
        let id = NodeId::Real(1);
        let mut graph = graph_with_node(id.clone());
        let mut pipeline = OperationPipeline::new();
        let mut cmd: Box<dyn Command> =
            Box::new(MoveNode::new(vec![id.clone()], vec![[5.0, 5.0]], Origin::Local));
        let mut ctx = CommandContext::new(&mut graph, Origin::Local);
        pipeline.apply_local(&mut ctx, &mut cmd, &[id.clone()]).unwrap();
        assert_eq!(ctx.graph.get(&id).unwrap().base.position, [5.0, 5.0]);
        assert_eq!(pipeline.generation(&id), 1);
    }

    #[test]
    fn apply_remote_rejects_stale_sequence() {
        let id = NodeId::Real(1);
        let mut graph = graph_with_node(id.clone());
        let mut pipeline = OperationPipeline::new();

        let mut first: Box<dyn Command> =
            Box::new(MoveNode::new(vec![id.clone()], vec![[1.0, 0.0]], Origin::Remote));
        let mut ctx = CommandContext::new(&mut graph, Origin::Remote);
        assert!(pipeline
            .apply_remote(&mut ctx, &mut first, &[id.clone()], 10)
            .unwrap());

        let mut stale: Box<dyn Command> =
            Box::new(MoveNode::new(vec![id.clone()], vec![[99.0, 0.0]], Origin::Remote));
        let mut ctx = CommandContext::new(&mut graph, Origin::Remote);
        let applied = pipeline
            .apply_remote(&mut ctx, &mut stale, &[id.clone()], 5)
            .unwrap();
        assert!(!applied);
        assert_eq!(ctx.graph.get(&id).unwrap().base.position, [1.0, 0.0]);
    }

    #[test]
    fn remap_generation_preserves_ordering_guard_across_id_resolution() {
        let mut pipeline = OperationPipeline::new();
        let temp = NodeId::Temp("temp_1".into());
        pipeline.record_generations(&[temp.clone()], 7);
        let real = NodeId::Real(42);
        pipeline.remap_generation(&temp, real.clone());
        assert_eq!(pipeline.generation(&real), 7);
        assert_eq!(pipeline.generation(&temp), 0);
    }
}
