// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `node_align`: writes AlignmentEngine-computed targets onto nodes.
//!
//! This command never computes positions itself — the spring-physics
//! solver in `canvas-align` does that and calls the pipeline with the
//! result. During an active local alignment animation the command is a
//! deliberate no-op, so the animator's per-frame writes aren't raced by a
//! stale command replay.

use crate::catalog::{
    Command, CommandContext, CommandError, InteractionSnapshot, MediaResidencyCheck, Origin,
    ValidationError,
};
use canvas_scene::NodeId;
use std::any::Any;

/// Which axis the alignment interaction committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignAxis {
    /// Single horizontal line.
    Horizontal,
    /// Single vertical line.
    Vertical,
    /// Grid layout.
    Grid,
}

/// `node_align`.
#[derive(Debug)]
pub struct AlignNode {
    /// Nodes being aligned.
    pub node_ids: Vec<NodeId>,
    /// Target positions, parallel to `node_ids`.
    pub positions: Vec<[f64; 2]>,
    /// Target sizes (groups animate size along with position).
    pub sizes: Option<Vec<[f64; 2]>>,
    /// Axis this interaction committed to.
    pub axis: AlignAxis,
    initial_positions: Option<Vec<[f64; 2]>>,
    initial_sizes: Option<Vec<[f64; 2]>>,
}

impl AlignNode {
    /// Construct a pending align command.
    pub fn new(
        node_ids: Vec<NodeId>,
        positions: Vec<[f64; 2]>,
        sizes: Option<Vec<[f64; 2]>>,
        axis: AlignAxis,
    ) -> Self {
        Self {
            node_ids,
            positions,
            sizes,
            axis,
            initial_positions: None,
            initial_sizes: None,
        }
    }
}

impl Command for AlignNode {
    fn command_type(&self) -> &'static str {
        "node_align"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() || self.node_ids.len() != self.positions.len() {
            return Err(ValidationError::new(
                "node_align: node_ids/positions length mismatch",
            ));
        }
        if let Some(sizes) = &self.sizes {
            if sizes.len() != self.node_ids.len() {
                return Err(ValidationError::new("node_align: sizes length mismatch"));
            }
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.initial_positions.is_some() {
            return;
        }
        self.initial_positions = Some(
            self.node_ids
                .iter()
                .map(|id| {
                    initial_state
                        .and_then(|s| s.positions.get(id).copied())
                        .or_else(|| ctx.graph.get(id).map(|n| n.base.position))
                        .unwrap_or([0.0, 0.0])
                })
                .collect(),
        );
        if self.sizes.is_some() {
            self.initial_sizes = Some(
                self.node_ids
                    .iter()
                    .map(|id| ctx.graph.get(id).map_or([0.0, 0.0], |n| n.base.size))
                    .collect(),
            );
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        if ctx.origin == Origin::Local && ctx.alignment_animating {
            return Ok(());
        }
        let single = self.node_ids.len() == 1;
        let mut last_err = None;
        for (i, id) in self.node_ids.clone().into_iter().enumerate() {
            match ctx.require_mut(&id) {
                Ok(node) => {
                    node.base.position = self.positions[i];
                    if let Some(sizes) = &self.sizes {
                        node.base.size = sizes[i];
                    }
                    ctx.graph.mark_updated(&id);
                }
                Err(e) => last_err = Some(e),
            }
        }
        if single {
            if let Some(e) = last_err {
                return Err(e);
            }
        }
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(positions) = self.initial_positions.clone() else {
            return;
        };
        for (i, id) in self.node_ids.clone().into_iter().enumerate() {
            if let Some(node) = ctx.graph.get_mut(&id) {
                node.base.position = positions[i];
                if let Some(sizes) = &self.initial_sizes {
                    node.base.size = sizes[i];
                }
                ctx.graph.mark_updated(&id);
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use canvas_scene::{GraphId, Node, NodeVariant, SceneGraph};

    fn ctx(graph: &mut SceneGraph, origin: Origin) -> CommandContext<'_> {
        CommandContext::new(graph, origin)
    }

    #[test]
    fn skipped_during_local_alignment_animation() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();

        let mut cmd = AlignNode::new(vec![id.clone()], vec![[99.0, 99.0]], None, AlignAxis::Horizontal);
        let mut c = ctx(&mut graph, Origin::Local);
        c.alignment_animating = true;
        cmd.execute(&mut c).unwrap();
        assert_eq!(c.graph.get(&id).unwrap().base.position, [0.0, 0.0]);
    }

    #[test]
    fn applies_and_undoes_target_positions() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();

        let mut cmd = AlignNode::new(vec![id.clone()], vec![[50.0, 0.0]], None, AlignAxis::Horizontal);
        let mut c = ctx(&mut graph, Origin::Local);
        cmd.prepare_undo(&c, None, &|_| false);
        cmd.execute(&mut c).unwrap();
        assert_eq!(c.graph.get(&id).unwrap().base.position, [50.0, 0.0]);
        cmd.undo(&mut c);
        assert_eq!(c.graph.get(&id).unwrap().base.position, [0.0, 0.0]);
    }
}
