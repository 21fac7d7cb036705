// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `node_move`, `node_resize`, `node_rotate`, `node_reset`.

use crate::catalog::{
    Command, CommandContext, CommandError, InteractionSnapshot, MediaResidencyCheck, Origin,
    ValidationError,
};
use canvas_scene::NodeId;
use std::any::Any;

fn snapshot_positions(
    ids: &[NodeId],
    ctx: &CommandContext<'_>,
    initial_state: Option<&InteractionSnapshot>,
) -> Vec<[f64; 2]> {
    ids.iter()
        .map(|id| {
            if let Some(snap) = initial_state {
                if let Some(pos) = snap.positions.get(id) {
                    return *pos;
                }
            }
            ctx.graph.get(id).map_or([0.0, 0.0], |n| n.base.position)
        })
        .collect()
}

/// `node_move`: single or batch position update, mergeable across
/// consecutive drags from the same origin targeting the same node set.
#[derive(Debug)]
pub struct MoveNode {
    /// Nodes being moved.
    pub node_ids: Vec<NodeId>,
    /// New positions, parallel to `node_ids`.
    pub positions: Vec<[f64; 2]>,
    origin: Origin,
    initial_positions: Option<Vec<[f64; 2]>>,
}

impl MoveNode {
    /// Construct a pending move command.
    pub fn new(node_ids: Vec<NodeId>, positions: Vec<[f64; 2]>, origin: Origin) -> Self {
        Self {
            node_ids,
            positions,
            origin,
            initial_positions: None,
        }
    }
}

impl Command for MoveNode {
    fn command_type(&self) -> &'static str {
        "node_move"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() || self.node_ids.len() != self.positions.len() {
            return Err(ValidationError::new(
                "node_move: node_ids/positions length mismatch",
            ));
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.initial_positions.is_none() {
            self.initial_positions = Some(snapshot_positions(&self.node_ids, ctx, initial_state));
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let single = self.node_ids.len() == 1;
        let mut last_err = None;
        for (id, pos) in self.node_ids.clone().into_iter().zip(self.positions.clone()) {
            match ctx.require_mut(&id) {
                Ok(node) => {
                    node.base.position = pos;
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
        let Some(initial) = self.initial_positions.clone() else {
            return;
        };
        for (id, pos) in self.node_ids.clone().into_iter().zip(initial) {
            if let Some(node) = ctx.graph.get_mut(&id) {
                node.base.position = pos;
                ctx.graph.mark_updated(&id);
            }
        }
    }

    fn can_merge_with(&self, other: &dyn Command) -> bool {
        let Some(other) = other.as_any().downcast_ref::<MoveNode>() else {
            return false;
        };
        other.origin == self.origin && other.node_ids == self.node_ids
    }

    fn merge_with(&mut self, other: Box<dyn Command>) {
        if let Ok(other) = (other as Box<dyn Any>).downcast::<MoveNode>() {
            self.positions = other.positions;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// `node_resize`.
#[derive(Debug)]
pub struct ResizeNode {
    /// Nodes being resized.
    pub node_ids: Vec<NodeId>,
    /// New sizes, parallel to `node_ids`.
    pub sizes: Vec<[f64; 2]>,
    /// Explicit positions, when the caller already computed them.
    pub positions: Option<Vec<[f64; 2]>>,
    origin: Origin,
    initial_sizes: Option<Vec<[f64; 2]>>,
    initial_positions: Option<Vec<[f64; 2]>>,
    initial_aspects: Option<Vec<f64>>,
    initial_locked_aspect_values: Option<Vec<Option<f64>>>,
}

impl ResizeNode {
    /// Construct a pending resize command.
    pub fn new(
        node_ids: Vec<NodeId>,
        sizes: Vec<[f64; 2]>,
        positions: Option<Vec<[f64; 2]>>,
        origin: Origin,
    ) -> Self {
        Self {
            node_ids,
            sizes,
            positions,
            origin,
            initial_sizes: None,
            initial_positions: None,
            initial_aspects: None,
            initial_locked_aspect_values: None,
        }
    }
}

fn aspect_of(size: [f64; 2]) -> Option<f64> {
    if size[1].abs() > f64::EPSILON {
        Some(size[0] / size[1])
    } else {
        None
    }
}

impl Command for ResizeNode {
    fn command_type(&self) -> &'static str {
        "node_resize"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() || self.node_ids.len() != self.sizes.len() {
            return Err(ValidationError::new(
                "node_resize: node_ids/sizes length mismatch",
            ));
        }
        if let Some(positions) = &self.positions {
            if positions.len() != self.node_ids.len() {
                return Err(ValidationError::new(
                    "node_resize: positions length mismatch",
                ));
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
        if self.initial_sizes.is_some() {
            return;
        }
        let mut sizes = Vec::with_capacity(self.node_ids.len());
        let mut positions = Vec::with_capacity(self.node_ids.len());
        let mut aspects = Vec::with_capacity(self.node_ids.len());
        let mut locked = Vec::with_capacity(self.node_ids.len());
        for id in &self.node_ids {
            let size = initial_state
                .and_then(|s| s.sizes.get(id).copied())
                .or_else(|| ctx.graph.get(id).map(|n| n.base.size))
                .unwrap_or([0.0, 0.0]);
            let position = initial_state
                .and_then(|s| s.positions.get(id).copied())
                .or_else(|| ctx.graph.get(id).map(|n| n.base.position))
                .unwrap_or([0.0, 0.0]);
            let (aspect, lock) = ctx
                .graph
                .get(id)
                .map_or((1.0, None), |n| (n.base.aspect_ratio, n.base.locked_aspect_value));
            sizes.push(size);
            positions.push(position);
            aspects.push(aspect);
            locked.push(lock);
        }
        self.initial_sizes = Some(sizes);
        self.initial_positions = Some(positions);
        self.initial_aspects = Some(aspects);
        self.initial_locked_aspect_values = Some(locked);
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let single = self.node_ids.len() == 1;
        let mut last_err = None;
        for (i, id) in self.node_ids.clone().into_iter().enumerate() {
            let size = self.sizes[i];
            let explicit_position = self.positions.as_ref().map(|p| p[i]);
            match ctx.require_mut(&id) {
                Ok(node) => {
                    let old_center = [
                        node.base.position[0] + node.base.size[0] / 2.0,
                        node.base.position[1] + node.base.size[1] / 2.0,
                    ];
                    let rotated = node.base.rotation.abs() > f64::EPSILON;

                    node.base.size = size;
                    if let Some(new_aspect) = aspect_of(size) {
                        node.base.aspect_ratio = new_aspect;
                        if node.base.locked_aspect_ratio {
                            node.base.locked_aspect_value = Some(new_aspect);
                        }
                    }

                    if let Some(pos) = explicit_position {
                        node.base.position = pos;
                    } else if rotated && self.origin == Origin::Local {
                        // Center-preserving recompute for rotated nodes
                        // without an explicit target position.
                        node.base.position = [
                            old_center[0] - size[0] / 2.0,
                            old_center[1] - size[1] / 2.0,
                        ];
                    }
                    // Remote origin does not recompute center or call any
                    // resize hook, to preserve the sender's non-uniform
                    // scale exactly.
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
        let (Some(sizes), Some(positions), Some(aspects), Some(locked)) = (
            self.initial_sizes.clone(),
            self.initial_positions.clone(),
            self.initial_aspects.clone(),
            self.initial_locked_aspect_values.clone(),
        ) else {
            return;
        };
        for (i, id) in self.node_ids.clone().into_iter().enumerate() {
            if let Some(node) = ctx.graph.get_mut(&id) {
                node.base.size = sizes[i];
                node.base.position = positions[i];
                node.base.aspect_ratio = aspects[i];
                node.base.locked_aspect_value = locked[i];
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

/// `node_rotate`.
#[derive(Debug)]
pub struct RotateNode {
    /// Nodes being rotated.
    pub node_ids: Vec<NodeId>,
    /// New rotations, parallel to `node_ids`.
    pub rotations: Vec<f64>,
    /// Positions, supplied when rotation is about a shared center.
    pub positions: Option<Vec<[f64; 2]>>,
    initial_rotations: Option<Vec<f64>>,
    initial_positions: Option<Vec<[f64; 2]>>,
}

impl RotateNode {
    /// Construct a pending rotate command.
    pub fn new(node_ids: Vec<NodeId>, rotations: Vec<f64>, positions: Option<Vec<[f64; 2]>>) -> Self {
        Self {
            node_ids,
            rotations,
            positions,
            initial_rotations: None,
            initial_positions: None,
        }
    }
}

impl Command for RotateNode {
    fn command_type(&self) -> &'static str {
        "node_rotate"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() || self.node_ids.len() != self.rotations.len() {
            return Err(ValidationError::new(
                "node_rotate: node_ids/rotations length mismatch",
            ));
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.initial_rotations.is_some() {
            return;
        }
        let rotations = self
            .node_ids
            .iter()
            .map(|id| {
                initial_state
                    .and_then(|s| s.rotations.get(id).copied())
                    .or_else(|| ctx.graph.get(id).map(|n| n.base.rotation))
                    .unwrap_or(0.0)
            })
            .collect();
        let positions = self
            .node_ids
            .iter()
            .map(|id| ctx.graph.get(id).map_or([0.0, 0.0], |n| n.base.position))
            .collect();
        self.initial_rotations = Some(rotations);
        self.initial_positions = Some(positions);
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let single = self.node_ids.len() == 1;
        let mut last_err = None;
        for (i, id) in self.node_ids.clone().into_iter().enumerate() {
            let rotation = self.rotations[i];
            let position = self.positions.as_ref().map(|p| p[i]);
            match ctx.require_mut(&id) {
                Ok(node) => {
                    node.base.rotation = rotation;
                    if let Some(pos) = position {
                        node.base.position = pos;
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
        let (Some(rotations), Some(positions)) = (
            self.initial_rotations.clone(),
            self.initial_positions.clone(),
        ) else {
            return;
        };
        for (i, id) in self.node_ids.clone().into_iter().enumerate() {
            if let Some(node) = ctx.graph.get_mut(&id) {
                node.base.rotation = rotations[i];
                node.base.position = positions[i];
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

/// `node_reset`: rotation back to zero and/or aspect ratio back to its
/// value at creation time.
#[derive(Debug)]
pub struct ResetNode {
    /// Nodes being reset.
    pub node_ids: Vec<NodeId>,
    /// Reset rotation to zero.
    pub reset_rotation: bool,
    /// Reset aspect ratio to `original_aspect`.
    pub reset_aspect_ratio: bool,
    initial_rotations: Option<Vec<f64>>,
    initial_aspects: Option<Vec<f64>>,
}

impl ResetNode {
    /// Construct a pending reset command.
    pub fn new(node_ids: Vec<NodeId>, reset_rotation: bool, reset_aspect_ratio: bool) -> Self {
        Self {
            node_ids,
            reset_rotation,
            reset_aspect_ratio,
            initial_rotations: None,
            initial_aspects: None,
        }
    }
}

impl Command for ResetNode {
    fn command_type(&self) -> &'static str {
        "node_reset"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() {
            return Err(ValidationError::new("node_reset: no node ids supplied"));
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.initial_rotations.is_some() {
            return;
        }
        self.initial_rotations = Some(
            self.node_ids
                .iter()
                .map(|id| ctx.graph.get(id).map_or(0.0, |n| n.base.rotation))
                .collect(),
        );
        self.initial_aspects = Some(
            self.node_ids
                .iter()
                .map(|id| ctx.graph.get(id).map_or(1.0, |n| n.base.aspect_ratio))
                .collect(),
        );
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let single = self.node_ids.len() == 1;
        let mut last_err = None;
        for id in self.node_ids.clone() {
            match ctx.require_mut(&id) {
                Ok(node) => {
                    if self.reset_rotation {
                        node.base.rotation = 0.0;
                    }
                    if self.reset_aspect_ratio {
                        node.base.aspect_ratio = node.base.original_aspect;
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
        let (Some(rotations), Some(aspects)) =
            (self.initial_rotations.clone(), self.initial_aspects.clone())
        else {
            return;
        };
        for (i, id) in self.node_ids.clone().into_iter().enumerate() {
            if let Some(node) = ctx.graph.get_mut(&id) {
                node.base.rotation = rotations[i];
                node.base.aspect_ratio = aspects[i];
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
    fn move_merge_replaces_positions_keeps_original_undo() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();

        let mut first = MoveNode::new(vec![id.clone()], vec![[10.0, 0.0]], Origin::Local);
        let mut second = MoveNode::new(vec![id.clone()], vec![[30.0, 0.0]], Origin::Local);
        assert!(first.can_merge_with(&second));

        {
            let c = ctx(&mut graph, Origin::Local);
            first.prepare_undo(&c, None, &|_| false);
        }
        {
            let c = ctx(&mut graph, Origin::Local);
            second.prepare_undo(&c, None, &|_| false);
        }
        first.merge_with(Box::new(second));
        assert_eq!(first.positions, vec![[30.0, 0.0]]);

        let mut c = ctx(&mut graph, Origin::Local);
        first.execute(&mut c).unwrap();
        assert_eq!(c.graph.get(&id).unwrap().base.position, [30.0, 0.0]);
        first.undo(&mut c);
        assert_eq!(c.graph.get(&id).unwrap().base.position, [0.0, 0.0]);
    }

    #[test]
    fn resize_rotated_local_recomputes_center() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();
        {
            let node = graph.get_mut(&id).unwrap();
            node.base.position = [0.0, 0.0];
            node.base.size = [10.0, 10.0];
            node.base.rotation = 0.5;
        }

        let mut cmd = ResizeNode::new(vec![id.clone()], vec![[20.0, 20.0]], None, Origin::Local);
        let mut c = ctx(&mut graph, Origin::Local);
        cmd.prepare_undo(&c, None, &|_| false);
        cmd.execute(&mut c).unwrap();
        // old center was [5,5]; new size [20,20] centered there -> pos [-5,-5]
        assert_eq!(c.graph.get(&id).unwrap().base.position, [-5.0, -5.0]);
    }

    #[test]
    fn reset_restores_rotation_and_aspect() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();
        {
            let node = graph.get_mut(&id).unwrap();
            node.base.rotation = 1.2;
            node.base.aspect_ratio = 2.0;
            node.base.original_aspect = 1.0;
        }

        let mut cmd = ResetNode::new(vec![id.clone()], true, true);
        let mut c = ctx(&mut graph, Origin::Local);
        cmd.prepare_undo(&c, None, &|_| false);
        cmd.execute(&mut c).unwrap();
        let node = c.graph.get(&id).unwrap();
        assert_eq!(node.base.rotation, 0.0);
        assert_eq!(node.base.aspect_ratio, 1.0);

        cmd.undo(&mut c);
        let node = c.graph.get(&id).unwrap();
        assert_eq!(node.base.rotation, 1.2);
        assert_eq!(node.base.aspect_ratio, 2.0);
    }
}
