// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `group_create`, `group_add_node`, `group_remove_node`, `group_move`,
//! `group_resize`, `group_toggle_collapsed`, `group_update_style`.
//!
//! Whether `group_create` gets applied locally before the server confirms
//! (it doesn't — group creation is server-authoritative) is a
//! `canvas-sync` policy decision, not something this command enforces;
//! the command itself is a plain, unconditional create so it behaves
//! identically whether invoked for `Origin::Remote` or `Origin::Server`.

use crate::catalog::{
    Command, CommandContext, CommandError, InteractionSnapshot, MediaResidencyCheck, Origin,
    ValidationError,
};
use canvas_scene::{GroupFields, GroupStyle, Node, NodeId, NodeVariant};
use std::any::Any;
use std::collections::BTreeSet;

fn detach_from_current_group(ctx: &mut CommandContext<'_>, child: &NodeId) -> Option<NodeId> {
    let prior_group = ctx.graph.get(child).and_then(|n| n.base.parent_group.clone());
    if let Some(old_group) = &prior_group {
        if let Some(group_node) = ctx.graph.get_mut(old_group) {
            if let Some(group) = group_node.variant.as_group_mut() {
                group.child_nodes.remove(child);
            }
        }
    }
    prior_group
}

/// `group_create`: builds a group node containing the given children.
#[derive(Debug)]
pub struct GroupCreate {
    /// Explicit id, when the server already assigned one.
    pub id: Option<NodeId>,
    /// Children to enclose.
    pub child_node_ids: Vec<NodeId>,
    /// Initial position.
    pub position: [f64; 2],
    /// Initial size.
    pub size: [f64; 2],
    /// Minimum frame size.
    pub min_size: [f64; 2],
    /// Visual style.
    pub style: GroupStyle,
    origin: Origin,
    created_id: Option<NodeId>,
}

impl GroupCreate {
    /// Construct a pending group-create command.
    pub fn new(
        id: Option<NodeId>,
        child_node_ids: Vec<NodeId>,
        position: [f64; 2],
        size: [f64; 2],
        min_size: [f64; 2],
        style: GroupStyle,
        origin: Origin,
    ) -> Self {
        Self {
            id,
            child_node_ids,
            position,
            size,
            min_size,
            style,
            origin,
            created_id: None,
        }
    }
}

impl Command for GroupCreate {
    fn command_type(&self) -> &'static str {
        "group_create"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.child_node_ids.is_empty() {
            return Err(ValidationError::new("group_create: no children supplied"));
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        _ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let id = match self.id.clone() {
            Some(id) => id,
            None if self.origin == Origin::Local => ctx.graph.mint_temp_group_id(),
            None => ctx.graph.next_real_id(),
        };

        let mut group = Node::new(
            id.clone(),
            NodeVariant::Group(GroupFields {
                child_nodes: self.child_node_ids.iter().cloned().collect(),
                is_collapsed: false,
                style: self.style.clone(),
                min_size: self.min_size,
                alignment_just_completed: false,
            }),
        );
        group.base.position = self.position;
        group.base.size = self.size;
        ctx.graph.add(group)?;

        for child in self.child_node_ids.clone() {
            detach_from_current_group(ctx, &child);
            if let Some(node) = ctx.graph.get_mut(&child) {
                node.base.parent_group = Some(id.clone());
            }
        }

        self.created_id = Some(id);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(id) = self.created_id.take() else {
            return;
        };
        for child in &self.child_node_ids {
            if let Some(node) = ctx.graph.get_mut(child) {
                node.base.parent_group = None;
            }
        }
        let _ = ctx.graph.remove(&id);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// `group_add_node`.
#[derive(Debug)]
pub struct GroupAddNode {
    /// Group receiving the node.
    pub group_id: NodeId,
    /// Node being added.
    pub node_id: NodeId,
    prior_group: Option<Option<NodeId>>,
}

impl GroupAddNode {
    /// Construct a pending add command.
    pub fn new(group_id: NodeId, node_id: NodeId) -> Self {
        Self {
            group_id,
            node_id,
            prior_group: None,
        }
    }
}

impl Command for GroupAddNode {
    fn command_type(&self) -> &'static str {
        "group_add_node"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        ctx.graph
            .get(&self.group_id)
            .filter(|n| n.variant.as_group().is_some())
            .ok_or_else(|| ValidationError::new("group_add_node: group not found"))?;
        ctx.graph
            .get(&self.node_id)
            .ok_or_else(|| ValidationError::new("group_add_node: node not found"))?;
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.prior_group.is_some() {
            return;
        }
        self.prior_group = Some(
            ctx.graph
                .get(&self.node_id)
                .and_then(|n| n.base.parent_group.clone()),
        );
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        detach_from_current_group(ctx, &self.node_id);
        let group = ctx
            .graph
            .get_mut(&self.group_id)
            .ok_or_else(|| CommandError::NodeNotFound(self.group_id.clone()))?;
        let Some(fields) = group.variant.as_group_mut() else {
            return Err(CommandError::InvalidType {
                command: "group_add_node",
                id: self.group_id.clone(),
            });
        };
        fields.child_nodes.insert(self.node_id.clone());
        let node = ctx.require_mut(&self.node_id)?;
        node.base.parent_group = Some(self.group_id.clone());
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        if let Some(group) = ctx.graph.get_mut(&self.group_id) {
            if let Some(fields) = group.variant.as_group_mut() {
                fields.child_nodes.remove(&self.node_id);
            }
        }
        if let Some(node) = ctx.graph.get_mut(&self.node_id) {
            node.base.parent_group = self.prior_group.clone().flatten();
        }
        if let Some(prior) = self.prior_group.clone().flatten() {
            if let Some(group) = ctx.graph.get_mut(&prior) {
                if let Some(fields) = group.variant.as_group_mut() {
                    fields.child_nodes.insert(self.node_id.clone());
                }
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

/// `group_remove_node`.
#[derive(Debug)]
pub struct GroupRemoveNode {
    /// Group losing the node.
    pub group_id: NodeId,
    /// Node being removed.
    pub node_id: NodeId,
    was_member: bool,
}

impl GroupRemoveNode {
    /// Construct a pending remove command.
    pub fn new(group_id: NodeId, node_id: NodeId) -> Self {
        Self {
            group_id,
            node_id,
            was_member: false,
        }
    }
}

impl Command for GroupRemoveNode {
    fn command_type(&self) -> &'static str {
        "group_remove_node"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        ctx.graph
            .get(&self.group_id)
            .filter(|n| n.variant.as_group().is_some())
            .ok_or_else(|| ValidationError::new("group_remove_node: group not found"))?;
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        self.was_member = ctx
            .graph
            .get(&self.group_id)
            .and_then(|n| n.variant.as_group())
            .is_some_and(|g| g.child_nodes.contains(&self.node_id));
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let group = ctx
            .graph
            .get_mut(&self.group_id)
            .ok_or_else(|| CommandError::NodeNotFound(self.group_id.clone()))?;
        if let Some(fields) = group.variant.as_group_mut() {
            fields.child_nodes.remove(&self.node_id);
        }
        if let Some(node) = ctx.graph.get_mut(&self.node_id) {
            node.base.parent_group = None;
        }
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        if !self.was_member {
            return;
        }
        if let Some(group) = ctx.graph.get_mut(&self.group_id) {
            if let Some(fields) = group.variant.as_group_mut() {
                fields.child_nodes.insert(self.node_id.clone());
            }
        }
        if let Some(node) = ctx.graph.get_mut(&self.node_id) {
            node.base.parent_group = Some(self.group_id.clone());
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// `group_move`: moving the group frame cascades the same delta to every
/// child node.
#[derive(Debug)]
pub struct GroupMove {
    /// Group being moved.
    pub group_id: NodeId,
    /// New group position.
    pub position: [f64; 2],
    initial_group_position: Option<[f64; 2]>,
    initial_child_positions: Option<Vec<(NodeId, [f64; 2])>>,
}

impl GroupMove {
    /// Construct a pending group-move command.
    pub fn new(group_id: NodeId, position: [f64; 2]) -> Self {
        Self {
            group_id,
            position,
            initial_group_position: None,
            initial_child_positions: None,
        }
    }
}

impl Command for GroupMove {
    fn command_type(&self) -> &'static str {
        "group_move"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        ctx.graph
            .get(&self.group_id)
            .filter(|n| n.variant.as_group().is_some())
            .ok_or_else(|| ValidationError::new("group_move: group not found"))?;
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.initial_group_position.is_some() {
            return;
        }
        let Some(group) = ctx.graph.get(&self.group_id) else {
            return;
        };
        self.initial_group_position = Some(
            initial_state
                .and_then(|s| s.positions.get(&self.group_id).copied())
                .unwrap_or(group.base.position),
        );
        let Some(fields) = group.variant.as_group() else {
            return;
        };
        self.initial_child_positions = Some(
            fields
                .child_nodes
                .iter()
                .map(|child| {
                    let pos = initial_state
                        .and_then(|s| s.positions.get(child).copied())
                        .or_else(|| ctx.graph.get(child).map(|n| n.base.position))
                        .unwrap_or([0.0, 0.0]);
                    (child.clone(), pos)
                })
                .collect(),
        );
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let group = ctx.require_mut(&self.group_id)?;
        let old_position = group.base.position;
        let delta = [
            self.position[0] - old_position[0],
            self.position[1] - old_position[1],
        ];
        group.base.position = self.position;
        let children: Vec<NodeId> = group
            .variant
            .as_group()
            .map(|g| g.child_nodes.iter().cloned().collect())
            .unwrap_or_default();
        for child in children {
            if let Some(node) = ctx.graph.get_mut(&child) {
                node.base.position[0] += delta[0];
                node.base.position[1] += delta[1];
                ctx.graph.mark_updated(&child);
            }
        }
        ctx.graph.mark_updated(&self.group_id);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        if let Some(pos) = self.initial_group_position {
            if let Some(group) = ctx.graph.get_mut(&self.group_id) {
                group.base.position = pos;
            }
        }
        if let Some(children) = self.initial_child_positions.clone() {
            for (child, pos) in children {
                if let Some(node) = ctx.graph.get_mut(&child) {
                    node.base.position = pos;
                }
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

/// `group_resize`.
#[derive(Debug)]
pub struct GroupResize {
    /// Group being resized.
    pub group_id: NodeId,
    /// New size, clamped to the group's `min_size`.
    pub size: [f64; 2],
    initial_size: Option<[f64; 2]>,
}

impl GroupResize {
    /// Construct a pending group-resize command.
    pub fn new(group_id: NodeId, size: [f64; 2]) -> Self {
        Self {
            group_id,
            size,
            initial_size: None,
        }
    }
}

impl Command for GroupResize {
    fn command_type(&self) -> &'static str {
        "group_resize"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        ctx.graph
            .get(&self.group_id)
            .filter(|n| n.variant.as_group().is_some())
            .ok_or_else(|| ValidationError::new("group_resize: group not found"))?;
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.initial_size.is_some() {
            return;
        }
        self.initial_size = ctx.graph.get(&self.group_id).map(|n| n.base.size);
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let group = ctx.require_mut(&self.group_id)?;
        let min_size = group
            .variant
            .as_group()
            .map_or([0.0, 0.0], |g| g.min_size);
        group.base.size = [
            self.size[0].max(min_size[0]),
            self.size[1].max(min_size[1]),
        ];
        let id = self.group_id.clone();
        ctx.graph.mark_updated(&id);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(size) = self.initial_size else {
            return;
        };
        if let Some(group) = ctx.graph.get_mut(&self.group_id) {
            group.base.size = size;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// `group_toggle_collapsed`.
#[derive(Debug)]
pub struct GroupToggleCollapsed {
    /// Target group.
    pub group_id: NodeId,
    /// Explicit value; `None` toggles.
    pub collapsed: Option<bool>,
    previous: Option<bool>,
}

impl GroupToggleCollapsed {
    /// Construct a pending toggle command.
    pub fn new(group_id: NodeId, collapsed: Option<bool>) -> Self {
        Self {
            group_id,
            collapsed,
            previous: None,
        }
    }
}

impl Command for GroupToggleCollapsed {
    fn command_type(&self) -> &'static str {
        "group_toggle_collapsed"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        ctx.graph
            .get(&self.group_id)
            .filter(|n| n.variant.as_group().is_some())
            .ok_or_else(|| ValidationError::new("group_toggle_collapsed: group not found"))?;
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.previous.is_some() {
            return;
        }
        self.previous = ctx
            .graph
            .get(&self.group_id)
            .and_then(|n| n.variant.as_group())
            .map(|g| g.is_collapsed);
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let group = ctx.require_mut(&self.group_id)?;
        let Some(fields) = group.variant.as_group_mut() else {
            return Err(CommandError::InvalidType {
                command: "group_toggle_collapsed",
                id: self.group_id.clone(),
            });
        };
        fields.is_collapsed = self.collapsed.unwrap_or(!fields.is_collapsed);
        let id = self.group_id.clone();
        ctx.graph.mark_updated(&id);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(prev) = self.previous else {
            return;
        };
        if let Some(group) = ctx.graph.get_mut(&self.group_id) {
            if let Some(fields) = group.variant.as_group_mut() {
                fields.is_collapsed = prev;
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

/// `group_update_style`.
#[derive(Debug)]
pub struct GroupUpdateStyle {
    /// Target group.
    pub group_id: NodeId,
    /// New style, replacing the old one wholesale.
    pub style: GroupStyle,
    previous: Option<GroupStyle>,
}

impl GroupUpdateStyle {
    /// Construct a pending style-update command.
    pub fn new(group_id: NodeId, style: GroupStyle) -> Self {
        Self {
            group_id,
            style,
            previous: None,
        }
    }
}

impl Command for GroupUpdateStyle {
    fn command_type(&self) -> &'static str {
        "group_update_style"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        ctx.graph
            .get(&self.group_id)
            .filter(|n| n.variant.as_group().is_some())
            .ok_or_else(|| ValidationError::new("group_update_style: group not found"))?;
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.previous.is_some() {
            return;
        }
        self.previous = ctx
            .graph
            .get(&self.group_id)
            .and_then(|n| n.variant.as_group())
            .map(|g| g.style.clone());
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let group = ctx.require_mut(&self.group_id)?;
        let Some(fields) = group.variant.as_group_mut() else {
            return Err(CommandError::InvalidType {
                command: "group_update_style",
                id: self.group_id.clone(),
            });
        };
        fields.style = self.style.clone();
        let id = self.group_id.clone();
        ctx.graph.mark_updated(&id);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(prev) = self.previous.clone() else {
            return;
        };
        if let Some(group) = ctx.graph.get_mut(&self.group_id) {
            if let Some(fields) = group.variant.as_group_mut() {
                fields.style = prev;
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
    fn create_attaches_children_and_undo_detaches() {
        let mut graph = SceneGraph::new(GraphId(1));
        let a = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();
        let b = graph.add(Node::new(NodeId::Real(2), NodeVariant::Shape)).unwrap();

        let mut cmd = GroupCreate::new(
            None,
            vec![a.clone(), b.clone()],
            [0.0, 0.0],
            [100.0, 100.0],
            [20.0, 20.0],
            GroupStyle::default(),
            Origin::Remote,
        );
        let mut c = ctx(&mut graph, Origin::Remote);
        cmd.execute(&mut c).unwrap();
        assert_eq!(c.graph.get(&a).unwrap().base.parent_group, Some(cmd.created_id.clone().unwrap()));

        cmd.undo(&mut c);
        assert_eq!(c.graph.get(&a).unwrap().base.parent_group, None);
        assert!(c.graph.get(&cmd.created_id.clone().unwrap_or(NodeId::Real(9999))).is_none());
    }

    #[test]
    fn move_cascades_delta_to_children() {
        let mut graph = SceneGraph::new(GraphId(1));
        let child = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();
        let mut fields = GroupFields::default();
        fields.child_nodes = BTreeSet::from([child.clone()]);
        let group_id = graph
            .add(Node::new(NodeId::Real(2), NodeVariant::Group(fields)))
            .unwrap();

        let mut cmd = GroupMove::new(group_id.clone(), [10.0, 5.0]);
        let mut c = ctx(&mut graph, Origin::Local);
        cmd.prepare_undo(&c, None, &|_| false);
        cmd.execute(&mut c).unwrap();
        assert_eq!(c.graph.get(&child).unwrap().base.position, [10.0, 5.0]);

        cmd.undo(&mut c);
        assert_eq!(c.graph.get(&child).unwrap().base.position, [0.0, 0.0]);
    }

    #[test]
    fn resize_clamps_to_min_size() {
        let mut graph = SceneGraph::new(GraphId(1));
        let mut fields = GroupFields::default();
        fields.min_size = [50.0, 50.0];
        let group_id = graph
            .add(Node::new(NodeId::Real(1), NodeVariant::Group(fields)))
            .unwrap();

        let mut cmd = GroupResize::new(group_id.clone(), [10.0, 10.0]);
        let mut c = ctx(&mut graph, Origin::Local);
        cmd.execute(&mut c).unwrap();
        assert_eq!(c.graph.get(&group_id).unwrap().base.size, [50.0, 50.0]);
    }
}
