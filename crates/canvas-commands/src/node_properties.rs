// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `node_property_update`, `node_batch_property_update`, `node_layer_order`.
//!
//! A dedicated `updateProperty` hook is not modeled here: the
//! [`canvas_scene::SceneObserver`] notification already fired by
//! `SceneGraph::mark_updated` gives the host the same opportunity to react
//! to a property change, without a second callback mechanism.

use crate::catalog::{
    Command, CommandContext, CommandError, InteractionSnapshot, MediaResidencyCheck,
    ValidationError,
};
use canvas_scene::{NodeId, PropertyValue};
use std::any::Any;

/// Which field a property update writes: a known direct base field, or an
/// entry in the freeform `properties` map.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyTarget {
    /// The node's `title` field.
    Title,
    /// `properties[key]`.
    Nested(String),
}

fn read_current(node: &canvas_scene::Node, target: &PropertyTarget) -> PropertyValue {
    match target {
        PropertyTarget::Title => node
            .base
            .title
            .clone()
            .map_or(PropertyValue::Null, PropertyValue::String),
        PropertyTarget::Nested(key) => node
            .base
            .properties
            .get(key)
            .cloned()
            .unwrap_or(PropertyValue::Null),
    }
}

fn write(node: &mut canvas_scene::Node, target: &PropertyTarget, value: &PropertyValue) {
    match target {
        PropertyTarget::Title => {
            node.base.title = match value {
                PropertyValue::String(s) => Some(s.clone()),
                PropertyValue::Null => None,
                _ => node.base.title.clone(),
            };
        }
        PropertyTarget::Nested(key) => {
            node.base.properties.insert(key.clone(), value.clone());
        }
    }
}

/// `node_property_update`.
#[derive(Debug)]
pub struct PropertyUpdate {
    /// Nodes to update.
    pub node_ids: Vec<NodeId>,
    /// Which field to write.
    pub target: PropertyTarget,
    /// New value.
    pub value: PropertyValue,
    previous: Option<Vec<PropertyValue>>,
}

impl PropertyUpdate {
    /// Construct a pending property update.
    pub fn new(node_ids: Vec<NodeId>, target: PropertyTarget, value: PropertyValue) -> Self {
        Self {
            node_ids,
            target,
            value,
            previous: None,
        }
    }
}

impl Command for PropertyUpdate {
    fn command_type(&self) -> &'static str {
        "node_property_update"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() {
            return Err(ValidationError::new(
                "node_property_update: no node ids supplied",
            ));
        }
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
        self.previous = Some(
            self.node_ids
                .iter()
                .map(|id| {
                    ctx.graph
                        .get(id)
                        .map_or(PropertyValue::Null, |n| read_current(n, &self.target))
                })
                .collect(),
        );
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let single = self.node_ids.len() == 1;
        let mut last_err = None;
        for id in self.node_ids.clone() {
            match ctx.require_mut(&id) {
                Ok(node) => {
                    write(node, &self.target, &self.value);
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
        let Some(previous) = self.previous.clone() else {
            return;
        };
        for (id, prev) in self.node_ids.clone().into_iter().zip(previous) {
            if let Some(node) = ctx.graph.get_mut(&id) {
                write(node, &self.target, &prev);
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

/// One entry of an atomic batch update.
#[derive(Debug, Clone)]
pub struct PropertyUpdateEntry {
    /// Target node.
    pub node_id: NodeId,
    /// Which field to write.
    pub target: PropertyTarget,
    /// New value.
    pub value: PropertyValue,
}

/// `node_batch_property_update`: applied atomically — if any target node is
/// missing, no entry is applied.
#[derive(Debug)]
pub struct BatchPropertyUpdate {
    /// Entries to apply.
    pub updates: Vec<PropertyUpdateEntry>,
    previous: Option<Vec<PropertyValue>>,
}

impl BatchPropertyUpdate {
    /// Construct a pending batch update.
    pub fn new(updates: Vec<PropertyUpdateEntry>) -> Self {
        Self {
            updates,
            previous: None,
        }
    }
}

impl Command for BatchPropertyUpdate {
    fn command_type(&self) -> &'static str {
        "node_batch_property_update"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.updates.is_empty() {
            return Err(ValidationError::new(
                "node_batch_property_update: empty update set",
            ));
        }
        for entry in &self.updates {
            if ctx.graph.get(&entry.node_id).is_none() {
                return Err(ValidationError::new(format!(
                    "node_batch_property_update: missing node {}",
                    entry.node_id
                )));
            }
        }
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
        self.previous = Some(
            self.updates
                .iter()
                .map(|entry| {
                    ctx.graph
                        .get(&entry.node_id)
                        .map_or(PropertyValue::Null, |n| read_current(n, &entry.target))
                })
                .collect(),
        );
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        for entry in &self.updates {
            if ctx.graph.get(&entry.node_id).is_none() {
                return Err(CommandError::NodeNotFound(entry.node_id.clone()));
            }
        }
        for entry in self.updates.clone() {
            if let Some(node) = ctx.graph.get_mut(&entry.node_id) {
                write(node, &entry.target, &entry.value);
                ctx.graph.mark_updated(&entry.node_id);
            }
        }
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(previous) = self.previous.clone() else {
            return;
        };
        for (entry, prev) in self.updates.clone().into_iter().zip(previous) {
            if let Some(node) = ctx.graph.get_mut(&entry.node_id) {
                write(node, &entry.target, &prev);
                ctx.graph.mark_updated(&entry.node_id);
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

/// Which direction to swap one step in paint order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerDirection {
    /// Toward the end of the paint order (drawn later/on top).
    Up,
    /// Toward the start of the paint order (drawn earlier/below).
    Down,
}

/// `node_layer_order`: element-wise one-step swap; undo restores the full
/// prior z-order of every node in the graph.
#[derive(Debug)]
pub struct LayerOrder {
    /// Nodes to shift, processed in order.
    pub node_ids: Vec<NodeId>,
    /// Direction to shift.
    pub direction: LayerDirection,
    prior_order: Option<Vec<(NodeId, Option<i64>)>>,
}

impl LayerOrder {
    /// Construct a pending layer-order command.
    pub fn new(node_ids: Vec<NodeId>, direction: LayerDirection) -> Self {
        Self {
            node_ids,
            direction,
            prior_order: None,
        }
    }
}

fn swap_one_step(ctx: &mut CommandContext<'_>, id: &NodeId, direction: LayerDirection) {
    let order: Vec<NodeId> = ctx
        .graph
        .nodes_in_z_order()
        .into_iter()
        .map(|n| n.base.id.clone())
        .collect();
    let Some(pos) = order.iter().position(|x| x == id) else {
        return;
    };
    let neighbor = match direction {
        LayerDirection::Up => (pos + 1 < order.len()).then_some(pos + 1),
        LayerDirection::Down => pos.checked_sub(1),
    };
    let Some(neighbor) = neighbor else {
        return;
    };
    let a = order[pos].clone();
    let b = order[neighbor].clone();
    let a_z = ctx.graph.get(&a).and_then(|n| n.base.z_index);
    let b_z = ctx.graph.get(&b).and_then(|n| n.base.z_index);
    if let Some(node) = ctx.graph.get_mut(&a) {
        node.base.z_index = b_z;
    }
    if let Some(node) = ctx.graph.get_mut(&b) {
        node.base.z_index = a_z;
    }
    ctx.graph.mark_updated(&a);
    ctx.graph.mark_updated(&b);
}

impl Command for LayerOrder {
    fn command_type(&self) -> &'static str {
        "node_layer_order"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() {
            return Err(ValidationError::new("node_layer_order: no node ids supplied"));
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        if self.prior_order.is_some() {
            return;
        }
        self.prior_order = Some(
            ctx.graph
                .nodes()
                .map(|n| (n.base.id.clone(), n.base.z_index))
                .collect(),
        );
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        for id in self.node_ids.clone() {
            if ctx.graph.get(&id).is_none() {
                return Err(CommandError::NodeNotFound(id));
            }
            swap_one_step(ctx, &id, self.direction);
        }
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        let Some(prior) = self.prior_order.clone() else {
            return;
        };
        for (id, z) in prior {
            if let Some(node) = ctx.graph.get_mut(&id) {
                node.base.z_index = z;
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

    fn ctx(graph: &mut SceneGraph) -> CommandContext<'_> {
        CommandContext::new(graph, crate::catalog::Origin::Local)
    }

    #[test]
    fn property_update_nested_round_trips_on_undo() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();

        let mut cmd = PropertyUpdate::new(
            vec![id.clone()],
            PropertyTarget::Nested("tint".into()),
            PropertyValue::String("red".into()),
        );
        let mut c = ctx(&mut graph);
        cmd.prepare_undo(&c, None, &|_| false);
        cmd.execute(&mut c).unwrap();
        assert_eq!(
            c.graph.get(&id).unwrap().base.properties.get("tint"),
            Some(&PropertyValue::String("red".into()))
        );
        cmd.undo(&mut c);
        assert_eq!(c.graph.get(&id).unwrap().base.properties.get("tint"), None);
    }

    #[test]
    fn batch_update_is_atomic_on_missing_node() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();

        let mut cmd = BatchPropertyUpdate::new(vec![
            PropertyUpdateEntry {
                node_id: id.clone(),
                target: PropertyTarget::Title,
                value: PropertyValue::String("A".into()),
            },
            PropertyUpdateEntry {
                node_id: NodeId::Real(999),
                target: PropertyTarget::Title,
                value: PropertyValue::String("B".into()),
            },
        ]);
        let mut c = ctx(&mut graph);
        assert!(cmd.execute(&mut c).is_err());
        assert_eq!(c.graph.get(&id).unwrap().base.title, None);
    }

    #[test]
    fn layer_order_up_swaps_with_next_neighbor() {
        let mut graph = SceneGraph::new(GraphId(1));
        let a = graph.add(Node::new(NodeId::Real(1), NodeVariant::Shape)).unwrap();
        let b = graph.add(Node::new(NodeId::Real(2), NodeVariant::Shape)).unwrap();

        let mut cmd = LayerOrder::new(vec![a.clone()], LayerDirection::Up);
        let mut c = ctx(&mut graph);
        cmd.prepare_undo(&c, None, &|_| false);
        cmd.execute(&mut c).unwrap();
        assert_eq!(c.graph.get(&a).unwrap().base.z_index, Some(1));
        assert_eq!(c.graph.get(&b).unwrap().base.z_index, Some(0));

        cmd.undo(&mut c);
        assert_eq!(c.graph.get(&a).unwrap().base.z_index, Some(0));
        assert_eq!(c.graph.get(&b).unwrap().base.z_index, Some(1));
    }
}
