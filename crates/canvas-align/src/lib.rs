// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Spring-physics alignment engine: a gesture-driven interaction (linear
//! or grid) is armed against a [`canvas_scene::SceneGraph`]
//! snapshot, driven toward per-node target positions by fixed-timestep
//! springs, and finished into a `node_align` command once the caller decides
//! the gesture is over.
//!
//! [`AlignmentEngine::tick`] is the single entry point an embedder's frame
//! loop calls; it owns the fixed-step accumulator internally and advances
//! whichever interaction is currently armed. This follows the same
//! "accumulator as private field, public `tick`" shape as a scheduler
//! loop, without the rewrite-rule machinery such a scheduler would also
//! carry — alignment has no rule engine to drive.

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

mod constants;
mod grid;
mod linear;
mod spring;

pub use constants::*;
pub use grid::GridInteraction;
pub use linear::{LinearAxis, LinearInteraction};
pub use spring::{Spring, DEFAULT_SETTLE_THRESHOLD};

use canvas_commands::{AlignAxis, AlignNode};
use canvas_scene::{NodeId, SceneGraph};
use std::collections::BTreeSet;
use std::time::Duration;

enum Active {
    None,
    Linear(LinearInteraction),
    Grid(GridInteraction),
}

/// Result of [`AlignmentEngine::finish`]: enough to build the `node_align`
/// command and to know which parent groups outside the interaction need a
/// follow-up `group_resize`.
#[derive(Debug)]
pub struct AlignmentOutcome {
    /// Nodes that were part of the interaction, master order first.
    pub node_ids: Vec<NodeId>,
    /// Committed positions, parallel to `node_ids`.
    pub positions: Vec<[f64; 2]>,
    /// Committed sizes, parallel to `node_ids`, when any group participated.
    pub sizes: Option<Vec<[f64; 2]>>,
    /// Axis the interaction committed to.
    pub axis: AlignAxis,
}

impl AlignmentOutcome {
    /// Build the `node_align` command from this outcome.
    pub fn into_command(self) -> AlignNode {
        AlignNode::new(self.node_ids, self.positions, self.sizes, self.axis)
    }
}

/// Drives one alignment interaction (linear or grid) to completion.
///
/// Only one interaction can be armed at a time; starting a new one while
/// another is active drops the old one (the caller is expected to have
/// already finished or cancelled it).
pub struct AlignmentEngine {
    active: Active,
    accumulator: Duration,
    batch_cursor: usize,
}

impl Default for AlignmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AlignmentEngine {
    /// Construct an idle engine.
    pub fn new() -> Self {
        Self {
            active: Active::None,
            accumulator: Duration::ZERO,
            batch_cursor: 0,
        }
    }

    /// `true` while a linear or grid interaction is armed.
    pub fn is_active(&self) -> bool {
        !matches!(self.active, Active::None)
    }

    /// Arm a linear-align interaction over `node_ids`. Returns `false`
    /// (leaving any prior interaction untouched) if fewer than two nodes
    /// resolve, per [`LinearInteraction::begin`].
    pub fn start_linear(&mut self, graph: &SceneGraph, node_ids: &[NodeId]) -> bool {
        let Some(interaction) = LinearInteraction::begin(graph, node_ids) else {
            return false;
        };
        self.active = Active::Linear(interaction);
        self.accumulator = Duration::ZERO;
        self.batch_cursor = 0;
        true
    }

    /// Feed a linear interaction's total pointer displacement since gesture
    /// start. No-op if a linear interaction isn't armed.
    pub fn update_linear(&mut self, pointer_delta: [f64; 2]) {
        if let Active::Linear(interaction) = &mut self.active {
            interaction.update(pointer_delta);
        }
    }

    /// The committed axis of an armed linear interaction, if any.
    pub fn linear_axis(&self) -> Option<LinearAxis> {
        match &self.active {
            Active::Linear(interaction) => interaction.axis(),
            Active::None | Active::Grid(_) => None,
        }
    }

    /// Arm a grid-align interaction over `node_ids` at `origin`. Returns
    /// `false` if `node_ids` is empty or any id fails to resolve.
    pub fn start_grid(&mut self, graph: &SceneGraph, node_ids: &[NodeId], origin: [f64; 2]) -> bool {
        let Some(interaction) = GridInteraction::begin(graph, node_ids, origin) else {
            return false;
        };
        self.active = Active::Grid(interaction);
        self.accumulator = Duration::ZERO;
        self.batch_cursor = 0;
        true
    }

    /// Feed a grid interaction's current drag delta. No-op if a grid
    /// interaction isn't armed.
    pub fn drag_grid(&mut self, drag_delta: [f64; 2]) {
        if let Active::Grid(interaction) = &mut self.active {
            interaction.drag(drag_delta);
        }
    }

    /// Cancel whatever interaction is armed without producing an outcome.
    pub fn cancel(&mut self) {
        self.active = Active::None;
        self.accumulator = Duration::ZERO;
        self.batch_cursor = 0;
    }

    fn node_count(&self) -> usize {
        match &self.active {
            Active::None => 0,
            Active::Linear(i) => i.node_ids().len(),
            Active::Grid(i) => i.node_ids().len(),
        }
    }

    fn is_large_scale(&self) -> bool {
        self.node_count() >= LARGE_SCALE_THRESHOLD
    }

    /// Advance the armed interaction's springs by `dt` of wall-clock time,
    /// in fixed [`FIXED_DT`] substeps (capped at [`MAX_SUBSTEPS`] per call).
    /// No-op if nothing is armed.
    pub fn tick(&mut self, dt: Duration) {
        if matches!(self.active, Active::None) {
            return;
        }
        let scaled = dt.as_secs_f64() * TIME_SCALE;
        self.accumulator += Duration::from_secs_f64(scaled.max(0.0));

        let large = self.is_large_scale();
        let (k, d) = if large {
            (SPRING_K_LARGE, SPRING_D_LARGE)
        } else {
            (SPRING_K, SPRING_D)
        };
        let dt_secs = FIXED_DT.as_secs_f64();

        let mut substeps = 0;
        while self.accumulator >= FIXED_DT && substeps < MAX_SUBSTEPS {
            self.step_once(dt_secs, k, d, large);
            self.accumulator -= FIXED_DT;
            substeps += 1;
        }
    }

    fn step_once(&mut self, dt_secs: f64, k: f64, d: f64, large: bool) {
        match &mut self.active {
            Active::None => {}
            Active::Linear(interaction) => {
                let order = interaction.node_ids().to_vec();
                let batch = batch_slice(&order, large, &mut self.batch_cursor);
                for id in &batch {
                    if let Some(spring) = interaction.springs.get_mut(id) {
                        spring.step(dt_secs, k, d);
                    }
                    if let Some(spring) = interaction.size_springs.get_mut(id) {
                        spring.step(dt_secs, k, d);
                    }
                }
            }
            Active::Grid(interaction) => {
                let order = interaction.node_ids().to_vec();
                let batch = batch_slice(&order, large, &mut self.batch_cursor);
                for id in &batch {
                    if let Some(spring) = interaction.springs.get_mut(id) {
                        spring.step(dt_secs, k, d);
                    }
                }
            }
        }
    }

    /// `true` once every spring in the armed interaction has settled. `true`
    /// (vacuously) when nothing is armed.
    pub fn settled(&self) -> bool {
        let threshold = if self.is_large_scale() {
            LARGE_SETTLE_THRESHOLD
        } else {
            DEFAULT_SETTLE_THRESHOLD
        };
        match &self.active {
            Active::None => true,
            Active::Linear(interaction) => {
                interaction.springs.values().all(|s| s.settled(threshold))
                    && interaction.size_springs.values().all(|s| s.settled(threshold))
            }
            Active::Grid(interaction) => interaction.springs.values().all(|s| s.settled(threshold)),
        }
    }

    /// Render-facing positions for every node in the armed interaction,
    /// interpolated between physics samples by the accumulator's unconsumed
    /// fraction of a step. Callers write these to a transient `_animPos`
    /// field, never to committed node state.
    pub fn sample(&self) -> Vec<(NodeId, [f64; 2])> {
        let alpha = (self.accumulator.as_secs_f64() / FIXED_DT.as_secs_f64()).clamp(0.0, 1.0);
        match &self.active {
            Active::None => Vec::new(),
            Active::Linear(interaction) => interaction
                .node_ids()
                .iter()
                .map(|id| {
                    let pos = interaction.springs.get(id).map_or([0.0, 0.0], |s| s.sample(alpha));
                    (id.clone(), pos)
                })
                .collect(),
            Active::Grid(interaction) => interaction
                .node_ids()
                .iter()
                .map(|id| {
                    let pos = interaction.springs.get(id).map_or([0.0, 0.0], |s| s.sample(alpha));
                    (id.clone(), pos)
                })
                .collect(),
        }
    }

    /// Parent groups that contain a moved child but are not themselves part
    /// of the armed interaction. Call before [`AlignmentEngine::finish`] —
    /// these ids need a follow-up `group_resize` once the interaction's own
    /// `node_align` lands, since their bounds weren't animated here.
    pub fn external_parent_groups(&self, graph: &SceneGraph) -> Vec<NodeId> {
        let ids: BTreeSet<&NodeId> = match &self.active {
            Active::None => return Vec::new(),
            Active::Linear(i) => i.node_ids().iter().collect(),
            Active::Grid(i) => i.node_ids().iter().collect(),
        };
        let mut externals = BTreeSet::new();
        for id in &ids {
            let Some(node) = graph.get(id) else { continue };
            if let Some(parent) = &node.base.parent_group {
                if !ids.contains(parent) {
                    externals.insert(parent.clone());
                }
            }
        }
        externals.into_iter().collect()
    }

    /// Finish the armed interaction, returning the outcome to build a
    /// `node_align` command from, or `None` if nothing is armed or a linear
    /// interaction never crossed the commit threshold. Clears the engine back
    /// to idle either way.
    ///
    /// Positions/sizes use the committed spring target while still mid-flight
    /// and the settled physics value once the animation has already finished.
    pub fn finish(&mut self) -> Option<AlignmentOutcome> {
        let settled = self.settled();
        let active = std::mem::replace(&mut self.active, Active::None);
        self.accumulator = Duration::ZERO;
        self.batch_cursor = 0;

        match active {
            Active::None => None,
            Active::Linear(interaction) => {
                let axis = match interaction.axis()? {
                    LinearAxis::Horizontal => AlignAxis::Horizontal,
                    LinearAxis::Vertical => AlignAxis::Vertical,
                };
                let node_ids = interaction.node_ids().to_vec();
                let positions = node_ids
                    .iter()
                    .map(|id| resolve(interaction.springs.get(id), settled))
                    .collect();
                let sizes = interaction.has_groups().then(|| {
                    node_ids
                        .iter()
                        .map(|id| resolve(interaction.size_springs.get(id), settled))
                        .collect()
                });
                Some(AlignmentOutcome {
                    node_ids,
                    positions,
                    sizes,
                    axis,
                })
            }
            Active::Grid(interaction) => {
                let node_ids = interaction.node_ids().to_vec();
                let positions = node_ids
                    .iter()
                    .map(|id| resolve(interaction.springs.get(id), settled))
                    .collect();
                Some(AlignmentOutcome {
                    node_ids,
                    positions,
                    sizes: None,
                    axis: AlignAxis::Grid,
                })
            }
        }
    }
}

fn resolve(spring: Option<&Spring>, settled: bool) -> [f64; 2] {
    spring.map_or([0.0, 0.0], |s| if settled { s.value } else { s.target })
}

/// Pick the subset of `order` a `tick` call advances this step. At normal
/// scale every node steps every substep; at large scale only a rotating
/// window of [`MAX_ANIMATION_BATCH_SIZE`] nodes does, bounding per-tick cost
/// to roughly [`FRAME_BUDGET_MS`] regardless of selection size.
fn batch_slice(order: &[NodeId], large: bool, cursor: &mut usize) -> Vec<NodeId> {
    if !large || order.len() <= MAX_ANIMATION_BATCH_SIZE {
        return order.to_vec();
    }
    let len = order.len();
    let start = *cursor % len;
    let batch = (0..MAX_ANIMATION_BATCH_SIZE)
        .map(|offset| order[(start + offset) % len].clone())
        .collect();
    *cursor = (start + MAX_ANIMATION_BATCH_SIZE) % len;
    batch
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use canvas_scene::{GraphId, GroupFields, Node, NodeVariant};

    fn graph_with(positions: &[[f64; 2]]) -> (SceneGraph, Vec<NodeId>) {
        let mut graph = SceneGraph::new(GraphId(1));
        let mut ids = Vec::new();
        for (i, pos) in positions.iter().enumerate() {
            let id = NodeId::Real(i as u64 + 1);
            let mut node = Node::new(id.clone(), NodeVariant::Shape);
            node.base.position = *pos;
            node.base.size = [50.0, 50.0];
            graph.add(node).unwrap();
            ids.push(id);
        }
        (graph, ids)
    }

    #[test]
    fn idle_engine_ticks_and_finishes_to_nothing() {
        let mut engine = AlignmentEngine::new();
        engine.tick(Duration::from_millis(16));
        assert!(!engine.is_active());
        assert!(engine.finish().is_none());
    }

    #[test]
    fn linear_interaction_converges_and_finishes_with_committed_positions() {
        let (graph, ids) = graph_with(&[[0.0, 0.0], [100.0, 0.0], [200.0, 0.0]]);
        let mut engine = AlignmentEngine::new();
        assert!(engine.start_linear(&graph, &ids));
        engine.update_linear([ANIMATION_THRESHOLD + 5.0, 0.0]);
        assert_eq!(engine.linear_axis(), Some(LinearAxis::Horizontal));

        for _ in 0..600 {
            engine.tick(Duration::from_millis(16));
        }
        assert!(engine.settled());

        let outcome = engine.finish().unwrap();
        assert_eq!(outcome.node_ids.len(), 3);
        assert_eq!(outcome.positions.len(), 3);
        assert_eq!(outcome.axis, AlignAxis::Horizontal);
        assert!(outcome.sizes.is_none());
        assert!(!engine.is_active());
    }

    #[test]
    fn finish_before_axis_commit_yields_nothing() {
        let (graph, ids) = graph_with(&[[0.0, 0.0], [10.0, 0.0]]);
        let mut engine = AlignmentEngine::new();
        assert!(engine.start_linear(&graph, &ids));
        assert!(engine.finish().is_none());
    }

    #[test]
    fn grid_interaction_finishes_with_grid_axis_and_no_sizes() {
        let (graph, ids) = graph_with(&[[0.0, 0.0], [50.0, 0.0], [100.0, 0.0], [150.0, 0.0]]);
        let mut engine = AlignmentEngine::new();
        assert!(engine.start_grid(&graph, &ids, [0.0, 0.0]));
        engine.drag_grid([300.0, 0.0]);
        for _ in 0..300 {
            engine.tick(Duration::from_millis(16));
        }
        let outcome = engine.finish().unwrap();
        assert_eq!(outcome.axis, AlignAxis::Grid);
        assert!(outcome.sizes.is_none());
    }

    #[test]
    fn external_parent_groups_excludes_groups_already_in_the_interaction() {
        let (mut graph, ids) = graph_with(&[[0.0, 0.0], [100.0, 0.0]]);
        let group_id = NodeId::Real(100);
        let mut group = Node::new(group_id.clone(), NodeVariant::Group(GroupFields::default()));
        if let Some(fields) = group.variant.as_group_mut() {
            fields.child_nodes.insert(ids[0].clone());
        }
        graph.add(group).unwrap();
        if let Some(node) = graph.get_mut(&ids[0]) {
            node.base.parent_group = Some(group_id.clone());
        }

        let mut engine = AlignmentEngine::new();
        assert!(engine.start_linear(&graph, &ids));
        let externals = engine.external_parent_groups(&graph);
        assert_eq!(externals, vec![group_id]);
    }

    #[test]
    fn batch_slice_rotates_through_a_large_order_across_calls() {
        let order: Vec<NodeId> = (0..300u64).map(NodeId::Real).collect();
        let mut cursor = 0;
        let first = batch_slice(&order, true, &mut cursor);
        let second = batch_slice(&order, true, &mut cursor);
        assert_eq!(first.len(), MAX_ANIMATION_BATCH_SIZE);
        assert_eq!(second.len(), MAX_ANIMATION_BATCH_SIZE);
        assert_ne!(first, second);
        assert_eq!(cursor, (2 * MAX_ANIMATION_BATCH_SIZE) % order.len());
    }

    #[test]
    fn batch_slice_is_a_noop_below_large_scale() {
        let order: Vec<NodeId> = (0..5u64).map(NodeId::Real).collect();
        let mut cursor = 0;
        let batch = batch_slice(&order, false, &mut cursor);
        assert_eq!(batch, order);
        assert_eq!(cursor, 0);
    }
}
