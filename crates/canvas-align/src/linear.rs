// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Linear auto-align: a frozen master order along the selection's
//! dominant axis, with a reorder sub-mode when the selection was already
//! aligned at commit time and the pointer reverses direction.

use crate::constants::{ANIMATION_THRESHOLD, DEFAULT_MARGIN, GROUP_PADDING, GROUP_TITLE_BAR_HEIGHT, TOLERANCE};
use crate::spring::Spring;
use canvas_scene::{NodeId, SceneGraph};
use std::collections::HashMap;

/// Which line the interaction has committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinearAxis {
    /// A single horizontal line (nodes ordered left to right).
    Horizontal,
    /// A single vertical line (nodes ordered top to bottom).
    Vertical,
}

struct GroupMember {
    group: NodeId,
    children: Vec<NodeId>,
}

/// One linear-align interaction: armed at construction, commits an axis on
/// the first threshold crossing, then tracks whether the selection was
/// already aligned (arming reorder mode on a pointer reversal).
pub struct LinearInteraction {
    master_order: Vec<NodeId>,
    sizes: HashMap<NodeId, [f64; 2]>,
    groups: Vec<GroupMember>,
    axis: Option<LinearAxis>,
    commit_delta: [f64; 2],
    already_aligned: bool,
    reorder: bool,
    line_coord: f64,
    start_x: f64,
    start_y: f64,
    line_start: f64,
    pub(crate) springs: HashMap<NodeId, Spring>,
    pub(crate) size_springs: HashMap<NodeId, Spring>,
}

impl LinearInteraction {
    /// Arm a linear interaction over `node_ids`, reading current
    /// positions/sizes/group membership from `graph`. Freezes the master
    /// order along the selection's dominant bounding-box axis.
    pub fn begin(graph: &SceneGraph, node_ids: &[NodeId]) -> Option<Self> {
        if node_ids.len() < 2 {
            return None;
        }
        let mut groups = Vec::new();
        let mut sizes = HashMap::new();
        let mut springs = HashMap::new();
        let mut size_springs = HashMap::new();

        for id in node_ids {
            let node = graph.get(id)?;
            sizes.insert(id.clone(), node.base.size);
            springs.insert(id.clone(), Spring::at_rest(node.base.position));
            size_springs.insert(id.clone(), Spring::at_rest(node.base.size));
            if let Some(group) = node.variant.as_group() {
                groups.push(GroupMember {
                    group: id.clone(),
                    children: group.child_nodes.iter().cloned().collect(),
                });
            }
        }
        // Groups participate in the dominant-axis ordering alongside
        // leaves, using their own current position.
        let mut ordered: Vec<NodeId> = node_ids.to_vec();

        let (min_x, max_x, min_y, max_y) = ordered.iter().filter_map(|id| graph.get(id)).fold(
            (f64::MAX, f64::MIN, f64::MAX, f64::MIN),
            |(min_x, max_x, min_y, max_y), n| {
                (
                    min_x.min(n.base.position[0]),
                    max_x.max(n.base.position[0] + n.base.size[0]),
                    min_y.min(n.base.position[1]),
                    max_y.max(n.base.position[1] + n.base.size[1]),
                )
            },
        );
        let dominant = if (max_x - min_x) >= (max_y - min_y) {
            LinearAxis::Horizontal
        } else {
            LinearAxis::Vertical
        };
        ordered.sort_by(|a, b| {
            let pa = graph.get(a).map_or([0.0, 0.0], |n| n.base.position);
            let pb = graph.get(b).map_or([0.0, 0.0], |n| n.base.position);
            let (ca, cb) = match dominant {
                LinearAxis::Horizontal => (pa[0], pb[0]),
                LinearAxis::Vertical => (pa[1], pb[1]),
            };
            ca.total_cmp(&cb)
        });

        Some(Self {
            master_order: ordered,
            sizes,
            groups,
            axis: None,
            commit_delta: [0.0, 0.0],
            already_aligned: false,
            reorder: false,
            line_coord: 0.0,
            start_x: min_x,
            start_y: min_y,
            line_start: 0.0,
            springs,
            size_springs,
        })
    }

    /// Feed the interaction's current total pointer displacement from
    /// gesture start. Commits an axis on the first threshold crossing;
    /// after commit, arms reorder mode on a same-axis pointer reversal
    /// past the threshold, but only if the selection was already aligned
    /// the moment the axis committed.
    pub fn update(&mut self, pointer_delta: [f64; 2]) {
        match self.axis {
            None => {
                if pointer_delta[0].abs() >= ANIMATION_THRESHOLD
                    || pointer_delta[1].abs() >= ANIMATION_THRESHOLD
                {
                    let axis = if pointer_delta[0].abs() >= pointer_delta[1].abs() {
                        LinearAxis::Horizontal
                    } else {
                        LinearAxis::Vertical
                    };
                    self.commit(axis, pointer_delta);
                }
            }
            Some(axis) => {
                if self.already_aligned && !self.reorder {
                    let (coord, home) = match axis {
                        LinearAxis::Horizontal => (pointer_delta[0], self.commit_delta[0]),
                        LinearAxis::Vertical => (pointer_delta[1], self.commit_delta[1]),
                    };
                    if (coord - home).abs() >= ANIMATION_THRESHOLD && coord.signum() != home.signum() {
                        self.reorder = true;
                        self.recompute_targets();
                    }
                }
            }
        }
    }

    fn commit(&mut self, axis: LinearAxis, pointer_delta: [f64; 2]) {
        self.axis = Some(axis);
        self.commit_delta = pointer_delta;
        self.line_start = match axis {
            LinearAxis::Horizontal => self.start_x,
            LinearAxis::Vertical => self.start_y,
        };
        self.line_coord = self
            .master_order
            .first()
            .and_then(|id| self.springs.get(id))
            .map_or(0.0, |s| match axis {
                LinearAxis::Horizontal => s.value[1],
                LinearAxis::Vertical => s.value[0],
            });
        self.already_aligned = self.is_already_sequenced(axis);
        self.recompute_targets();
    }

    fn is_already_sequenced(&self, axis: LinearAxis) -> bool {
        let mut cursor = self.line_start;
        for id in &self.master_order {
            let Some(spring) = self.springs.get(id) else {
                return false;
            };
            let coord = match axis {
                LinearAxis::Horizontal => spring.value[0],
                LinearAxis::Vertical => spring.value[1],
            };
            if (coord - cursor).abs() > TOLERANCE {
                return false;
            }
            let size = self.sizes.get(id).copied().unwrap_or([0.0, 0.0]);
            cursor += match axis {
                LinearAxis::Horizontal => size[0] + DEFAULT_MARGIN,
                LinearAxis::Vertical => size[1] + DEFAULT_MARGIN,
            };
        }
        true
    }

    fn recompute_targets(&mut self) {
        let Some(axis) = self.axis else { return };
        let order: Vec<NodeId> = if self.reorder {
            self.master_order.iter().rev().cloned().collect()
        } else {
            self.master_order.clone()
        };
        let mut cursor = self.line_start;
        for id in &order {
            let size = self.sizes.get(id).copied().unwrap_or([0.0, 0.0]);
            let target = match axis {
                LinearAxis::Horizontal => [cursor, self.line_coord],
                LinearAxis::Vertical => [self.line_coord, cursor],
            };
            if let Some(spring) = self.springs.get_mut(id) {
                spring.retarget(target);
            }
            cursor += match axis {
                LinearAxis::Horizontal => size[0] + DEFAULT_MARGIN,
                LinearAxis::Vertical => size[1] + DEFAULT_MARGIN,
            };
        }
        self.apply_group_targets();
    }

    fn apply_group_targets(&mut self) {
        for member in &self.groups {
            let (mut min_x, mut max_x, mut min_y, mut max_y) =
                (f64::MAX, f64::MIN, f64::MAX, f64::MIN);
            let mut any = false;
            for child in &member.children {
                let Some(spring) = self.springs.get(child) else {
                    continue;
                };
                let size = self.sizes.get(child).copied().unwrap_or([0.0, 0.0]);
                min_x = min_x.min(spring.target[0]);
                max_x = max_x.max(spring.target[0] + size[0]);
                min_y = min_y.min(spring.target[1]);
                max_y = max_y.max(spring.target[1] + size[1]);
                any = true;
            }
            if !any {
                continue;
            }
            let position = [min_x - GROUP_PADDING, min_y - GROUP_PADDING - GROUP_TITLE_BAR_HEIGHT];
            let size = [
                (max_x - min_x) + GROUP_PADDING * 2.0,
                (max_y - min_y) + GROUP_PADDING * 2.0 + GROUP_TITLE_BAR_HEIGHT,
            ];
            if let Some(spring) = self.springs.get_mut(&member.group) {
                spring.retarget(position);
            }
            if let Some(spring) = self.size_springs.get_mut(&member.group) {
                spring.retarget(size);
            }
        }
    }

    /// Node ids participating in this interaction, master order first.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.master_order
    }

    /// The committed axis, if the drag has crossed the commit threshold.
    pub fn axis(&self) -> Option<LinearAxis> {
        self.axis
    }

    /// `true` if any group sits in the master order, so the caller should
    /// include `size_springs` targets alongside position targets.
    pub(crate) fn has_groups(&self) -> bool {
        !self.groups.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use canvas_scene::{GraphId, Node, NodeVariant};

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
    fn master_order_follows_dominant_axis() {
        let (graph, ids) = graph_with(&[[200.0, 0.0], [0.0, 0.0], [100.0, 0.0]]);
        let interaction = LinearInteraction::begin(&graph, &ids).unwrap();
        assert_eq!(interaction.node_ids(), &[ids[1].clone(), ids[2].clone(), ids[0].clone()]);
    }

    #[test]
    fn axis_commits_once_threshold_crossed() {
        let (graph, ids) = graph_with(&[[0.0, 0.0], [100.0, 0.0], [200.0, 0.0]]);
        let mut interaction = LinearInteraction::begin(&graph, &ids).unwrap();
        assert!(interaction.axis().is_none());
        interaction.update([ANIMATION_THRESHOLD + 1.0, 0.0]);
        assert_eq!(interaction.axis(), Some(LinearAxis::Horizontal));
    }

    #[test]
    fn already_aligned_selection_arms_reorder_on_pointer_reversal() {
        let (graph, ids) = graph_with(&[[0.0, 0.0], [74.0, 0.0], [148.0, 0.0]]);
        let mut interaction = LinearInteraction::begin(&graph, &ids).unwrap();
        interaction.update([ANIMATION_THRESHOLD + 1.0, 0.0]);
        assert!(interaction.already_aligned);
        assert!(!interaction.reorder);
        interaction.update([-(ANIMATION_THRESHOLD + 2.0), 0.0]);
        assert!(interaction.reorder);
        // Reversed order: the node that was last in master order now sits
        // at the line's start.
        let first_id = interaction.master_order.last().unwrap();
        let spring = interaction.springs.get(first_id).unwrap();
        assert!((spring.target[0] - interaction.line_start).abs() < f64::EPSILON);
    }
}
