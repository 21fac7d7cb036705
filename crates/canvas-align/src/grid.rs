// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Grid auto-align: `startGridAlign → dragging → dragging`. Columns are
//! derived from the drag width and the widest selected node; cells are
//! assigned by nearest-neighbour so dragging never crosses two nodes'
//! trajectories mid-animation.

use crate::constants::DEFAULT_MARGIN;
use crate::spring::Spring;
use canvas_scene::{NodeId, SceneGraph};
use std::collections::HashMap;

/// One grid-align interaction: columns are fixed at `begin`, cell
/// assignment is recomputed on every `drag` call against the current drag
/// width.
pub struct GridInteraction {
    origin: [f64; 2],
    cell_width: f64,
    cell_height: f64,
    order: Vec<NodeId>,
    pub(crate) springs: HashMap<NodeId, Spring>,
}

impl GridInteraction {
    /// Arm a grid interaction at `origin`, reading current positions/sizes
    /// from `graph`. `cell_width`/`cell_height` are the widest/tallest
    /// selected node's size plus [`DEFAULT_MARGIN`].
    pub fn begin(graph: &SceneGraph, node_ids: &[NodeId], origin: [f64; 2]) -> Option<Self> {
        if node_ids.is_empty() {
            return None;
        }
        let mut springs = HashMap::new();
        let mut max_w = 0.0_f64;
        let mut max_h = 0.0_f64;
        for id in node_ids {
            let node = graph.get(id)?;
            springs.insert(id.clone(), Spring::at_rest(node.base.position));
            max_w = max_w.max(node.base.size[0]);
            max_h = max_h.max(node.base.size[1]);
        }
        let mut interaction = Self {
            origin,
            cell_width: max_w + DEFAULT_MARGIN,
            cell_height: max_h + DEFAULT_MARGIN,
            order: node_ids.to_vec(),
            springs,
        };
        interaction.drag([0.0, 0.0]);
        Some(interaction)
    }

    /// Recompute columns from the current drag width and reassign nodes to
    /// cells by nearest-neighbour, so no two trajectories cross as the
    /// drag width changes.
    pub fn drag(&mut self, drag_delta: [f64; 2]) {
        let drag_width = drag_delta[0].abs().max(self.cell_width);
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let raw_columns = (drag_width / self.cell_width).round() as usize;
        let columns = raw_columns.max(1).min(self.order.len());

        let cells: Vec<(usize, usize)> = (0..self.order.len())
            .map(|i| (i % columns, i / columns))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let cell_positions: Vec<[f64; 2]> = cells
            .iter()
            .map(|&(col, row)| {
                [
                    self.origin[0] + col as f64 * self.cell_width,
                    self.origin[1] + row as f64 * self.cell_height,
                ]
            })
            .collect();

        // Nearest-neighbour assignment: each node claims the closest
        // still-unclaimed cell to its current physics position, so a
        // shrinking/growing column count reassigns with minimal crossing.
        let mut remaining: Vec<usize> = (0..cell_positions.len()).collect();
        for id in &self.order {
            let current = self
                .springs
                .get(id)
                .map_or(self.origin, |s| s.value);
            let Some((pick_idx, &cell)) = remaining.iter().enumerate().min_by(|(_, &a), (_, &b)| {
                dist(current, cell_positions[a]).total_cmp(&dist(current, cell_positions[b]))
            }) else {
                // One cell was reserved per node up front; `remaining`
                // only shrinks by one per iteration of this same loop.
                continue;
            };
            remaining.remove(pick_idx);
            if let Some(spring) = self.springs.get_mut(id) {
                spring.retarget(cell_positions[cell]);
            }
        }
    }

    /// Finish the interaction: target positions in master-order.
    pub fn targets(&self) -> Vec<(NodeId, [f64; 2])> {
        self.order
            .iter()
            .map(|id| {
                let pos = self.springs.get(id).map_or(self.origin, |s| s.target);
                (id.clone(), pos)
            })
            .collect()
    }

    /// Node ids participating in this interaction.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }
}

fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::cast_possible_truncation
)]
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
            node.base.size = [40.0, 40.0];
            graph.add(node).unwrap();
            ids.push(id);
        }
        (graph, ids)
    }

    #[test]
    fn wide_drag_produces_more_columns() {
        let (graph, ids) = graph_with(&[[0.0, 0.0], [10.0, 0.0], [20.0, 0.0], [30.0, 0.0]]);
        let mut interaction = GridInteraction::begin(&graph, &ids, [0.0, 0.0]).unwrap();
        interaction.drag([1000.0, 0.0]);
        // 4 nodes spread across a wide drag: more than a single column.
        let xs: std::collections::BTreeSet<i64> = interaction
            .targets()
            .iter()
            .map(|(_, pos)| pos[0] as i64)
            .collect();
        assert!(xs.len() > 1);
    }

    #[test]
    fn narrow_drag_collapses_to_single_column() {
        let (graph, ids) = graph_with(&[[0.0, 0.0], [10.0, 0.0], [20.0, 0.0]]);
        let mut interaction = GridInteraction::begin(&graph, &ids, [0.0, 0.0]).unwrap();
        interaction.drag([0.0, 0.0]);
        let xs: std::collections::BTreeSet<i64> = interaction
            .targets()
            .iter()
            .map(|(_, pos)| pos[0] as i64)
            .collect();
        assert_eq!(xs.len(), 1);
    }

    #[test]
    fn every_node_gets_a_distinct_cell() {
        let (graph, ids) = graph_with(&[[0.0, 0.0], [50.0, 0.0], [100.0, 0.0], [150.0, 0.0]]);
        let mut interaction = GridInteraction::begin(&graph, &ids, [0.0, 0.0]).unwrap();
        interaction.drag([300.0, 0.0]);
        let targets = interaction.targets();
        let unique: std::collections::BTreeSet<(i64, i64)> = targets
            .iter()
            .map(|(_, pos)| (pos[0] as i64, pos[1] as i64))
            .collect();
        assert_eq!(unique.len(), targets.len());
    }
}
