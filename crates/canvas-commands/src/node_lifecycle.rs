// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `node_create`, `node_delete`, `node_duplicate`, `node_paste`.

use crate::catalog::{
    Command, CommandContext, CommandError, InteractionSnapshot, MediaResidencyCheck, Origin,
    ValidationError, LARGE_UNDO_PAYLOAD_BYTES,
};
use canvas_scene::{Node, NodeId, NodeVariant, PropertyValue};
use std::any::Any;
use std::collections::BTreeMap;

/// Parameters for `node_create`.
#[derive(Debug, Clone)]
pub struct CreateNodeParams {
    /// Explicit id, if the caller already knows it (remote/server origin).
    pub id: Option<NodeId>,
    /// Fully-formed variant payload (loading state etc. pre-initialized).
    pub variant: NodeVariant,
    /// Initial position.
    pub position: [f64; 2],
    /// Initial size.
    pub size: [f64; 2],
    /// Initial rotation, radians.
    pub rotation: f64,
    /// Initial aspect ratio; defaults to `size[0] / size[1]` when absent.
    pub aspect_ratio: Option<f64>,
    /// Initial freeform properties.
    pub properties: BTreeMap<String, PropertyValue>,
    /// Initial flags, merged over variant-default flags.
    pub flags: BTreeMap<String, bool>,
    /// Optional display title.
    pub title: Option<String>,
}

/// `node_create`: adds a node to the graph. Does not launch an image
/// upload itself — that is the upload coordinator's job.
#[derive(Debug)]
pub struct CreateNode {
    /// Command parameters.
    pub params: CreateNodeParams,
    origin: Origin,
    created_id: Option<NodeId>,
}

impl CreateNode {
    /// Construct a pending create command for the given origin.
    pub fn new(params: CreateNodeParams, origin: Origin) -> Self {
        Self {
            params,
            origin,
            created_id: None,
        }
    }

    /// The id assigned on the last successful `execute`, if any.
    pub fn created_id(&self) -> Option<&NodeId> {
        self.created_id.as_ref()
    }
}

impl Command for CreateNode {
    fn command_type(&self) -> &'static str {
        "node_create"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if let Some(id) = &self.params.id {
            if ctx.graph.get(id).is_some() {
                return Err(ValidationError::new(format!(
                    "node_create: id already exists: {id}"
                )));
            }
        }
        if self.params.size[0] < 0.0 || self.params.size[1] < 0.0 {
            return Err(ValidationError::new("node_create: negative size"));
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        _ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        _media_resident: MediaResidencyCheck<'_>,
    ) {
        // Undo data is just "delete the node we created"; captured in execute.
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let id = match self.params.id.clone() {
            Some(id) => id,
            None if ctx.origin == Origin::Local => ctx.graph.mint_temp_id(),
            None => ctx.graph.next_real_id(),
        };

        let mut node = Node::new(id.clone(), self.params.variant.clone());
        node.base.position = self.params.position;
        node.base.size = self.params.size;
        node.base.rotation = self.params.rotation;
        let aspect = self
            .params
            .aspect_ratio
            .unwrap_or_else(|| aspect_of(self.params.size));
        node.base.aspect_ratio = aspect;
        node.base.original_aspect = aspect;
        node.base.properties = self.params.properties.clone();
        node.base.merge_flags(&self.params.flags);
        node.base.title = self.params.title.clone();
        node.base.is_temporary = id.is_temp();

        ctx.graph.add(node)?;
        self.created_id = Some(id);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        if let Some(id) = self.created_id.take() {
            let _ = ctx.graph.remove(&id);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn aspect_of(size: [f64; 2]) -> f64 {
    if size[1].abs() > f64::EPSILON {
        size[0] / size[1]
    } else {
        1.0
    }
}

/// Media-optimized snapshot of a deleted node, bounding undo-stack memory
/// for large images.
#[derive(Debug, Clone)]
pub enum UndoPayload {
    /// Full structural clone (small payload, or no server/cache backing).
    Full(Box<Node>),
    /// Image already uploaded: keep only the pointer, drop `data:` bytes.
    OptimizedWithServer {
        /// Node id (for placeholder reconstruction).
        id: NodeId,
        /// Server URL to restore on undo.
        server_url: String,
        /// Content hash.
        hash: String,
        /// Original filename.
        filename: Option<String>,
    },
    /// Image not uploaded but present in the local cache by hash.
    OptimizedFromCache {
        /// Node id.
        id: NodeId,
        /// Content hash.
        hash: String,
        /// Original filename.
        filename: Option<String>,
    },
    /// Payload exceeded [`LARGE_UNDO_PAYLOAD_BYTES`] with no server/cache
    /// backing; the `data:` URL was dropped and the entry marked stripped.
    Stripped {
        /// Node id.
        id: NodeId,
        /// Content hash, if known.
        hash: Option<String>,
        /// Original filename.
        filename: Option<String>,
    },
}

impl UndoPayload {
    fn id(&self) -> &NodeId {
        match self {
            UndoPayload::Full(n) => &n.base.id,
            UndoPayload::OptimizedWithServer { id, .. }
            | UndoPayload::OptimizedFromCache { id, .. }
            | UndoPayload::Stripped { id, .. } => id,
        }
    }

    /// Reconstruct a best-effort node for undo. Optimized/stripped variants
    /// produce a placeholder image node without the original pixel data.
    fn reconstruct(&self) -> Node {
        match self {
            UndoPayload::Full(n) => (**n).clone(),
            UndoPayload::OptimizedWithServer {
                id,
                server_url,
                hash,
                filename,
            } => {
                let mut node = Node::new(id.clone(), NodeVariant::Image(canvas_scene::ImageFields {
                    hash: Some(hash.clone()),
                    filename: filename.clone(),
                    src: None,
                    server_url: Some(server_url.clone()),
                    server_filename: None,
                    thumbnail: None,
                    loading_state: canvas_scene::LoadingState::Loaded,
                    loading_progress: 1.0,
                }));
                node.base.id = id.clone();
                node
            }
            UndoPayload::OptimizedFromCache { id, hash, filename } => {
                Node::new(
                    id.clone(),
                    NodeVariant::Image(canvas_scene::ImageFields {
                        hash: Some(hash.clone()),
                        filename: filename.clone(),
                        src: None,
                        server_url: None,
                        server_filename: None,
                        thumbnail: None,
                        loading_state: canvas_scene::LoadingState::Idle,
                        loading_progress: 0.0,
                    }),
                )
            }
            UndoPayload::Stripped { id, hash, filename } => Node::new(
                id.clone(),
                NodeVariant::Image(canvas_scene::ImageFields {
                    hash: hash.clone(),
                    filename: filename.clone(),
                    src: None,
                    server_url: None,
                    server_filename: None,
                    thumbnail: None,
                    loading_state: canvas_scene::LoadingState::Failed,
                    loading_progress: 0.0,
                }),
            ),
        }
    }
}

fn snapshot_for_undo(node: &Node, media_resident: MediaResidencyCheck<'_>) -> UndoPayload {
    if let NodeVariant::Image(img) = &node.variant {
        if let Some(hash) = &img.hash {
            if let Some(server_url) = &img.server_url {
                return UndoPayload::OptimizedWithServer {
                    id: node.base.id.clone(),
                    server_url: server_url.clone(),
                    hash: hash.clone(),
                    filename: img.filename.clone(),
                };
            }
            if media_resident(hash) {
                return UndoPayload::OptimizedFromCache {
                    id: node.base.id.clone(),
                    hash: hash.clone(),
                    filename: img.filename.clone(),
                };
            }
            if node.base.approx_payload_bytes(&node.variant) > LARGE_UNDO_PAYLOAD_BYTES {
                return UndoPayload::Stripped {
                    id: node.base.id.clone(),
                    hash: Some(hash.clone()),
                    filename: img.filename.clone(),
                };
            }
        }
    }
    UndoPayload::Full(Box::new(node.clone()))
}

/// `node_delete`: snapshots each node (with media optimization), deselects,
/// and removes it from the graph.
///
/// Historically the stored undo payload used the key `undoData.nodes`;
/// newer code writes `undoData.deletedNodes`. Both are read on undo, only
/// the newer key is ever written.
#[derive(Debug)]
pub struct DeleteNode {
    /// Ids to delete.
    pub node_ids: Vec<NodeId>,
    deleted_nodes: Option<Vec<UndoPayload>>,
    legacy_nodes: Option<Vec<UndoPayload>>,
}

impl DeleteNode {
    /// Construct a pending delete command.
    pub fn new(node_ids: Vec<NodeId>) -> Self {
        Self {
            node_ids,
            deleted_nodes: None,
            legacy_nodes: None,
        }
    }

    /// Construct from a historical payload that only populated the legacy
    /// `nodes` key, exercising the read-both-keys compatibility path.
    #[cfg(test)]
    pub fn from_legacy_undo_data(node_ids: Vec<NodeId>, legacy_nodes: Vec<UndoPayload>) -> Self {
        Self {
            node_ids,
            deleted_nodes: None,
            legacy_nodes: Some(legacy_nodes),
        }
    }
}

impl Command for DeleteNode {
    fn command_type(&self) -> &'static str {
        "node_delete"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_ids.is_empty() {
            return Err(ValidationError::new("node_delete: no node ids supplied"));
        }
        Ok(())
    }

    fn prepare_undo(
        &mut self,
        ctx: &CommandContext<'_>,
        _initial_state: Option<&InteractionSnapshot>,
        media_resident: MediaResidencyCheck<'_>,
    ) {
        let mut snaps = Vec::with_capacity(self.node_ids.len());
        for id in &self.node_ids {
            if let Some(node) = ctx.graph.get(id) {
                snaps.push(snapshot_for_undo(node, media_resident));
            }
        }
        self.deleted_nodes = Some(snaps);
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let single = self.node_ids.len() == 1;
        let mut last_err = None;
        for id in self.node_ids.clone() {
            if let Err(e) = ctx.graph.remove(&id) {
                last_err = Some(CommandError::from(e));
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
        let snaps = self
            .deleted_nodes
            .clone()
            .or_else(|| self.legacy_nodes.clone())
            .unwrap_or_default();
        for payload in snaps {
            let node = payload.reconstruct();
            if ctx.graph.get(payload.id()).is_none() {
                let _ = ctx.graph.add(node);
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

/// Source data for `node_duplicate`: either ids to clone from the live
/// graph (Ctrl+D) or fully-formed node data (alt-drag). The distinction
/// matters for the sync layer's reconciliation, not for this command:
/// alt-drag never re-adds locally on remote echo, Ctrl+D respects the
/// global optimistic flag — both unify on this same `execute`, the policy
/// difference lives in `canvas-sync`.
#[derive(Debug, Clone)]
pub enum DuplicateSource {
    /// Clone these existing nodes, applying `offset`.
    NodeIds(Vec<NodeId>),
    /// Insert these already-offset, already-identified nodes verbatim.
    ExplicitData(Vec<Node>),
}

/// `node_duplicate`.
#[derive(Debug)]
pub struct DuplicateNode {
    /// Source nodes.
    pub source: DuplicateSource,
    /// Offset applied to `NodeIds`-sourced clones.
    pub offset: [f64; 2],
    /// Operation id stamped on every created node for reconciliation.
    pub operation_id: Option<String>,
    origin: Origin,
    created_ids: Vec<NodeId>,
}

impl DuplicateNode {
    /// Construct a pending duplicate command.
    pub fn new(
        source: DuplicateSource,
        offset: [f64; 2],
        operation_id: Option<String>,
        origin: Origin,
    ) -> Self {
        Self {
            source,
            offset,
            operation_id,
            origin,
            created_ids: Vec::new(),
        }
    }

    /// Ids created by the last successful `execute`.
    pub fn created_ids(&self) -> &[NodeId] {
        &self.created_ids
    }
}

impl Command for DuplicateNode {
    fn command_type(&self) -> &'static str {
        "node_duplicate"
    }

    fn validate(&self, ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if let DuplicateSource::NodeIds(ids) = &self.source {
            if ids.is_empty() {
                return Err(ValidationError::new("node_duplicate: no node ids supplied"));
            }
            if ids.iter().all(|id| ctx.graph.get(id).is_none()) {
                return Err(ValidationError::new("node_duplicate: no source nodes found"));
            }
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
        let sources: Vec<Node> = match &self.source {
            DuplicateSource::NodeIds(ids) => {
                ids.iter().filter_map(|id| ctx.graph.get(id).cloned()).collect()
            }
            DuplicateSource::ExplicitData(nodes) => nodes.clone(),
        };

        let mut created = Vec::with_capacity(sources.len());
        for mut node in sources {
            match &self.source {
                DuplicateSource::NodeIds(_) => {
                    let id = if self.origin == Origin::Local {
                        ctx.graph.mint_temp_id()
                    } else {
                        ctx.graph.next_real_id()
                    };
                    node.base.id = id;
                    node.base.position[0] += self.offset[0];
                    node.base.position[1] += self.offset[1];
                    node.base.z_index = None;
                    node.base.is_temporary = node.base.id.is_temp();
                }
                DuplicateSource::ExplicitData(_) => {
                    node.base.is_temporary = node.base.id.is_temp();
                }
            }
            node.base.operation_id = self.operation_id.clone();
            let id = ctx.graph.add(node)?;
            created.push(id);
        }
        self.created_ids = created;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        for id in self.created_ids.drain(..) {
            let _ = ctx.graph.remove(&id);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// `node_paste`: positions pasted nodes preserving the clipboard centroid.
#[derive(Debug)]
pub struct PasteNode {
    /// Clipboard node data.
    pub node_data: Vec<Node>,
    /// Target position for the clipboard centroid.
    pub target_position: [f64; 2],
    origin: Origin,
    created_ids: Vec<NodeId>,
}

impl PasteNode {
    /// Construct a pending paste command.
    pub fn new(node_data: Vec<Node>, target_position: [f64; 2], origin: Origin) -> Self {
        Self {
            node_data,
            target_position,
            origin,
            created_ids: Vec::new(),
        }
    }
}

fn centroid(nodes: &[Node]) -> [f64; 2] {
    if nodes.is_empty() {
        return [0.0, 0.0];
    }
    let (mut sx, mut sy) = (0.0, 0.0);
    for n in nodes {
        sx += n.base.position[0];
        sy += n.base.position[1];
    }
    #[allow(clippy::cast_precision_loss)]
    let count = nodes.len() as f64;
    [sx / count, sy / count]
}

impl Command for PasteNode {
    fn command_type(&self) -> &'static str {
        "node_paste"
    }

    fn validate(&self, _ctx: &CommandContext<'_>) -> Result<(), ValidationError> {
        if self.node_data.is_empty() {
            return Err(ValidationError::new("node_paste: empty clipboard"));
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
        let origin_centroid = centroid(&self.node_data);
        let mut created = Vec::with_capacity(self.node_data.len());
        for mut node in self.node_data.clone() {
            let id = if self.origin == Origin::Local {
                ctx.graph.mint_temp_id()
            } else {
                ctx.graph.next_real_id()
            };
            let dx = node.base.position[0] - origin_centroid[0];
            let dy = node.base.position[1] - origin_centroid[1];
            node.base.id = id;
            node.base.position = [self.target_position[0] + dx, self.target_position[1] + dy];
            node.base.z_index = None;
            node.base.is_temporary = node.base.id.is_temp();
            let id = ctx.graph.add(node)?;
            created.push(id);
        }
        self.created_ids = created;
        Ok(())
    }

    fn undo(&mut self, ctx: &mut CommandContext<'_>) {
        for id in self.created_ids.drain(..) {
            let _ = ctx.graph.remove(&id);
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
    use canvas_scene::{GraphId, SceneGraph};

    fn ctx(graph: &mut SceneGraph, origin: Origin) -> CommandContext<'_> {
        CommandContext::new(graph, origin)
    }

    fn no_media(_hash: &str) -> bool {
        false
    }

    #[test]
    fn create_then_undo_removes_node() {
        let mut graph = SceneGraph::new(GraphId(1));
        let mut cmd = CreateNode::new(
            CreateNodeParams {
                id: None,
                variant: NodeVariant::Shape,
                position: [1.0, 2.0],
                size: [10.0, 10.0],
                rotation: 0.0,
                aspect_ratio: None,
                properties: BTreeMap::new(),
                flags: BTreeMap::new(),
                title: None,
            },
            Origin::Local,
        );
        let mut c = ctx(&mut graph, Origin::Local);
        cmd.execute(&mut c).unwrap();
        let id = cmd.created_id().unwrap().clone();
        assert!(id.is_temp());
        assert!(c.graph.get(&id).is_some());
        cmd.undo(&mut c);
        assert!(c.graph.get(&id).is_none());
    }

    #[test]
    fn delete_then_undo_restores_full_snapshot() {
        let mut graph = SceneGraph::new(GraphId(1));
        let id = graph
            .add(Node::new(NodeId::Real(1), NodeVariant::Shape))
            .unwrap();

        let mut del = DeleteNode::new(vec![id.clone()]);
        {
            let c = ctx(&mut graph, Origin::Local);
            del.prepare_undo(&c, None, &no_media);
        }
        {
            let mut c = ctx(&mut graph, Origin::Local);
            del.execute(&mut c).unwrap();
            assert!(c.graph.get(&id).is_none());
            del.undo(&mut c);
            assert!(c.graph.get(&id).is_some());
        }
    }

    #[test]
    fn delete_undo_reads_legacy_key_when_new_key_absent() {
        let mut graph = SceneGraph::new(GraphId(1));
        let node = Node::new(NodeId::Real(5), NodeVariant::Shape);
        let legacy = vec![UndoPayload::Full(Box::new(node))];
        let mut del = DeleteNode::from_legacy_undo_data(vec![NodeId::Real(5)], legacy);
        let mut c = ctx(&mut graph, Origin::Local);
        del.undo(&mut c);
        assert!(c.graph.get(&NodeId::Real(5)).is_some());
    }

    #[test]
    fn delete_large_image_without_backing_is_stripped() {
        let mut graph = SceneGraph::new(GraphId(1));
        let big_src = format!("data:image/png;base64,{}", "A".repeat(200 * 1024));
        let mut img = canvas_scene::ImageFields::default();
        img.hash = Some("abc123".into());
        img.src = Some(big_src);
        let id = graph
            .add(Node::new(NodeId::Real(9), NodeVariant::Image(img)))
            .unwrap();

        let mut del = DeleteNode::new(vec![id]);
        let c = ctx(&mut graph, Origin::Local);
        del.prepare_undo(&c, None, &no_media);
        let payload = del.deleted_nodes.as_ref().unwrap().first().unwrap().clone();
        assert!(matches!(payload, UndoPayload::Stripped { .. }));
    }

    #[test]
    fn delete_image_with_server_url_is_optimized() {
        let mut graph = SceneGraph::new(GraphId(1));
        let mut img = canvas_scene::ImageFields::default();
        img.hash = Some("abc".into());
        img.server_url = Some("/m/abc.png".into());
        let id = graph
            .add(Node::new(NodeId::Real(2), NodeVariant::Image(img)))
            .unwrap();

        let mut del = DeleteNode::new(vec![id]);
        let c = ctx(&mut graph, Origin::Local);
        del.prepare_undo(&c, None, &no_media);
        let payload = del.deleted_nodes.as_ref().unwrap().first().unwrap().clone();
        assert!(matches!(payload, UndoPayload::OptimizedWithServer { .. }));
    }

    #[test]
    fn duplicate_alt_drag_explicit_data_preserves_ids() {
        let mut graph = SceneGraph::new(GraphId(1));
        let dup = Node::new(NodeId::Temp("temp_1".into()), NodeVariant::Shape);
        let mut cmd = DuplicateNode::new(
            DuplicateSource::ExplicitData(vec![dup]),
            [0.0, 0.0],
            Some("op-7".into()),
            Origin::Local,
        );
        let mut c = ctx(&mut graph, Origin::Local);
        cmd.execute(&mut c).unwrap();
        assert_eq!(cmd.created_ids(), &[NodeId::Temp("temp_1".into())]);
    }

    #[test]
    fn paste_preserves_clipboard_centroid() {
        let mut graph = SceneGraph::new(GraphId(1));
        let mut a = Node::new(NodeId::Real(1), NodeVariant::Shape);
        a.base.position = [0.0, 0.0];
        let mut b = Node::new(NodeId::Real(2), NodeVariant::Shape);
        b.base.position = [10.0, 0.0];

        let mut cmd = PasteNode::new(vec![a, b], [100.0, 100.0], Origin::Local);
        let mut c = ctx(&mut graph, Origin::Local);
        cmd.execute(&mut c).unwrap();
        let positions: Vec<[f64; 2]> = cmd
            .created_ids
            .iter()
            .map(|id| c.graph.get(id).unwrap().base.position)
            .collect();
        // centroid was [5,0]; offsets -5 and +5 around target [100,100]
        assert!(positions.contains(&[95.0, 100.0]));
        assert!(positions.contains(&[105.0, 100.0]));
    }
}
