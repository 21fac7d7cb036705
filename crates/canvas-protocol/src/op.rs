// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed wire params for every catalog command and the
//! [`OpEnvelope`](crate::envelope::OpEnvelope) → `Box<dyn Command>`
//! translation.
//!
//! One struct per `op_type`, named after the catalog command it carries.
//! Each carries `#[serde(rename_all = "camelCase")]` to match the
//! client-facing JSON wire convention; this crate is the only place that
//! convention is visible, everywhere else in the workspace is plain Rust
//! field names.

use crate::envelope::{OpEnvelope, WireOrigin};
use canvas_commands::{
    AlignAxis, AlignNode, BatchPropertyUpdate, Command, CreateNode, CreateNodeParams, DeleteNode,
    DuplicateNode, DuplicateSource, GroupAddNode, GroupCreate, GroupMove, GroupRemoveNode,
    GroupResize, GroupToggleCollapsed, GroupUpdateStyle, ImageUploadComplete, LayerDirection,
    LayerOrder, MoveNode, Origin, PasteNode, PropertyTarget, PropertyUpdate, PropertyUpdateEntry,
    ResetNode, ResizeNode, RotateNode, VideoToggle,
};
use canvas_scene::{GroupStyle, Node, NodeId, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure translating a wire envelope into a command.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// `op_type` did not match any entry in the catalog.
    #[error("unknown op type: {0}")]
    UnknownOpType(String),
    /// `params` did not match the shape `op_type` requires.
    #[error("malformed params for {op_type}: {source}")]
    Malformed {
        /// The op type being decoded.
        op_type: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateNodeWire {
    id: Option<NodeId>,
    variant: canvas_scene::NodeVariant,
    position: [f64; 2],
    size: [f64; 2],
    #[serde(default)]
    rotation: f64,
    #[serde(default)]
    aspect_ratio: Option<f64>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    flags: BTreeMap<String, bool>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteNodeWire {
    node_ids: Vec<NodeId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuplicateNodeWire {
    #[serde(default)]
    node_ids: Option<Vec<NodeId>>,
    #[serde(default)]
    node_data: Option<Vec<Node>>,
    #[serde(default)]
    offset: [f64; 2],
    #[serde(default)]
    operation_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasteNodeWire {
    node_data: Vec<Node>,
    target_position: [f64; 2],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveNodeWire {
    node_ids: Vec<NodeId>,
    positions: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResizeNodeWire {
    node_ids: Vec<NodeId>,
    sizes: Vec<[f64; 2]>,
    #[serde(default)]
    positions: Option<Vec<[f64; 2]>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RotateNodeWire {
    node_ids: Vec<NodeId>,
    rotations: Vec<f64>,
    #[serde(default)]
    positions: Option<Vec<[f64; 2]>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResetNodeWire {
    node_ids: Vec<NodeId>,
    #[serde(default)]
    reset_rotation: bool,
    #[serde(default)]
    reset_aspect_ratio: bool,
}

/// A property target on the wire: `"title"`, or a freeform key under
/// `properties`. Mirrors [`PropertyTarget`] without needing an internally
/// tagged enum for one field.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyTargetWire {
    #[serde(default)]
    key: Option<String>,
}

impl From<PropertyTargetWire> for PropertyTarget {
    fn from(t: PropertyTargetWire) -> Self {
        match t.key {
            Some(key) => PropertyTarget::Nested(key),
            None => PropertyTarget::Title,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PropertyUpdateWire {
    node_ids: Vec<NodeId>,
    #[serde(flatten)]
    target: PropertyTargetWire,
    value: PropertyValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchEntryWire {
    node_id: NodeId,
    #[serde(flatten)]
    target: PropertyTargetWire,
    value: PropertyValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchPropertyUpdateWire {
    updates: Vec<BatchEntryWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayerOrderWire {
    node_ids: Vec<NodeId>,
    direction: WireLayerDirection,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
enum WireLayerDirection {
    /// Toward the end of the paint order.
    Up,
    /// Toward the start of the paint order.
    Down,
}

impl From<WireLayerDirection> for LayerDirection {
    fn from(d: WireLayerDirection) -> Self {
        match d {
            WireLayerDirection::Up => LayerDirection::Up,
            WireLayerDirection::Down => LayerDirection::Down,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlignNodeWire {
    node_ids: Vec<NodeId>,
    positions: Vec<[f64; 2]>,
    #[serde(default)]
    sizes: Option<Vec<[f64; 2]>>,
    axis: WireAlignAxis,
}

#[derive(Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireAlignAxis {
    /// Single horizontal line.
    Horizontal,
    /// Single vertical line.
    Vertical,
    /// Grid layout.
    Grid,
}

impl From<WireAlignAxis> for AlignAxis {
    fn from(a: WireAlignAxis) -> Self {
        match a {
            WireAlignAxis::Horizontal => AlignAxis::Horizontal,
            WireAlignAxis::Vertical => AlignAxis::Vertical,
            WireAlignAxis::Grid => AlignAxis::Grid,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoToggleWire {
    node_id: NodeId,
    #[serde(default)]
    paused: Option<bool>,
}

/// Payload for `image_upload_complete`. Historical clients sent the
/// server-assigned filename as `filename`; current clients send
/// `serverFilename`. Both are accepted, `serverFilename` wins when both are
/// present — this is the one field-spelling shim this crate exists to own.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageUploadCompleteWire {
    hash: String,
    server_url: String,
    #[serde(default)]
    server_filename: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupCreateWire {
    #[serde(default)]
    id: Option<NodeId>,
    child_node_ids: Vec<NodeId>,
    position: [f64; 2],
    size: [f64; 2],
    #[serde(default)]
    min_size: [f64; 2],
    #[serde(default)]
    style: GroupStyle,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupChildWire {
    group_id: NodeId,
    node_id: NodeId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupMoveWire {
    group_id: NodeId,
    position: [f64; 2],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupResizeWire {
    group_id: NodeId,
    size: [f64; 2],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupToggleCollapsedWire {
    group_id: NodeId,
    #[serde(default)]
    collapsed: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupUpdateStyleWire {
    group_id: NodeId,
    style: GroupStyle,
}

fn decode<T: for<'de> Deserialize<'de>>(
    op_type: &str,
    params: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(params).map_err(|source| ProtocolError::Malformed {
        op_type: op_type.to_string(),
        source,
    })
}

/// Decode an envelope into a ready-to-run command. `op_id`/`origin` are
/// carried on the envelope itself; the returned command is otherwise
/// indistinguishable from one built directly via the catalog constructors.
pub fn decode_command(env: &OpEnvelope) -> Result<Box<dyn Command>, ProtocolError> {
    let origin = Origin::from(env.origin);
    let params = env.params.clone();
    let op_type = env.op_type.as_str();
    let cmd: Box<dyn Command> = match op_type {
        "node_create" => {
            let w: CreateNodeWire = decode(op_type, params)?;
            Box::new(CreateNode::new(
                CreateNodeParams {
                    id: w.id,
                    variant: w.variant,
                    position: w.position,
                    size: w.size,
                    rotation: w.rotation,
                    aspect_ratio: w.aspect_ratio,
                    properties: w.properties,
                    flags: w.flags,
                    title: w.title,
                },
                origin,
            ))
        }
        "node_delete" => {
            let w: DeleteNodeWire = decode(op_type, params)?;
            Box::new(DeleteNode::new(w.node_ids))
        }
        "node_duplicate" => {
            let w: DuplicateNodeWire = decode(op_type, params)?;
            let source = match (w.node_ids, w.node_data) {
                (_, Some(data)) => DuplicateSource::ExplicitData(data),
                (Some(ids), None) => DuplicateSource::NodeIds(ids),
                (None, None) => DuplicateSource::NodeIds(Vec::new()),
            };
            Box::new(DuplicateNode::new(source, w.offset, w.operation_id, origin))
        }
        "node_paste" => {
            let w: PasteNodeWire = decode(op_type, params)?;
            Box::new(PasteNode::new(w.node_data, w.target_position, origin))
        }
        "node_move" => {
            let w: MoveNodeWire = decode(op_type, params)?;
            Box::new(MoveNode::new(w.node_ids, w.positions, origin))
        }
        "node_resize" => {
            let w: ResizeNodeWire = decode(op_type, params)?;
            Box::new(ResizeNode::new(w.node_ids, w.sizes, w.positions, origin))
        }
        "node_rotate" => {
            let w: RotateNodeWire = decode(op_type, params)?;
            Box::new(RotateNode::new(w.node_ids, w.rotations, w.positions))
        }
        "node_reset" => {
            let w: ResetNodeWire = decode(op_type, params)?;
            Box::new(ResetNode::new(
                w.node_ids,
                w.reset_rotation,
                w.reset_aspect_ratio,
            ))
        }
        "node_property_update" => {
            let w: PropertyUpdateWire = decode(op_type, params)?;
            Box::new(PropertyUpdate::new(w.node_ids, w.target.into(), w.value))
        }
        "node_batch_property_update" => {
            let w: BatchPropertyUpdateWire = decode(op_type, params)?;
            let updates = w
                .updates
                .into_iter()
                .map(|e| PropertyUpdateEntry {
                    node_id: e.node_id,
                    target: e.target.into(),
                    value: e.value,
                })
                .collect();
            Box::new(BatchPropertyUpdate::new(updates))
        }
        "node_layer_order" => {
            let w: LayerOrderWire = decode(op_type, params)?;
            Box::new(LayerOrder::new(w.node_ids, w.direction.into()))
        }
        "node_align" => {
            let w: AlignNodeWire = decode(op_type, params)?;
            Box::new(AlignNode::new(
                w.node_ids,
                w.positions,
                w.sizes,
                w.axis.into(),
            ))
        }
        "video_toggle" => {
            let w: VideoToggleWire = decode(op_type, params)?;
            Box::new(VideoToggle::new(w.node_id, w.paused))
        }
        "image_upload_complete" => {
            let w: ImageUploadCompleteWire = decode(op_type, params)?;
            let server_filename = w.server_filename.or(w.filename);
            Box::new(ImageUploadComplete::new(w.hash, w.server_url, server_filename))
        }
        "group_create" => {
            let w: GroupCreateWire = decode(op_type, params)?;
            Box::new(GroupCreate::new(
                w.id,
                w.child_node_ids,
                w.position,
                w.size,
                w.min_size,
                w.style,
                origin,
            ))
        }
        "group_add_node" => {
            let w: GroupChildWire = decode(op_type, params)?;
            Box::new(GroupAddNode::new(w.group_id, w.node_id))
        }
        "group_remove_node" => {
            let w: GroupChildWire = decode(op_type, params)?;
            Box::new(GroupRemoveNode::new(w.group_id, w.node_id))
        }
        "group_move" => {
            let w: GroupMoveWire = decode(op_type, params)?;
            Box::new(GroupMove::new(w.group_id, w.position))
        }
        "group_resize" => {
            let w: GroupResizeWire = decode(op_type, params)?;
            Box::new(GroupResize::new(w.group_id, w.size))
        }
        "group_toggle_collapsed" => {
            let w: GroupToggleCollapsedWire = decode(op_type, params)?;
            Box::new(GroupToggleCollapsed::new(w.group_id, w.collapsed))
        }
        "group_update_style" => {
            let w: GroupUpdateStyleWire = decode(op_type, params)?;
            Box::new(GroupUpdateStyle::new(w.group_id, w.style))
        }
        other => return Err(ProtocolError::UnknownOpType(other.to_string())),
    };
    Ok(cmd)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::envelope::OpId;
    use serde_json::json;

    #[test]
    fn decodes_node_move() {
        let env = OpEnvelope {
            op_type: "node_move".to_string(),
            params: json!({"nodeIds": [{"Real": 1}], "positions": [[1.0, 2.0]]}),
            op_id: OpId(1),
            origin: WireOrigin::Local,
            seq: None,
        };
        let cmd = decode_command(&env).unwrap();
        assert_eq!(cmd.command_type(), "node_move");
    }

    #[test]
    fn image_upload_complete_accepts_legacy_filename_key() {
        let env = OpEnvelope {
            op_type: "image_upload_complete".to_string(),
            params: json!({"hash": "abc", "serverUrl": "/m/abc.png", "filename": "cat.png"}),
            op_id: OpId(2),
            origin: WireOrigin::Local,
            seq: None,
        };
        let cmd = decode_command(&env).unwrap();
        assert_eq!(cmd.command_type(), "image_upload_complete");
    }

    #[test]
    fn unknown_op_type_errors() {
        let env = OpEnvelope {
            op_type: "node_teleport".to_string(),
            params: json!({}),
            op_id: OpId(3),
            origin: WireOrigin::Local,
            seq: None,
        };
        assert!(matches!(
            decode_command(&env),
            Err(ProtocolError::UnknownOpType(_))
        ));
    }
}
