// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node types: a shared base record plus a tagged payload per variant.
//!
//! Command dispatch reads the variant tag rather than relying on subclass
//! identity, so this stays a closed enum instead of a trait object
//! hierarchy.

use crate::ids::{GraphId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Scalar property value for the freeform `properties` map.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// Numeric value (integers are stored as whole floats).
    Number(f64),
    /// String value.
    String(String),
    /// Explicit null/absence, distinct from a missing key.
    Null,
}

/// Image decode/upload lifecycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LoadingState {
    /// Not yet started.
    Idle,
    /// Bytes are being fetched/decoded.
    Loading,
    /// Fully loaded and ready to render.
    Loaded,
    /// Deliberately deferred (e.g. offscreen virtualization).
    Deferred,
    /// Load failed; see `loading_progress` for the last known value.
    Failed,
}

/// Image-specific fields, including the upload-dedup key.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Default)]
pub struct ImageFields {
    /// Content hash of the image bytes (primary dedup key for uploads).
    pub hash: Option<String>,
    /// Original filename as supplied by the client.
    pub filename: Option<String>,
    /// Current source: a `data:` URL or a server-relative URL.
    pub src: Option<String>,
    /// Server URL once the upload for `hash` has completed. Source of
    /// truth over `src`/`data:` once set.
    pub server_url: Option<String>,
    /// Server-assigned filename, once known.
    pub server_filename: Option<String>,
    /// Optional low-res thumbnail (data URL or server URL).
    pub thumbnail: Option<String>,
    /// Decode/upload lifecycle state.
    pub loading_state: LoadingState,
    /// Fractional load progress in `[0.0, 1.0]`.
    pub loading_progress: f32,
}

impl Default for LoadingState {
    fn default() -> Self {
        LoadingState::Idle
    }
}

/// Video-specific fields.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Default)]
pub struct VideoFields {
    /// Video source URL.
    pub video: Option<String>,
    /// Paused state.
    pub paused: bool,
    /// Loop playback.
    pub looped: bool,
    /// Muted audio track.
    pub muted: bool,
    /// Autoplay on load (may be rejected by the playback host).
    pub autoplay: bool,
}

/// Visual style knobs for a group frame.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Default)]
pub struct GroupStyle {
    /// Optional fill/stroke color, as an opaque string (e.g. `"#3366ff"`).
    pub color: Option<String>,
}

/// Group-specific fields.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Default)]
pub struct GroupFields {
    /// Member node ids. Always a set of ids, never object references —
    /// a node belongs to at most one group.
    pub child_nodes: BTreeSet<NodeId>,
    /// Collapsed/expanded presentation state.
    pub is_collapsed: bool,
    /// Visual style.
    pub style: GroupStyle,
    /// Minimum size the group frame may shrink to.
    pub min_size: [f64; 2],
    /// Set for ~1s after an alignment animation completes on this group's
    /// children, suppressing bounds recompute so the animation's final
    /// frame isn't immediately overwritten.
    #[serde(skip)]
    pub alignment_just_completed: bool,
}

/// Text-specific fields.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize, Default)]
pub struct TextFields {
    /// Text content.
    pub text: String,
}

/// Variant payload, tagged by node type.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeVariant {
    /// Image node.
    Image(ImageFields),
    /// Video node.
    Video(VideoFields),
    /// Plain text node.
    Text(TextFields),
    /// Vector/primitive shape node (color etc. live in `properties`).
    Shape,
    /// Container node with child membership.
    Group(GroupFields),
}

impl NodeVariant {
    /// Short type tag matching the wire/command vocabulary (`image`,
    /// `video`, `text`, `shape`, `group`).
    pub fn kind(&self) -> &'static str {
        match self {
            NodeVariant::Image(_) => "image",
            NodeVariant::Video(_) => "video",
            NodeVariant::Text(_) => "text",
            NodeVariant::Shape => "shape",
            NodeVariant::Group(_) => "group",
        }
    }

    /// View as group fields, if this is a group node.
    pub fn as_group(&self) -> Option<&GroupFields> {
        match self {
            NodeVariant::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Mutable view as group fields, if this is a group node.
    pub fn as_group_mut(&mut self) -> Option<&mut GroupFields> {
        match self {
            NodeVariant::Group(g) => Some(g),
            _ => None,
        }
    }

    /// View as image fields, if this is an image node.
    pub fn as_image(&self) -> Option<&ImageFields> {
        match self {
            NodeVariant::Image(i) => Some(i),
            _ => None,
        }
    }

    /// Mutable view as image fields, if this is an image node.
    pub fn as_image_mut(&mut self) -> Option<&mut ImageFields> {
        match self {
            NodeVariant::Image(i) => Some(i),
            _ => None,
        }
    }

    /// View as video fields, if this is a video node.
    pub fn as_video(&self) -> Option<&VideoFields> {
        match self {
            NodeVariant::Video(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable view as video fields, if this is a video node.
    pub fn as_video_mut(&mut self) -> Option<&mut VideoFields> {
        match self {
            NodeVariant::Video(v) => Some(v),
            _ => None,
        }
    }
}

/// Fields shared by every node variant.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct NodeBase {
    /// Unique id within the owning scene graph.
    pub id: NodeId,
    /// Position `[x, y]`.
    pub position: [f64; 2],
    /// Size `[w, h]`.
    pub size: [f64; 2],
    /// Rotation in radians.
    pub rotation: f64,
    /// Width/height ratio, kept in sync by `node_resize`.
    pub aspect_ratio: f64,
    /// Aspect ratio at creation time; restored by `node_reset`.
    pub original_aspect: f64,
    /// Whether resizes preserve `aspect_ratio`.
    pub locked_aspect_ratio: bool,
    /// When `locked_aspect_ratio` is set, the ratio resize locks to.
    pub locked_aspect_value: Option<f64>,
    /// Boolean flags. Constructor defaults are preserved across merges —
    /// only keys explicitly present in an update override an existing key.
    pub flags: BTreeMap<String, bool>,
    /// Freeform nested properties (e.g. image `hash`/`src`, color-correction).
    pub properties: BTreeMap<String, PropertyValue>,
    /// Optional display title.
    pub title: Option<String>,
    /// Paint order; `None` until the graph assigns one on `add`.
    pub z_index: Option<i64>,
    /// `true` for a node that exists only pending server confirmation.
    #[serde(default)]
    pub is_temporary: bool,
    /// Group this node currently belongs to, if any. A node belongs to at
    /// most one group; joining a new group clears this from the old one.
    pub parent_group: Option<NodeId>,
    /// Operation id stamped on optimistically-duplicated nodes so the
    /// server's matching broadcast becomes a no-op for local origin.
    pub operation_id: Option<String>,
    /// Non-enumerable back-pointer to the owning graph. Never serialized;
    /// see module docs on why this can't cause a cycle.
    #[serde(skip)]
    pub graph_id: Option<GraphId>,
}

impl NodeBase {
    /// Construct a base record with the given id and otherwise-default
    /// fields, preserving constructor defaults for `flags`.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            position: [0.0, 0.0],
            size: [0.0, 0.0],
            rotation: 0.0,
            aspect_ratio: 1.0,
            original_aspect: 1.0,
            locked_aspect_ratio: false,
            locked_aspect_value: None,
            flags: BTreeMap::new(),
            properties: BTreeMap::new(),
            title: None,
            z_index: None,
            is_temporary: false,
            parent_group: None,
            operation_id: None,
            graph_id: None,
        }
    }

    /// Merge `overrides` into `flags`, keeping any key not present in
    /// `overrides` at its current (constructor-default) value.
    pub fn merge_flags(&mut self, overrides: &BTreeMap<String, bool>) {
        for (k, v) in overrides {
            self.flags.insert(k.clone(), *v);
        }
    }

    /// Approximate in-memory size of this node's variable-length data, used
    /// to decide whether undo payloads need media stripping against the
    /// ~100KB threshold.
    pub fn approx_payload_bytes(&self, variant: &NodeVariant) -> usize {
        let mut total = 0usize;
        for v in self.properties.values() {
            if let PropertyValue::String(s) = v {
                total += s.len();
            }
        }
        if let NodeVariant::Image(img) = variant {
            total += img.src.as_ref().map_or(0, String::len);
            total += img.thumbnail.as_ref().map_or(0, String::len);
        }
        total
    }
}

/// A node: shared base plus variant payload.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Node {
    /// Fields common to every variant.
    pub base: NodeBase,
    /// Variant-specific payload.
    pub variant: NodeVariant,
}

impl Node {
    /// Construct a node of the given variant with the given id.
    pub fn new(id: NodeId, variant: NodeVariant) -> Self {
        Self {
            base: NodeBase::new(id),
            variant,
        }
    }

    /// Convenience accessor for the node id.
    pub fn id(&self) -> &NodeId {
        &self.base.id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn merge_flags_preserves_unmentioned_keys() {
        let mut base = NodeBase::new(NodeId::Real(1));
        base.flags.insert("locked".into(), true);
        base.flags.insert("visible".into(), true);

        let mut overrides = BTreeMap::new();
        overrides.insert("visible".into(), false);
        base.merge_flags(&overrides);

        assert_eq!(base.flags.get("locked"), Some(&true));
        assert_eq!(base.flags.get("visible"), Some(&false));
    }

    #[test]
    fn variant_kind_matches_vocabulary() {
        assert_eq!(NodeVariant::Shape.kind(), "shape");
        assert_eq!(NodeVariant::Group(GroupFields::default()).kind(), "group");
    }

    #[test]
    fn graph_id_is_not_serialized() {
        let mut node = Node::new(NodeId::Real(1), NodeVariant::Shape);
        node.base.graph_id = Some(GraphId(42));
        let json = serde_json::to_string(&node).expect("serialize");
        assert!(!json.contains("graph_id"));
        assert!(!json.contains("42"), "graph id value must not leak: {json}");
    }
}
