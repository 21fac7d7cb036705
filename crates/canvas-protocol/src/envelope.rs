// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire envelope: `{type, params, opId, origin, seq}`.

use canvas_commands::Origin;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-assigned operation id, echoed back on `ack`/`reject` so the
/// sender can resolve its pending-operation table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct OpId(pub u64);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire twin of [`Origin`]. Kept separate because `Origin` is an in-process
/// dispatch detail, not a wire concept — a peer never sends `Server`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireOrigin {
    /// Sent by the local client.
    Local,
    /// Arrived from another peer via the server.
    Remote,
}

impl From<WireOrigin> for Origin {
    fn from(o: WireOrigin) -> Self {
        match o {
            WireOrigin::Local => Origin::Local,
            WireOrigin::Remote => Origin::Remote,
        }
    }
}

/// A mutating operation in flight: `{type, params, opId, origin, seq}`.
/// `params` stays an opaque JSON value at this layer — [`crate::op::WireOp`]
/// gives it a typed shape once the envelope's `op_type` tag has been read.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpEnvelope {
    /// Catalog type name, e.g. `"node_move"`.
    #[serde(rename = "type")]
    pub op_type: String,
    /// Type-specific payload, shaped by `op_type`.
    pub params: serde_json::Value,
    /// Id assigned by the sender.
    #[serde(rename = "opId")]
    pub op_id: OpId,
    /// Who originated this envelope.
    pub origin: WireOrigin,
    /// Server-assigned sequence number, present once broadcast.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl OpEnvelope {
    /// Build a local envelope with no sequence number yet assigned.
    pub fn local(op_type: impl Into<String>, params: serde_json::Value, op_id: OpId) -> Self {
        Self {
            op_type: op_type.into(),
            params,
            op_id,
            origin: WireOrigin::Local,
            seq: None,
        }
    }
}
