// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Non-mutation wire messages: `request_state`, `state_delta`, `ack`,
//! `reject`, `presence`, `cursor`.

use crate::envelope::{OpEnvelope, OpId};
use canvas_scene::NodeId;
use serde::{Deserialize, Serialize};

/// Every message a client or server sends over the session connection.
/// Mutating operations use [`Message::Op`]; everything else is control
/// traffic.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A mutating operation envelope.
    Op(OpEnvelope),
    /// Client asks the server for a full scene snapshot, typically after a
    /// reconciliation failure or on initial connect.
    RequestState,
    /// Server's answer to `request_state` or periodic resync: the full set
    /// of operations needed to reconstruct current state.
    StateDelta {
        /// Ops to replay, in order.
        ops: Vec<OpEnvelope>,
        /// Sequence number of the last op included.
        seq: u64,
    },
    /// Server confirms an operation was applied. `ids`, when present, are
    /// server-assigned ids replacing the client's temp ids in the order the
    /// command created them.
    Ack {
        /// The operation being confirmed.
        op_id: OpId,
        /// Server-assigned ids, for id-minting commands.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ids: Option<Vec<NodeId>>,
    },
    /// Server rejects an operation; the client must undo its optimistic
    /// apply.
    Reject {
        /// The operation being rejected.
        op_id: OpId,
        /// Human-readable reason, surfaced to the user.
        reason: String,
    },
    /// Peer cursor/selection broadcast, informational only.
    Presence {
        /// Opaque peer identifier.
        peer_id: String,
        /// Currently selected node ids, if any.
        #[serde(default)]
        selection: Vec<NodeId>,
    },
    /// Peer pointer position broadcast, informational only.
    Cursor {
        /// Opaque peer identifier.
        peer_id: String,
        /// Canvas-space position.
        position: [f64; 2],
    },
}
