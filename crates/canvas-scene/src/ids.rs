// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node identity.
//!
//! A node is addressed by [`NodeId`], which is either a server-assigned
//! `Real` id or a client-minted `Temp` id. Temp ids are rewritten in place
//! once the server assigns a real id (see [`crate::SceneGraph::remap`]);
//! every holder of a `NodeId` — pending operations, the undo stack, the
//! selection set, group `child_nodes` sets — goes through that one call so
//! the rewrite never misses a reference.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a scene graph instance (back-pointer target).
///
/// Nodes never hold a reference to their owning graph. Instead
/// [`crate::node::NodeBase::graph_id`] stores this small copyable id, and the
/// graph keeps the authoritative node table. This is the systems-language
/// rendering of the "non-enumerable weak association" the original browser
/// implementation used to dodge JSON cycles.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct GraphId(pub u64);

/// Node identifier: either server-authoritative or client-temporary.
///
/// Temp ids carry the `temp_` / `_temp_group_` prefix convention from the
/// wire protocol so a peer can recognize an id that has not yet round-tripped
/// through the server, without needing a side channel.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum NodeId {
    /// Server-assigned, stable identifier.
    Real(u64),
    /// Client-minted placeholder, valid only until the server ACKs it.
    Temp(String),
}

impl NodeId {
    /// `true` if this id has not yet been confirmed by the server.
    pub fn is_temp(&self) -> bool {
        matches!(self, NodeId::Temp(_))
    }

    /// The temp-id string, if this is a temp id.
    pub fn as_temp_str(&self) -> Option<&str> {
        match self {
            NodeId::Temp(s) => Some(s.as_str()),
            NodeId::Real(_) => None,
        }
    }

    /// `true` if this id was minted for a group created optimistically.
    ///
    /// Group creation is server-authoritative, so in practice no
    /// group ever carries a `_temp_group_` id that survives past the
    /// broadcast, but other commands still need to recognize the prefix
    /// when reconciling a mixed batch.
    pub fn is_temp_group(&self) -> bool {
        matches!(self, NodeId::Temp(s) if s.starts_with("_temp_group_"))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Real(n) => write!(f, "{n}"),
            NodeId::Temp(s) => write!(f, "{s}"),
        }
    }
}

/// Monotonic id minter used by the scene graph to hand out real ids and by
/// commands to mint temp ids for optimistic local nodes.
#[derive(Debug, Default)]
pub struct IdMinter {
    next_real: u64,
    next_temp: u64,
    next_temp_group: u64,
}

impl IdMinter {
    /// Create a minter starting at id `1` for every sequence.
    pub fn new() -> Self {
        Self {
            next_real: 1,
            next_temp: 1,
            next_temp_group: 1,
        }
    }

    /// Mint the next server-shaped real id. Used for local test doubles and
    /// for the authoritative path where the "server" is embedded.
    pub fn next_real_id(&mut self) -> NodeId {
        let id = self.next_real;
        self.next_real += 1;
        NodeId::Real(id)
    }

    /// Mint a `temp_{n}` id for an optimistic node.
    pub fn next_temp_id(&mut self) -> NodeId {
        let id = self.next_temp;
        self.next_temp += 1;
        NodeId::Temp(format!("temp_{id}"))
    }

    /// Mint a `_temp_group_{n}` id.
    ///
    /// Not used for optimistic application (group creation is
    /// authority-only) but kept so the pipeline can label a pending
    /// `group_create` request before the server responds.
    pub fn next_temp_group_id(&mut self) -> NodeId {
        let id = self.next_temp_group;
        self.next_temp_group += 1;
        NodeId::Temp(format!("_temp_group_{id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_ids_use_documented_prefixes() {
        let mut m = IdMinter::new();
        assert_eq!(m.next_temp_id().to_string(), "temp_1");
        assert_eq!(m.next_temp_group_id().to_string(), "_temp_group_1");
    }

    #[test]
    fn real_ids_are_monotonic() {
        let mut m = IdMinter::new();
        let a = m.next_real_id();
        let b = m.next_real_id();
        assert_eq!(a, NodeId::Real(1));
        assert_eq!(b, NodeId::Real(2));
    }

    #[test]
    fn is_temp_group_checks_prefix() {
        assert!(NodeId::Temp("_temp_group_7".into()).is_temp_group());
        assert!(!NodeId::Temp("temp_7".into()).is_temp_group());
        assert!(!NodeId::Real(7).is_temp_group());
    }
}
