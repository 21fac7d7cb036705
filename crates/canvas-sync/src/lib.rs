// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! State synchronization manager for the collaborative canvas edit engine.
//!
//! Owns the pending-operations table, the optimistic-vs-authority decision
//! per command type, `_operationId`-based duplicate reconciliation for
//! optimistically-duplicated nodes, the temp-id remap fan-out, remote
//! sequence ordering, and the `requestFullSync` cooldown. Does not execute
//! commands itself — that's `canvas-pipeline`'s job; this crate decides
//! *whether* and *how* to call into it.
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

use canvas_app_core::{CanvasConfig, Cooldown};
use canvas_scene::NodeId;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use thiserror::Error;

/// Command type name for which optimistic local apply is never used:
/// a phantom local group would confuse the user before the server
/// assigns its real id.
pub const AUTHORITY_ONLY_COMMAND_TYPE: &str = "group_create";

/// A locally-issued operation awaiting server ACK or broadcast echo.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    /// Wire/catalog command type name.
    pub command_type: &'static str,
    /// Node ids touched by this operation (temp ids before resolution).
    pub node_ids: Vec<NodeId>,
    /// When this operation was submitted, for stale-pending detection.
    pub submitted_at: Instant,
}

/// Reconciliation failures that should trigger a full sync.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Server ACK referenced an operation id we have no pending entry for.
    #[error("ack for unknown operation {0}")]
    OrphanAck(u64),
}

/// Tracks pending operations, the optimistic/authority split, duplicate
/// reconciliation, temp-id remap, and sequence ordering.
pub struct StateSyncManager {
    pending: HashMap<u64, PendingOperation>,
    optimistic_enabled: bool,
    seen_operation_ids: HashSet<String>,
    last_seq: Option<u64>,
    full_sync_cooldown: Cooldown,
}

impl StateSyncManager {
    /// Construct a manager from the engine's tunable config, with
    /// optimistic apply enabled by default.
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            pending: HashMap::new(),
            optimistic_enabled: true,
            seen_operation_ids: HashSet::new(),
            last_seq: None,
            full_sync_cooldown: Cooldown::new(std::time::Duration::from_secs(
                config.full_sync_cooldown_secs,
            )),
        }
    }

    /// Globally enable/disable optimistic local apply. Authority-only
    /// command types (`group_create`) never apply optimistically
    /// regardless of this flag.
    pub fn set_optimistic_enabled(&mut self, enabled: bool) {
        self.optimistic_enabled = enabled;
    }

    /// `true` if a command of `command_type` should be applied locally
    /// before the server round-trip.
    pub fn is_optimistic(&self, command_type: &str) -> bool {
        self.optimistic_enabled && command_type != AUTHORITY_ONLY_COMMAND_TYPE
    }

    /// Register a newly-submitted operation as pending.
    pub fn submit(
        &mut self,
        op_id: u64,
        command_type: &'static str,
        node_ids: Vec<NodeId>,
        now: Instant,
    ) {
        self.pending.insert(
            op_id,
            PendingOperation {
                command_type,
                node_ids,
                submitted_at: now,
            },
        );
    }

    /// `true` if `op_id` is still awaiting resolution.
    pub fn is_pending(&self, op_id: u64) -> bool {
        self.pending.contains_key(&op_id)
    }

    /// Resolve a server ACK for `op_id`, removing it from the pending
    /// table. Errors with [`SyncError::OrphanAck`] (and triggers no state
    /// change) if no such operation is pending — the caller should then
    /// call [`StateSyncManager::request_full_sync`].
    pub fn ack(&mut self, op_id: u64) -> Result<PendingOperation, SyncError> {
        self.pending
            .remove(&op_id)
            .ok_or(SyncError::OrphanAck(op_id))
    }

    /// Resolve a server rejection for `op_id`, returning the pending entry
    /// (so the caller can look up and invoke its command's `undo`) if one
    /// existed.
    pub fn reject(&mut self, op_id: u64) -> Option<PendingOperation> {
        self.pending.remove(&op_id)
    }

    /// Rewrite `old` to `new` across every pending operation's node id
    /// list, alongside the matching `SceneGraph::remap` call the caller
    /// performs on the graph itself.
    pub fn remap_pending(&mut self, old: &NodeId, new: &NodeId) {
        for op in self.pending.values_mut() {
            for id in &mut op.node_ids {
                if id == old {
                    *id = new.clone();
                }
            }
        }
    }

    /// Record an `_operationId` tag written on an optimistically
    /// duplicated node (alt-drag), so the matching broadcast echo can be
    /// recognized as a no-op rather than a second insert.
    pub fn record_operation_id(&mut self, operation_id: impl Into<String>) {
        self.seen_operation_ids.insert(operation_id.into());
    }

    /// `true` if `operation_id` was already applied locally — the caller
    /// should skip re-applying a remote `node_duplicate` carrying this id
    /// for local origin, while still treating it as additive for any other
    /// peer's origin.
    pub fn is_duplicate_echo(&self, operation_id: &str) -> bool {
        self.seen_operation_ids.contains(operation_id)
    }

    /// Accept or reject a remote op's server sequence number. Returns
    /// `true` (and advances `last_seq`) if `seq` is strictly greater than
    /// the last-applied sequence; returns `false` without mutating state
    /// for a sequence at or below it.
    pub fn accept_seq(&mut self, seq: u64) -> bool {
        if let Some(last) = self.last_seq {
            if seq <= last {
                tracing::debug!(seq, last, "dropped remote op at or below last-applied seq");
                return false;
            }
        }
        self.last_seq = Some(seq);
        true
    }

    /// The last accepted remote sequence number, if any has arrived yet.
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Request a full sync, respecting the cooldown. Returns `true` if the
    /// request should actually be sent (and marks the cooldown triggered);
    /// `false` if one was requested too recently.
    pub fn request_full_sync(&mut self, now: Instant) -> bool {
        if !self.full_sync_cooldown.ready(now) {
            tracing::debug!("full sync requested but suppressed by cooldown");
            return false;
        }
        self.full_sync_cooldown.trigger(now);
        tracing::debug!("full sync requested");
        true
    }

    /// Pending operations whose `submitted_at` is older than `max_age`
    /// relative to `now` — candidates for the caller to mark failed and
    /// drop, mirroring the upload coordinator's stale-pending eviction.
    pub fn stale_pending(&self, now: Instant, max_age: std::time::Duration) -> Vec<u64> {
        self.pending
            .iter()
            .filter(|(_, op)| now.saturating_duration_since(op.submitted_at) >= max_age)
            .map(|(id, _)| *id)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> CanvasConfig {
        CanvasConfig::default()
    }

    #[test]
    fn group_create_is_never_optimistic_regardless_of_global_flag() {
        let mgr = StateSyncManager::new(&config());
        assert!(!mgr.is_optimistic("group_create"));
        assert!(mgr.is_optimistic("node_move"));
    }

    #[test]
    fn ack_removes_pending_entry() {
        let mut mgr = StateSyncManager::new(&config());
        let now = Instant::now();
        mgr.submit(1, "node_move", vec![NodeId::Real(1)], now);
        assert!(mgr.is_pending(1));
        let resolved = mgr.ack(1).unwrap();
        assert_eq!(resolved.command_type, "node_move");
        assert!(!mgr.is_pending(1));
    }

    #[test]
    fn ack_of_unknown_op_is_an_orphan() {
        let mut mgr = StateSyncManager::new(&config());
        assert_eq!(mgr.ack(999), Err(SyncError::OrphanAck(999)));
    }

    #[test]
    fn remap_pending_rewrites_temp_id_in_node_list() {
        let mut mgr = StateSyncManager::new(&config());
        let now = Instant::now();
        let temp = NodeId::Temp("temp_1".into());
        mgr.submit(1, "node_create", vec![temp.clone()], now);
        let real = NodeId::Real(7);
        mgr.remap_pending(&temp, &real);
        let op = mgr.pending.get(&1).unwrap();
        assert_eq!(op.node_ids, vec![real]);
    }

    #[test]
    fn duplicate_echo_is_recognized_after_recording() {
        let mut mgr = StateSyncManager::new(&config());
        assert!(!mgr.is_duplicate_echo("op-7"));
        mgr.record_operation_id("op-7");
        assert!(mgr.is_duplicate_echo("op-7"));
    }

    #[test]
    fn accept_seq_drops_stale_and_equal_sequences() {
        let mut mgr = StateSyncManager::new(&config());
        assert!(mgr.accept_seq(10));
        assert!(!mgr.accept_seq(10));
        assert!(!mgr.accept_seq(5));
        assert!(mgr.accept_seq(11));
        assert_eq!(mgr.last_seq(), Some(11));
    }

    #[test]
    fn full_sync_respects_cooldown() {
        let mut mgr = StateSyncManager::new(&config());
        let start = Instant::now();
        assert!(mgr.request_full_sync(start));
        assert!(!mgr.request_full_sync(start + std::time::Duration::from_secs(1)));
        assert!(mgr.request_full_sync(start + std::time::Duration::from_secs(3)));
    }

    #[test]
    fn stale_pending_reports_operations_past_max_age() {
        let mut mgr = StateSyncManager::new(&config());
        let start = Instant::now();
        mgr.submit(1, "node_move", vec![NodeId::Real(1)], start);
        assert!(mgr
            .stale_pending(start + std::time::Duration::from_secs(1), std::time::Duration::from_secs(5))
            .is_empty());
        let stale = mgr.stale_pending(
            start + std::time::Duration::from_secs(10),
            std::time::Duration::from_secs(5),
        );
        assert_eq!(stale, vec![1]);
    }
}
