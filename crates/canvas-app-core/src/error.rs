// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Top-level error taxonomy, shared across `canvas-*` crates so the
//! pipeline can classify a failure once and route it consistently.

use thiserror::Error;

/// The engine's error taxonomy. Per-crate errors (`canvas_commands::
/// CommandError`, etc.) convert into this at crate boundaries via `From`
/// impls defined alongside each error type, keeping each crate's own
/// error layered under one top-level type.
#[derive(Debug, Clone, Error)]
pub enum CanvasError {
    /// Bad params; surfaced to the caller, no state change.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Referenced node does not exist. Multi-node ops proceed with partial
    /// success; single-node ops fail.
    #[error("node not found: {0}")]
    NodeNotFound(String),
    /// Transport failure; the pipeline marks the op pending and retries on
    /// reconnect.
    #[error("network error: {0}")]
    Network(String),
    /// Upload failed; retried with backoff, then marked failed.
    #[error("upload error: {0}")]
    Upload(String),
    /// Authentication/authorization failure; deferred retry.
    #[error("auth error: {0}")]
    Auth(String),
    /// Unknown opId ack, id remap conflict, or missing node on broadcast;
    /// triggers a full sync.
    #[error("reconciliation error: {0}")]
    Reconciliation(String),
    /// Corrupted local state; clear pending set, request full sync, notify
    /// the user.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl CanvasError {
    /// `true` for error categories that should trigger a full-sync request
    /// (respecting the cooldown).
    pub fn triggers_full_sync(&self) -> bool {
        matches!(self, CanvasError::Reconciliation(_) | CanvasError::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconciliation_and_fatal_trigger_full_sync() {
        assert!(CanvasError::Reconciliation("x".into()).triggers_full_sync());
        assert!(CanvasError::Fatal("x".into()).triggers_full_sync());
        assert!(!CanvasError::Validation("x".into()).triggers_full_sync());
    }
}
