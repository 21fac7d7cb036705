// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Upload retry/backoff bookkeeping.
//!
//! [`UploadCoordinator`] tracks state only; it never runs an async
//! executor itself. Callers drive [`UploadTransport::upload`] futures on
//! whatever runtime the embedder already has, and report outcomes back via
//! [`UploadCoordinator::on_success`]/[`UploadCoordinator::on_failure`].

use canvas_app_core::CanvasConfig;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Bytes and metadata for one upload attempt.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Content hash identifying the image.
    pub hash: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Filename as originally selected/pasted by the user, if known.
    pub original_filename: Option<String>,
}

/// Server response to a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResponse {
    /// Filename assigned by the server.
    pub server_filename: String,
}

/// Failure reason for an upload attempt.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The transport could not reach the server (network, timeout).
    #[error("transport error: {0}")]
    Transport(String),
    /// The server rejected the upload (4xx/5xx).
    #[error("server rejected upload: {0}")]
    Rejected(String),
}

/// Boxed future returned by [`UploadTransport::upload`]. Hand-rolled
/// instead of `async fn` in a trait (not object-safe) or the `async-trait`
/// macro crate, which this workspace's dependency stack never reaches for.
pub type BoxUploadFuture =
    Pin<Box<dyn Future<Output = Result<UploadResponse, UploadError>> + Send>>;

/// Transport seam for actually performing an upload; object-safe so
/// embedders can supply an HTTP client, a test double, or a no-op stub.
pub trait UploadTransport: Send + Sync {
    /// Upload `request`'s bytes, returning the server-assigned filename on
    /// success.
    fn upload(&self, request: UploadRequest) -> BoxUploadFuture;
}

#[derive(Debug, Clone)]
struct PendingUpload {
    attempts: u32,
    last_attempt: Instant,
    original_filename: Option<String>,
}

/// Tracks in-flight/retrying uploads and their backoff schedule. Holds no
/// transport and drives no clock internally: every call takes an explicit
/// `now`, matching [`canvas_app_core::clock::Cooldown`]'s convention.
pub struct UploadCoordinator {
    pending: HashMap<String, PendingUpload>,
    backoff_schedule: Vec<Duration>,
    max_attempts: u32,
    stale_after: Duration,
}

/// How long after a successful upload the caller should re-check sync
/// state.
pub const POST_UPLOAD_CHECK_DELAY: Duration = Duration::from_secs(1);

impl UploadCoordinator {
    /// Build a coordinator from the engine's tunable config.
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            pending: HashMap::new(),
            backoff_schedule: config
                .upload_retry_schedule_secs
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            max_attempts: config.max_upload_attempts,
            stale_after: Duration::from_secs(config.upload_stale_eviction_secs),
        }
    }

    /// `true` if `hash` already has an upload in flight or awaiting retry;
    /// callers should attach as an observer rather than starting a second
    /// upload for the same hash.
    pub fn is_pending(&self, hash: &str) -> bool {
        self.pending.contains_key(hash)
    }

    /// Record the start of a new upload attempt for `hash`. Returns
    /// `false` (and does not touch bookkeeping) if one is already
    /// in-flight.
    pub fn begin(&mut self, hash: &str, original_filename: Option<String>, now: Instant) -> bool {
        if self.pending.contains_key(hash) {
            return false;
        }
        self.pending.insert(
            hash.to_string(),
            PendingUpload {
                attempts: 1,
                last_attempt: now,
                original_filename,
            },
        );
        true
    }

    /// Record a successful upload, clearing its pending state. Returns the
    /// instant at which the caller should perform the delayed post-upload
    /// sync check.
    pub fn on_success(&mut self, hash: &str, now: Instant) -> Instant {
        self.pending.remove(hash);
        now + POST_UPLOAD_CHECK_DELAY
    }

    /// Record a failed attempt. Returns `Some(retry_at)` if another
    /// attempt remains under `max_attempts`, or `None` once attempts are
    /// exhausted (the caller should mark the upload failed and drop it via
    /// a follow-up [`UploadCoordinator::abandon`] call).
    pub fn on_failure(&mut self, hash: &str, now: Instant) -> Option<Instant> {
        let entry = self.pending.get_mut(hash)?;
        if entry.attempts >= self.max_attempts {
            return None;
        }
        let delay = self
            .backoff_schedule
            .get(entry.attempts as usize - 1)
            .copied()
            .unwrap_or_else(|| {
                self.backoff_schedule
                    .last()
                    .copied()
                    .unwrap_or(Duration::from_secs(1))
            });
        entry.attempts += 1;
        entry.last_attempt = now;
        Some(now + delay)
    }

    /// Drop a hash's pending state after attempts are exhausted or the
    /// caller otherwise gives up on it.
    pub fn abandon(&mut self, hash: &str) {
        self.pending.remove(hash);
    }

    /// Hashes whose next retry is due by `now`.
    pub fn due_for_retry(&self, now: Instant) -> Vec<String> {
        self.pending
            .iter()
            .filter(|(_, p)| {
                let elapsed = now.saturating_duration_since(p.last_attempt);
                let due = self
                    .backoff_schedule
                    .get(p.attempts as usize - 1)
                    .copied()
                    .unwrap_or(Duration::ZERO);
                elapsed >= due
            })
            .map(|(hash, _)| hash.clone())
            .collect()
    }

    /// Evict pending entries that have sat without a completed retry for
    /// longer than the stale-eviction window, returning the evicted
    /// hashes. The caller should mark their nodes failed.
    pub fn evict_stale(&mut self, now: Instant) -> Vec<String> {
        let stale: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| now.saturating_duration_since(p.last_attempt) >= self.stale_after)
            .map(|(hash, _)| hash.clone())
            .collect();
        for hash in &stale {
            self.pending.remove(hash);
            tracing::debug!(hash, "upload evicted as stale");
        }
        stale
    }

    /// Number of attempts made so far for `hash`, `0` if not pending.
    pub fn attempts(&self, hash: &str) -> u32 {
        self.pending.get(hash).map_or(0, |p| p.attempts)
    }

    /// Original filename recorded when the upload began, if any.
    pub fn original_filename(&self, hash: &str) -> Option<&str> {
        self.pending
            .get(hash)
            .and_then(|p| p.original_filename.as_deref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> CanvasConfig {
        CanvasConfig::default()
    }

    #[test]
    fn begin_refuses_a_second_concurrent_upload_for_the_same_hash() {
        let mut coord = UploadCoordinator::new(&config());
        let now = Instant::now();
        assert!(coord.begin("abc", None, now));
        assert!(!coord.begin("abc", None, now));
        assert!(coord.is_pending("abc"));
    }

    #[test]
    fn on_failure_schedules_backoff_until_attempts_exhausted() {
        let mut coord = UploadCoordinator::new(&config());
        let now = Instant::now();
        coord.begin("abc", None, now);
        let retry1 = coord.on_failure("abc", now).unwrap();
        assert_eq!(retry1, now + Duration::from_secs(2));
        let retry2 = coord.on_failure("abc", retry1).unwrap();
        assert_eq!(retry2, retry1 + Duration::from_secs(4));
        assert!(coord.on_failure("abc", retry2).is_none());
    }

    #[test]
    fn on_success_clears_pending_and_schedules_post_upload_check() {
        let mut coord = UploadCoordinator::new(&config());
        let now = Instant::now();
        coord.begin("abc", None, now);
        let check_at = coord.on_success("abc", now);
        assert_eq!(check_at, now + POST_UPLOAD_CHECK_DELAY);
        assert!(!coord.is_pending("abc"));
    }

    #[test]
    fn stale_pending_uploads_are_evicted() {
        let mut coord = UploadCoordinator::new(&config());
        let now = Instant::now();
        coord.begin("abc", None, now);
        let far_future = now + Duration::from_secs(301);
        let evicted = coord.evict_stale(far_future);
        assert_eq!(evicted, vec!["abc".to_string()]);
        assert!(!coord.is_pending("abc"));
    }
}
