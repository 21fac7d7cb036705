// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! User-facing notification queue for network/upload/auth errors.
//! Explicit-clock, like [`crate::clock::Cooldown`]: the caller drives
//! `now` instead of the service reading the system clock.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Informational note (e.g. "reconnected").
    Info,
    /// Recoverable problem the user may want to know about.
    Warn,
    /// Error requiring user awareness (e.g. upload failed after retries).
    Error,
}

/// Stable identifier for a queued notice.
pub type NoticeId = u64;

#[derive(Debug, Clone)]
struct Notice {
    id: NoticeId,
    kind: NoticeKind,
    title: String,
    body: Option<String>,
    ttl: Duration,
    created: Instant,
}

/// Render-ready view of a notice, with remaining-lifetime progress.
#[derive(Debug, Clone)]
pub struct NoticeView {
    /// Stable identifier.
    pub id: NoticeId,
    /// Severity.
    pub kind: NoticeKind,
    /// Short title line.
    pub title: String,
    /// Optional detail text.
    pub body: Option<String>,
    /// `1.0` just created, `0.0` about to expire.
    pub progress: f32,
}

/// In-memory notice queue with TTL and a short dedupe window, so repeated
/// transport errors during a reconnect storm don't spam the user.
pub struct NotificationService {
    queue: VecDeque<Notice>,
    max: usize,
    dedupe_window: Duration,
    next_id: NoticeId,
}

impl NotificationService {
    /// Create a queue holding at most `max` simultaneous notices.
    pub fn new(max: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            max,
            dedupe_window: Duration::from_millis(500),
            next_id: 1,
        }
    }

    /// Push a notice, coalescing an identical recent one instead of adding
    /// a duplicate.
    pub fn push(
        &mut self,
        kind: NoticeKind,
        title: impl Into<String>,
        body: Option<String>,
        ttl: Duration,
        now: Instant,
    ) -> NoticeId {
        let title = title.into();
        if let Some(existing) = self.queue.iter_mut().find(|n| {
            n.kind == kind
                && n.title == title
                && n.body == body
                && now.saturating_duration_since(n.created) <= self.dedupe_window
        }) {
            existing.created = now;
            existing.ttl = ttl;
            return existing.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        if self.queue.len() == self.max {
            self.queue.pop_front();
        }
        self.queue.push_back(Notice {
            id,
            kind,
            title,
            body,
            ttl,
            created: now,
        });
        id
    }

    /// Drop expired notices. Call once per tick/frame.
    pub fn retain_visible(&mut self, now: Instant) {
        self.queue
            .retain(|n| now.saturating_duration_since(n.created) < n.ttl);
    }

    /// Currently visible notices, oldest first.
    pub fn visible(&self, now: Instant) -> Vec<NoticeView> {
        self.queue
            .iter()
            .filter(|n| now.saturating_duration_since(n.created) < n.ttl)
            .map(|n| NoticeView {
                id: n.id,
                kind: n.kind,
                title: n.title.clone(),
                body: n.body.clone(),
                progress: 1.0
                    - (now.saturating_duration_since(n.created).as_secs_f32()
                        / n.ttl.as_secs_f32()),
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_within_window_coalesces() {
        let mut svc = NotificationService::new(10);
        let start = Instant::now();
        let a = svc.push(NoticeKind::Error, "upload failed", None, Duration::from_secs(5), start);
        let b = svc.push(
            NoticeKind::Error,
            "upload failed",
            None,
            Duration::from_secs(5),
            start + Duration::from_millis(100),
        );
        assert_eq!(a, b);
        assert_eq!(svc.visible(start).len(), 1);
    }

    #[test]
    fn expired_notices_are_dropped() {
        let mut svc = NotificationService::new(10);
        let start = Instant::now();
        svc.push(NoticeKind::Info, "reconnected", None, Duration::from_secs(1), start);
        svc.retain_visible(start + Duration::from_secs(2));
        assert!(svc.visible(start + Duration::from_secs(2)).is_empty());
    }

    #[test]
    fn oldest_is_evicted_past_capacity() {
        let mut svc = NotificationService::new(1);
        let start = Instant::now();
        svc.push(NoticeKind::Info, "a", None, Duration::from_secs(5), start);
        svc.push(NoticeKind::Info, "b", None, Duration::from_secs(5), start);
        let visible = svc.visible(start);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "b");
    }
}
