// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hash-keyed image resource cache.
//!
//! Tracks a per-hash reference count rather than a boolean pin: a node
//! referencing a hash `acquire`s it, losing the last reference (on
//! delete/undo-of-create) `release`s it, and the entry is dropped only
//! once the count reaches zero. Keyed by `String` rather than a `BlobHash`
//! newtype, matching `canvas_scene::ImageFields::hash`'s established type
//! across this workspace.

use std::collections::HashMap;

/// One cached image's known locations and readiness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResource {
    /// Browser-local object URL or data URL, if the bytes are resident
    /// client-side.
    pub url: Option<String>,
    /// Filename assigned by the upload server, once known.
    pub server_filename: Option<String>,
    /// Filename as originally selected/pasted by the user.
    pub original_filename: Option<String>,
    /// Thumbnail/preview URL, if one was generated.
    pub thumbnail: Option<String>,
    /// `true` while only a local representation exists (no server upload
    /// has completed yet).
    pub is_local: bool,
}

struct Entry {
    resource: ImageResource,
    refs: u32,
}

/// Reference-counted cache of [`ImageResource`]s, keyed by content hash.
#[derive(Default)]
pub struct ImageResourceCache {
    entries: HashMap<String, Entry>,
}

impl ImageResourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// `true` if `hash` has a resident entry, local or server-backed.
    /// Backs `canvas_commands::MediaResidencyCheck`.
    pub fn has(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    /// Look up the current resource for `hash`.
    pub fn get(&self, hash: &str) -> Option<&ImageResource> {
        self.entries.get(hash).map(|e| &e.resource)
    }

    /// Register a new local reference to `hash`, inserting a fresh
    /// local-only entry if none exists yet, and incrementing its refcount.
    /// Returns the entry's refcount after the increment.
    pub fn acquire_local(
        &mut self,
        hash: &str,
        url: Option<String>,
        original_filename: Option<String>,
    ) -> u32 {
        let entry = self.entries.entry(hash.to_string()).or_insert_with(|| Entry {
            resource: ImageResource {
                url: None,
                server_filename: None,
                original_filename: None,
                thumbnail: None,
                is_local: true,
            },
            refs: 0,
        });
        if url.is_some() {
            entry.resource.url = url;
        }
        if original_filename.is_some() {
            entry.resource.original_filename = original_filename;
        }
        entry.refs += 1;
        entry.refs
    }

    /// Increment an existing entry's reference count (e.g. a duplicate or
    /// paste reusing an already-cached hash). No-op if `hash` is unknown.
    pub fn acquire(&mut self, hash: &str) {
        if let Some(entry) = self.entries.get_mut(hash) {
            entry.refs += 1;
        }
    }

    /// Drop one reference to `hash`. Removes the entry once the count
    /// reaches zero. Returns `true` if the entry was removed.
    pub fn release(&mut self, hash: &str) -> bool {
        let Some(entry) = self.entries.get_mut(hash) else {
            return false;
        };
        entry.refs = entry.refs.saturating_sub(1);
        if entry.refs == 0 {
            self.entries.remove(hash);
            true
        } else {
            false
        }
    }

    /// Mark `hash` as server-resident, recording the assigned filename and
    /// clearing `is_local`. No-op if `hash` is unknown (entry was released
    /// before the upload completed).
    pub fn upgrade_to_server(&mut self, hash: &str, server_filename: String) {
        if let Some(entry) = self.entries.get_mut(hash) {
            entry.resource.server_filename = Some(server_filename);
            entry.resource.is_local = false;
        }
    }

    /// Current reference count for `hash`, `0` if unknown.
    pub fn ref_count(&self, hash: &str) -> u32 {
        self.entries.get(hash).map_or(0, |e| e.refs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_drops_entry_at_zero() {
        let mut cache = ImageResourceCache::new();
        cache.acquire_local("abc", Some("blob:abc".into()), None);
        cache.acquire("abc");
        assert_eq!(cache.ref_count("abc"), 2);
        assert!(!cache.release("abc"));
        assert!(cache.has("abc"));
        assert!(cache.release("abc"));
        assert!(!cache.has("abc"));
    }

    #[test]
    fn upgrade_to_server_preserves_url_and_clears_local_flag() {
        let mut cache = ImageResourceCache::new();
        cache.acquire_local("abc", Some("blob:abc".into()), Some("cat.png".into()));
        cache.upgrade_to_server("abc", "srv-cat-1.png".into());
        let resource = cache.get("abc").unwrap();
        assert!(!resource.is_local);
        assert_eq!(resource.server_filename.as_deref(), Some("srv-cat-1.png"));
        assert_eq!(resource.url.as_deref(), Some("blob:abc"));
    }

    #[test]
    fn release_of_unknown_hash_is_a_no_op() {
        let mut cache = ImageResourceCache::new();
        assert!(!cache.release("missing"));
    }
}
