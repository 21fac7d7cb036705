// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config storage port and the engine's tunable configuration.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

/// Storage port for raw config blobs (keyed by logical name).
pub trait ConfigStore {
    /// Load a raw config blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Persist a raw config blob.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Error type for config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key not present in store.
    #[error("not found")]
    NotFound,
    /// I/O error while reading/writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Thin service that serializes config values and delegates storage to a
/// [`ConfigStore`].
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Create a new service using the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Consume the service and return the inner store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S> ConfigService<S>
where
    S: ConfigStore,
{
    /// Load and deserialize a config value for `key`. Returns `Ok(None)` if
    /// missing.
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.store.load_raw(key) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                let value = serde_json::from_slice(&bytes)?;
                Ok(Some(value))
            }
            Err(ConfigError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Serialize and persist a config value for `key`.
    pub fn save<T>(&self, key: &str, value: &T) -> Result<(), ConfigError>
    where
        T: Serialize,
    {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Load `CanvasConfig` under its well-known key, falling back to
    /// defaults when absent.
    pub fn load_canvas_config(&self) -> Result<CanvasConfig, ConfigError> {
        Ok(self.load("canvas_config")?.unwrap_or_default())
    }

    /// Persist `CanvasConfig` under its well-known key.
    pub fn save_canvas_config(&self, config: &CanvasConfig) -> Result<(), ConfigError> {
        self.save("canvas_config", config)
    }
}

/// The engine's tunable constants, as a typed, serde-defaulted config
/// record instead of hardcoded constants, so embedders can override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Cooldown between `requestFullSync` calls, in seconds.
    pub full_sync_cooldown_secs: u64,
    /// Upload retry backoff schedule, in seconds, applied in order.
    pub upload_retry_schedule_secs: Vec<u64>,
    /// Upload attempts before an entry is marked failed.
    pub max_upload_attempts: u32,
    /// A pending upload with no retry in this many seconds is evicted and
    /// marked failed.
    pub upload_stale_eviction_secs: u64,
    /// Maximum undo stack depth before the oldest entry is dropped.
    pub undo_stack_depth: usize,
    /// Undo payloads larger than this many bytes have their `data:` URL
    /// stripped (`canvas_commands::LARGE_UNDO_PAYLOAD_BYTES`'s configurable
    /// twin, consulted by `canvas-undo` when wiring the media-residency
    /// check).
    pub large_undo_payload_bytes: usize,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            full_sync_cooldown_secs: 3,
            upload_retry_schedule_secs: vec![2, 4, 6],
            max_upload_attempts: 3,
            upload_stale_eviction_secs: 300,
            undo_stack_depth: 100,
            large_undo_payload_bytes: 100 * 1024,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct MemStore(RefCell<HashMap<String, Vec<u8>>>);

    impl ConfigStore for MemStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0
                .borrow()
                .get(key)
                .cloned()
                .ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn missing_key_yields_default_config() {
        let svc = ConfigService::new(MemStore(RefCell::new(HashMap::new())));
        let config = svc.load_canvas_config().unwrap();
        assert_eq!(config, CanvasConfig::default());
    }

    #[test]
    fn round_trips_through_store() {
        let svc = ConfigService::new(MemStore(RefCell::new(HashMap::new())));
        let mut config = CanvasConfig::default();
        config.undo_stack_depth = 42;
        svc.save_canvas_config(&config).unwrap();
        assert_eq!(svc.load_canvas_config().unwrap(), config);
    }
}
