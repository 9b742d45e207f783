// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted host configuration: a blob store port plus a JSON service on top.
//!
//! The engine only ever reads one key, [`SESSION_CONFIG_KEY`]. Hosts may keep
//! their own settings in the same store under other keys.

use crate::settings::SessionConfig;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Key holding the serialized [`SessionConfig`].
pub const SESSION_CONFIG_KEY: &str = "edit-session";

/// Byte-blob storage keyed by logical name. Implemented by the host
/// (filesystem, browser storage, in-memory fakes).
pub trait ConfigStore {
    /// Read the blob stored under `key`; `ConfigError::NotFound` if absent.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError>;
    /// Replace the blob stored under `key`.
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError>;
}

/// Failures reading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Nothing stored under the key.
    #[error("config key not found")]
    NotFound,
    /// Key cannot be used by this store.
    #[error("invalid config key `{0}`")]
    InvalidKey(String),
    /// Underlying storage I/O failed.
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    /// Stored blob is not valid JSON for the requested type.
    #[error("config json: {0}")]
    Serde(#[from] serde_json::Error),
    /// Store-specific failure.
    #[error("config store: {0}")]
    Other(String),
}

/// JSON (de)serialization over a [`ConfigStore`].
#[derive(Debug, Clone)]
pub struct ConfigService<S> {
    store: S,
}

impl<S> ConfigService<S> {
    /// Wrap `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap the store.
    pub fn into_inner(self) -> S {
        self.store
    }
}

impl<S: ConfigStore> ConfigService<S> {
    /// Decode the value under `key`. Missing or empty blobs are `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let bytes = match self.store.load_raw(key) {
            Ok(bytes) => bytes,
            Err(ConfigError::NotFound) => return Ok(None),
            Err(err) => return Err(err),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Encode `value` as pretty JSON under `key`.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), ConfigError> {
        let data = serde_json::to_vec_pretty(value)?;
        self.store.save_raw(key, &data)
    }

    /// Session tunables. A missing entry yields defaults; an unreadable one
    /// is logged and also yields defaults, so a bad file never blocks editing.
    pub fn session_config(&self) -> SessionConfig {
        match self.load::<SessionConfig>(SESSION_CONFIG_KEY) {
            Ok(Some(cfg)) => cfg.sanitized(),
            Ok(None) => {
                debug!(key = SESSION_CONFIG_KEY, "no stored session config");
                SessionConfig::default()
            }
            Err(err) => {
                warn!(%err, key = SESSION_CONFIG_KEY, "unreadable session config; using defaults");
                SessionConfig::default()
            }
        }
    }

    /// Store session tunables.
    pub fn save_session_config(&self, cfg: &SessionConfig) -> Result<(), ConfigError> {
        self.save(SESSION_CONFIG_KEY, cfg)
    }

    /// Read, modify and write back the session tunables. Returns the stored value.
    pub fn update_session_config(
        &self,
        edit: impl FnOnce(&mut SessionConfig),
    ) -> Result<SessionConfig, ConfigError> {
        let mut cfg = self.session_config();
        edit(&mut cfg);
        let cfg = cfg.sanitized();
        self.save_session_config(&cfg)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct MapStore(RefCell<BTreeMap<String, Vec<u8>>>);

    impl ConfigStore for MapStore {
        fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
            self.0.borrow().get(key).cloned().ok_or(ConfigError::NotFound)
        }

        fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
            self.0.borrow_mut().insert(key.to_string(), data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn blank_blob_reads_as_missing() {
        let service = ConfigService::new(MapStore::default());
        service.store().save_raw("k", b"  \n").unwrap();
        assert_eq!(service.load::<u32>("k").unwrap(), None);
        assert_eq!(service.load::<u32>("absent").unwrap(), None);
    }

    #[test]
    fn bad_json_is_an_error_for_load_but_not_for_session_config() {
        let service = ConfigService::new(MapStore::default());
        service.store().save_raw(SESSION_CONFIG_KEY, b"{oops").unwrap();
        assert!(matches!(
            service.load::<SessionConfig>(SESSION_CONFIG_KEY),
            Err(ConfigError::Serde(_))
        ));
        assert_eq!(service.session_config(), SessionConfig::default());
    }

    #[test]
    fn update_writes_back_sanitized_values() {
        let service = ConfigService::new(MapStore::default());
        let cfg = service
            .update_session_config(|cfg| {
                cfg.slug_max_len = 0;
                cfg.seo_title_max = 70;
            })
            .unwrap();
        assert_eq!(cfg.seo_title_max, 70);
        assert_eq!(cfg.slug_max_len, 1);
        assert_eq!(service.session_config(), cfg);
    }
}
