//! Key-Value Store
//!
//! Opaque keyed storage for the records the core persists: query-id state
//! and the vault's seed and password records. Every record is JSON and
//! carries a `version` field.

mod file;

pub use file::FileStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{HawalaError, HawalaResult};

/// Key prefix of persisted query-id state
pub const QUERY_ID_PREFIX: &str = "query_id/";
/// Key of the encrypted seed record
pub const VAULT_SEED_KEY: &str = "vault/seed";
/// Key of the password verification record
pub const VAULT_PASSWORD_KEY: &str = "vault/password";

/// Synchronous keyed storage. `put` must be durable when it returns.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> HawalaResult<Option<Vec<u8>>>;
    fn put(&self, key: &str, value: &[u8]) -> HawalaResult<()>;
    fn delete(&self, key: &str) -> HawalaResult<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> HawalaResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &[u8]) -> HawalaResult<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> HawalaResult<()> {
        (**self).delete(key)
    }
}

/// Load and decode a JSON record
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> HawalaResult<Option<T>> {
    match store.get(key)? {
        Some(bytes) => {
            let value = serde_json::from_slice(&bytes).map_err(|e| {
                HawalaError::storage(format!("Corrupt record at {}", key)).with_details(e.to_string())
            })?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Encode and store a JSON record
pub fn put_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> HawalaResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.put(key, &bytes)
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> HawalaResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| HawalaError::internal("Store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> HawalaResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| HawalaError::internal("Store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> HawalaResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| HawalaError::internal("Store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}
