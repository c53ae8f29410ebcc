//! In-memory store.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{KeyValueStore, StoreError};

/// Process-local [`KeyValueStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".to_string()))?
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Unavailable("Lock poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}
