//! ## urverk-core::storage
//! **Key-value persistence contract**
//!
//! The trusted clock and the timer persistence adapter both write opaque
//! string blobs under fixed keys. No transactionality is assumed across keys.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StorageError;

/// Blob storage addressed by string keys.
pub trait KeyValueStore: Send + Sync {
    /// Writes `blob` under `key`, replacing any previous value.
    fn save(&self, key: &str, blob: &str) -> Result<(), StorageError>;

    /// Reads the blob under `key`. `Ok(None)` means no record exists.
    fn try_load(&self, key: &str) -> Result<Option<String>, StorageError>;
}

/// Shared handle to a store, cloned into every component that persists.
pub type SharedStore = Arc<dyn KeyValueStore>;

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn save(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        (**self).save(key, blob)
    }

    fn try_load(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).try_load(key)
    }
}

/// In-process store. Used by tests, simulations and the `memory` backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.blobs.lock().remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.lock().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl KeyValueStore for MemoryStore {
    fn save(&self, key: &str, blob: &str) -> Result<(), StorageError> {
        self.blobs.lock().insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn try_load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.blobs.lock().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.try_load("a").unwrap().is_none());
        store.save("a", "one").unwrap();
        store.save("a", "two").unwrap();
        assert_eq!(store.try_load("a").unwrap().as_deref(), Some("two"));
        assert_eq!(store.keys(), vec!["a".to_string()]);
        assert_eq!(store.remove("a").as_deref(), Some("two"));
    }

    #[test]
    fn test_shared_handle_sees_writes() {
        let store = MemoryStore::shared();
        let shared: SharedStore = store.clone();
        shared.save("k", "v").unwrap();
        assert_eq!(store.try_load("k").unwrap().as_deref(), Some("v"));
    }
}
