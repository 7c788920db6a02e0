//! In-memory key-value store for tests and single-process hosts.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::KeyValueStore;
use crate::error::{Result, TagmarkError};
use crate::BoxFuture;

/// In-memory [`KeyValueStore`].
///
/// Thread-safe via `RwLock`; data is lost when dropped. Clones share the same
/// underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryKeyValueStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Value>>> {
        self.entries
            .read()
            .map_err(|_| TagmarkError::BackendUnavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Value>>> {
        self.entries
            .write()
            .map_err(|_| TagmarkError::BackendUnavailable("store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move { Ok(self.read()?.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.write()?.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.write()?.remove(key);
            Ok(())
        })
    }
}
