//! File-backed key-value store for native hosts.
//!
//! Persists all keys as one pretty-printed JSON object per store file, read
//! on every operation so that concurrent processes observe each other's
//! writes (last-write-wins, consistent with the index's single-atomic-put
//! model).

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::KeyValueStore;
use crate::error::{Result, TagmarkError};
use crate::BoxFuture;

/// [`KeyValueStore`] persisted as a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by `path`. The file is created lazily on the
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(TagmarkError::BackendUnavailable(format!(
                    "cannot read store '{}': {e}",
                    self.path.display()
                )));
            }
        };
        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => Err(TagmarkError::BackendUnavailable(format!(
                "store '{}' is not a JSON object",
                self.path.display()
            ))),
        }
    }

    fn persist(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TagmarkError::BackendUnavailable(format!(
                    "cannot create store directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        let text = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, text).map_err(|e| {
            TagmarkError::BackendUnavailable(format!(
                "cannot write store '{}': {e}",
                self.path.display()
            ))
        })
    }
}

impl KeyValueStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        Box::pin(async move { Ok(self.load()?.get(key).cloned()) })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut map = self.load()?;
            map.insert(key.to_string(), value);
            self.persist(&map)
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut map = self.load()?;
            if map.remove(key).is_some() {
                self.persist(&map)?;
            }
            Ok(())
        })
    }
}
