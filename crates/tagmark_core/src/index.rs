//! Per-URL storage index.
//!
//! Maps each normalized URL to the backend currently holding it. Absence
//! means "not yet indexed, assume the default backend". The index lives under
//! a single key of the device-local store, and every mutation is one atomic
//! `set`, so there is no multi-writer race within a process; across processes
//! the policy is last-write-wins. Only the storage router mutates the index.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::backend::BookmarkBackend;
use crate::error::Result;
use crate::model::{normalize_url, BackendId};
use crate::store::KeyValueStore;

const STORAGE_INDEX_KEY: &str = "tagmark_storage_index";

/// The url→backend mapping that makes backend selection explicit and
/// migratable.
pub struct StorageIndex {
    store: Arc<dyn KeyValueStore>,
}

impl StorageIndex {
    /// Build an index over the device-local store.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The full index. Unreadable or malformed entries read as absent rather
    /// than failing the caller.
    pub async fn get_index(&self) -> BTreeMap<String, BackendId> {
        let raw = match self.store.get(STORAGE_INDEX_KEY).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("storage index unreadable: {e}");
                return BTreeMap::new();
            }
        };
        let Some(Value::Object(map)) = raw else {
            return BTreeMap::new();
        };
        map.into_iter()
            .filter_map(|(url, value)| {
                let backend = value.as_str()?.parse::<BackendId>().ok()?;
                Some((url, backend))
            })
            .collect()
    }

    /// The backend recorded for a URL, or `None` when unindexed.
    pub async fn backend_for_url(&self, url: &str) -> Option<BackendId> {
        let key = normalize_url(url);
        self.get_index().await.get(&key).copied()
    }

    /// Record that `backend` now holds `url`. Router-only.
    pub(crate) async fn set_backend_for_url(&self, url: &str, backend: BackendId) -> Result<()> {
        let key = normalize_url(url);
        if key.is_empty() {
            return Ok(());
        }
        let mut index = self.get_index().await;
        index.insert(key.clone(), backend);
        self.persist(&index).await?;
        log::debug!("index: {key} -> {backend}");
        Ok(())
    }

    /// Drop the entry for `url`. Router-only.
    pub(crate) async fn remove_url(&self, url: &str) -> Result<()> {
        let key = normalize_url(url);
        if key.is_empty() {
            return Ok(());
        }
        let mut index = self.get_index().await;
        if index.remove(&key).is_none() {
            return Ok(());
        }
        self.persist(&index).await?;
        log::debug!("index: removed {key}");
        Ok(())
    }

    /// One-time migration: when the index is empty, seed an entry per
    /// existing local bookmark so pre-index data keeps resolving to `local`.
    pub async fn ensure_seeded_from_local(&self, local: &dyn BookmarkBackend) -> Result<()> {
        let index = self.get_index().await;
        if !index.is_empty() {
            log::debug!("index migration skipped: index not empty");
            return Ok(());
        }
        let bookmarks = local.list_all().await?;
        if bookmarks.is_empty() {
            return Ok(());
        }
        let mut seeded = BTreeMap::new();
        for bookmark in &bookmarks {
            if !bookmark.url.is_empty() {
                seeded.insert(normalize_url(&bookmark.url), BackendId::Local);
            }
        }
        self.persist(&seeded).await?;
        log::debug!("index migration seeded {} urls as local", seeded.len());
        Ok(())
    }

    async fn persist(&self, index: &BTreeMap<String, BackendId>) -> Result<()> {
        self.store
            .set(STORAGE_INDEX_KEY, serde_json::to_value(index)?)
            .await
    }
}
