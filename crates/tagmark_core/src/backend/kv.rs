//! Bookmark backend over a key-value store.
//!
//! The device-local and cross-device-synced backends are structurally
//! identical; they differ only in the replication scope of the underlying
//! store. One generic implementation covers both, tagged with the scope it
//! was built for.

use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::Value;

use super::BookmarkBackend;
use crate::error::Result;
use crate::model::{normalize_url, stable_hash, BookmarkRecord};
use crate::store::KeyValueStore;
use crate::BoxFuture;

const LOCAL_BOOKMARKS_KEY: &str = "tagmark_local_bookmarks";
const SYNCED_BOOKMARKS_KEY: &str = "tagmark_synced_bookmarks";

/// Key-value bookmark backend, device-local or synced depending on the store
/// it wraps.
pub struct KvBookmarkStore {
    store: Arc<dyn KeyValueStore>,
    storage_key: &'static str,
    hash_prefix: &'static str,
}

impl KvBookmarkStore {
    /// Backend over the device-local store.
    pub fn local(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            storage_key: LOCAL_BOOKMARKS_KEY,
            hash_prefix: "local",
        }
    }

    /// Backend over the cross-device-synced store.
    pub fn synced(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            storage_key: SYNCED_BOOKMARKS_KEY,
            hash_prefix: "sync",
        }
    }

    async fn load_map(&self) -> Result<IndexMap<String, BookmarkRecord>> {
        let raw = self.store.get(self.storage_key).await?;
        let map = match raw {
            Some(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
            // Anything that is not an object reads as empty rather than an error.
            _ => IndexMap::new(),
        };
        Ok(map)
    }

    async fn save_map(&self, map: &IndexMap<String, BookmarkRecord>) -> Result<()> {
        self.store
            .set(self.storage_key, serde_json::to_value(map)?)
            .await
    }
}

impl BookmarkBackend for KvBookmarkStore {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<BookmarkRecord>>> {
        Box::pin(async move {
            let key = normalize_url(url);
            let map = self.load_map().await?;
            Ok(map.get(&key).cloned())
        })
    }

    fn put<'a>(&'a self, record: &'a BookmarkRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let key = normalize_url(&record.url);
            let now = Utc::now();
            let mut map = self.load_map().await?;
            let existing = map.get(&key);

            let mut stored = record.clone();
            stored.url = key.clone();
            // Create time survives updates; updated_at always moves forward.
            stored.time = existing.and_then(|e| e.time).or(record.time).or(Some(now));
            stored.updated_at = Some(now);
            stored.hash = existing
                .and_then(|e| e.hash.clone())
                .or_else(|| Some(stable_hash(self.hash_prefix, &key)));

            map.insert(key, stored);
            self.save_map(&map).await
        })
    }

    fn delete<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let key = normalize_url(url);
            let mut map = self.load_map().await?;
            if map.shift_remove(&key).is_none() {
                log::debug!("delete: url not held here: {key}");
                return Ok(());
            }
            self.save_map(&map).await
        })
    }

    fn list_all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BookmarkRecord>>> {
        Box::pin(async move {
            let map = self.load_map().await?;
            Ok(map.into_values().collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_on_test;
    use crate::model::TriState;
    use crate::store::MemoryKeyValueStore;

    fn local_backend() -> KvBookmarkStore {
        KvBookmarkStore::local(Arc::new(MemoryKeyValueStore::new()))
    }

    #[test]
    fn put_get_round_trip() {
        let backend = local_backend();
        let mut record = BookmarkRecord::empty("https://a.example/", "Example");
        record.add_tag("x");
        record.toread = TriState::Yes;

        block_on_test(async {
            backend.put(&record).await.unwrap();
            let stored = backend.get("https://a.example").await.unwrap().unwrap();
            assert_eq!(stored.url, "https://a.example");
            assert_eq!(stored.tags, vec!["x"]);
            assert_eq!(stored.toread, TriState::Yes);
            assert!(stored.time.is_some());
            assert_eq!(stored.updated_at, stored.time);
            assert!(stored.hash.as_deref().unwrap().starts_with("local-"));
        });
    }

    #[test]
    fn update_preserves_create_time_and_hash() {
        let backend = local_backend();
        let record = BookmarkRecord::empty("https://a.example", "first");

        block_on_test(async {
            backend.put(&record).await.unwrap();
            let first = backend.get("https://a.example").await.unwrap().unwrap();

            let mut updated = first.clone();
            updated.description = "second".to_string();
            backend.put(&updated).await.unwrap();

            let second = backend.get("https://a.example").await.unwrap().unwrap();
            assert_eq!(second.description, "second");
            assert_eq!(second.time, first.time);
            assert_eq!(second.hash, first.hash);
        });
    }

    #[test]
    fn synced_backend_uses_its_own_key_and_prefix() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let local = KvBookmarkStore::local(store.clone());
        let synced = KvBookmarkStore::synced(store);
        let record = BookmarkRecord::empty("https://a.example", "");

        block_on_test(async {
            synced.put(&record).await.unwrap();
            // Same underlying store, separate namespaces.
            assert!(local.get("https://a.example").await.unwrap().is_none());
            let stored = synced.get("https://a.example").await.unwrap().unwrap();
            assert!(stored.hash.as_deref().unwrap().starts_with("sync-"));
        });
    }

    #[test]
    fn delete_missing_is_soft_success() {
        let backend = local_backend();
        block_on_test(async {
            backend.delete("https://missing.example").await.unwrap();
            assert!(backend.list_all().await.unwrap().is_empty());
        });
    }

    #[test]
    fn list_all_returns_every_record() {
        let backend = local_backend();
        block_on_test(async {
            backend
                .put(&BookmarkRecord::empty("https://a.example", ""))
                .await
                .unwrap();
            backend
                .put(&BookmarkRecord::empty("https://b.example", ""))
                .await
                .unwrap();
            let all = backend.list_all().await.unwrap();
            assert_eq!(all.len(), 2);
        });
    }
}
