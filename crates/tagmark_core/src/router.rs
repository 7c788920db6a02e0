//! Storage router: backend selection and migration.
//!
//! Decides, per bookmark URL, which backend is authoritative, and migrates
//! bookmarks between backends on demand. The router is the only writer of the
//! storage index, and it depends on backends solely through the
//! [`BookmarkBackend`] interface.

use chrono::Utc;

use crate::backend::{BookmarkBackend, StoredBookmark};
use crate::error::{Result, TagmarkError};
use crate::index::StorageIndex;
use crate::model::{normalize_url, BackendId, BookmarkRecord};

/// Router over the four storage backends plus the url→backend index.
pub struct StorageRouter {
    remote: Box<dyn BookmarkBackend>,
    local: Box<dyn BookmarkBackend>,
    synced: Box<dyn BookmarkBackend>,
    file: Box<dyn BookmarkBackend>,
    index: StorageIndex,
    default_backend: BackendId,
}

impl StorageRouter {
    /// Assemble a router. `default_backend` is the user-selected backend for
    /// URLs the index has no entry for.
    pub fn new(
        remote: Box<dyn BookmarkBackend>,
        local: Box<dyn BookmarkBackend>,
        synced: Box<dyn BookmarkBackend>,
        file: Box<dyn BookmarkBackend>,
        index: StorageIndex,
        default_backend: BackendId,
    ) -> Self {
        Self {
            remote,
            local,
            synced,
            file,
            index,
            default_backend,
        }
    }

    fn backend(&self, id: BackendId) -> &dyn BookmarkBackend {
        match id {
            BackendId::Remote => self.remote.as_ref(),
            BackendId::Local => self.local.as_ref(),
            BackendId::Synced => self.synced.as_ref(),
            BackendId::File => self.file.as_ref(),
        }
    }

    /// The storage index (read access for diagnostics and seeding).
    pub fn index(&self) -> &StorageIndex {
        &self.index
    }

    /// One-time migration for stores that predate the index: seed an entry
    /// per existing local bookmark when the index is empty.
    pub async fn ensure_index_seeded(&self) -> Result<()> {
        self.index
            .ensure_seeded_from_local(self.local.as_ref())
            .await
    }

    /// Which backend is authoritative for `url`: the indexed backend, or the
    /// configured default when unindexed. Idempotent until the next
    /// successful save, delete, or move for the same URL.
    pub async fn resolve_backend(&self, url: &str) -> BackendId {
        self.index
            .backend_for_url(url)
            .await
            .unwrap_or(self.default_backend)
    }

    /// The record for `url` from its authoritative backend, or a fresh empty
    /// record (seeded with `title`) when no backend holds it.
    pub async fn get_bookmark_for_url(&self, url: &str, title: &str) -> Result<BookmarkRecord> {
        let backend = self.resolve_backend(url).await;
        log::debug!("get {} via {backend}", normalize_url(url));
        let found = self.backend(backend).get(url).await?;
        Ok(found.unwrap_or_else(|| BookmarkRecord::empty(url, title)))
    }

    /// The tags currently stored for `url`, from its authoritative backend.
    pub async fn get_tags_for_url(&self, url: &str) -> Result<Vec<String>> {
        Ok(self.get_bookmark_for_url(url, "").await?.tags)
    }

    /// Save a full record to its authoritative backend, then index it. The
    /// index is only updated after the write lands, so it never points at a
    /// backend that does not actually hold the record.
    pub async fn save_bookmark(&self, record: &BookmarkRecord) -> Result<()> {
        let url = normalize_url(&record.url);
        if url.is_empty() {
            return Err(TagmarkError::Validation(
                crate::error::ValidationError::field("url", "URL is required"),
            ));
        }
        let backend = self.resolve_backend(&url).await;
        self.backend(backend).put(record).await?;
        self.index.set_backend_for_url(&url, backend).await?;
        log::debug!("saved {url} to {backend}");
        Ok(())
    }

    /// Delete from the authoritative backend and drop the index entry. Some
    /// backends treat delete as fire-and-forget; the entry is removed on any
    /// soft success.
    pub async fn delete_bookmark(&self, url: &str) -> Result<()> {
        let key = normalize_url(url);
        let backend = self.resolve_backend(&key).await;
        self.backend(backend).delete(&key).await?;
        self.index.remove_url(&key).await?;
        log::debug!("deleted {key} from {backend}");
        Ok(())
    }

    /// Merge a tag into the record for `url` (deduplicated, order preserved)
    /// and write the full record back through its authoritative backend.
    pub async fn save_tag(&self, url: &str, value: &str) -> Result<()> {
        let backend = self.resolve_backend(url).await;
        let mut record = self
            .backend(backend)
            .get(url)
            .await?
            .unwrap_or_else(|| BookmarkRecord::empty(url, ""));
        record.add_tag(value);
        self.backend(backend).put(&record).await?;
        self.index.set_backend_for_url(&record.url, backend).await
    }

    /// Remove a tag from the record for `url` and write it back.
    pub async fn delete_tag(&self, url: &str, value: &str) -> Result<()> {
        let backend = self.resolve_backend(url).await;
        let Some(mut record) = self.backend(backend).get(url).await? else {
            log::debug!("deleteTag: no record for {}", normalize_url(url));
            return Ok(());
        };
        record.remove_tag(value);
        self.backend(backend).put(&record).await
    }

    /// Move a bookmark to `target`: read from source, write to target, delete
    /// from source, point the index at target.
    ///
    /// If the target write succeeds but the source delete fails, the index
    /// still moves to the target: the data then exists in two places, but the
    /// index reflects the authoritative, newer copy. Duplication is the
    /// acceptable failure mode; data loss is not.
    pub async fn move_bookmark_to_storage(&self, url: &str, target: BackendId) -> Result<()> {
        let key = normalize_url(url);
        let source = self.resolve_backend(&key).await;
        if source == target {
            log::debug!("move: {key} already in {target}");
            return Ok(());
        }

        let Some(mut record) = self.backend(source).get(&key).await? else {
            return Err(TagmarkError::NotFound(key));
        };
        // A record that never got stamped still needs a create time to sort.
        if record.time.is_none() {
            record.time = Some(Utc::now());
        }

        self.backend(target).put(&record).await?;
        if let Err(e) = self.backend(source).delete(&key).await {
            log::warn!("move: delete from {source} failed for {key}: {e}");
        }
        self.index.set_backend_for_url(&key, target).await?;
        log::debug!("moved {key}: {source} -> {target}");
        Ok(())
    }

    /// Recent bookmarks across every backend, merged and sorted by create
    /// time descending. Backends that fail to answer contribute nothing.
    pub async fn get_recent_bookmarks(&self, count: usize) -> Result<Vec<BookmarkRecord>> {
        let mut merged = Vec::new();
        for id in BackendId::ALL {
            merged.extend(self.list_backend_lossy(id).await);
        }
        merged.retain(|b| b.time.is_some());
        merged.sort_by(|a, b| b.time.cmp(&a.time));
        merged.truncate(count);
        Ok(merged)
    }

    /// All local-backend bookmarks, storage-tagged, for the index page.
    pub async fn get_local_bookmarks_for_index(&self) -> Result<Vec<StoredBookmark>> {
        let mut rows: Vec<StoredBookmark> = self
            .local
            .list_all()
            .await?
            .into_iter()
            .map(|record| StoredBookmark {
                record,
                storage: BackendId::Local,
            })
            .collect();
        rows.sort_by(|a, b| b.record.time.cmp(&a.record.time));
        Ok(rows)
    }

    /// All bookmarks from every backend, merged by URL and storage-tagged.
    /// When the same URL unexpectedly exists in more than one backend, the
    /// index's recorded backend wins the tie; unindexed duplicates fall back
    /// to the first backend in [`BackendId::ALL`] order.
    pub async fn get_all_bookmarks_for_index(&self) -> Result<Vec<StoredBookmark>> {
        let index = self.index.get_index().await;
        let mut merged: indexmap::IndexMap<String, StoredBookmark> = indexmap::IndexMap::new();

        for id in BackendId::ALL {
            for record in self.list_backend_lossy(id).await {
                let key = normalize_url(&record.url);
                let row = StoredBookmark {
                    record,
                    storage: id,
                };
                match merged.get(&key) {
                    None => {
                        merged.insert(key, row);
                    }
                    Some(existing) => {
                        // Replace only when the index says this backend is
                        // the authoritative holder.
                        if index.get(&key) == Some(&id) && existing.storage != id {
                            merged.insert(key, row);
                        }
                    }
                }
            }
        }

        let mut rows: Vec<StoredBookmark> = merged.into_values().collect();
        rows.sort_by(|a, b| b.record.time.cmp(&a.record.time));
        Ok(rows)
    }

    async fn list_backend_lossy(&self, id: BackendId) -> Vec<BookmarkRecord> {
        match self.backend(id).list_all().await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("list_all on {id} failed: {e}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileBookmarkStore, KvBookmarkStore};
    use crate::block_on_test;
    use crate::bridge::InMemoryFileBridge;
    use crate::store::MemoryKeyValueStore;
    use crate::BoxFuture;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Backend wrapper that can be told to fail deletes, for migration tests.
    struct FailingDelete<B> {
        inner: B,
        fail_delete: AtomicBool,
    }

    impl<B: BookmarkBackend> FailingDelete<B> {
        fn new(inner: B) -> Self {
            Self {
                inner,
                fail_delete: AtomicBool::new(false),
            }
        }
    }

    impl<B: BookmarkBackend> BookmarkBackend for Arc<FailingDelete<B>> {
        fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<BookmarkRecord>>> {
            self.inner.get(url)
        }

        fn put<'a>(&'a self, record: &'a BookmarkRecord) -> BoxFuture<'a, Result<()>> {
            self.inner.put(record)
        }

        fn delete<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
            if self.fail_delete.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(TagmarkError::BackendUnavailable("delete refused".into()))
                });
            }
            self.inner.delete(url)
        }

        fn list_all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BookmarkRecord>>> {
            self.inner.list_all()
        }
    }

    struct Fixture {
        router: StorageRouter,
        local: Arc<FailingDelete<KvBookmarkStore>>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn crate::store::KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let local = Arc::new(FailingDelete::new(KvBookmarkStore::local(store.clone())));
        let router = StorageRouter::new(
            Box::new(KvBookmarkStore::synced(Arc::new(MemoryKeyValueStore::new()))),
            Box::new(local.clone()),
            Box::new(KvBookmarkStore::synced(store.clone())),
            Box::new(FileBookmarkStore::new(InMemoryFileBridge::new())),
            StorageIndex::new(store),
            BackendId::Local,
        );
        Fixture { router, local }
    }

    fn record(url: &str, tags: &[&str]) -> BookmarkRecord {
        let mut record = BookmarkRecord::empty(url, "");
        for tag in tags {
            record.add_tag(tag);
        }
        record
    }

    #[test]
    fn resolve_backend_defaults_until_first_save() {
        let fx = fixture();
        block_on_test(async {
            assert_eq!(
                fx.router.resolve_backend("https://a.example").await,
                BackendId::Local
            );
            // Idempotent across calls.
            assert_eq!(
                fx.router.resolve_backend("https://a.example").await,
                BackendId::Local
            );

            fx.router
                .save_bookmark(&record("https://a.example", &["x"]))
                .await
                .unwrap();
            assert_eq!(
                fx.router.resolve_backend("https://a.example").await,
                BackendId::Local
            );
        });
    }

    #[test]
    fn save_then_get_round_trips() {
        let fx = fixture();
        block_on_test(async {
            fx.router
                .save_bookmark(&record("https://a.example/", &["x", "y"]))
                .await
                .unwrap();
            let stored = fx
                .router
                .get_bookmark_for_url("https://a.example", "")
                .await
                .unwrap();
            assert_eq!(stored.url, "https://a.example");
            assert_eq!(stored.tags, vec!["x", "y"]);
            assert_eq!(
                fx.router.get_tags_for_url("https://a.example").await.unwrap(),
                vec!["x", "y"]
            );
        });
    }

    #[test]
    fn save_rejects_empty_url() {
        let fx = fixture();
        block_on_test(async {
            let err = fx
                .router
                .save_bookmark(&record("   ", &[]))
                .await
                .unwrap_err();
            assert!(matches!(err, TagmarkError::Validation(_)));
        });
    }

    #[test]
    fn failed_save_leaves_index_untouched() {
        let store: Arc<dyn crate::store::KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let router = StorageRouter::new(
            Box::new(KvBookmarkStore::local(Arc::new(MemoryKeyValueStore::new()))),
            Box::new(KvBookmarkStore::local(store.clone())),
            Box::new(KvBookmarkStore::synced(store.clone())),
            // File backend with no handle: every put fails.
            Box::new(FileBookmarkStore::new(InMemoryFileBridge::without_handle())),
            StorageIndex::new(store),
            BackendId::File,
        );
        block_on_test(async {
            let err = router
                .save_bookmark(&record("https://a.example", &[]))
                .await
                .unwrap_err();
            assert!(matches!(err, TagmarkError::NoHandle));
            assert!(router
                .index()
                .backend_for_url("https://a.example")
                .await
                .is_none());
        });
    }

    #[test]
    fn delete_removes_record_and_index_entry() {
        let fx = fixture();
        block_on_test(async {
            fx.router
                .save_bookmark(&record("https://a.example", &[]))
                .await
                .unwrap();
            fx.router.delete_bookmark("https://a.example").await.unwrap();
            assert!(fx
                .router
                .index()
                .backend_for_url("https://a.example")
                .await
                .is_none());
            let after = fx
                .router
                .get_bookmark_for_url("https://a.example", "")
                .await
                .unwrap();
            assert!(!after.is_stored());
        });
    }

    #[test]
    fn tag_ops_merge_and_remove_in_place() {
        let fx = fixture();
        block_on_test(async {
            fx.router
                .save_bookmark(&record("https://a.example", &["a", "b"]))
                .await
                .unwrap();
            fx.router.save_tag("https://a.example", "new").await.unwrap();
            fx.router.save_tag("https://a.example", "a").await.unwrap();
            assert_eq!(
                fx.router.get_tags_for_url("https://a.example").await.unwrap(),
                vec!["a", "b", "new"]
            );

            fx.router.delete_tag("https://a.example", "b").await.unwrap();
            assert_eq!(
                fx.router.get_tags_for_url("https://a.example").await.unwrap(),
                vec!["a", "new"]
            );
        });
    }

    #[test]
    fn save_tag_on_unsaved_url_creates_record() {
        let fx = fixture();
        block_on_test(async {
            fx.router.save_tag("https://new.example", "t").await.unwrap();
            assert_eq!(
                fx.router.get_tags_for_url("https://new.example").await.unwrap(),
                vec!["t"]
            );
            assert_eq!(
                fx.router.index().backend_for_url("https://new.example").await,
                Some(BackendId::Local)
            );
        });
    }

    #[test]
    fn move_transfers_record_and_index() {
        let fx = fixture();
        block_on_test(async {
            fx.router
                .save_bookmark(&record("https://a.example/", &["x", "y"]))
                .await
                .unwrap();
            fx.router
                .move_bookmark_to_storage("https://a.example", BackendId::File)
                .await
                .unwrap();

            assert_eq!(
                fx.router.resolve_backend("https://a.example").await,
                BackendId::File
            );
            let moved = fx
                .router
                .get_bookmark_for_url("https://a.example", "")
                .await
                .unwrap();
            assert_eq!(moved.tags, vec!["x", "y"]);
        });
    }

    #[test]
    fn move_to_current_backend_is_noop() {
        let fx = fixture();
        block_on_test(async {
            fx.router
                .save_bookmark(&record("https://a.example", &[]))
                .await
                .unwrap();
            fx.router
                .move_bookmark_to_storage("https://a.example", BackendId::Local)
                .await
                .unwrap();
        });
    }

    #[test]
    fn move_of_missing_record_is_not_found() {
        let fx = fixture();
        block_on_test(async {
            let err = fx
                .router
                .move_bookmark_to_storage("https://missing.example", BackendId::File)
                .await
                .unwrap_err();
            assert!(matches!(err, TagmarkError::NotFound(_)));
        });
    }

    #[test]
    fn move_updates_index_even_when_source_delete_fails() {
        let fx = fixture();
        block_on_test(async {
            fx.router
                .save_bookmark(&record("https://a.example", &["x"]))
                .await
                .unwrap();
            fx.local.fail_delete.store(true, Ordering::SeqCst);

            fx.router
                .move_bookmark_to_storage("https://a.example", BackendId::File)
                .await
                .unwrap();

            // Index reflects the authoritative, newer copy; the stale source
            // copy may linger (duplication over loss).
            assert_eq!(
                fx.router.resolve_backend("https://a.example").await,
                BackendId::File
            );
            let moved = fx
                .router
                .get_bookmark_for_url("https://a.example", "")
                .await
                .unwrap();
            assert_eq!(moved.tags, vec!["x"]);
        });
    }

    #[test]
    fn aggregation_tags_rows_and_tie_breaks_by_index() {
        let fx = fixture();
        block_on_test(async {
            fx.router
                .save_bookmark(&record("https://a.example", &["x"]))
                .await
                .unwrap();
            fx.local.fail_delete.store(true, Ordering::SeqCst);
            // Leaves the record duplicated in local and file, indexed to file.
            fx.router
                .move_bookmark_to_storage("https://a.example", BackendId::File)
                .await
                .unwrap();

            let rows = fx.router.get_all_bookmarks_for_index().await.unwrap();
            let row = rows
                .iter()
                .find(|r| r.record.url == "https://a.example")
                .unwrap();
            assert_eq!(row.storage, BackendId::File);
            assert_eq!(
                rows.iter().filter(|r| r.record.url == "https://a.example").count(),
                1
            );
        });
    }

    #[test]
    fn recent_merges_across_backends() {
        let fx = fixture();
        block_on_test(async {
            fx.router
                .save_bookmark(&record("https://a.example", &[]))
                .await
                .unwrap();
            fx.router
                .save_bookmark(&record("https://b.example", &[]))
                .await
                .unwrap();
            fx.router
                .move_bookmark_to_storage("https://b.example", BackendId::File)
                .await
                .unwrap();

            let recent = fx.router.get_recent_bookmarks(10).await.unwrap();
            assert_eq!(recent.len(), 2);

            let local_rows = fx.router.get_local_bookmarks_for_index().await.unwrap();
            assert_eq!(local_rows.len(), 1);
            assert_eq!(local_rows[0].storage, BackendId::Local);
        });
    }
}
