//! Bookmark backend over the file bridge.
//!
//! Every operation is a read-modify-write of the whole document through the
//! bridge; the bridge serializes the full document on each write, so this
//! backend never patches in place.

use chrono::Utc;

use super::BookmarkBackend;
use crate::bridge::FileBridge;
use crate::error::Result;
use crate::model::{normalize_url, stable_hash, BookmarkRecord};
use crate::BoxFuture;

/// File-backed bookmark store behind a [`FileBridge`].
pub struct FileBookmarkStore<B: FileBridge> {
    bridge: B,
}

impl<B: FileBridge> FileBookmarkStore<B> {
    /// Wrap a bridge.
    pub fn new(bridge: B) -> Self {
        Self { bridge }
    }
}

impl<B: FileBridge> BookmarkBackend for FileBookmarkStore<B> {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<BookmarkRecord>>> {
        Box::pin(async move {
            let key = normalize_url(url);
            let doc = self.bridge.read_document().await?;
            Ok(doc.bookmarks.get(&key).cloned())
        })
    }

    fn put<'a>(&'a self, record: &'a BookmarkRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let key = normalize_url(&record.url);
            let now = Utc::now();
            let mut doc = self.bridge.read_document().await?;
            let existing = doc.bookmarks.get(&key);

            let mut stored = record.clone();
            stored.url = key.clone();
            stored.time = existing.and_then(|e| e.time).or(record.time).or(Some(now));
            stored.updated_at = Some(now);
            stored.hash = existing
                .and_then(|e| e.hash.clone())
                .or_else(|| Some(stable_hash("file", &key)));

            doc.bookmarks.insert(key, stored);
            self.bridge.write_document(&doc).await
        })
    }

    fn delete<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let key = normalize_url(url);
            let mut doc = self.bridge.read_document().await?;
            if doc.bookmarks.shift_remove(&key).is_none() {
                log::debug!("delete: url not held in file backend: {key}");
                return Ok(());
            }
            self.bridge.write_document(&doc).await
        })
    }

    fn list_all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BookmarkRecord>>> {
        Box::pin(async move {
            let doc = self.bridge.read_document().await?;
            Ok(doc.bookmarks.into_values().collect())
        })
    }
}
