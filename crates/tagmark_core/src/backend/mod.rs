//! Storage backend capability interface.
//!
//! Every backend - remote API, device-local store, synced store, file bridge -
//! satisfies the same `{get, put, delete, list_all}` interface. The storage
//! router depends only on this trait; backend identity appears nowhere except
//! the index's [`BackendId`] tag.

mod file;
mod kv;
#[cfg(not(target_arch = "wasm32"))]
mod remote;

pub use file::FileBookmarkStore;
pub use kv::KvBookmarkStore;
#[cfg(not(target_arch = "wasm32"))]
pub use remote::RemoteBookmarkBackend;

use serde::Serialize;

use crate::error::Result;
use crate::model::{BackendId, BookmarkRecord};
use crate::BoxFuture;

/// Uniform capability interface over bookmark storage.
///
/// `put` carries full-record replace semantics: the record is the complete
/// desired state for its URL. Backends stamp timestamps (create time
/// preserved, `updated_at` refreshed) and assign the content hash themselves.
pub trait BookmarkBackend: Send + Sync {
    /// Fetch the record for a normalized URL, or `None` when the backend does
    /// not hold it.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<BookmarkRecord>>>;

    /// Store `record` as the full new state for `record.url`.
    fn put<'a>(&'a self, record: &'a BookmarkRecord) -> BoxFuture<'a, Result<()>>;

    /// Delete the record for a normalized URL. Deleting an absent record is a
    /// soft success.
    fn delete<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Every record this backend holds, in no particular order.
    fn list_all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BookmarkRecord>>>;
}

/// A bookmark paired with the backend that holds it, as returned by the
/// router's index/aggregation operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredBookmark {
    /// The record itself, flattened into the response object.
    #[serde(flatten)]
    pub record: BookmarkRecord,
    /// Which backend holds the record.
    pub storage: BackendId,
}
