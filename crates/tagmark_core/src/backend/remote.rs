//! Remote API adapted to the uniform backend interface.

use super::BookmarkBackend;
use crate::error::Result;
use crate::model::BookmarkRecord;
use crate::remote::{HttpTransport, RemoteClient};
use crate::BoxFuture;

/// The remote API has no full-export endpoint in the consumed surface;
/// `posts/recent` with this cap stands in for `list_all`.
const RECENT_EXPORT_CAP: usize = 100;

/// [`BookmarkBackend`] over a [`RemoteClient`].
pub struct RemoteBookmarkBackend<T: HttpTransport> {
    client: RemoteClient<T>,
}

impl<T: HttpTransport> RemoteBookmarkBackend<T> {
    /// Wrap a remote client.
    pub fn new(client: RemoteClient<T>) -> Self {
        Self { client }
    }

    /// Access the underlying client (for tag-suggestion seeding).
    pub fn client(&self) -> &RemoteClient<T> {
        &self.client
    }
}

impl<T: HttpTransport> BookmarkBackend for RemoteBookmarkBackend<T> {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<BookmarkRecord>>> {
        Box::pin(self.client.fetch_bookmark_for_url(url))
    }

    fn put<'a>(&'a self, record: &'a BookmarkRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.client.save_bookmark(record))
    }

    fn delete<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.client.delete_pin(url))
    }

    fn list_all<'a>(&'a self) -> BoxFuture<'a, Result<Vec<BookmarkRecord>>> {
        Box::pin(self.client.fetch_recent_bookmarks(RECENT_EXPORT_CAP))
    }
}
