//! Key-value store abstraction.
//!
//! Host storage APIs come in callback and future flavors depending on the
//! embedding; this trait normalizes them into a single async interface at the
//! outermost adapter boundary so the router and backends never branch on
//! calling convention. Keys map to JSON values; backends keep their whole
//! bookmark map under one key, mirroring how a browser-style keyed store is
//! used.

mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod json_file;

pub use memory::MemoryKeyValueStore;

#[cfg(not(target_arch = "wasm32"))]
pub use json_file::JsonFileStore;

use serde_json::Value;

use crate::error::Result;
use crate::BoxFuture;

/// Async keyed JSON storage.
///
/// Failures are limited to the underlying store being unavailable, surfaced
/// as [`crate::TagmarkError::BackendUnavailable`].
pub trait KeyValueStore: Send + Sync {
    /// Read the value under `key`, or `None` if absent.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>>;

    /// Write `value` under `key`, replacing any existing value. A single
    /// atomic put from the caller's perspective.
    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>>;

    /// Remove the value under `key`. Removing an absent key is a no-op.
    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>>;
}

// Blanket implementation for references to KeyValueStore
impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        (*self).get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        (*self).set(key, value)
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        (*self).remove(key)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Value>>> {
        (**self).get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, Result<()>> {
        (**self).set(key, value)
    }

    fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<()>> {
        (**self).remove(key)
    }
}
