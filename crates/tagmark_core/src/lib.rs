#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use std::future::Future;
use std::pin::Pin;

/// Configuration options
pub mod config;

/// Error (common error types)
pub mod error;

/// Bookmark data model
pub mod model;

/// Message envelope validation
pub mod validate;

/// Key-value store abstraction
pub mod store;

/// Per-URL storage index
pub mod index;

/// Storage backend capability interface and implementations
pub mod backend;

/// File bridge request/response protocol
pub mod bridge;

/// Remote bookmark API client
#[cfg(not(target_arch = "wasm32"))]
pub mod remote;

/// Storage router (backend selection and migration)
pub mod router;

/// Message dispatcher (top-level entry point)
pub mod dispatch;

/// A boxed future for object-safe async trait methods.
///
/// On native targets, futures are `Send` for compatibility with multi-threaded
/// runtimes. On WASM, there's no `Send` requirement since JavaScript is
/// single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A boxed future for object-safe async trait methods.
///
/// WASM version without `Send` requirement - JavaScript is single-threaded.
#[cfg(target_arch = "wasm32")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub use error::{Result, TagmarkError};
pub use model::{BackendId, BookmarkRecord, FileBookmarkDocument, TriState};

#[cfg(test)]
pub(crate) fn block_on_test<F: Future>(f: F) -> F::Output {
    futures_lite::future::block_on(f)
}
