//! File bridge request/response protocol.
//!
//! The dispatcher process cannot hold a filesystem directory handle reliably
//! across its own lifecycle, so file-backed storage is delegated to a
//! long-lived helper context that owns the handle and answers a fixed,
//! versioned RPC: `READ_FILE_BOOKMARKS` and `WRITE_FILE_BOOKMARKS`. Requests
//! are non-cancelable; once sent, the caller awaits a response or a transport
//! failure. Unknown request types yield no response at all, signaling
//! "not mine" to the transport.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, TagmarkError};
use crate::model::FileBookmarkDocument;
use crate::BoxFuture;

/// Request type for reading the whole bookmark document.
pub const READ_FILE_BOOKMARKS: &str = "READ_FILE_BOOKMARKS";
/// Request type for writing the whole bookmark document.
pub const WRITE_FILE_BOOKMARKS: &str = "WRITE_FILE_BOOKMARKS";
/// Error code reported when no directory has been granted to the helper.
pub const NO_HANDLE: &str = "NO_HANDLE";

/// Name of the document file inside the granted directory.
pub const BOOKMARKS_FILENAME: &str = "tagmark-bookmarks.json";

/// Wire shape of a `READ_FILE_BOOKMARKS` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResponse {
    /// `None` on success; `"NO_HANDLE"` or a failure message otherwise.
    pub error: Option<String>,
    /// The document on success, `None` otherwise.
    pub data: Option<FileBookmarkDocument>,
}

/// Wire shape of a `WRITE_FILE_BOOKMARKS` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    /// `None` on success; `"NO_HANDLE"` or a failure message otherwise.
    pub error: Option<String>,
    /// Whether the write landed.
    pub success: bool,
}

/// Client-side view of the file backend's document store.
pub trait FileBridge: Send + Sync {
    /// Read the full document. A not-yet-created file is an empty document,
    /// not an error.
    fn read_document(&self) -> BoxFuture<'_, Result<FileBookmarkDocument>>;

    /// Serialize and persist the full document.
    fn write_document<'a>(&'a self, doc: &'a FileBookmarkDocument) -> BoxFuture<'a, Result<()>>;
}

/// Transport carrying bridge requests into the helper context.
pub trait BridgeTransport: Send + Sync {
    /// Send a request envelope and await its response envelope. Errors are
    /// transport-level only; protocol errors ride inside the response.
    fn send(&self, request: Value) -> BoxFuture<'_, std::result::Result<Value, String>>;
}

/// [`FileBridge`] speaking the RPC over a [`BridgeTransport`].
pub struct MessageFileBridge<T: BridgeTransport> {
    transport: T,
}

impl<T: BridgeTransport> MessageFileBridge<T> {
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    fn map_error(error: Option<String>, fallback: &str) -> TagmarkError {
        match error {
            Some(code) if code == NO_HANDLE => TagmarkError::NoHandle,
            Some(message) => TagmarkError::Transport(message),
            None => TagmarkError::Transport(fallback.to_string()),
        }
    }
}

impl<T: BridgeTransport> FileBridge for MessageFileBridge<T> {
    fn read_document(&self) -> BoxFuture<'_, Result<FileBookmarkDocument>> {
        Box::pin(async move {
            let raw = self
                .transport
                .send(json!({ "type": READ_FILE_BOOKMARKS }))
                .await
                .map_err(TagmarkError::Transport)?;
            let response: ReadResponse = serde_json::from_value(raw)?;
            match response.data {
                Some(doc) if response.error.is_none() => Ok(doc),
                _ => Err(Self::map_error(response.error, "empty read response")),
            }
        })
    }

    fn write_document<'a>(&'a self, doc: &'a FileBookmarkDocument) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let raw = self
                .transport
                .send(json!({
                    "type": WRITE_FILE_BOOKMARKS,
                    "data": serde_json::to_value(doc)?,
                }))
                .await
                .map_err(TagmarkError::Transport)?;
            let response: WriteResponse = serde_json::from_value(raw)?;
            if response.success && response.error.is_none() {
                Ok(())
            } else {
                Err(Self::map_error(response.error, "write rejected"))
            }
        })
    }
}

/// In-memory [`FileBridge`] for tests and single-process hosts.
pub struct InMemoryFileBridge {
    doc: std::sync::RwLock<FileBookmarkDocument>,
    granted: bool,
}

impl Default for InMemoryFileBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFileBridge {
    /// A bridge with a granted handle and an empty document.
    pub fn new() -> Self {
        Self {
            doc: std::sync::RwLock::new(FileBookmarkDocument::empty()),
            granted: true,
        }
    }

    /// A bridge that reports `NO_HANDLE` for every operation.
    pub fn without_handle() -> Self {
        Self {
            doc: std::sync::RwLock::new(FileBookmarkDocument::empty()),
            granted: false,
        }
    }
}

impl FileBridge for InMemoryFileBridge {
    fn read_document(&self) -> BoxFuture<'_, Result<FileBookmarkDocument>> {
        Box::pin(async move {
            if !self.granted {
                return Err(TagmarkError::NoHandle);
            }
            self.doc
                .read()
                .map(|doc| doc.clone())
                .map_err(|_| TagmarkError::Transport("bridge lock poisoned".to_string()))
        })
    }

    fn write_document<'a>(&'a self, doc: &'a FileBookmarkDocument) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if !self.granted {
                return Err(TagmarkError::NoHandle);
            }
            let mut slot = self
                .doc
                .write()
                .map_err(|_| TagmarkError::Transport("bridge lock poisoned".to_string()))?;
            *slot = doc.clone();
            Ok(())
        })
    }
}

// ============================================================================
// Helper-context side
// ============================================================================

/// The helper context that owns the directory handle and serves the RPC.
///
/// Native hosts hand it the granted directory path (persisted out of band by
/// configuration); hosts where no directory has been granted construct it
/// with `None` and every request answers `NO_HANDLE`.
#[cfg(not(target_arch = "wasm32"))]
pub struct FileBridgeHost {
    handle: std::sync::RwLock<Option<std::path::PathBuf>>,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileBridgeHost {
    /// Create a host around an optional directory handle.
    pub fn new(handle: Option<std::path::PathBuf>) -> Self {
        Self {
            handle: std::sync::RwLock::new(handle),
        }
    }

    /// Grant or revoke the directory handle.
    pub fn set_handle(&self, handle: Option<std::path::PathBuf>) {
        if let Ok(mut slot) = self.handle.write() {
            *slot = handle;
        }
    }

    fn current_handle(&self) -> Option<std::path::PathBuf> {
        self.handle.read().ok().and_then(|h| h.clone())
    }

    /// Serve one request. Returns `None` for request types that are not part
    /// of this protocol, so the transport can route them elsewhere.
    pub async fn serve(&self, request: &Value) -> Option<Value> {
        match request.get("type").and_then(Value::as_str) {
            Some(READ_FILE_BOOKMARKS) => Some(self.handle_read()),
            Some(WRITE_FILE_BOOKMARKS) => Some(self.handle_write(request.get("data"))),
            _ => None,
        }
    }

    fn handle_read(&self) -> Value {
        let Some(dir) = self.current_handle() else {
            return json!({ "error": NO_HANDLE, "data": null });
        };
        let path = dir.join(BOOKMARKS_FILENAME);
        let doc = match std::fs::read_to_string(&path) {
            Ok(text) => FileBookmarkDocument::from_json_lossy(&text),
            // A missing file is not an error: the document simply doesn't
            // exist yet.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileBookmarkDocument::empty(),
            Err(e) => {
                return json!({ "error": e.to_string(), "data": null });
            }
        };
        match serde_json::to_value(&doc) {
            Ok(data) => json!({ "error": null, "data": data }),
            Err(e) => json!({ "error": e.to_string(), "data": null }),
        }
    }

    fn handle_write(&self, data: Option<&Value>) -> Value {
        let Some(dir) = self.current_handle() else {
            return json!({ "error": NO_HANDLE, "success": false });
        };
        let doc = match data {
            Some(value) => match serde_json::from_value::<FileBookmarkDocument>(value.clone()) {
                Ok(doc) => doc,
                Err(e) => return json!({ "error": e.to_string(), "success": false }),
            },
            None => FileBookmarkDocument::empty(),
        };
        let path = dir.join(BOOKMARKS_FILENAME);
        match std::fs::write(&path, doc.to_pretty_json()) {
            Ok(()) => json!({ "error": null, "success": true }),
            Err(e) => json!({ "error": e.to_string(), "success": false }),
        }
    }
}

/// Transport that delivers requests to an in-process [`FileBridgeHost`].
///
/// Stands in for the real cross-context message channel on native hosts,
/// keeping the protocol boundary intact: everything still crosses the wire
/// as envelopes.
#[cfg(not(target_arch = "wasm32"))]
pub struct LoopbackTransport {
    host: std::sync::Arc<FileBridgeHost>,
}

#[cfg(not(target_arch = "wasm32"))]
impl LoopbackTransport {
    /// Attach to a host.
    pub fn new(host: std::sync::Arc<FileBridgeHost>) -> Self {
        Self { host }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl BridgeTransport for LoopbackTransport {
    fn send(&self, request: Value) -> BoxFuture<'_, std::result::Result<Value, String>> {
        Box::pin(async move {
            match self.host.serve(&request).await {
                Some(response) => Ok(response),
                None => Err("bridge ignored unknown request type".to_string()),
            }
        })
    }
}
