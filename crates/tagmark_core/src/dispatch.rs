//! Message dispatcher: the top-level entry point.
//!
//! Validates each inbound envelope, validates its per-type data, then invokes
//! the handler for its type and normalizes the result into a response
//! envelope. No handler error ever escapes: every path produces either the
//! operation result or an error-shaped response. Validation failures are
//! guaranteed to return before any backend is touched, and an unknown type is
//! a hard failure distinct from a validation failure.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Result, TagmarkError};
use crate::model::TriState;
use crate::router::StorageRouter;
use crate::validate;

/// Context about the sender of a message, used by the handful of types that
/// need "current active page" context when `data.url` is absent.
#[derive(Debug, Clone, Default)]
pub struct SenderContext {
    /// URL of the originating tab, when known.
    pub url: Option<String>,
    /// Identity of the originating tab, when known.
    pub tab_id: Option<i64>,
}

/// Result shape for write operations, mirrored verbatim to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpStatus {
    /// Whether the operation landed.
    pub success: bool,
    /// Short machine-readable code.
    pub code: String,
    /// Human-readable message; the UI renders it or maps it.
    pub message: String,
}

impl OpStatus {
    fn done() -> Self {
        Self {
            success: true,
            code: "done".to_string(),
            message: "Operation completed".to_string(),
        }
    }
}

/// Top-level message dispatcher over a [`StorageRouter`].
pub struct MessageDispatcher {
    router: StorageRouter,
}

impl MessageDispatcher {
    /// Build a dispatcher.
    pub fn new(router: StorageRouter) -> Self {
        Self { router }
    }

    /// The router behind this dispatcher.
    pub fn router(&self) -> &StorageRouter {
        &self.router
    }

    /// Dispatch one raw message and produce its response envelope. Never
    /// fails: errors come back as `{ "error": ..., "details"? }`.
    pub async fn dispatch(&self, raw: Value, ctx: &SenderContext) -> Value {
        match self.try_dispatch(raw, ctx).await {
            Ok(response) => response,
            Err(e) => error_response(&e),
        }
    }

    async fn try_dispatch(&self, raw: Value, ctx: &SenderContext) -> Result<Value> {
        let envelope = validate::validate_envelope(&raw)?;
        validate::validate_data(&envelope.message_type, envelope.data.as_ref())?;
        let data = envelope.data;

        log::debug!("dispatch {}", envelope.message_type);
        match envelope.message_type.as_str() {
            "getCurrentBookmark" => self.handle_get_current_bookmark(data, ctx).await,
            "getTagsForUrl" => self.handle_get_tags_for_url(data).await,
            "getRecentBookmarks" => self.handle_get_recent_bookmarks(data).await,
            "getLocalBookmarksForIndex" => {
                let rows = self.router.get_local_bookmarks_for_index().await?;
                Ok(json!({ "bookmarks": rows }))
            }
            "getAggregatedBookmarksForIndex" => {
                let rows = self.router.get_all_bookmarks_for_index().await?;
                Ok(json!({ "bookmarks": rows }))
            }
            "saveBookmark" => self.handle_save_bookmark(data).await,
            "deleteBookmark" => self.handle_delete_bookmark(data).await,
            "saveTag" => self.handle_tag_op(data, TagOp::Save).await,
            "deleteTag" => self.handle_tag_op(data, TagOp::Delete).await,
            "getStorageBackendForUrl" => self.handle_get_storage_backend(data).await,
            "moveBookmarkToStorage" => self.handle_move_bookmark(data).await,
            "echo" => Ok(json!({ "echo": data })),
            other => Err(TagmarkError::UnknownMessageType(other.to_string())),
        }
    }

    async fn handle_get_current_bookmark(
        &self,
        data: Option<Map<String, Value>>,
        ctx: &SenderContext,
    ) -> Result<Value> {
        // Senders without tab context (e.g. popups) pass url in data instead.
        let data_url = data
            .as_ref()
            .and_then(|d| d.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let url = ctx.url.clone().or(data_url).ok_or(TagmarkError::MissingUrl)?;
        let title = data
            .as_ref()
            .and_then(|d| d.get("title"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let storage = self.router.resolve_backend(&url).await;
        let record = self.router.get_bookmark_for_url(&url, title).await?;
        let mut response = serde_json::to_value(&record)?;
        if let Some(object) = response.as_object_mut() {
            object.insert("storage".to_string(), json!(storage));
        }
        Ok(response)
    }

    async fn handle_get_tags_for_url(&self, data: Option<Map<String, Value>>) -> Result<Value> {
        let params: UrlParams = from_data(data)?;
        let tags = self.router.get_tags_for_url(&params.url).await?;
        Ok(json!({ "tags": tags }))
    }

    async fn handle_get_recent_bookmarks(
        &self,
        data: Option<Map<String, Value>>,
    ) -> Result<Value> {
        let count = data
            .as_ref()
            .and_then(|d| d.get("count"))
            .and_then(Value::as_u64)
            .unwrap_or(15) as usize;
        let bookmarks = self.router.get_recent_bookmarks(count).await?;
        Ok(json!({ "bookmarks": bookmarks }))
    }

    async fn handle_save_bookmark(&self, data: Option<Map<String, Value>>) -> Result<Value> {
        let params: SaveBookmarkParams = from_data(data)?;

        // Merge the payload over the record currently held for this URL, so
        // omitted fields survive the full-record write.
        let mut record = self
            .router
            .get_bookmark_for_url(&params.url, params.title.as_deref().unwrap_or(""))
            .await?;
        if let Some(tags) = params.tags {
            record.tags = tags.into_vec();
        }
        if let Some(description) = params.description {
            record.description = description;
        }
        if let Some(extended) = params.extended {
            record.extended = extended;
        }
        if let Some(shared) = params.shared.as_ref().and_then(TriState::coerce) {
            record.shared = shared;
        }
        if let Some(toread) = params.toread.as_ref().and_then(TriState::coerce) {
            record.toread = toread;
        }

        self.router.save_bookmark(&record).await?;
        Ok(json!(OpStatus::done()))
    }

    async fn handle_delete_bookmark(&self, data: Option<Map<String, Value>>) -> Result<Value> {
        let params: UrlParams = from_data(data)?;
        self.router.delete_bookmark(&params.url).await?;
        Ok(json!(OpStatus::done()))
    }

    async fn handle_tag_op(&self, data: Option<Map<String, Value>>, op: TagOp) -> Result<Value> {
        let params: TagParams = from_data(data)?;
        match op {
            TagOp::Save => self.router.save_tag(&params.url, &params.value).await?,
            TagOp::Delete => self.router.delete_tag(&params.url, &params.value).await?,
        }
        Ok(json!(OpStatus::done()))
    }

    async fn handle_get_storage_backend(
        &self,
        data: Option<Map<String, Value>>,
    ) -> Result<Value> {
        let params: UrlParams = from_data(data)?;
        let backend = self.router.resolve_backend(&params.url).await;
        Ok(json!({ "backend": backend }))
    }

    async fn handle_move_bookmark(&self, data: Option<Map<String, Value>>) -> Result<Value> {
        let params: MoveParams = from_data(data)?;
        let target = params.target_backend.parse()?;
        self.router
            .move_bookmark_to_storage(&params.url, target)
            .await?;
        Ok(json!(OpStatus::done()))
    }
}

enum TagOp {
    Save,
    Delete,
}

// ============================================================================
// Handler parameter shapes (extracted after validation)
// ============================================================================

#[derive(Deserialize)]
struct UrlParams {
    url: String,
}

#[derive(Deserialize)]
struct TagParams {
    url: String,
    value: String,
}

#[derive(Deserialize)]
struct MoveParams {
    url: String,
    #[serde(rename = "targetBackend")]
    target_backend: String,
}

#[derive(Deserialize)]
struct SaveBookmarkParams {
    url: String,
    #[serde(default)]
    tags: Option<TagsField>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    extended: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    shared: Option<Value>,
    #[serde(default)]
    toread: Option<Value>,
}

/// Tags arrive as an ordered list or a space-delimited wire string.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagsField {
    List(Vec<String>),
    Wire(String),
}

impl TagsField {
    fn into_vec(self) -> Vec<String> {
        match self {
            TagsField::List(list) => crate::model::normalize_tags(list),
            TagsField::Wire(s) => crate::model::tags_from_wire(&s),
        }
    }
}

fn from_data<P: serde::de::DeserializeOwned>(data: Option<Map<String, Value>>) -> Result<P> {
    let data = data.unwrap_or_default();
    Ok(serde_json::from_value(Value::Object(data))?)
}

/// Shape an error into the response envelope the UI expects.
pub fn error_response(error: &TagmarkError) -> Value {
    match error {
        TagmarkError::Validation(details) => json!({
            "error": "Invalid message",
            "details": details,
        }),
        TagmarkError::UnknownMessageType(message_type) => json!({
            "error": "Unknown message type",
            "details": { "type": message_type },
        }),
        other => json!({ "error": other.to_string() }),
    }
}
