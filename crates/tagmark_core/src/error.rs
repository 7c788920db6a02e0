use serde::Serialize;
use thiserror::Error;

/// Unified error type for tagmark operations
#[derive(Debug, Error)]
pub enum TagmarkError {
    /// A message envelope or its per-type data failed validation.
    /// Never reaches a backend; recoverable by the caller correcting input.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A message carried a type the dispatcher has no handler for.
    /// Distinct from a validation failure.
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    // Remote credential errors
    #[error("not logged in")]
    NotLoggedIn,

    #[error("authentication rejected by remote API")]
    AuthRejected,

    /// The remote API kept rate-limiting past the retry ceiling.
    #[error("too many retries")]
    TooManyRetries,

    // Storage errors
    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The file bridge has no directory handle to work with.
    /// The caller must re-provision access.
    #[error("NO_HANDLE")]
    NoHandle,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("bookmark not found in source backend: {0}")]
    NotFound(String),

    /// Neither the sender context nor the payload carried a URL for an
    /// operation that needs one.
    #[error("No URL provided")]
    MissingUrl,

    #[error("invalid storage backend: {0}. Use remote, local, synced, or file.")]
    UnknownBackend(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias for tagmark operations
pub type Result<T> = std::result::Result<T, TagmarkError>;

/// A validation failure carrying the offending field names.
///
/// Serializable so the dispatcher can attach it verbatim as the `details`
/// object of an `Invalid message` response.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct ValidationError {
    /// Human-readable summary of what failed.
    pub message: String,
    /// The envelope or data fields that failed, e.g. `["url", "value"]`.
    pub fields: Vec<String>,
}

impl ValidationError {
    /// Build a failure for a single offending field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: vec![field.to_string()],
        }
    }

    /// Build a failure for several offending fields.
    pub fn fields(fields: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields,
        }
    }
}
