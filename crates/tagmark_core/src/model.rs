//! Bookmark data model.
//!
//! The canonical unit is [`BookmarkRecord`], keyed by a normalized URL.
//! Records move between four storage backends identified by [`BackendId`];
//! the file backend persists them inside a single [`FileBookmarkDocument`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::TagmarkError;

/// On-disk format version for the file backend document.
pub const FILE_FORMAT_VERSION: u32 = 1;

/// Normalize a URL for use as a storage key.
///
/// Trims surrounding whitespace, strips any fragment, and strips trailing
/// slashes, so `"https://a.example/ "` and `"https://a.example/#top"` key the
/// same record.
pub fn normalize_url(url: &str) -> String {
    let mut s = url.trim();
    if let Some(pos) = s.find('#') {
        s = &s[..pos];
    }
    s.trim_end_matches('/').to_string()
}

/// Normalize a tag list: drop empty entries and duplicates, preserving the
/// order of first occurrence. Tags are case-sensitive.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if tag.is_empty() {
            continue;
        }
        if !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Split a space-delimited wire tag string into a normalized tag list.
pub fn tags_from_wire(wire: &str) -> Vec<String> {
    normalize_tags(wire.split_whitespace())
}

/// The remote API's yes/no string convention for `shared` and `toread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriState {
    /// Wire value `"yes"`.
    Yes,
    /// Wire value `"no"`.
    No,
}

impl TriState {
    /// Serde default for fields that default to `"yes"` (e.g. `shared`).
    pub fn default_yes() -> Self {
        TriState::Yes
    }

    /// Serde default for fields that default to `"no"` (e.g. `toread`).
    pub fn default_no() -> Self {
        TriState::No
    }

    /// The wire string, `"yes"` or `"no"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriState::Yes => "yes",
            TriState::No => "no",
        }
    }

    /// Lenient coercion from message data, where UI surfaces may send
    /// booleans, 0/1 numbers, or the wire strings. Anything else is `None`.
    pub fn coerce(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(true) => Some(TriState::Yes),
            JsonValue::Bool(false) => Some(TriState::No),
            JsonValue::Number(n) => Some(if n.as_f64() == Some(0.0) {
                TriState::No
            } else {
                TriState::Yes
            }),
            JsonValue::String(s) => match s.as_str() {
                "yes" => Some(TriState::Yes),
                "no" => Some(TriState::No),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of the storage backend holding a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// The remote bookmarking HTTP API.
    Remote,
    /// The device-local key-value store.
    Local,
    /// The cross-device-synced key-value store.
    Synced,
    /// The file backend behind the bridge.
    File,
}

impl BackendId {
    /// All backends, in merge/tie-break order.
    pub const ALL: [BackendId; 4] = [
        BackendId::Remote,
        BackendId::Local,
        BackendId::Synced,
        BackendId::File,
    ];

    /// The lowercase identifier used on the wire and in the storage index.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Remote => "remote",
            BackendId::Local => "local",
            BackendId::Synced => "synced",
            BackendId::File => "file",
        }
    }
}

impl Default for BackendId {
    fn default() -> Self {
        BackendId::Local
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = TagmarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(BackendId::Remote),
            "local" => Ok(BackendId::Local),
            "synced" => Ok(BackendId::Synced),
            "file" => Ok(BackendId::File),
            other => Err(TagmarkError::UnknownBackend(other.to_string())),
        }
    }
}

/// The canonical bookmark unit.
///
/// `url` is the unique key and is always present and non-empty in stored
/// records. `tags` never contains empty or duplicate entries after
/// normalization. `time` is the create time; `updated_at` is refreshed on
/// every save. `hash` is opaque and backend-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    /// Normalized URL, the unique key.
    pub url: String,

    /// Short description (the remote API's title field).
    #[serde(default)]
    pub description: String,

    /// Extended notes.
    #[serde(default)]
    pub extended: String,

    /// Ordered, case-sensitive tag set. Space-delimited on the remote wire;
    /// a JSON array everywhere else.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    /// Create time. Preserved across updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    /// Most recent update time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Remote-API string convention; defaults to `"yes"`.
    #[serde(default = "TriState::default_yes")]
    pub shared: TriState,

    /// Remote-API string convention; defaults to `"no"`.
    #[serde(default = "TriState::default_no")]
    pub toread: TriState,

    /// Opaque backend-assigned content hash, used for optimistic
    /// delete/update. `None` until a backend assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl BookmarkRecord {
    /// An empty record for a URL not yet saved anywhere. `title`, when
    /// available from the sender context, seeds the description.
    pub fn empty(url: &str, title: &str) -> Self {
        Self {
            url: normalize_url(url),
            description: title.to_string(),
            extended: String::new(),
            tags: Vec::new(),
            time: None,
            updated_at: None,
            shared: TriState::Yes,
            toread: TriState::No,
            hash: None,
        }
    }

    /// Whether any backend has actually stored this record yet.
    pub fn is_stored(&self) -> bool {
        self.time.is_some() || self.hash.is_some()
    }

    /// Tags joined for the remote wire (space-delimited).
    pub fn tags_wire(&self) -> String {
        self.tags.join(" ")
    }

    /// Merge a tag into the tag set, deduplicated, original order preserved.
    pub fn add_tag(&mut self, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        if !self.tags.iter().any(|t| t == value) {
            self.tags.push(value.to_string());
        }
    }

    /// Remove a tag from the tag set. Removing an absent tag is a no-op.
    pub fn remove_tag(&mut self, value: &str) {
        self.tags.retain(|t| t != value);
    }
}

/// Accept tags as either a JSON array of strings or a space-delimited wire
/// string; normalize either way.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TagsField {
        List(Vec<String>),
        Wire(String),
    }

    match Option::<TagsField>::deserialize(deserializer)? {
        Some(TagsField::List(list)) => Ok(normalize_tags(list)),
        Some(TagsField::Wire(s)) => Ok(tags_from_wire(&s)),
        None => Ok(Vec::new()),
    }
}

/// Derive a stable, backend-prefixed hash for a URL.
///
/// The key-value and file backends have no server to assign content hashes,
/// so they derive one from the URL: a 32-bit rolling hash rendered in base36
/// behind a backend prefix (`local-`, `sync-`, `file-`).
pub fn stable_hash(prefix: &str, url: &str) -> String {
    let mut h: i32 = 0;
    for c in url.chars() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32);
    }
    format!("{}-{}", prefix, to_base36(h.unsigned_abs()))
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// The document persisted by the file backend: a single JSON object holding
/// every file-backed bookmark, fully rewritten on each write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBookmarkDocument {
    /// Format version; defaults to [`FILE_FORMAT_VERSION`].
    #[serde(default = "default_version")]
    pub version: u32,

    /// Bookmarks keyed by normalized URL, in insertion order.
    #[serde(default)]
    pub bookmarks: IndexMap<String, BookmarkRecord>,
}

fn default_version() -> u32 {
    FILE_FORMAT_VERSION
}

impl Default for FileBookmarkDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl FileBookmarkDocument {
    /// A fresh, empty document at the current format version.
    pub fn empty() -> Self {
        Self {
            version: FILE_FORMAT_VERSION,
            bookmarks: IndexMap::new(),
        }
    }

    /// Parse a document leniently: text that fails to parse, or that lacks a
    /// `bookmarks` object, reads as the empty document rather than an error.
    pub fn from_json_lossy(text: &str) -> Self {
        match serde_json::from_str::<FileBookmarkDocument>(text) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("unreadable bookmark document, treating as empty: {e}");
                Self::empty()
            }
        }
    }

    /// Serialize for disk: pretty-printed, full document.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
