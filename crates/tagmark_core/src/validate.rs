//! Runtime validation of request envelopes at the dispatcher boundary.
//!
//! Validation is incremental: only message types with side effects on
//! persisted data have data schemas; other types pass through. The validator
//! never panics; every failure is a tagged [`ValidationError`] carrying the
//! offending field names, which the dispatcher turns into an
//! `Invalid message` response before any backend is touched.

use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A validated message envelope: a non-empty `type` plus optional object
/// `data`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The message type, always a non-empty string.
    pub message_type: String,
    /// The payload, when present always a flat keyed structure.
    pub data: Option<Map<String, Value>>,
}

/// Validate the envelope shape of a raw message.
///
/// Rejects anything that is not an object, anything missing a non-empty
/// string `type`, and any `data` that is present but not an object.
pub fn validate_envelope(raw: &Value) -> Result<Envelope, ValidationError> {
    let object = raw
        .as_object()
        .ok_or_else(|| ValidationError::field("message", "message must be an object"))?;

    let message_type = match object.get("type") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::String(_)) => {
            return Err(ValidationError::field("type", "type must be non-empty"));
        }
        Some(_) => {
            return Err(ValidationError::field("type", "type must be a string"));
        }
        None => {
            return Err(ValidationError::field("type", "type is required"));
        }
    };

    let data = match object.get("data") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(_) => {
            return Err(ValidationError::field("data", "data must be an object"));
        }
    };

    Ok(Envelope { message_type, data })
}

/// Validate message data against the per-type schema, if one is registered.
///
/// Types without a registered schema pass through unchanged (incremental
/// validation).
pub fn validate_data(
    message_type: &str,
    data: Option<&Map<String, Value>>,
) -> Result<(), ValidationError> {
    match message_type {
        "getCurrentBookmark" => {
            // Optional url; passthrough for extra keys like title or tabId.
            if let Some(map) = data {
                match map.get("url") {
                    None | Some(Value::Null) | Some(Value::String(_)) => {}
                    Some(_) => {
                        return Err(ValidationError::field("url", "url must be a string"));
                    }
                }
            }
            Ok(())
        }
        "getTagsForUrl" | "deleteBookmark" => {
            let map = require_data(message_type, data)?;
            require_url(map)?;
            reject_unknown_keys(map, &["url"])
        }
        "saveBookmark" => {
            let map = require_data(message_type, data)?;
            let mut bad = Vec::new();
            if check_url(map).is_err() {
                bad.push("url".to_string());
            }
            if let Some(tags) = map.get("tags") {
                if !tags_shape_ok(tags) {
                    bad.push("tags".to_string());
                }
            }
            for field in ["description", "title"] {
                if let Some(value) = map.get(field) {
                    if !value.is_string() {
                        bad.push(field.to_string());
                    }
                }
            }
            for field in ["toread", "shared"] {
                if let Some(value) = map.get(field) {
                    if crate::model::TriState::coerce(value).is_none() {
                        bad.push(field.to_string());
                    }
                }
            }
            // Backend-specific passthrough fields are tolerated, not rejected.
            if bad.is_empty() {
                Ok(())
            } else {
                Err(ValidationError::fields(bad, "invalid saveBookmark data"))
            }
        }
        "saveTag" | "deleteTag" => {
            let map = require_data(message_type, data)?;
            let mut bad = Vec::new();
            if check_url(map).is_err() {
                bad.push("url".to_string());
            }
            match map.get("value") {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => bad.push("value".to_string()),
            }
            if !bad.is_empty() {
                return Err(ValidationError::fields(
                    bad,
                    format!("invalid {message_type} data"),
                ));
            }
            reject_unknown_keys(map, &["url", "value"])
        }
        "moveBookmarkToStorage" => {
            let map = require_data(message_type, data)?;
            let mut bad = Vec::new();
            if check_url(map).is_err() {
                bad.push("url".to_string());
            }
            match map.get("targetBackend") {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => bad.push("targetBackend".to_string()),
            }
            if bad.is_empty() {
                Ok(())
            } else {
                Err(ValidationError::fields(
                    bad,
                    "invalid moveBookmarkToStorage data",
                ))
            }
        }
        // No schema registered: pass through.
        _ => Ok(()),
    }
}

fn require_data<'a>(
    message_type: &str,
    data: Option<&'a Map<String, Value>>,
) -> Result<&'a Map<String, Value>, ValidationError> {
    data.ok_or_else(|| {
        ValidationError::field("data", format!("{message_type} requires a data object"))
    })
}

fn check_url(map: &Map<String, Value>) -> Result<(), ()> {
    match map.get("url") {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        _ => Err(()),
    }
}

fn require_url(map: &Map<String, Value>) -> Result<(), ValidationError> {
    check_url(map).map_err(|_| ValidationError::field("url", "url must be a non-empty string"))
}

fn tags_shape_ok(tags: &Value) -> bool {
    match tags {
        Value::String(_) => true,
        Value::Array(items) => items.iter().all(Value::is_string),
        _ => false,
    }
}

/// Strict schemas reject keys outside their contract.
fn reject_unknown_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
) -> Result<(), ValidationError> {
    let unknown: Vec<String> = map
        .keys()
        .filter(|k| !allowed.contains(&k.as_str()))
        .cloned()
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::fields(unknown, "unrecognized fields"))
    }
}
