//! Configuration types for Tagmark.
//!
//! [`Config`] is the router configuration surface: which backend is the
//! default for unindexed URLs, the remote API endpoint and credential, the
//! directory granted to the file bridge, and the remote retry knobs.
//! Persisted as TOML (typically at `~/.config/tagmark/config.toml` on Unix
//! systems). UI preference toggles (theme, badge text, fonts) are not core
//! configuration and live with their surfaces.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::BackendId;

/// User-configurable parts of the storage core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend used for URLs the storage index has no entry for.
    #[serde(default)]
    pub default_backend: BackendId,

    /// Remote API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Remote API credential (`user:TOKEN`). Absent means "not logged in".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Directory granted to the file bridge. Absent means the file backend
    /// answers `NO_HANDLE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_directory: Option<PathBuf>,

    /// Retry ceiling for rate-limited remote responses.
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Backoff unit in seconds; attempt `n` waits `n * unit`.
    #[serde(default = "default_retry_unit_secs")]
    pub retry_unit_secs: u64,

    /// Hard per-request timeout in seconds for remote calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.pinboard.in/v1/".to_string()
}

fn default_retry_max_attempts() -> u32 {
    3
}

fn default_retry_unit_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_backend: BackendId::default(),
            api_base: default_api_base(),
            auth_token: None,
            file_directory: None,
            retry_max_attempts: default_retry_max_attempts(),
            retry_unit_secs: default_retry_unit_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// The remote client configuration derived from this config.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn remote_config(&self) -> crate::remote::RemoteConfig {
        crate::remote::RemoteConfig {
            api_base: self.api_base.clone(),
            auth_token: self.auth_token.clone(),
            max_attempts: self.retry_max_attempts,
            retry_unit: Duration::from_secs(self.retry_unit_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    /// Whether a remote credential is configured.
    pub fn has_auth_token(&self) -> bool {
        self.auth_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Config {
    /// Path of the config file: `<config_dir>/tagmark/config.toml`.
    pub fn config_path() -> crate::error::Result<PathBuf> {
        let dir = dirs::config_dir().ok_or(crate::error::TagmarkError::NoConfigDir)?;
        Ok(dir.join("tagmark").join("config.toml"))
    }

    /// Load the config, or defaults when no file exists yet.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from an explicit path (used by tests and the CLI's `--config`).
    pub fn load_from(path: &std::path::Path) -> crate::error::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(toml::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to the default location, creating parent directories.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
