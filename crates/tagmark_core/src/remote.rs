//! Remote bookmark API client.
//!
//! Performs authenticated HTTP calls against the remote bookmarking API and
//! normalizes transport-level failure into a small retry state machine:
//!
//! ```text
//! Idle -> Sent -> Retryable(429) -> sleep(attempt * unit) -> Sent
//!              -> Fatal(401)     -> AuthRejected
//!              -> Success(200)   -> per-operation parser
//!              -> anything else  -> Transport (fail fast)
//! ```
//!
//! The client is a pure function of (config, transport, request): the
//! credential lives in [`RemoteConfig`], not ambient state, and the
//! [`HttpTransport`] trait keeps the machine testable without a network.
//! Every write is "replace": the full record is re-submitted; there is no
//! partial-field update on the wire.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TagmarkError};
use crate::model::{normalize_url, tags_from_wire, BookmarkRecord, TriState};
use crate::BoxFuture;

/// Default API base for the remote bookmarking service.
pub const DEFAULT_API_BASE: &str = "https://api.pinboard.in/v1/";

/// Construction-time configuration for the remote client.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// API base URL, ending in a slash.
    pub api_base: String,
    /// The credential. Absence short-circuits every operation with
    /// [`TagmarkError::NotLoggedIn`] before any network call.
    pub auth_token: Option<String>,
    /// Retry ceiling for rate-limited responses.
    pub max_attempts: u32,
    /// Backoff unit; attempt `n` sleeps `n * retry_unit` before re-sending.
    pub retry_unit: Duration,
    /// Hard per-request timeout applied at the transport.
    pub request_timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            auth_token: None,
            max_attempts: 3,
            retry_unit: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// A transport-level HTTP response: status plus raw body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

/// Minimal HTTP GET transport, object-safe for mocking.
pub trait HttpTransport: Send + Sync {
    /// Issue a GET and return the status and body, or a transport failure.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, std::result::Result<HttpResponse, String>>;
}

/// Classification of one response inside the retry machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// HTTP 200: hand the body to the per-operation parser.
    Success,
    /// HTTP 429: schedule a retry.
    Retryable,
    /// HTTP 401: the credential is wrong; retrying cannot help.
    Fatal,
    /// Any other status: fail fast as a transport error.
    Unrecognized,
}

impl SendOutcome {
    /// Classify an HTTP status.
    pub fn classify(status: u16) -> Self {
        match status {
            200 => SendOutcome::Success,
            429 => SendOutcome::Retryable,
            401 => SendOutcome::Fatal,
            _ => SendOutcome::Unrecognized,
        }
    }
}

/// Ephemeral per-request retry state. Created at request start, discarded on
/// terminal resolution; never assumed to survive a process restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts sent so far.
    pub attempt: u32,
    /// Retry ceiling.
    pub max_attempts: u32,
    /// Status of the most recent response, if any.
    pub last_status: Option<u16>,
}

impl RetryState {
    /// Fresh state for one request.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            last_status: None,
        }
    }

    /// Record the start of another send.
    pub fn begin_attempt(&mut self) {
        self.attempt += 1;
    }

    /// Whether the retry ceiling has been reached.
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Backoff before the next send: proportional to the attempt count.
    pub fn backoff(&self, unit: Duration) -> Duration {
        unit * self.attempt
    }
}

/// Client for the remote bookmarking HTTP API.
pub struct RemoteClient<T: HttpTransport> {
    config: RemoteConfig,
    transport: T,
}

impl<T: HttpTransport> RemoteClient<T> {
    /// Build a client from explicit configuration and a transport.
    pub fn new(config: RemoteConfig, transport: T) -> Self {
        Self { config, transport }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn require_auth(&self) -> Result<&str> {
        self.config
            .auth_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(TagmarkError::NotLoggedIn)
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<String> {
        let token = self.require_auth()?;
        let mut url = format!("{}{}?", self.config.api_base, path);
        for (name, value) in params {
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencode(value));
            url.push('&');
        }
        url.push_str(&format!("auth_token={}&format=json", urlencode(token)));
        Ok(url)
    }

    /// Send with the retry state machine; resolves with the 200 body or a
    /// terminal failure.
    async fn send(&self, url: &str) -> Result<String> {
        let mut state = RetryState::new(self.config.max_attempts);
        loop {
            state.begin_attempt();
            let response = self
                .transport
                .get(url)
                .await
                .map_err(TagmarkError::Transport)?;
            state.last_status = Some(response.status);

            match SendOutcome::classify(response.status) {
                SendOutcome::Success => return Ok(response.body),
                SendOutcome::Fatal => return Err(TagmarkError::AuthRejected),
                SendOutcome::Retryable => {
                    if state.exhausted() {
                        log::warn!(
                            "rate limited {} times, giving up",
                            state.attempt
                        );
                        return Err(TagmarkError::TooManyRetries);
                    }
                    let delay = state.backoff(self.config.retry_unit);
                    log::debug!(
                        "rate limited (attempt {}), retrying in {:?}",
                        state.attempt,
                        delay
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                SendOutcome::Unrecognized => {
                    return Err(TagmarkError::Transport(format!(
                        "unexpected HTTP status {}",
                        response.status
                    )));
                }
            }
        }
    }

    /// Fetch the bookmark for a URL, or `None` when the service has no post
    /// for it.
    pub async fn fetch_bookmark_for_url(&self, url: &str) -> Result<Option<BookmarkRecord>> {
        let key = normalize_url(url);
        let endpoint = self.endpoint("posts/get", &[("url", &key)])?;
        let body = self.send(&endpoint).await?;
        let parsed: WirePosts = serde_json::from_str(&body)?;
        Ok(parsed.posts.into_iter().next().map(WirePost::into_record))
    }

    /// Fetch up to `count` recent bookmarks.
    pub async fn fetch_recent_bookmarks(&self, count: usize) -> Result<Vec<BookmarkRecord>> {
        let count_param = count.to_string();
        let endpoint = self.endpoint("posts/recent", &[("count", &count_param)])?;
        let body = self.send(&endpoint).await?;
        let parsed: WirePosts = serde_json::from_str(&body)?;
        Ok(parsed
            .posts
            .into_iter()
            .map(WirePost::into_record)
            .collect())
    }

    /// Frequency-ordered unique tags across recent bookmarks, minus
    /// `exclude`, truncated to `count`. Seeds tag suggestions.
    pub async fn fetch_recent_tags(
        &self,
        exclude: &[String],
        count: usize,
    ) -> Result<Vec<String>> {
        let recent = self.fetch_recent_bookmarks(32).await?;
        let mut occurrences: indexmap::IndexMap<String, usize> = indexmap::IndexMap::new();
        for record in &recent {
            for tag in &record.tags {
                *occurrences.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = occurrences.into_iter().collect();
        // Stable sort keeps first-seen order among equally frequent tags.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(ranked
            .into_iter()
            .map(|(tag, _)| tag)
            .filter(|tag| !exclude.contains(tag))
            .take(count)
            .collect())
    }

    /// Create or update a bookmark: the full record is submitted with
    /// `replace=yes`.
    pub async fn save_bookmark(&self, record: &BookmarkRecord) -> Result<()> {
        let key = normalize_url(&record.url);
        // The API requires a non-empty description; fall back to the URL.
        let description = if record.description.is_empty() {
            key.clone()
        } else {
            record.description.clone()
        };
        let tags = record.tags_wire();
        let endpoint = self.endpoint(
            "posts/add",
            &[
                ("url", &key),
                ("description", &description),
                ("extended", &record.extended),
                ("tags", &tags),
                ("shared", record.shared.as_str()),
                ("toread", record.toread.as_str()),
                ("replace", "yes"),
            ],
        )?;
        let body = self.send(&endpoint).await?;
        let result: WireResult = serde_json::from_str(&body)?;
        if result.result_code == "done" {
            Ok(())
        } else {
            Err(TagmarkError::Transport(format!(
                "remote API rejected save: {}",
                result.result_code
            )))
        }
    }

    /// Merge a new tag into a bookmark's existing tag set (deduplicated,
    /// order preserved) and write the full record back.
    pub async fn save_tag(&self, url: &str, value: &str) -> Result<()> {
        let mut record = self
            .fetch_bookmark_for_url(url)
            .await?
            .unwrap_or_else(|| BookmarkRecord::empty(url, ""));
        record.add_tag(value);
        self.save_bookmark(&record).await
    }

    /// Remove a tag from a bookmark and write the full record back.
    pub async fn delete_tag(&self, url: &str, value: &str) -> Result<()> {
        let mut record = self
            .fetch_bookmark_for_url(url)
            .await?
            .unwrap_or_else(|| BookmarkRecord::empty(url, ""));
        record.remove_tag(value);
        self.save_bookmark(&record).await
    }

    /// Delete the bookmark for a URL. The service treats deletes loosely;
    /// "item not found" resolves as a soft success.
    pub async fn delete_pin(&self, url: &str) -> Result<()> {
        let key = normalize_url(url);
        let endpoint = self.endpoint("posts/delete", &[("url", &key)])?;
        let body = self.send(&endpoint).await?;
        let result: WireResult = serde_json::from_str(&body)?;
        if result.result_code != "done" {
            log::warn!("remote delete for {key}: {}", result.result_code);
        }
        Ok(())
    }
}

// ============================================================================
// Wire formats
// ============================================================================

#[derive(Debug, Deserialize)]
struct WirePosts {
    #[serde(default)]
    posts: Vec<WirePost>,
}

#[derive(Debug, Deserialize)]
struct WirePost {
    href: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    extended: String,
    #[serde(default)]
    hash: String,
    #[serde(default)]
    time: String,
    #[serde(default)]
    shared: String,
    #[serde(default)]
    toread: String,
    #[serde(default)]
    tags: String,
}

impl WirePost {
    fn into_record(self) -> BookmarkRecord {
        let time = chrono::DateTime::parse_from_rfc3339(&self.time)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc));
        BookmarkRecord {
            url: normalize_url(&self.href),
            description: self.description,
            extended: self.extended,
            tags: tags_from_wire(&self.tags),
            time,
            updated_at: time,
            shared: if self.shared == "no" {
                TriState::No
            } else {
                TriState::Yes
            },
            toread: if self.toread == "yes" {
                TriState::Yes
            } else {
                TriState::No
            },
            hash: if self.hash.is_empty() {
                None
            } else {
                Some(self.hash)
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireResult {
    #[serde(default)]
    result_code: String,
}

fn urlencode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

// ============================================================================
// Native transport
// ============================================================================

/// [`HttpTransport`] backed by reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport honoring the config's request timeout.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TagmarkError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, std::result::Result<HttpResponse, String>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| e.to_string())?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| e.to_string())?;
            Ok(HttpResponse { status, body })
        })
    }
}
