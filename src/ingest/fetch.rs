// src/ingest/fetch.rs
//! Resilient GET with a fixed-delay retry policy.
//!
//! Transient network failures (reset, refused, timeout, DNS) are retried and, once
//! retries run out, reported as `Ok(None)`: an unreachable source is not fatal.
//! Anything else (HTTP status, body errors) is retried the same way but surfaces
//! as `Err` on the last attempt.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL};
use serde::{Deserialize, Serialize};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const BROWSER_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
const BROWSER_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";

fn default_retries() -> u32 {
    3
}
fn default_delay_ms() -> u64 {
    2_000
}
fn default_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per URL (values below 1 are treated as 1).
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay_ms: default_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    /// Same attempt count, no waiting between attempts.
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            delay_ms: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    ConnectionReset,
    ConnectionRefused,
    Timeout,
    Dns,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransientKind::ConnectionReset => "connection reset",
            TransientKind::ConnectionRefused => "connection refused",
            TransientKind::Timeout => "timeout",
            TransientKind::Dns => "dns failure",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("transient network failure ({kind}): {message}")]
    Transient { kind: TransientKind, message: String },
    #[error("HTTP status {status}")]
    Status { status: u16 },
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient { .. })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("fetching {url} failed after {attempts} attempt(s): {source}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: TransportError,
}

/// One GET, no retries. Returns the body on 2xx.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, TransportError>;
}

pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// `Ok(Some(body))` on success, `Ok(None)` when the host stayed unreachable,
    /// `Err` when the final attempt failed for a non-network reason.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<Option<String>, FetchError> {
        let attempts = self.policy.retries.max(1);
        let timeout = Duration::from_millis(self.policy.timeout_ms);

        for attempt in 1..=attempts {
            match self.transport.get(url, timeout).await {
                Ok(body) => return Ok(Some(body)),
                Err(e) if e.is_transient() => {
                    tracing::warn!(target: "fetch", %url, attempt, attempts, error = %e, "transient fetch failure");
                    counter!("fetch_transient_errors_total").increment(1);
                }
                Err(e) => {
                    tracing::error!(target: "fetch", %url, attempt, attempts, error = %e, "fetch failure");
                    counter!("fetch_errors_total").increment(1);
                    if attempt == attempts {
                        return Err(FetchError {
                            url: url.to_string(),
                            attempts,
                            source: e,
                        });
                    }
                }
            }
            if attempt < attempts && self.policy.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.policy.delay_ms)).await;
            }
        }

        tracing::warn!(target: "fetch", %url, attempts, "source unreachable, giving up");
        Ok(None)
    }
}

/// Production transport with a browser-like header set; several sources
/// reject requests that do not look like a browser.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(BROWSER_ACCEPT));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(BROWSER_ACCEPT_LANGUAGE));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building source http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> Result<String, TransportError> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(classify_reqwest)
    }
}

fn classify_reqwest(err: reqwest::Error) -> TransportError {
    let chain = error_chain_text(&err);
    let transient = if err.is_timeout() || chain.contains("timed out") {
        Some(TransientKind::Timeout)
    } else if chain.contains("dns")
        || chain.contains("failed to lookup")
        || chain.contains("name or service not known")
    {
        Some(TransientKind::Dns)
    } else if chain.contains("reset") {
        Some(TransientKind::ConnectionReset)
    } else if chain.contains("refused") || err.is_connect() {
        Some(TransientKind::ConnectionRefused)
    } else {
        None
    };

    match transient {
        Some(kind) => TransportError::Transient {
            kind,
            message: err.to_string(),
        },
        None => TransportError::Other(err.to_string()),
    }
}

fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut cur = err.source();
    while let Some(e) = cur {
        out.push_str(": ");
        out.push_str(&e.to_string());
        cur = e.source();
    }
    out.to_lowercase()
}

// --- Test/demo helper ---

/// Serves canned bodies or errors per URL and counts calls. Unknown URLs get HTTP 404.
#[derive(Default)]
pub struct StaticTransport {
    routes: Mutex<HashMap<String, Result<String, TransportError>>>,
    calls: AtomicU32,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: impl Into<String>) -> Self {
        self.routes
            .lock()
            .expect("routes mutex poisoned")
            .insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn with_error(self, url: &str, err: TransportError) -> Self {
        self.routes
            .lock()
            .expect("routes mutex poisoned")
            .insert(url.to_string(), Err(err));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for StaticTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<String, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let routes = self.routes.lock().expect("routes mutex poisoned");
        match routes.get(url) {
            Some(r) => r.clone(),
            None => Err(TransportError::Status { status: 404 }),
        }
    }
}
