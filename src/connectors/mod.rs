//! Data connectors
//!
//! Connectors poll third-party URLs on behalf of display plugins and turn the
//! responses into named slot values. Every outbound call follows the same
//! discipline:
//!
//! 1. Resolve `{{NAME}}` secret placeholders in the URL and header values
//! 2. Check the resolved URL against the SSRF blocklist
//! 3. Send exactly one request through a [`Transport`] under a timeout
//! 4. Classify the outcome as recoverable (HTTP status) or terminal
//!
//! [`tester`] runs this once for the admin UI and never fails; the
//! long-lived [`JsonApiConnector`] and [`RssFeedConnector`] repeat it and
//! keep a one-slot cache for stale fallback.

pub mod json_api;
pub mod json_path;
pub mod rss;
pub mod rss_feed;
pub mod secrets;
pub mod tester;
pub mod transport;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::targets;
use crate::plugins::blocklist::{self, BlocklistConfig};

pub use json_api::{JsonApiConnector, JsonApiConnectorConfig, MappedValues};
pub use json_path::{resolve_path, JsonPath, JsonPathError};
pub use rss::{parse_feed, RssFeed, RssItem};
pub use rss_feed::{RssFeedConnector, RssFeedConnectorConfig};
pub use secrets::{
    substitute_placeholders, EnvSecretResolver, SecretError, SecretResolver, StaticSecretResolver,
};
pub use tester::{
    discover_fields, test_connector, ConnectorTestConfig, ConnectorTestResult, ConnectorTester,
    TestOptions,
};
pub use transport::{
    HttpRequest, HttpResponse, ReqwestTransport, ReqwestTransportConfig, Transport, TransportError,
};

/// Default per-request timeout (10 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Upper bound accepted for configured timeouts (60 seconds)
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// Connector flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    JsonApi,
    RssFeed,
}

impl ConnectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectorKind::JsonApi => "json_api",
            ConnectorKind::RssFeed => "rss_feed",
        }
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorKind {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json_api" => Ok(ConnectorKind::JsonApi),
            "rss_feed" => Ok(ConnectorKind::RssFeed),
            other => Err(ConnectorError::InvalidConfig(format!(
                "Unsupported connector type: {} (expected json_api or rss_feed)",
                other
            ))),
        }
    }
}

/// Runtime options shared by the long-lived connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectorOptions {
    pub timeout: Duration,
    pub allow_private: bool,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            allow_private: false,
        }
    }
}

impl ConnectorOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_allow_private(mut self, allow_private: bool) -> Self {
        self.allow_private = allow_private;
        self
    }

    fn blocklist(&self) -> BlocklistConfig {
        BlocklistConfig {
            allow_private: self.allow_private,
        }
    }
}

/// Connector fetch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    #[error("URL blocked: {0}")]
    Blocked(String),

    #[error("HTTP {status}: {status_text}")]
    Http { status: u16, status_text: String },

    #[error("Failed to parse JSON response: {0}")]
    JsonParse(String),

    #[error(transparent)]
    Path(#[from] JsonPathError),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Secret resolution failed: {0}")]
    Secret(#[from] SecretError),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid connector config: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse feed: {0}")]
    FeedParse(String),
}

impl ConnectorError {
    /// Stable machine-readable tag for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorError::Blocked(_) => "blocked",
            ConnectorError::Http { .. } => "http_status",
            ConnectorError::JsonParse(_) => "json_parse",
            ConnectorError::Path(JsonPathError::ExpectedArray { .. }) => "expected_array",
            ConnectorError::Path(_) => "path_not_found",
            ConnectorError::Timeout { .. } => "timeout",
            ConnectorError::Secret(_) => "secret",
            ConnectorError::Network(_) => "network",
            ConnectorError::InvalidConfig(_) => "invalid_config",
            ConnectorError::FeedParse(_) => "feed_parse",
        }
    }

    /// Only upstream HTTP failures may be answered from cache.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConnectorError::Http { .. })
    }
}

impl From<TransportError> for ConnectorError {
    fn from(err: TransportError) -> Self {
        match err {
            // DNS-time rejection by the production transport
            TransportError::Blocked(reason) => ConnectorError::Blocked(reason),
            other => ConnectorError::Network(other.to_string()),
        }
    }
}

/// Build the outbound request with every placeholder resolved.
pub(crate) async fn resolve_request(
    url: &str,
    method: &str,
    headers: &BTreeMap<String, String>,
    resolver: &dyn SecretResolver,
) -> Result<HttpRequest, SecretError> {
    let url = substitute_placeholders(url, resolver).await?;
    let mut request = HttpRequest::new(method, url);
    for (name, value) in headers {
        let value = substitute_placeholders(value, resolver).await?;
        request.headers.push((name.clone(), value));
    }
    Ok(request)
}

/// Blocklist check on an already-resolved URL.
pub(crate) fn check_blocklist(url: &str, options: &ConnectorOptions) -> Result<(), ConnectorError> {
    match blocklist::block_reason(url, &options.blocklist()) {
        Some(reason) => {
            tracing::warn!(target: targets::CONNECTORS, reason = %reason, "connector URL blocked");
            Err(ConnectorError::Blocked(reason.to_string()))
        }
        None => Ok(()),
    }
}

/// Send one request; dropping the transport future on expiry cancels it.
pub(crate) async fn send_with_timeout(
    transport: &dyn Transport,
    request: HttpRequest,
    timeout: Duration,
) -> Result<HttpResponse, ConnectorError> {
    match tokio::time::timeout(timeout, transport.send(request)).await {
        Ok(result) => result.map_err(ConnectorError::from),
        Err(_) => Err(ConnectorError::Timeout {
            ms: timeout.as_millis() as u64,
        }),
    }
}
