//! Connector dry-run for the admin UI
//!
//! [`test_connector`] validates a candidate config, applies the blocklist,
//! performs one bounded request and returns a sample of the response with
//! the field paths it found. It is total: every failure is folded into
//! [`ConnectorTestResult::error`] so the result can be shown to an admin
//! as-is.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use super::rss;
use super::transport::{normalize_method, HttpRequest, Transport, TransportError};
use super::{ConnectorKind, DEFAULT_TIMEOUT_MS};
use crate::logging::targets;
use crate::plugins::blocklist::{self, BlocklistConfig};

/// Maximum nesting depth walked by [`discover_fields`].
pub const MAX_FIELD_DEPTH: usize = 4;

/// Candidate connector submitted for testing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorTestConfig {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl ConnectorTestConfig {
    pub fn new(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Outcome of one test run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorTestResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectorTestResult {
    pub fn ok(sample: Value, fields: Vec<String>) -> Self {
        Self {
            success: true,
            sample: Some(sample),
            fields: Some(fields),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Caller-controlled test policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestOptions {
    pub allow_private: bool,
    pub timeout: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            allow_private: false,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Holds a transport and options so the admin endpoint can share one tester.
#[derive(Clone)]
pub struct ConnectorTester {
    transport: Arc<dyn Transport>,
    options: TestOptions,
}

impl ConnectorTester {
    pub fn new(transport: Arc<dyn Transport>, options: TestOptions) -> Self {
        Self { transport, options }
    }

    pub async fn test(&self, config: &ConnectorTestConfig) -> ConnectorTestResult {
        test_connector(config, &self.options, self.transport.as_ref()).await
    }
}

/// Run one connector test. Never fails.
pub async fn test_connector(
    config: &ConnectorTestConfig,
    options: &TestOptions,
    transport: &dyn Transport,
) -> ConnectorTestResult {
    let result = run_test(config, options, transport).await;
    match &result {
        Ok(r) => tracing::debug!(
            target: targets::CONNECTORS,
            kind = %config.kind,
            fields = r.fields.as_ref().map(|f| f.len()).unwrap_or(0),
            "connector test succeeded"
        ),
        Err(e) => tracing::debug!(
            target: targets::CONNECTORS,
            kind = %config.kind,
            error = %e,
            "connector test failed"
        ),
    }
    result.unwrap_or_else(ConnectorTestResult::failure)
}

async fn run_test(
    config: &ConnectorTestConfig,
    options: &TestOptions,
    transport: &dyn Transport,
) -> Result<ConnectorTestResult, String> {
    let kind = validate_kind(&config.kind)?;
    validate_url(&config.url)?;
    let method = normalize_method(config.method.as_deref()).map_err(|e| e.to_string())?;

    let blocklist_config = BlocklistConfig {
        allow_private: options.allow_private,
    };
    if let Some(reason) = blocklist::block_reason(&config.url, &blocklist_config) {
        return Err(format!("Blocked: {}", reason));
    }

    let mut request = HttpRequest::new(method, config.url.clone());
    if let Some(headers) = &config.headers {
        for (name, value) in headers {
            request = request.with_header(name.clone(), value.clone());
        }
    }

    let response = match tokio::time::timeout(options.timeout, transport.send(request)).await {
        Err(_) => {
            return Err(format!(
                "Request timed out after {}ms",
                options.timeout.as_millis()
            ))
        }
        Ok(Err(TransportError::Blocked(reason))) => return Err(format!("Blocked: {}", reason)),
        Ok(Err(e)) => return Err(format!("Network error: {}", e)),
        Ok(Ok(response)) => response,
    };

    if !response.ok() {
        return Err(format!("HTTP {}: {}", response.status, response.status_text));
    }

    match kind {
        ConnectorKind::JsonApi => {
            let body = response
                .json()
                .map_err(|e| format!("Failed to parse JSON response: {}", e))?;
            let fields = discover_fields(&body);
            Ok(ConnectorTestResult::ok(body, fields))
        }
        ConnectorKind::RssFeed => {
            let feed = rss::parse_feed(&response.text());
            let fields = feed.items.first().map(|i| i.fields()).unwrap_or_default();
            let sample = serde_json::to_value(&feed)
                .map_err(|e| format!("Failed to serialize feed sample: {}", e))?;
            Ok(ConnectorTestResult::ok(sample, fields))
        }
    }
}

fn validate_kind(kind: &str) -> Result<ConnectorKind, String> {
    if kind.trim().is_empty() {
        return Err("Missing required field: type".to_string());
    }
    kind.parse::<ConnectorKind>().map_err(|_| {
        format!(
            "Unsupported connector type: {} (expected json_api or rss_feed)",
            kind
        )
    })
}

fn validate_url(url: &str) -> Result<(), String> {
    if url.trim().is_empty() {
        return Err("Missing required field: url".to_string());
    }
    Url::parse(url)
        .map(|_| ())
        .map_err(|e| format!("Invalid url: {}", e))
}

/// Enumerate dotted field paths in a JSON document, up to [`MAX_FIELD_DEPTH`].
///
/// Object keys join with `.`; a non-empty array contributes `name[0]` and is
/// only descended into when its first element is an object. Scalars and
/// empty containers end a path.
pub fn discover_fields(value: &Value) -> Vec<String> {
    let mut fields = Vec::new();
    match value {
        Value::Object(_) => walk(value, "", 0, &mut fields),
        Value::Array(items) => {
            if let Some(first) = items.first() {
                descend_array_item(first, "[0]".to_string(), 0, &mut fields);
            }
        }
        _ => {}
    }
    fields
}

fn walk(value: &Value, prefix: &str, depth: usize, fields: &mut Vec<String>) {
    let Value::Object(map) = value else {
        return;
    };

    for (key, child) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        let depth = depth + 1;

        match child {
            Value::Object(inner) if !inner.is_empty() && depth < MAX_FIELD_DEPTH => {
                walk(child, &path, depth, fields)
            }
            Value::Array(items) if !items.is_empty() => {
                descend_array_item(&items[0], format!("{}[0]", path), depth, fields)
            }
            _ => fields.push(path),
        }
    }
}

fn descend_array_item(first: &Value, path: String, depth: usize, fields: &mut Vec<String>) {
    match first {
        Value::Object(inner) if !inner.is_empty() && depth < MAX_FIELD_DEPTH => {
            walk(first, &path, depth, fields)
        }
        _ => fields.push(path),
    }
}
