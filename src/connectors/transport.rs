//! HTTP transport seam for connectors and plugins
//!
//! Everything that issues an outbound request goes through [`Transport`], so
//! tests can inject a mock and the permission layer can wrap the production
//! client without changing the calling convention.
//!
//! The production [`ReqwestTransport`]:
//! - Re-checks every literal or DNS-resolved address against the blocklist
//! - Pins the validated address to defeat DNS rebinding
//! - Disables redirects (a 3xx could otherwise bounce to a private host)
//! - Streams the body with a hard size cap
//!
//! Timeouts are owned by the caller: dropping the `send` future cancels the
//! in-flight request.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::{Host, Url};

use crate::plugins::blocklist::{self, BlocklistConfig};

/// Default maximum response body size (10MB)
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// HTTP methods a connector may use.
pub const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Transport errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Raised by the permission guard. The text is matched verbatim by callers.
    #[error("Permission denied: domain not allowed")]
    PermissionDenied,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("SSRF protection: {0}")]
    Blocked(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Response too large: {size} bytes (max {max})")]
    ResponseTooLarge { size: usize, max: usize },

    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Lowercased hostname of the target, if the URL parses.
    pub fn hostname(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }
}

/// Response handed back to connectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response; the status text defaults to the canonical reason phrase.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let status_text = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            status,
            status_text,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Something that can carry one HTTP request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}

/// Normalise and validate an HTTP method.
pub fn normalize_method(method: Option<&str>) -> Result<String, TransportError> {
    let method = method
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "GET".to_string());
    if ALLOWED_METHODS.contains(&method.as_str()) {
        Ok(method)
    } else {
        Err(TransportError::InvalidMethod(method))
    }
}

/// Configuration for the production transport
#[derive(Debug, Clone)]
pub struct ReqwestTransportConfig {
    /// Blocklist applied to literal and resolved addresses.
    pub blocklist: BlocklistConfig,
    /// Hard cap on the response body.
    pub max_response_bytes: usize,
}

impl Default for ReqwestTransportConfig {
    fn default() -> Self {
        Self {
            blocklist: BlocklistConfig::default(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// Production transport backed by reqwest.
pub struct ReqwestTransport {
    config: ReqwestTransportConfig,
    resolver: TokioAsyncResolver,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(ReqwestTransportConfig::default())
    }
}

impl ReqwestTransport {
    pub fn new(config: ReqwestTransportConfig) -> Self {
        Self {
            config,
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    /// Resolve a hostname and validate every address it maps to.
    ///
    /// Returns the first address, which is then pinned for the connection.
    async fn resolve_and_validate(&self, host: &str) -> Result<IpAddr, TransportError> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| TransportError::Dns(format!("{}: {}", host, e)))?;

        let mut pinned: Option<IpAddr> = None;
        for ip in lookup.iter() {
            if let Some(reason) = blocklist::ip_block_reason(ip, &self.config.blocklist) {
                return Err(TransportError::Blocked(format!(
                    "{} resolved to {}",
                    host, reason
                )));
            }
            pinned.get_or_insert(ip);
        }

        pinned.ok_or_else(|| TransportError::Dns(format!("no addresses returned for {}", host)))
    }

    async fn build_client(&self, url: &Url) -> Result<Client, TransportError> {
        let mut builder = Client::builder().redirect(reqwest::redirect::Policy::none());

        match url.host() {
            Some(Host::Domain(domain)) => {
                let port = url.port_or_known_default().unwrap_or(443);
                let ip = self.resolve_and_validate(domain).await?;
                builder = builder.resolve(domain, SocketAddr::new(ip, port));
                tracing::debug!(host = %domain, resolved_ip = %ip, "pinned validated address");
            }
            Some(Host::Ipv4(ip)) => self.check_literal(IpAddr::V4(ip))?,
            Some(Host::Ipv6(ip)) => self.check_literal(IpAddr::V6(ip))?,
            None => return Err(TransportError::InvalidUrl("URL has no host".to_string())),
        }

        builder
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {}", e)))
    }

    fn check_literal(&self, ip: IpAddr) -> Result<(), TransportError> {
        match blocklist::ip_block_reason(ip, &self.config.blocklist) {
            Some(reason) => Err(TransportError::Blocked(reason.to_string())),
            None => Ok(()),
        }
    }

    async fn read_body_limited(&self, response: reqwest::Response) -> Result<Vec<u8>, TransportError> {
        use futures_util::StreamExt;

        let max = self.config.max_response_bytes;
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Body(e.to_string()))?;
            if body.len() + chunk.len() > max {
                return Err(TransportError::ResponseTooLarge {
                    size: body.len() + chunk.len(),
                    max,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = normalize_method(Some(&request.method))?;
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(method.clone()))?;

        let url = Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let client = self.build_client(&url).await?;

        let mut builder = client.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if let Some(len) = response.content_length() {
            if len > self.config.max_response_bytes as u64 {
                return Err(TransportError::ResponseTooLarge {
                    size: len as usize,
                    max: self.config.max_response_bytes,
                });
            }
        }

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body = self.read_body_limited(response).await?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
