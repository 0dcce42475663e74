//! Per-plugin permission enforcement.
//!
//! A [`PermissionEnforcer`] is built once per plugin from the permissions in
//! its manifest and guards three things:
//!
//! - **Network**: outbound requests must pass the SSRF blocklist (always,
//!   with private ranges blocked) and then the plugin's domain allowlist
//! - **Refresh rate**: a minimum interval between data refreshes
//! - **Secrets**: only secret names declared in the manifest are visible
//!
//! Denials never poison the enforcer. The offending call fails, a
//! [`PermissionViolation`] is appended to the enforcer's own log and the
//! optional callback is notified.
//!
//! # Architecture
//!
//! ```text
//! PluginManifest.permissions
//!          |
//!          v
//!  PluginPermissions ----> PermissionEnforcer ----> violation log / callback
//!                              |          |
//!                              v          v
//!                   GuardedTransport   ScopedSecretResolver
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use url::{Host, Url};

use super::blocklist::{self, BlocklistConfig};
use crate::connectors::secrets::{SecretError, SecretResolver};
use crate::connectors::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::logging::targets;

/// Permissions declared in a plugin manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginPermissions {
    /// Empty means any domain that passes the blocklist.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Minimum interval between refreshes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_refresh_ms: Option<u64>,
    /// Absent or empty authorizes no secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Network,
    RefreshRate,
    SecretAccess,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Network => "network",
            ViolationKind::RefreshRate => "refresh_rate",
            ViolationKind::SecretAccess => "secret_access",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one denied action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionViolation {
    pub plugin_id: String,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub timestamp: DateTime<Utc>,
    pub details: Value,
}

/// Notified after each violation is recorded.
pub type ViolationCallback = Arc<dyn Fn(&PermissionViolation) + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("domain '{hostname}' denied: {reason}")]
    DomainDenied { hostname: String, reason: String },

    #[error("raw plugin permissions are not accessible")]
    RawPermissionsUnavailable,
}

/// Outcome of a refresh-rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshDecision {
    pub allowed: bool,
    #[serde(rename = "retryAfter", default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl RefreshDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after_ms: None,
        }
    }
}

/// Anything an outbound request target can be read from.
pub trait RequestUrl {
    fn request_url(&self) -> &str;
}

impl RequestUrl for str {
    fn request_url(&self) -> &str {
        self
    }
}

impl RequestUrl for String {
    fn request_url(&self) -> &str {
        self
    }
}

impl RequestUrl for Url {
    fn request_url(&self) -> &str {
        self.as_str()
    }
}

impl RequestUrl for HttpRequest {
    fn request_url(&self) -> &str {
        &self.url
    }
}

/// Enforces one plugin's declared permissions.
pub struct PermissionEnforcer {
    plugin_id: String,
    permissions: PluginPermissions,
    /// Parsed `allowed_domains`.
    domains: Vec<Host>,
    violations: Mutex<Vec<PermissionViolation>>,
    on_violation: Option<ViolationCallback>,
}

impl fmt::Debug for PermissionEnforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionEnforcer")
            .field("plugin_id", &self.plugin_id)
            .field("domains", &self.domains)
            .field("violations", &self.violations.lock().len())
            .finish_non_exhaustive()
    }
}

impl PermissionEnforcer {
    pub fn new(plugin_id: impl Into<String>, permissions: PluginPermissions) -> Self {
        let domains = permissions
            .allowed_domains
            .iter()
            .filter_map(|d| parse_allowed_host(d))
            .collect();

        Self {
            plugin_id: plugin_id.into(),
            permissions,
            domains,
            violations: Mutex::new(Vec::new()),
            on_violation: None,
        }
    }

    pub fn with_violation_callback(mut self, callback: ViolationCallback) -> Self {
        self.on_violation = Some(callback);
        self
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    // ---- network ----

    /// Blocklist first, then the allowlist. Does not record a violation.
    pub fn validate_domain(&self, url: &str) -> Result<(), PermissionError> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host().map(|h| h.to_owned()))
            .map(|h| match h {
                Host::Domain(d) => Host::Domain(d.trim_end_matches('.').to_string()),
                other => other,
            });
        let hostname = host.as_ref().map(ToString::to_string).unwrap_or_default();

        if let Some(reason) = blocklist::block_reason(url, &BlocklistConfig::strict()) {
            return Err(PermissionError::DomainDenied {
                hostname,
                reason: reason.to_string(),
            });
        }

        if self.domains.is_empty() {
            return Ok(());
        }

        let allowed = host
            .as_ref()
            .is_some_and(|host| self.domains.iter().any(|entry| host_matches(host, entry)));

        if allowed {
            Ok(())
        } else {
            Err(PermissionError::DomainDenied {
                hostname,
                reason: "not in allowed_domains".to_string(),
            })
        }
    }

    pub fn is_domain_allowed(&self, url: &str) -> bool {
        self.validate_domain(url).is_ok()
    }

    /// Gate one outbound request, recording a `network` violation on denial.
    pub fn authorize_request<T: RequestUrl + ?Sized>(&self, target: &T) -> Result<(), TransportError> {
        let url = target.request_url();
        match self.validate_domain(url) {
            Ok(()) => Ok(()),
            Err(PermissionError::DomainDenied { hostname, reason }) => {
                self.record(
                    ViolationKind::Network,
                    json!({ "hostname": hostname, "url": url, "reason": reason }),
                );
                Err(TransportError::PermissionDenied)
            }
            Err(_) => Err(TransportError::PermissionDenied),
        }
    }

    /// Wrap a transport so every request is authorized first.
    pub fn guard<T: Transport>(self: &Arc<Self>, inner: T) -> GuardedTransport<T> {
        GuardedTransport {
            enforcer: Arc::clone(self),
            inner,
        }
    }

    // ---- refresh rate ----

    pub fn validate_refresh(&self, last_refresh: Option<DateTime<Utc>>) -> RefreshDecision {
        self.validate_refresh_at(last_refresh, Utc::now())
    }

    /// Clock-injectable form of [`Self::validate_refresh`].
    pub fn validate_refresh_at(
        &self,
        last_refresh: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> RefreshDecision {
        let (Some(limit), Some(last)) = (self.permissions.max_refresh_ms, last_refresh) else {
            return RefreshDecision::allow();
        };

        // A last refresh in the future counts as no time elapsed.
        let elapsed = (now - last).num_milliseconds().max(0) as u64;
        if elapsed >= limit {
            return RefreshDecision::allow();
        }

        let retry_after = (limit - elapsed).max(1);
        self.record(
            ViolationKind::RefreshRate,
            json!({
                "last_refresh": last.to_rfc3339(),
                "elapsed_ms": elapsed,
                "max_refresh_ms": limit,
                "retry_after_ms": retry_after,
            }),
        );

        RefreshDecision {
            allowed: false,
            retry_after_ms: Some(retry_after),
        }
    }

    // ---- secrets ----

    pub fn is_secret_allowed(&self, name: &str) -> bool {
        self.permissions
            .secrets
            .as_ref()
            .is_some_and(|declared| declared.iter().any(|s| s == name))
    }

    /// Keep only declared secrets; every dropped name is a violation.
    pub fn filter_secrets(&self, secrets: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut allowed = BTreeMap::new();
        for (name, value) in secrets {
            if self.is_secret_allowed(name) {
                allowed.insert(name.clone(), value.clone());
            } else {
                self.record(ViolationKind::SecretAccess, json!({ "secret": name }));
            }
        }
        allowed
    }

    /// Single-name form used by [`ScopedSecretResolver`].
    pub fn check_secret(&self, name: &str) -> Result<(), SecretError> {
        if self.is_secret_allowed(name) {
            return Ok(());
        }
        self.record(ViolationKind::SecretAccess, json!({ "secret": name }));
        Err(SecretError::NotPermitted {
            plugin_id: self.plugin_id.clone(),
            name: name.to_string(),
        })
    }

    /// Wrap a resolver so only declared secrets can be resolved.
    pub fn scope_secrets<R: SecretResolver>(self: &Arc<Self>, inner: R) -> ScopedSecretResolver<R> {
        ScopedSecretResolver {
            enforcer: Arc::clone(self),
            inner,
        }
    }

    // ---- diagnostics ----

    /// Snapshot of recorded violations.
    pub fn violations(&self) -> Vec<PermissionViolation> {
        self.violations.lock().clone()
    }

    pub fn violation_count(&self) -> usize {
        self.violations.lock().len()
    }

    /// Raw permissions are never handed to sandboxed plugin code. Reaching
    /// this is a host bug.
    pub fn raw_permissions(&self) -> Result<&PluginPermissions, PermissionError> {
        tracing::error!(
            target: targets::PLUGINS,
            plugin_id = %self.plugin_id,
            "attempted to read raw plugin permissions"
        );
        Err(PermissionError::RawPermissionsUnavailable)
    }

    fn record(&self, kind: ViolationKind, details: Value) {
        let violation = PermissionViolation {
            plugin_id: self.plugin_id.clone(),
            kind,
            timestamp: Utc::now(),
            details,
        };

        tracing::warn!(
            target: targets::PLUGINS,
            plugin_id = %violation.plugin_id,
            kind = %violation.kind,
            details = %violation.details,
            "plugin permission violation"
        );

        self.violations.lock().push(violation.clone());

        if let Some(callback) = &self.on_violation {
            callback(&violation);
        }
    }
}

/// Parse an allowlist entry with the same host parser URLs go through.
///
/// Wildcard and leading dots are dropped, as is a trailing root dot. Domains
/// come out lowercased and in their ASCII (punycode) form; IP literals may be
/// written with or without IPv6 brackets.
fn parse_allowed_host(entry: &str) -> Option<Host> {
    let entry = entry.trim();
    let entry = entry.strip_prefix("*.").unwrap_or(entry);
    let entry = entry.trim_start_matches('.').trim_end_matches('.');
    if entry.is_empty() {
        return None;
    }
    if let Ok(ip) = entry.parse::<Ipv6Addr>() {
        return Some(Host::Ipv6(ip));
    }
    Host::parse(entry).ok()
}

/// Domains match exactly or as a parent domain; IP literals match exactly.
fn host_matches(host: &Host, entry: &Host) -> bool {
    match (host, entry) {
        (Host::Domain(host), Host::Domain(entry)) => {
            host == entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        _ => host == entry,
    }
}

/// Transport wrapper returned by [`PermissionEnforcer::guard`].
pub struct GuardedTransport<T> {
    enforcer: Arc<PermissionEnforcer>,
    inner: T,
}

#[async_trait]
impl<T: Transport> Transport for GuardedTransport<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.enforcer.authorize_request(&request)?;
        self.inner.send(request).await
    }
}

/// Secret resolver wrapper returned by [`PermissionEnforcer::scope_secrets`].
pub struct ScopedSecretResolver<R> {
    enforcer: Arc<PermissionEnforcer>,
    inner: R,
}

#[async_trait]
impl<R: SecretResolver> SecretResolver for ScopedSecretResolver<R> {
    async fn resolve(&self, name: &str) -> Result<String, SecretError> {
        self.enforcer.check_secret(name)?;
        self.inner.resolve(name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::secrets::StaticSecretResolver;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn perms(domains: &[&str]) -> PluginPermissions {
        PluginPermissions {
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse::new(200, "ok"))
        }
    }

    #[test]
    fn test_empty_allowlist_allows_public_only() {
        let enforcer = PermissionEnforcer::new("p", PluginPermissions::default());
        assert!(enforcer.is_domain_allowed("https://anything.example.org/x"));
        assert!(!enforcer.is_domain_allowed("http://localhost/"));
        assert!(!enforcer.is_domain_allowed("http://10.1.2.3/"));
        assert!(!enforcer.is_domain_allowed("http://metadata.google.internal/"));
    }

    #[test]
    fn test_subdomain_matching() {
        let enforcer = PermissionEnforcer::new("p", perms(&["api.test.com"]));
        assert!(enforcer.is_domain_allowed("https://api.test.com/v1"));
        assert!(enforcer.is_domain_allowed("https://eu.api.test.com/v1"));
        assert!(enforcer.is_domain_allowed("https://API.TEST.COM./v1"));
        assert!(!enforcer.is_domain_allowed("https://evilapi.test.com/"));
        assert!(!enforcer.is_domain_allowed("https://test.com/"));
        assert!(!enforcer.is_domain_allowed("https://api.test.com.evil.com/"));
    }

    #[test]
    fn test_idn_domain_matching() {
        let enforcer = PermissionEnforcer::new("p", perms(&["bücher.de"]));
        assert!(enforcer.is_domain_allowed("https://bücher.de/x"));
        assert!(enforcer.is_domain_allowed("https://api.bücher.de/x"));
        assert!(enforcer.is_domain_allowed("https://xn--bcher-kva.de/x"));
        assert!(!enforcer.is_domain_allowed("https://bucher.de/x"));

        let enforcer = PermissionEnforcer::new("p", perms(&["XN--BCHER-KVA.DE"]));
        assert!(enforcer.is_domain_allowed("https://BÜCHER.de/x"));
    }

    #[test]
    fn test_ip_literal_matching() {
        let enforcer = PermissionEnforcer::new(
            "p",
            perms(&["2606:4700:4700::1111", "[2001:4860:4860::8888]", "1.1.1.1"]),
        );
        assert!(enforcer.is_domain_allowed("https://[2606:4700:4700::1111]/dns"));
        assert!(enforcer.is_domain_allowed("https://[2001:4860:4860:0:0:0:0:8888]/"));
        assert!(enforcer.is_domain_allowed("https://1.1.1.1/"));
        assert!(!enforcer.is_domain_allowed("https://[2606:4700:4700::1001]/"));
        assert!(!enforcer.is_domain_allowed("https://1.1.1.2/"));
        assert!(!enforcer.is_domain_allowed("https://x.1.1.1.1.example/"));
    }

    #[test]
    fn test_wildcard_domain_is_normalised() {
        let enforcer = PermissionEnforcer::new("p", perms(&["*.Example.com", ".other.org."]));
        assert!(enforcer.is_domain_allowed("https://a.example.com/"));
        assert!(enforcer.is_domain_allowed("https://example.com/"));
        assert!(enforcer.is_domain_allowed("https://x.other.org/"));
    }

    #[test]
    fn test_allowlist_cannot_unblock_ssrf_targets() {
        let enforcer = PermissionEnforcer::new(
            "p",
            perms(&["localhost", "127.0.0.1", "192.168.1.1", "169.254.169.254"]),
        );
        assert!(!enforcer.is_domain_allowed("http://localhost/"));
        assert!(!enforcer.is_domain_allowed("http://127.0.0.1/"));
        assert!(!enforcer.is_domain_allowed("http://192.168.1.1/"));
        assert!(!enforcer.is_domain_allowed("http://169.254.169.254/"));
    }

    #[tokio::test]
    async fn test_guard_denies_and_records() {
        let enforcer = Arc::new(PermissionEnforcer::new("weather", perms(&["api.test.com"])));
        let inner = Arc::new(CountingTransport::default());
        let guarded = enforcer.guard(inner.clone());

        let err = guarded
            .send(HttpRequest::get("https://evil.com"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Permission denied: domain not allowed");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 0);

        let violations = enforcer.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::Network);
        assert_eq!(violations[0].plugin_id, "weather");
        assert_eq!(violations[0].details["hostname"], "evil.com");

        guarded
            .send(HttpRequest::get("https://api.test.com/forecast"))
            .await
            .unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(enforcer.violation_count(), 1);
    }

    #[test]
    fn test_authorize_accepts_url_kinds() {
        let enforcer = PermissionEnforcer::new("p", perms(&["api.test.com"]));
        let url = Url::parse("https://api.test.com/a").unwrap();
        assert!(enforcer.authorize_request(&url).is_ok());
        assert!(enforcer.authorize_request("https://api.test.com/b").is_ok());
        assert!(enforcer
            .authorize_request(&"https://nope.com".to_string())
            .is_err());
        assert!(enforcer
            .authorize_request(&HttpRequest::get("not a url"))
            .is_err());
        assert_eq!(enforcer.violation_count(), 2);
    }

    #[test]
    fn test_callback_invoked() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let enforcer = PermissionEnforcer::new("p", perms(&["a.com"])).with_violation_callback(
            Arc::new(move |v: &PermissionViolation| {
                assert_eq!(v.kind, ViolationKind::Network);
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let _ = enforcer.authorize_request("https://b.com");
        let _ = enforcer.authorize_request("https://c.com");
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_refresh_rate() {
        let enforcer = PermissionEnforcer::new(
            "p",
            PluginPermissions {
                max_refresh_ms: Some(5000),
                ..Default::default()
            },
        );
        let now = Utc::now();

        assert!(enforcer.validate_refresh_at(None, now).allowed);
        assert!(enforcer
            .validate_refresh_at(Some(now - Duration::milliseconds(5000)), now)
            .allowed);

        let decision = enforcer.validate_refresh_at(Some(now - Duration::milliseconds(2000)), now);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_ms, Some(3000));

        let violations = enforcer.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::RefreshRate);
    }

    #[test]
    fn test_refresh_from_future_and_minimum_retry() {
        let enforcer = PermissionEnforcer::new(
            "p",
            PluginPermissions {
                max_refresh_ms: Some(1000),
                ..Default::default()
            },
        );
        let now = Utc::now();

        let decision = enforcer.validate_refresh_at(Some(now + Duration::seconds(10)), now);
        assert_eq!(decision.retry_after_ms, Some(1000));

        let decision =
            enforcer.validate_refresh_at(Some(now - Duration::microseconds(999_500)), now);
        assert_eq!(decision.retry_after_ms, Some(1));
    }

    #[test]
    fn test_no_refresh_limit() {
        let enforcer = PermissionEnforcer::new("p", PluginPermissions::default());
        assert!(enforcer.validate_refresh(Some(Utc::now())).allowed);
        assert_eq!(enforcer.violation_count(), 0);
    }

    #[test]
    fn test_filter_secrets() {
        let enforcer = PermissionEnforcer::new(
            "p",
            PluginPermissions {
                secrets: Some(vec!["API_KEY".to_string()]),
                ..Default::default()
            },
        );
        let mut candidate = BTreeMap::new();
        candidate.insert("API_KEY".to_string(), "k".to_string());
        candidate.insert("DB_PASSWORD".to_string(), "p".to_string());
        candidate.insert("OTHER".to_string(), "o".to_string());

        let filtered = enforcer.filter_secrets(&candidate);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.get("API_KEY").map(String::as_str), Some("k"));

        let violations = enforcer.violations();
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().all(|v| v.kind == ViolationKind::SecretAccess));
        assert_eq!(violations[0].details["secret"], "DB_PASSWORD");
    }

    #[test]
    fn test_absent_or_empty_secrets_deny_all() {
        let mut candidate = BTreeMap::new();
        candidate.insert("A".to_string(), "1".to_string());

        let absent = PermissionEnforcer::new("p", PluginPermissions::default());
        assert!(absent.filter_secrets(&candidate).is_empty());

        let empty = PermissionEnforcer::new(
            "p",
            PluginPermissions {
                secrets: Some(Vec::new()),
                ..Default::default()
            },
        );
        assert!(empty.filter_secrets(&candidate).is_empty());
    }

    #[tokio::test]
    async fn test_scoped_resolver() {
        let enforcer = Arc::new(PermissionEnforcer::new(
            "p",
            PluginPermissions {
                secrets: Some(vec!["TOKEN".to_string()]),
                ..Default::default()
            },
        ));
        let resolver = enforcer.scope_secrets(
            StaticSecretResolver::new()
                .with("TOKEN", "t")
                .with("ADMIN", "a"),
        );

        assert_eq!(resolver.resolve("TOKEN").await.unwrap(), "t");
        let err = resolver.resolve("ADMIN").await.unwrap_err();
        assert!(matches!(err, SecretError::NotPermitted { .. }));
        assert_eq!(enforcer.violation_count(), 1);
    }

    #[test]
    fn test_enforcers_are_isolated() {
        let a = PermissionEnforcer::new("a", perms(&["a.com"]));
        let b = PermissionEnforcer::new("b", perms(&["b.com"]));

        let _ = a.authorize_request("https://b.com");
        assert_eq!(a.violation_count(), 1);
        assert_eq!(b.violation_count(), 0);
        assert!(b.is_domain_allowed("https://b.com"));
    }

    #[test]
    fn test_raw_permissions_always_fails() {
        let enforcer = PermissionEnforcer::new("p", PluginPermissions::default());
        assert_eq!(
            enforcer.raw_permissions().unwrap_err(),
            PermissionError::RawPermissionsUnavailable
        );
    }

    #[test]
    fn test_violation_serialization() {
        let enforcer = PermissionEnforcer::new("p", perms(&["a.com"]));
        let _ = enforcer.authorize_request("https://b.com");
        let value = serde_json::to_value(&enforcer.violations()[0]).unwrap();
        assert_eq!(value["type"], "network");
        assert_eq!(value["plugin_id"], "p");
    }

    #[test]
    fn test_manifest_permissions_deserialize() {
        let p: PluginPermissions = serde_json::from_str(
            r#"{"allowed_domains": ["api.x.com"], "max_refresh_ms": 60000, "secrets": ["K"]}"#,
        )
        .unwrap();
        assert_eq!(p.max_refresh_ms, Some(60000));
        assert_eq!(p.secrets, Some(vec!["K".to_string()]));
    }
}
