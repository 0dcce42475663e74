//! End-to-end connector scenarios through mock transports.
//!
//! Covers the tester, the JSON-API and RSS engines and the permission
//! enforcer wired together the way the host wires them.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;

use tapline::connectors::secrets::{SecretError, SecretResolver, StaticSecretResolver};
use tapline::connectors::tester::{test_connector, ConnectorTestConfig, TestOptions};
use tapline::connectors::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use tapline::connectors::{
    ConnectorError, ConnectorOptions, JsonApiConnector, JsonApiConnectorConfig, RssFeedConnector,
    RssFeedConnectorConfig,
};
use tapline::plugins::{PermissionEnforcer, PermissionViolation, PluginPermissions, ViolationKind};

/// Replays queued responses, recording each request.
#[derive(Default)]
struct MockTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_url(&self) -> Option<String> {
        self.requests.lock().last().map(|r| r.url.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| TransportError::Request("connection reset by peer".to_string()))
    }
}

fn json_response(body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(200, body.to_string()).with_header("content-type", "application/json")
}

fn json_api(url: &str, mapping: &[(&str, &str)]) -> JsonApiConnectorConfig {
    JsonApiConnectorConfig {
        url: url.to_string(),
        mapping: mapping
            .iter()
            .map(|(slot, path)| (slot.to_string(), path.to_string()))
            .collect(),
        ..Default::default()
    }
}

// ============== Connector Tester ==============

#[tokio::test]
async fn test_tester_blocks_localhost_without_network() {
    let transport = MockTransport::new(vec![json_response(json!({}))]);
    let config = ConnectorTestConfig::new("json_api", "http://localhost/x");

    let result = test_connector(&config, &TestOptions::default(), transport.as_ref()).await;

    assert!(!result.success);
    assert!(result.error.unwrap().to_lowercase().contains("blocked"));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_tester_discovers_fields() {
    let transport = MockTransport::new(vec![json_response(
        json!({"temp": 72, "weather": {"condition": "sunny"}}),
    )]);
    let config = ConnectorTestConfig::new("json_api", "https://api.example.com/w");

    let result = test_connector(&config, &TestOptions::default(), transport.as_ref()).await;

    assert!(result.success, "{:?}", result.error);
    let fields = result.fields.unwrap();
    assert!(fields.contains(&"temp".to_string()));
    assert!(fields.contains(&"weather.condition".to_string()));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_tester_network_failure_is_a_result() {
    let transport = MockTransport::new(vec![]);
    let config = ConnectorTestConfig::new("rss_feed", "https://news.example.com/rss");

    let result = test_connector(&config, &TestOptions::default(), transport.as_ref()).await;

    assert!(!result.success);
    assert!(result.error.unwrap().contains("connection reset"));
}

// ============== JSON-API Engine ==============

#[tokio::test]
async fn test_engine_maps_nested_path() {
    let transport = MockTransport::new(vec![json_response(json!({"x": {"y": [{"z": 5}]}}))]);
    let connector = JsonApiConnector::new(
        json_api("https://api.example.com/data", &[("a", "$.x.y[0].z")]),
        transport,
        Arc::new(StaticSecretResolver::new()),
    )
    .unwrap();

    let values = connector.fetch().await.unwrap();
    assert_eq!(values, BTreeMap::from([("a".to_string(), json!(5))]));
}

#[tokio::test]
async fn test_engine_resolves_placeholder_into_exact_url() {
    let transport = MockTransport::new(vec![json_response(json!({}))]);
    let connector = JsonApiConnector::new(
        json_api("https://h/x?k={{K}}", &[]),
        transport.clone(),
        Arc::new(StaticSecretResolver::new().with("K", "v")),
    )
    .unwrap();

    connector.fetch().await.unwrap();
    assert_eq!(transport.last_url().as_deref(), Some("https://h/x?k=v"));
}

#[tokio::test]
async fn test_engine_serves_stale_on_http_500() {
    let transport = MockTransport::new(vec![
        json_response(json!({"main": {"temp": 18.5}})),
        HttpResponse::new(500, "upstream exploded"),
    ]);
    let connector = JsonApiConnector::new(
        json_api("https://api.example.com/w", &[("temp", "main.temp")]),
        transport.clone(),
        Arc::new(StaticSecretResolver::new()),
    )
    .unwrap();

    let fresh = connector.fetch().await.unwrap();
    let stale = connector.fetch().await.unwrap();
    assert_eq!(fresh, stale);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_engine_http_500_without_cache_fails() {
    let transport = MockTransport::new(vec![HttpResponse::new(500, "")]);
    let connector = JsonApiConnector::new(
        json_api("https://api.example.com/w", &[("temp", "main.temp")]),
        transport,
        Arc::new(StaticSecretResolver::new()),
    )
    .unwrap();

    let err = connector.fetch().await.unwrap_err();
    assert!(matches!(err, ConnectorError::Http { status: 500, .. }));
}

#[tokio::test]
async fn test_engine_schema_change_is_not_masked() {
    let transport = MockTransport::new(vec![
        json_response(json!({"main": {"temp": 18.5}})),
        json_response(json!({"current": {"temperature": 18.5}})),
    ]);
    let connector = JsonApiConnector::new(
        json_api("https://api.example.com/w", &[("temp", "main.temp")]),
        transport,
        Arc::new(StaticSecretResolver::new()),
    )
    .unwrap();

    connector.fetch().await.unwrap();
    let err = connector.fetch().await.unwrap_err();
    assert_eq!(err.kind(), "path_not_found");
    assert!(err.to_string().contains("main.temp"));
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_engine_network_error_is_not_served_from_cache() {
    let transport = MockTransport::new(vec![json_response(json!({"v": 1}))]);
    let connector = JsonApiConnector::new(
        json_api("https://api.example.com/w", &[("v", "v")]),
        transport,
        Arc::new(StaticSecretResolver::new()),
    )
    .unwrap();

    connector.fetch().await.unwrap();
    // Queue is empty now; the mock fails like a dropped connection
    let err = connector.fetch().await.unwrap_err();
    assert_eq!(err.kind(), "network");
}

#[tokio::test]
async fn test_independent_connectors_do_not_share_cache() {
    let a = JsonApiConnector::new(
        json_api("https://a.example.com", &[("v", "v")]),
        MockTransport::new(vec![json_response(json!({"v": "a"}))]),
        Arc::new(StaticSecretResolver::new()),
    )
    .unwrap();
    let b = JsonApiConnector::new(
        json_api("https://b.example.com", &[("v", "v")]),
        MockTransport::new(vec![HttpResponse::new(503, "")]),
        Arc::new(StaticSecretResolver::new()),
    )
    .unwrap();

    a.fetch().await.unwrap();
    assert!(b.fetch().await.is_err());
    assert!(b.cached().is_none());
}

// ============== Permission Enforcer ==============

#[tokio::test]
async fn test_guarded_request_to_unlisted_domain() {
    let seen: Arc<Mutex<Vec<PermissionViolation>>> = Arc::default();
    let sink = seen.clone();
    let enforcer = Arc::new(
        PermissionEnforcer::new(
            "weather-widget",
            PluginPermissions {
                allowed_domains: vec!["api.test.com".to_string()],
                ..Default::default()
            },
        )
        .with_violation_callback(Arc::new(move |v: &PermissionViolation| {
            sink.lock().push(v.clone())
        })),
    );
    let inner = MockTransport::new(vec![json_response(json!({}))]);
    let guarded = enforcer.guard(inner.clone());

    let err = guarded
        .send(HttpRequest::get("https://evil.com"))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Permission denied: domain not allowed");
    assert_eq!(inner.calls(), 0);
    let violations = enforcer.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::Network);
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_guarded_transport_drives_connector() {
    let enforcer = Arc::new(PermissionEnforcer::new(
        "weather-widget",
        PluginPermissions {
            allowed_domains: vec!["api.test.com".to_string()],
            secrets: Some(vec!["API_KEY".to_string()]),
            ..Default::default()
        },
    ));
    let inner = MockTransport::new(vec![json_response(json!({"t": 3}))]);
    let secrets = StaticSecretResolver::new()
        .with("API_KEY", "abc")
        .with("ROOT_PASSWORD", "hunter2");

    let allowed = JsonApiConnector::new(
        json_api("https://api.test.com/v1?key={{API_KEY}}", &[("t", "t")]),
        Arc::new(enforcer.guard(inner.clone())),
        Arc::new(enforcer.scope_secrets(secrets.clone())),
    )
    .unwrap();
    assert_eq!(allowed.fetch().await.unwrap()["t"], json!(3));
    assert_eq!(inner.last_url().as_deref(), Some("https://api.test.com/v1?key=abc"));

    let escalating = JsonApiConnector::new(
        json_api("https://api.test.com/v1?pw={{ROOT_PASSWORD}}", &[]),
        Arc::new(enforcer.guard(inner.clone())),
        Arc::new(enforcer.scope_secrets(secrets)),
    )
    .unwrap();
    let err = escalating.fetch().await.unwrap_err();
    assert!(matches!(
        err,
        ConnectorError::Secret(SecretError::NotPermitted { .. })
    ));
    assert_eq!(inner.calls(), 1);
    assert_eq!(enforcer.violations()[0].kind, ViolationKind::SecretAccess);
}

#[tokio::test]
async fn test_guard_denial_surfaces_as_network_error() {
    let enforcer = Arc::new(PermissionEnforcer::new(
        "p",
        PluginPermissions {
            allowed_domains: vec!["api.test.com".to_string()],
            ..Default::default()
        },
    ));
    let inner = MockTransport::new(vec![]);
    let connector = JsonApiConnector::new(
        json_api("https://other.example.com/", &[]),
        Arc::new(enforcer.guard(inner.clone())),
        Arc::new(StaticSecretResolver::new()),
    )
    .unwrap();

    let err = connector.fetch().await.unwrap_err();
    assert!(err.to_string().contains("Permission denied: domain not allowed"));
    assert_eq!(inner.calls(), 0);
}

#[test]
fn test_refresh_rate_retry_after() {
    let enforcer = PermissionEnforcer::new(
        "p",
        PluginPermissions {
            max_refresh_ms: Some(5000),
            ..Default::default()
        },
    );
    let now = Utc::now();
    let decision =
        enforcer.validate_refresh_at(Some(now - chrono::Duration::milliseconds(2000)), now);

    assert!(!decision.allowed);
    let retry = decision.retry_after_ms.unwrap();
    assert!((2990..=3000).contains(&retry), "{}", retry);
    assert_eq!(enforcer.violations()[0].kind, ViolationKind::RefreshRate);
}

#[test]
fn test_refresh_rate_with_wall_clock() {
    let enforcer = PermissionEnforcer::new(
        "p",
        PluginPermissions {
            max_refresh_ms: Some(5000),
            ..Default::default()
        },
    );
    let decision =
        enforcer.validate_refresh(Some(Utc::now() - chrono::Duration::milliseconds(2000)));
    assert!(!decision.allowed);
    let retry = decision.retry_after_ms.unwrap();
    assert!((2500..=3000).contains(&retry), "{}", retry);
}

// ============== RSS Engine ==============

#[tokio::test]
async fn test_rss_engine_with_secret_header() {
    struct HeaderCheck {
        seen: Mutex<Option<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for HeaderCheck {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            *self.seen.lock() = Some(request);
            Ok(HttpResponse::new(
                200,
                "<rss><channel><title>Team</title><item><title>Deploy</title></item></channel></rss>",
            ))
        }
    }

    let transport = Arc::new(HeaderCheck {
        seen: Mutex::new(None),
    });
    let mut config = RssFeedConnectorConfig {
        url: "https://status.example.com/feed".to_string(),
        ..Default::default()
    };
    config
        .headers
        .insert("Authorization".to_string(), "Bearer {{FEED_TOKEN}}".to_string());

    let secrets: Arc<dyn SecretResolver> =
        Arc::new(StaticSecretResolver::new().with("FEED_TOKEN", "t0k"));
    let connector = RssFeedConnector::new(config, transport.clone(), secrets)
        .unwrap()
        .with_options(ConnectorOptions::default().with_timeout(Duration::from_secs(2)));

    let feed = connector.fetch().await.unwrap();
    assert_eq!(feed.channel_title.as_deref(), Some("Team"));
    let seen = transport.seen.lock().clone().unwrap();
    assert_eq!(
        seen.headers,
        vec![("Authorization".to_string(), "Bearer t0k".to_string())]
    );
}
