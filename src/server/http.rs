//! Admin HTTP endpoints
//!
//! - `POST /admin/connectors/test` runs the connector tester
//! - `GET /health` liveness probe
//!
//! A tester result with `success: false` is still a 200: the test itself
//! completed and determined that the connector does not work.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::connectors::tester::{ConnectorTestConfig, ConnectorTester};
use crate::logging::redact::RedactedDisplay;
use crate::logging::targets;

/// Route for the connector dry-run
pub const CONNECTOR_TEST_PATH: &str = "/admin/connectors/test";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub tester: Arc<ConnectorTester>,
    /// Unix timestamp the router was created at.
    pub start_time: i64,
}

impl AppState {
    pub fn new(tester: ConnectorTester) -> Self {
        Self {
            tester: Arc::new(tester),
            start_time: chrono::Utc::now().timestamp(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(CONNECTOR_TEST_PATH, post(connector_test_handler))
        .with_state(state)
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Response {
    let uptime = chrono::Utc::now().timestamp() - state.start_time;
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptimeSeconds": uptime,
        })),
    )
        .into_response()
}

/// POST /admin/connectors/test
async fn connector_test_handler(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Response {
    let config: ConnectorTestConfig = match serde_json::from_slice(&body) {
        Ok(c) => c,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid request body: {}", e) })),
            )
                .into_response();
        }
    };

    tracing::debug!(
        target: targets::HTTP,
        kind = %config.kind,
        url = %RedactedDisplay(&config.url),
        "connector test requested"
    );

    // Run on its own task so a panic becomes a 500 rather than a dropped connection.
    let tester = Arc::clone(&state.tester);
    let handle = tokio::spawn(async move { tester.test(&config).await });

    match handle.await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => {
            tracing::error!(target: targets::HTTP, error = %e, "connector test handler failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Connector test failed unexpectedly" })),
            )
                .into_response()
        }
    }
}
