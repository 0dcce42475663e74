//! Admin server
//!
//! Hosts the connector test endpoint used by the admin UI before a connector
//! is saved.

pub mod http;

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::logging::targets;

pub use http::{create_router, AppState};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Serve the admin router until Ctrl+C or SIGTERM.
pub async fn serve(bind: SocketAddr, state: AppState) -> Result<(), ServerError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|source| ServerError::Bind { addr: bind, source })?;

    tracing::info!(target: targets::HTTP, addr = %bind, "admin server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let reason = await_shutdown_trigger().await;
            tracing::info!(target: targets::HTTP, "shutdown signal received ({})", reason);
        })
        .await?;

    Ok(())
}

#[cfg(unix)]
async fn await_shutdown_trigger() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "ctrl-c",
                _ = sigterm.recv() => "SIGTERM",
            }
        }
        Err(e) => {
            tracing::warn!(
                "Failed to install SIGTERM handler: {}; falling back to Ctrl+C only",
                e
            );
            let _ = tokio::signal::ctrl_c().await;
            "ctrl-c"
        }
    }
}

#[cfg(not(unix))]
async fn await_shutdown_trigger() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "ctrl-c"
}
