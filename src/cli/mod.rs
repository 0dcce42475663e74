//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `serve` (default) -- start the admin server
//! - `test` -- dry-run a connector config and print the result
//! - `fetch` -- run a saved connector config once and print the values
//! - `check-url` -- print the SSRF blocklist decision for a URL

use std::collections::BTreeMap;
use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{self, ConfigError, TaplineConfig};
use crate::connectors::secrets::{EnvSecretResolver, SecretResolver};
use crate::connectors::tester::{ConnectorTestConfig, ConnectorTester, TestOptions};
use crate::connectors::transport::{ReqwestTransport, ReqwestTransportConfig, Transport};
use crate::connectors::{
    ConnectorKind, JsonApiConnector, JsonApiConnectorConfig, RssFeedConnector,
    RssFeedConnectorConfig,
};
use crate::plugins::blocklist::{self, BlocklistConfig};
use crate::plugins::PermissionEnforcer;
use crate::server::{self, AppState};

/// Tapline connector host.
#[derive(Parser, Debug)]
#[command(
    name = "tapline",
    version = env!("CARGO_PKG_VERSION"),
    about = "Tapline: sandboxed data connectors for display plugins"
)]
pub struct Cli {
    /// Config file (default: $TAPLINE_CONFIG_PATH or ~/.tapline/tapline.json5).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the admin server (default when no subcommand is given).
    Serve {
        /// Address to bind (default: server.bind from config).
        #[arg(long)]
        bind: Option<SocketAddr>,
    },

    /// Test a connector once and print the result as JSON.
    Test {
        /// Connector type.
        #[arg(long = "type", value_enum)]
        kind: KindArg,

        /// Target URL.
        #[arg(long)]
        url: String,

        /// HTTP method (default: GET).
        #[arg(long)]
        method: Option<String>,

        /// Request header as `Name: value`. Repeatable.
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Allow private network targets (10/8, 172.16/12, 192.168/16).
        #[arg(long)]
        allow_private: bool,

        /// Request timeout in milliseconds (default: connectors.timeoutMs).
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Run a connector config file once, resolving secrets from
    /// TAPLINE_SECRET_<NAME> environment variables.
    Fetch {
        /// JSON5 connector config file.
        path: PathBuf,

        /// Connector type.
        #[arg(long = "type", value_enum, default_value_t = KindArg::JsonApi)]
        kind: KindArg,

        /// Apply this plugin's permissions from the config file.
        #[arg(long)]
        plugin: Option<String>,
    },

    /// Print the blocklist decision for a URL.
    CheckUrl {
        url: String,

        /// Allow private network targets.
        #[arg(long)]
        allow_private: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    #[value(name = "json_api", alias = "json-api")]
    JsonApi,
    #[value(name = "rss_feed", alias = "rss-feed")]
    RssFeed,
}

impl From<KindArg> for ConnectorKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::JsonApi => ConnectorKind::JsonApi,
            KindArg::RssFeed => ConnectorKind::RssFeed,
        }
    }
}

/// Parse a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got `{}`", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in `{}`", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Load the config from `--config`, or the default location.
pub fn load_cli_config(path: Option<&Path>) -> Result<TaplineConfig, ConfigError> {
    match path {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
}

fn build_transport(config: &TaplineConfig, allow_private: bool) -> ReqwestTransport {
    ReqwestTransport::new(ReqwestTransportConfig {
        blocklist: BlocklistConfig { allow_private },
        max_response_bytes: config.connectors.max_response_bytes,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `serve`
pub async fn handle_serve(
    config: &TaplineConfig,
    bind: Option<SocketAddr>,
) -> Result<(), Box<dyn Error>> {
    let options = TestOptions {
        allow_private: config.connectors.allow_private,
        timeout: config.connectors.timeout(),
    };
    let transport = build_transport(config, options.allow_private);
    let tester = ConnectorTester::new(Arc::new(transport), options);

    let bind = bind.unwrap_or(config.server.bind);
    server::serve(bind, AppState::new(tester)).await?;
    Ok(())
}

/// `test`
pub async fn handle_test(
    config: &TaplineConfig,
    kind: KindArg,
    url: String,
    method: Option<String>,
    headers: Vec<(String, String)>,
    allow_private: bool,
    timeout_ms: Option<u64>,
) -> Result<(), Box<dyn Error>> {
    let options = TestOptions {
        allow_private: allow_private || config.connectors.allow_private,
        timeout: match timeout_ms {
            Some(ms) => std::time::Duration::from_millis(ms),
            None => config.connectors.timeout(),
        },
    };

    let test_config = ConnectorTestConfig {
        kind: ConnectorKind::from(kind).to_string(),
        url,
        method,
        headers: (!headers.is_empty()).then(|| headers.into_iter().collect::<BTreeMap<_, _>>()),
    };

    let transport = build_transport(config, options.allow_private);
    let tester = ConnectorTester::new(Arc::new(transport), options);
    let result = tester.test(&test_config).await;
    print_json(&result)?;

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

/// `fetch`
pub async fn handle_fetch(
    config: &TaplineConfig,
    path: &Path,
    kind: KindArg,
    plugin: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let options = config.connectors.options();
    let base_transport = build_transport(config, options.allow_private);

    let (transport, secrets): (Arc<dyn Transport>, Arc<dyn SecretResolver>) = match plugin {
        Some(plugin_id) => {
            let enforcer = Arc::new(PermissionEnforcer::new(
                plugin_id,
                config.plugin_permissions(plugin_id),
            ));
            (
                Arc::new(enforcer.guard(base_transport)),
                Arc::new(enforcer.scope_secrets(EnvSecretResolver::default())),
            )
        }
        None => (
            Arc::new(base_transport),
            Arc::new(EnvSecretResolver::default()),
        ),
    };

    match ConnectorKind::from(kind) {
        ConnectorKind::JsonApi => {
            let connector_config: JsonApiConnectorConfig = config::load_json5_file(path)?;
            let connector = JsonApiConnector::new(connector_config, transport, secrets)?
                .with_options(options);
            print_json(&connector.fetch().await?)
        }
        ConnectorKind::RssFeed => {
            let connector_config: RssFeedConnectorConfig = config::load_json5_file(path)?;
            let connector = RssFeedConnector::new(connector_config, transport, secrets)?
                .with_options(options);
            print_json(&connector.fetch().await?)
        }
    }
}

/// `check-url`
pub fn handle_check_url(url: &str, allow_private: bool) -> Result<(), Box<dyn Error>> {
    let decision = blocklist::classify(url, &BlocklistConfig { allow_private });
    print_json(&decision)?;
    if decision.blocked {
        std::process::exit(1);
    }
    Ok(())
}
