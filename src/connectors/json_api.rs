//! JSON-API connector engine
//!
//! One instance per deployed connector. Each [`JsonApiConnector::fetch`]
//! resolves secrets, checks the blocklist, sends one bounded request and maps
//! the JSON body into named slots. The last successful mapping is cached and
//! served when the upstream returns a non-2xx status; parse and mapping
//! failures are always surfaced.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::json_path::JsonPath;
use super::secrets::SecretResolver;
use super::transport::{normalize_method, Transport};
use super::{check_blocklist, resolve_request, send_with_timeout, ConnectorError, ConnectorOptions};
use crate::logging::targets;

/// Slot name to extracted value.
pub type MappedValues = BTreeMap<String, Value>;

/// Saved connector definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonApiConnectorConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Slot name to JSONPath expression.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
}

pub struct JsonApiConnector {
    config: JsonApiConnectorConfig,
    method: String,
    paths: Vec<(String, JsonPath)>,
    transport: Arc<dyn Transport>,
    secrets: Arc<dyn SecretResolver>,
    options: ConnectorOptions,
    cache: RwLock<Option<MappedValues>>,
}

impl std::fmt::Debug for JsonApiConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonApiConnector")
            .field("url", &self.config.url)
            .field("method", &self.method)
            .field("slots", &self.paths.len())
            .field("options", &self.options)
            .field("cached", &self.cache.read().is_some())
            .finish()
    }
}

impl JsonApiConnector {
    /// Validates the method and compiles every mapping expression up front.
    pub fn new(
        config: JsonApiConnectorConfig,
        transport: Arc<dyn Transport>,
        secrets: Arc<dyn SecretResolver>,
    ) -> Result<Self, ConnectorError> {
        if config.url.trim().is_empty() {
            return Err(ConnectorError::InvalidConfig(
                "Missing required field: url".to_string(),
            ));
        }

        let method = normalize_method(config.method.as_deref())
            .map_err(|e| ConnectorError::InvalidConfig(e.to_string()))?;

        let paths = config
            .mapping
            .iter()
            .map(|(slot, expr)| JsonPath::parse(expr).map(|path| (slot.clone(), path)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            method,
            paths,
            transport,
            secrets,
            options: ConnectorOptions::default(),
            cache: RwLock::new(None),
        })
    }

    pub fn with_options(mut self, options: ConnectorOptions) -> Self {
        self.options = options;
        self
    }

    /// Fetch and map once.
    pub async fn fetch(&self) -> Result<MappedValues, ConnectorError> {
        let request = resolve_request(
            &self.config.url,
            &self.method,
            &self.config.headers,
            self.secrets.as_ref(),
        )
        .await?;

        check_blocklist(&request.url, &self.options)?;

        let response =
            send_with_timeout(self.transport.as_ref(), request, self.options.timeout).await?;

        if !response.ok() {
            if let Some(cached) = self.cached() {
                tracing::warn!(
                    target: targets::CONNECTORS,
                    status = response.status,
                    "upstream error, serving cached values"
                );
                return Ok(cached);
            }
            return Err(ConnectorError::Http {
                status: response.status,
                status_text: response.status_text,
            });
        }

        let body = response
            .json()
            .map_err(|e| ConnectorError::JsonParse(e.to_string()))?;

        let mapped = self.map_response(&body)?;
        *self.cache.write() = Some(mapped.clone());

        tracing::debug!(target: targets::CONNECTORS, slots = mapped.len(), "connector fetch succeeded");
        Ok(mapped)
    }

    /// Resolve every slot against `body`. All slots resolve or none do.
    pub fn map_response(&self, body: &Value) -> Result<MappedValues, ConnectorError> {
        self.paths
            .iter()
            .map(|(slot, path)| -> Result<(String, Value), ConnectorError> {
                let value = path.evaluate(body)?;
                Ok((slot.clone(), value.clone()))
            })
            .collect()
    }

    /// Snapshot of the last successful mapping.
    pub fn cached(&self) -> Option<MappedValues> {
        self.cache.read().clone()
    }

    pub fn clear_cache(&self) {
        *self.cache.write() = None;
    }
}
