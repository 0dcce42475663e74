//! RSS connector engine
//!
//! Same request discipline as [`super::JsonApiConnector`], with the body
//! scanned by [`super::rss`] instead of mapped through JSONPath.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::rss::{self, RssFeed};
use super::secrets::SecretResolver;
use super::transport::{normalize_method, Transport};
use super::{check_blocklist, resolve_request, send_with_timeout, ConnectorError, ConnectorOptions};
use crate::logging::targets;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RssFeedConnectorConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Keep only the first N items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

pub struct RssFeedConnector {
    config: RssFeedConnectorConfig,
    method: String,
    transport: Arc<dyn Transport>,
    secrets: Arc<dyn SecretResolver>,
    options: ConnectorOptions,
    cache: RwLock<Option<RssFeed>>,
}

impl RssFeedConnector {
    pub fn new(
        config: RssFeedConnectorConfig,
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

        Ok(Self {
            config,
            method,
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

    pub async fn fetch(&self) -> Result<RssFeed, ConnectorError> {
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
                    "upstream error, serving cached feed"
                );
                return Ok(cached);
            }
            return Err(ConnectorError::Http {
                status: response.status,
                status_text: response.status_text,
            });
        }

        let text = response.text();
        if !rss::looks_like_feed(&text) {
            return Err(ConnectorError::FeedParse(
                "response contains no <channel> or <item> elements".to_string(),
            ));
        }

        let mut feed = rss::parse_feed(&text);
        if let Some(max) = self.config.max_items {
            feed.items.truncate(max);
        }

        *self.cache.write() = Some(feed.clone());
        tracing::debug!(target: targets::CONNECTORS, items = feed.items.len(), "feed fetch succeeded");
        Ok(feed)
    }

    pub fn cached(&self) -> Option<RssFeed> {
        self.cache.read().clone()
    }

    pub fn clear_cache(&self) {
        *self.cache.write() = None;
    }
}
