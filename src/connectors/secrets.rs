//! Secret resolution for connector URLs and headers
//!
//! Connector configs reference secrets as `{{NAME}}` placeholders. They are
//! resolved through a [`SecretResolver`] immediately before each request, so
//! resolved values never live in the saved config.

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

/// Default environment prefix for [`EnvSecretResolver`].
pub const DEFAULT_ENV_PREFIX: &str = "TAPLINE_SECRET_";

static PLACEHOLDER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("failed to compile regex: placeholder")
});

/// Secret resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("plugin '{plugin_id}' is not permitted to read secret '{name}'")]
    NotPermitted { plugin_id: String, name: String },

    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Host-provided secret lookup. Must fail for unknown names.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String, SecretError>;
}

#[async_trait]
impl<T: SecretResolver + ?Sized> SecretResolver for Arc<T> {
    async fn resolve(&self, name: &str) -> Result<String, SecretError> {
        (**self).resolve(name).await
    }
}

/// In-memory secret map.
#[derive(Debug, Clone, Default)]
pub struct StaticSecretResolver {
    secrets: HashMap<String, String>,
}

impl StaticSecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticSecretResolver {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            secrets: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl SecretResolver for StaticSecretResolver {
    async fn resolve(&self, name: &str) -> Result<String, SecretError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

/// Reads secrets from `<prefix><NAME>` environment variables.
#[derive(Debug, Clone)]
pub struct EnvSecretResolver {
    prefix: String,
}

impl Default for EnvSecretResolver {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_ENV_PREFIX)
    }
}

impl EnvSecretResolver {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, name: &str) -> Result<String, SecretError> {
        env::var(format!("{}{}", self.prefix, name))
            .map_err(|_| SecretError::NotFound(name.to_string()))
    }
}

/// Replace every `{{NAME}}` in `input` with its resolved value.
///
/// Each occurrence is resolved in order; the first failure aborts the whole
/// substitution. Values are inserted verbatim.
pub async fn substitute_placeholders(
    input: &str,
    resolver: &dyn SecretResolver,
) -> Result<String, SecretError> {
    // Collect spans up front so no regex iterator is held across an await.
    let spans: Vec<(usize, usize, String)> = PLACEHOLDER_PATTERN
        .captures_iter(input)
        .filter_map(|caps| {
            let full = caps.get(0)?;
            let name = caps.get(1)?;
            Some((full.start(), full.end(), name.as_str().to_string()))
        })
        .collect();

    let mut result = String::with_capacity(input.len());
    let mut last_end = 0;

    for (start, end, name) in spans {
        result.push_str(&input[last_end..start]);
        let value = resolver.resolve(&name).await?;
        result.push_str(&value);
        last_end = end;
    }

    result.push_str(&input[last_end..]);
    Ok(result)
}
