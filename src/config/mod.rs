//! Configuration parsing module
//!
//! Handles JSON5 configuration with environment variable substitution and
//! typed sections for logging, the admin server, connector defaults and
//! per-plugin permissions.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::connectors::transport::DEFAULT_MAX_RESPONSE_BYTES;
use crate::connectors::{ConnectorOptions, DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS};
use crate::logging::{targets, LogFormat};
use crate::plugins::PluginPermissions;

/// Default admin server bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse JSON5 at {path}: {message}")]
    ParseError { path: String, message: String },

    #[error("Failed to read config file {path}: {message}")]
    ReadError { path: String, message: String },

    #[error("Missing environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Validation error at {path}: {message}")]
    ValidationError { path: String, message: String },
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaplineConfig {
    pub logging: LoggingSection,
    pub server: ServerSection,
    pub connectors: ConnectorsSection,
    /// Plugin id to manifest permissions.
    pub plugins: BTreeMap<String, PluginPermissions>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub format: LogFormat,
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: LogFormat::Plaintext,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: SocketAddr,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectorsSection {
    pub allow_private: bool,
    pub timeout_ms: u64,
    pub max_response_bytes: usize,
}

impl Default for ConnectorsSection {
    fn default() -> Self {
        Self {
            allow_private: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl ConnectorsSection {
    /// Configured timeout, capped at [`MAX_TIMEOUT_MS`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.min(MAX_TIMEOUT_MS))
    }

    pub fn options(&self) -> ConnectorOptions {
        ConnectorOptions {
            timeout: self.timeout(),
            allow_private: self.allow_private,
        }
    }
}

impl TaplineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connectors.timeout_ms == 0 {
            return Err(ConfigError::ValidationError {
                path: "connectors.timeoutMs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.connectors.max_response_bytes == 0 {
            return Err(ConfigError::ValidationError {
                path: "connectors.maxResponseBytes".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        for (id, perms) in &self.plugins {
            if perms.allowed_domains.iter().any(|d| d.trim().is_empty()) {
                return Err(ConfigError::ValidationError {
                    path: format!("plugins.{}.allowed_domains", id),
                    message: "domain entries must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn plugin_permissions(&self, plugin_id: &str) -> PluginPermissions {
        self.plugins.get(plugin_id).cloned().unwrap_or_default()
    }
}

/// Get the config file path.
/// Priority: TAPLINE_CONFIG_PATH > ~/.tapline/tapline.json5
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = env::var("TAPLINE_CONFIG_PATH") {
        return PathBuf::from(path);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tapline")
        .join("tapline.json5")
}

/// Load the configuration from the default path.
pub fn load_config() -> Result<TaplineConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load and validate a config file. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<TaplineConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!(target: targets::CONFIG, path = %path.display(), "config file not found, using defaults");
        return Ok(TaplineConfig::default());
    }

    let config: TaplineConfig = load_json5_file(path)?;
    config.validate()?;
    tracing::debug!(target: targets::CONFIG, path = %path.display(), plugins = config.plugins.len(), "loaded config");
    Ok(config)
}

/// Read a JSON5 file, substitute `${VAR}` references and deserialize it.
pub fn load_json5_file<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut value = parse_json5(&content, path)?;
    substitute_env_vars(&mut value)?;

    serde_json::from_value(value).map_err(|e| ConfigError::ValidationError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn parse_json5(content: &str, path: &Path) -> Result<Value, ConfigError> {
    json5::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn substitute_env_vars(value: &mut Value) -> Result<(), ConfigError> {
    match value {
        Value::String(s) => {
            *s = substitute_env_in_string(s)?;
        }
        Value::Object(obj) => {
            for (_, v) in obj.iter_mut() {
                substitute_env_vars(v)?;
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                substitute_env_vars(item)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// `${VAR}` is replaced from the environment; `$${VAR}` yields a literal `${VAR}`.
/// Connector `{{NAME}}` placeholders are left alone.
fn substitute_env_in_string(s: &str) -> Result<String, ConfigError> {
    static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\$\$?\{([A-Z_][A-Z0-9_]*)\}").expect("failed to compile regex: env_var")
    });

    let mut result = String::with_capacity(s.len());
    let mut last_end = 0;

    for caps in ENV_VAR_PATTERN.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let var_name = var_name.as_str();

        result.push_str(&s[last_end..full_match.start()]);

        if full_match.as_str().starts_with("$$") {
            result.push_str(&format!("${{{}}}", var_name));
        } else {
            let value = env::var(var_name).map_err(|_| ConfigError::MissingEnvVar {
                var: var_name.to_string(),
            })?;
            result.push_str(&value);
        }

        last_end = full_match.end();
    }

    result.push_str(&s[last_end..]);
    Ok(result)
}
