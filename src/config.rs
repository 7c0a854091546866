//! Configuration for the shared logger
//!
//! Settings come from an optional TOML file, overlaid by environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{mini_log, Level, Sink, SinkError};

/// Primary environment variable holding the webhook URL
pub const ENV_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_LOGGER_URL";
/// Older name for the webhook URL, read when the primary one is unset
pub const ENV_WEBHOOK_URL_FALLBACK: &str = "LOGGER_WEBHOOK_URI";
pub const ENV_STORE_LOGS: &str = "LOGGER_STORE_LOGS";
pub const ENV_CONSOLE: &str = "LOGGER_CONSOLE";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Webhook to deliver log lines to; delivery is off when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Keep the last 50 lines in memory
    #[serde(default)]
    pub store_logs: bool,

    /// Write lines to stdout
    #[serde(default = "default_console")]
    pub console: bool,

    /// Milliseconds between two webhook posts (default: 2100)
    #[serde(default = "default_delivery_interval_ms")]
    pub delivery_interval_ms: u64,
}

fn default_console() -> bool {
    true
}

fn default_delivery_interval_ms() -> u64 {
    2100
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            store_logs: false,
            console: default_console(),
            delivery_interval_ms: default_delivery_interval_ms(),
        }
    }
}

impl LoggerConfig {
    /// Load configuration from file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str::<Self>(&content)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
            .validated()
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(content)
            .map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?
            .validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.delivery_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "delivery_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }

    /// Overlay values from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup`; unset and empty variables are ignored
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_WEBHOOK_URL).or_else(|| get(ENV_WEBHOOK_URL_FALLBACK)) {
            self.webhook_url = Some(url);
        }
        if let Some(raw) = get(ENV_STORE_LOGS) {
            match parse_flag(&raw) {
                Some(v) => self.store_logs = v,
                None => warn_flag(ENV_STORE_LOGS, &raw),
            }
        }
        if let Some(raw) = get(ENV_CONSOLE) {
            match parse_flag(&raw) {
                Some(v) => self.console = v,
                None => warn_flag(ENV_CONSOLE, &raw),
            }
        }
        self
    }

    /// The webhook URL, ignoring blank values
    pub fn webhook(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn delivery_interval(&self) -> Duration {
        Duration::from_millis(self.delivery_interval_ms)
    }

    /// Build a sink from this configuration and arm delivery when a URL is set.
    ///
    /// Must be called from within a Tokio runtime when a webhook is configured.
    pub fn build_sink(&self) -> Result<Sink, SinkError> {
        let sink = Sink::builder()
            .console(self.console)
            .store_logs(self.store_logs)
            .delivery_interval(self.delivery_interval())
            .build();
        if let Some(url) = self.webhook() {
            sink.configure_webhook(url)?;
        } else {
            mini_log(Level::Warn, "No webhook URL configured, logging to console only");
        }
        Ok(sink)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn warn_flag(key: &str, raw: &str) {
    mini_log(
        Level::Warn,
        &format!("Ignoring {}={:?}: expected true or false", key, raw),
    );
}
