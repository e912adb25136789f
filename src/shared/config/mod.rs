//! Application configuration module
//!
//! Provides the typed configuration for the synchronization layer. Values come
//! from the builder, from a TOML file, or from the environment through
//! `client::config::Config`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default characters kept in a conversation's last-message preview
pub const DEFAULT_PREVIEW_LENGTH: usize = 50;

/// Default timeout for a single store request
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// What to do when a store echo arrives for a message that was appended
/// optimistically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoPolicy {
    /// Replace the optimistic entry with the store copy
    #[default]
    Reconcile,
    /// Append the echo as a separate message
    Duplicate,
}

/// What to do with an optimistic entry whose write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Flag the entry as failed so it can be retried
    #[default]
    MarkFailed,
    /// Leave the entry showing as sent
    KeepSent,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Document store URL; `None` means local-only
    pub server_url: Option<String>,
    /// Fallback file location
    pub fallback_path: Option<PathBuf>,
    /// Characters kept in a conversation preview
    pub preview_length: usize,
    /// Echo handling for optimistic sends
    pub echo_policy: EchoPolicy,
    /// Failure handling for optimistic sends
    pub write_failure_policy: WriteFailurePolicy,
    /// Per-request timeout against the remote store
    pub request_timeout_secs: u64,
    /// Seed sample conversations when the local store starts empty
    pub seed_demo_data: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            fallback_path: None,
            preview_length: DEFAULT_PREVIEW_LENGTH,
            echo_policy: EchoPolicy::default(),
            write_failure_policy: WriteFailurePolicy::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            seed_demo_data: true,
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.server_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl(url.clone()));
            }
        }
        if self.preview_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "preview_length",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    /// Request timeout as a `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = Some(url.into());
        self
    }

    /// Set the fallback file path
    pub fn fallback_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.fallback_path = Some(path.into());
        self
    }

    /// Set the preview length
    pub fn preview_length(mut self, len: usize) -> Self {
        self.config.preview_length = len;
        self
    }

    /// Set the echo policy
    pub fn echo_policy(mut self, policy: EchoPolicy) -> Self {
        self.config.echo_policy = policy;
        self
    }

    /// Set the write failure policy
    pub fn write_failure_policy(mut self, policy: WriteFailurePolicy) -> Self {
        self.config.write_failure_policy = policy;
        self
    }

    /// Set the request timeout in seconds
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Enable or disable demo seeding
    pub fn seed_demo_data(mut self, seed: bool) -> Self {
        self.config.seed_demo_data = seed;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to read config: {0}")]
    Io(String),
}
