use std::path::PathBuf;

use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Environment variable holding the document store URL
pub const SERVER_URL_ENV: &str = "SCHOOLCHAT_SERVER_URL";
/// Environment variable overriding the fallback file location
pub const FALLBACK_PATH_ENV: &str = "SCHOOLCHAT_FALLBACK_PATH";
/// Environment variable toggling demo seeding (`0` disables)
pub const DEMO_DATA_ENV: &str = "SCHOOLCHAT_DEMO_DATA";
/// Environment variable pointing at a TOML config file
pub const CONFIG_FILE_ENV: &str = "SCHOOLCHAT_CONFIG";

/// Default server URL
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Client configuration wrapper.
///
/// Layers environment variables over an `AppConfig` that comes from the
/// builder or from the file named by `SCHOOLCHAT_CONFIG`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    app: AppConfig,
}

impl Config {
    /// Configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let app = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => AppConfig::load(path)?,
            Err(_) => AppConfig::default(),
        };
        Self::with_overrides(app)
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self { app: builder.build()? })
    }

    fn with_overrides(mut app: AppConfig) -> Result<Self, ConfigError> {
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            app.server_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Ok(path) = std::env::var(FALLBACK_PATH_ENV) {
            app.fallback_path = Some(PathBuf::from(path));
        }
        if let Ok(flag) = std::env::var(DEMO_DATA_ENV) {
            app.seed_demo_data = flag != "0";
        }
        app.validate()?;
        Ok(Self { app })
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url(), path)
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    /// Whether a remote store is configured at all
    pub fn has_remote(&self) -> bool {
        self.app.server_url.is_some()
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    pub fn into_app(self) -> AppConfig {
        self.app
    }
}
