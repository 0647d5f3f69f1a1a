use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::{API_URL_ENV, DEFAULT_API_URL};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub desktop: DesktopConfig,
}

/// Where the results come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Send the ngrok browser-warning bypass header.
    #[serde(default = "default_true")]
    pub skip_warning_header: bool,
}

/// Timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between results requests, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How often toast age labels are recomputed, in seconds.
    #[serde(default = "default_toast_refresh")]
    pub toast_refresh_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Settings storage file. Defaults to the platform config dir.
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopConfig {
    /// Command invoked as `<command> <title> <body>`.
    #[serde(default = "default_notify_command")]
    pub command: String,
}

fn default_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    10
}

fn default_toast_refresh() -> u64 {
    60
}

fn default_notify_command() -> String {
    "notify-send".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            skip_warning_header: default_true(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            toast_refresh_secs: default_toast_refresh(),
        }
    }
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            command: default_notify_command(),
        }
    }
}

impl PollingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn toast_refresh(&self) -> Duration {
        Duration::from_secs(self.toast_refresh_secs.max(1))
    }
}

impl EndpointConfig {
    pub fn parsed_url(&self) -> Result<Url> {
        Url::parse(&self.url).with_context(|| format!("invalid endpoint URL {:?}", self.url))
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise, then apply the
    /// endpoint override from the environment.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let config = Self::load(path)?;
            info!("Loaded config from {}", path.display());
            config
        } else {
            debug!("{} not found, using defaults", path.display());
            Self::default()
        };
        config.apply_env_override(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    fn apply_env_override(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            debug!("Endpoint overridden by {API_URL_ENV}");
            self.endpoint.url = url.trim().to_string();
        }
    }
}
