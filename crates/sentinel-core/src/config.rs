//! Application configuration management.
//!
//! Configuration is stored at `~/.config/sentinel/config.json` and holds the
//! backend URL, the preferred credential storage backend and a few timing
//! knobs. Every field is optional on disk; missing fields take defaults.
//!
//! The backend host is selected by a single environment variable,
//! `SENTINEL_API_URL`, which wins over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "sentinel";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable selecting the backend host
pub const API_URL_ENV: &str = "SENTINEL_API_URL";

/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "SENTINEL_CONFIG_DIR";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "SENTINEL_DATA_DIR";

/// Backend used when neither the environment nor the config names one
pub const DEFAULT_API_URL: &str = "https://backend-belz.onrender.com";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Dashboard refresh interval in seconds.
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

/// Where the bearer token is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Use the OS keychain when it answers, the local file otherwise
    #[default]
    Auto,
    Keyring,
    Local,
    /// Keep the token in memory only; nothing survives the process
    Memory,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
    /// Check a restored token against `/auth/me` at startup
    #[serde(default = "default_true")]
    pub validate_on_startup: bool,
    #[serde(default)]
    pub last_username: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            storage: StorageBackend::default(),
            request_timeout_secs: None,
            refresh_interval_secs: None,
            validate_on_startup: true,
            last_username: None,
            device_id: None,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir).join(CONFIG_FILE));
        }
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the local token file and the unread news set.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Resolve the backend URL: environment, then config, then the default.
    pub fn api_base_url(&self) -> String {
        let url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        url.trim().trim_end_matches('/').to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(
            self.refresh_interval_secs
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS)
                .max(1),
        )
    }
}
