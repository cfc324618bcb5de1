//! Application configuration management.
//!
//! Configuration is stored at `~/.config/murmur/config.json` and holds the
//! backend base URL, request timeout, the token storage backend, and the last
//! email used to log in. `MURMUR_API_URL` overrides the base URL at runtime.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "murmur";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend used when nothing is configured
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "MURMUR_API_URL";

/// Where the credential pair is persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// JSON file in the cache directory
    #[default]
    File,
    /// OS keychain entry
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub token_storage: TokenStorage,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            token_storage: TokenStorage::default(),
            last_email: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
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

    /// Apply environment overrides on top of the file contents
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }

    /// Base URL guaranteed to end with a single slash, so that relative
    /// endpoint paths can be appended directly.
    pub fn base_url(&self) -> String {
        normalize_base_url(&self.api_base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

pub fn normalize_base_url(url: &str) -> String {
    format!("{}/", url.trim().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://localhost:8000/api"), "http://localhost:8000/api/");
        assert_eq!(normalize_base_url("http://localhost:8000/api/"), "http://localhost:8000/api/");
        assert_eq!(normalize_base_url("http://localhost:8000/api//"), "http://localhost:8000/api/");
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str(r#"{"last_email": "a@x.com"}"#)
            .expect("partial config should parse");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.token_storage, TokenStorage::File);
        assert_eq!(config.last_email.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_token_storage_serializes_lowercase() {
        let json = serde_json::to_string(&TokenStorage::Keyring).unwrap();
        assert_eq!(json, "\"keyring\"");
    }

    #[test]
    fn test_request_timeout_never_zero() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
