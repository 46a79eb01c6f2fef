//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which holds the backend base URL, where the session token is kept, the
//! polling interval, and the last used username.
//!
//! Configuration is stored at `~/.config/meteowatch/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, TokenStore};
use crate::readings::DEFAULT_POLL_INTERVAL_SECS;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "meteowatch";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the configured base URL
pub const API_URL_ENV: &str = "METEOWATCH_API_URL";

/// Backend address used when nothing is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Where the session token is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub token_backend: TokenBackend,
    pub poll_interval_secs: u64,
    pub last_username: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token_backend: TokenBackend::default(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            last_username: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply a base URL override, ignoring blank values
    pub fn override_base_url(&mut self, url: Option<String>) {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
    }

    /// Apply `METEOWATCH_API_URL` if set
    pub fn apply_env(&mut self) {
        self.override_base_url(std::env::var(API_URL_ENV).ok());
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Build the token store for the configured backend
    pub fn token_store(&self) -> Result<TokenStore> {
        Ok(match self.token_backend {
            TokenBackend::File => TokenStore::new(FileStorage::new(self.cache_dir()?)),
            TokenBackend::Keyring => TokenStore::new(KeyringStorage::new()),
            TokenBackend::Memory => TokenStore::new(MemoryStorage::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let err = Config::default()
            .save_to(&blocker.join("config.json"))
            .unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.starts_with("Failed to create config directory"));
        assert!(message.contains("not-a-dir"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meteowatch").join(CONFIG_FILE);
        let config = Config {
            base_url: "https://weather.example.com".to_string(),
            token_backend: TokenBackend::Keyring,
            poll_interval_secs: 30,
            last_username: Some("admin".to_string()),
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{"token_backend":"memory"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.token_backend, TokenBackend::Memory);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_override_base_url_ignores_blank() {
        let mut config = Config::default();
        config.override_base_url(Some("   ".to_string()));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        config.override_base_url(Some(" http://10.0.0.5:5000 ".to_string()));
        assert_eq!(config.base_url, "http://10.0.0.5:5000");
        config.override_base_url(None);
        assert_eq!(config.base_url, "http://10.0.0.5:5000");
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_memory_backend_store() {
        let config = Config {
            token_backend: TokenBackend::Memory,
            ..Config::default()
        };
        let store = config.token_store().unwrap();
        assert!(store.get_token().is_none());
    }
}
