//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/dh/config.toml, or the path passed with `--config`)
//!
//! Command-line flags such as `--store` are applied on top by the CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::storage::DEFAULT_LOCK_TIMEOUT;

/// File name of the store inside the home directory
const STORE_FILE_NAME: &str = "dh.db";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Location of the bookmark store file
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// How long to wait for another dh process to release the store
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Log level for stderr diagnostics (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            lock_timeout_ms: default_lock_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit config file path
    pub fn load_with_cli_override(config_path: Option<&PathBuf>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        toml::from_str(toml_content).context("Failed to parse config TOML")
    }

    /// Get the config file path
    pub fn config_file_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dh")
            .join("config.toml")
    }

    /// Lock wait bound as a `Duration`
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Store file in the invoking user's home directory
fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORE_FILE_NAME)
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.store_path.ends_with("dh.db"));
        assert_eq!(config.lock_timeout(), Duration::from_secs(1));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_load_from_str() {
        let toml = r#"
            store_path = "/custom/bookmarks.db"
            lock_timeout_ms = 250
            log_level = "debug"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/custom/bookmarks.db"));
        assert_eq!(config.lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::load_from_str("lock_timeout_ms = 5").unwrap();
        assert_eq!(config.lock_timeout_ms, 5);
        assert!(config.store_path.ends_with("dh.db"));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::load_from_str("lock_timeout_ms = \"soon\"").is_err());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let path = PathBuf::from("/nonexistent/dh/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.lock_timeout_ms, 1000);
    }

    #[test]
    fn test_load_with_cli_override() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "store_path = \"/elsewhere/dh.db\"\n").unwrap();

        let config = Config::load_with_cli_override(Some(&path)).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/elsewhere/dh.db"));
    }

    #[test]
    fn test_serialization() {
        let config = Config {
            store_path: PathBuf::from("/data/dh.db"),
            lock_timeout_ms: 42,
            log_level: "info".to_string(),
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("store_path"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.store_path, config.store_path);
        assert_eq!(parsed.lock_timeout_ms, 42);
    }
}
