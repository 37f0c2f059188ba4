//! Configuration loader

use std::path::Path;

use emubridge_utils::{config_file, BridgeError, Result};
use url::Url;

use super::AppConfig;

/// Preferred environment override for the backend address
pub const URL_ENV_VAR: &str = "EMUBRIDGE_WS_URL";

/// Older name for the same override, still honoured
pub const LEGACY_URL_ENV_VAR: &str = "ATARI_WS_URL";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from an explicit path or the default location
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(path) if path.exists() => Self::load_from_path(path),
            Some(path) => Err(BridgeError::ConfigNotFound(path.to_path_buf())),
            None => {
                let path = config_file();
                if path.exists() {
                    Self::load_from_path(&path)
                } else {
                    Ok(AppConfig::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| BridgeError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from string
    pub fn parse(content: &str, path: &Path) -> Result<AppConfig> {
        toml::from_str(content).map_err(|e| BridgeError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply environment overrides from the process environment
    pub fn apply_env(config: &mut AppConfig) {
        Self::apply_env_with(config, |key| std::env::var(key).ok());
    }

    /// Apply environment overrides from an arbitrary lookup
    pub fn apply_env_with<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = [URL_ENV_VAR, LEGACY_URL_ENV_VAR]
            .into_iter()
            .filter_map(|key| lookup(key))
            .find(|value| !value.trim().is_empty());

        if let Some(url) = url {
            config.backend.url = url.trim().to_string();
        }
    }

    /// Validate configuration
    pub fn validate(config: &AppConfig) -> Result<()> {
        let backend = &config.backend;

        let url = Url::parse(&backend.url)
            .map_err(|e| BridgeError::config(format!("invalid backend url '{}': {}", backend.url, e)))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(BridgeError::config(format!(
                "backend url must use ws:// or wss://, got '{}'",
                backend.url
            )));
        }

        if url.scheme() == "wss" && !cfg!(feature = "tls") {
            return Err(BridgeError::config(format!(
                "backend url '{}' needs TLS, but emubridge was built without the `tls` feature",
                backend.url
            )));
        }

        if backend.call_timeout_ms == 0 {
            return Err(BridgeError::config("call_timeout_ms must be greater than 0"));
        }

        if backend.reconnect_delay_ms == 0 {
            return Err(BridgeError::config(
                "reconnect_delay_ms must be greater than 0",
            ));
        }

        if backend.heartbeat_interval_ms > 0
            && backend.heartbeat_timeout_ms <= backend.heartbeat_interval_ms
        {
            return Err(BridgeError::config(
                "heartbeat_timeout_ms must exceed heartbeat_interval_ms",
            ));
        }

        if let Some(name) = &config.logging.file_name {
            let plain = Path::new(name)
                .file_name()
                .is_some_and(|file| file == name.as_str());
            if !plain {
                return Err(BridgeError::config(format!(
                    "logging.file_name must be a plain file name, got '{}'",
                    name
                )));
            }
        }

        Ok(())
    }
}
