//! Configuration schema structs

use std::time::Duration;

use emubridge_utils::logging::LOG_ENV_VAR;
use emubridge_utils::{LogConfig, LogOutput};
use serde::{Deserialize, Serialize};

use super::defaults::*;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub logging: LoggingConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// WebSocket address of the emulator backend
    pub url: String,
    pub reconnect_delay_ms: u64,
    pub call_timeout_ms: u64,
    /// 0 disables the heartbeat
    pub heartbeat_interval_ms: u64,
    pub heartbeat_timeout_ms: u64,
    /// Consecutive failed connects before giving up (0 = unbounded)
    pub max_reconnect_attempts: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.into(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            heartbeat_timeout_ms: DEFAULT_HEARTBEAT_TIMEOUT_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl BackendConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub output: LogOutput,
    /// tracing filter directive; `EMUBRIDGE_LOG` takes precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// File name inside the log dir for the `file` and `both` outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: None,
            file_name: None,
        }
    }
}

impl LoggingConfig {
    /// Build the subscriber config for the bridge process
    pub fn to_log_config(&self) -> LogConfig {
        let mut config = LogConfig::mcp_bridge().with_output(self.output);
        config.file_name = self.file_name.clone();
        if std::env::var(LOG_ENV_VAR).is_err() {
            if let Some(filter) = &self.filter {
                config.filter = filter.clone();
            }
        }
        config
    }
}
