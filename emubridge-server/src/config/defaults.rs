//! Default configuration values
//!
//! These are embedded in the binary and used when no config file exists.

/// Default backend connect target
pub const DEFAULT_URL: &str = emubridge_protocol::DEFAULT_BACKEND_URL;

/// Delay before each reconnect attempt
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;

/// Per-call deadline
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5000;

/// Heartbeat is off unless configured
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 0;

pub const DEFAULT_HEARTBEAT_TIMEOUT_MS: u64 = 10_000;

/// 0 keeps retrying forever
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 0;

/// Default configuration as TOML (for reference/documentation)
#[allow(dead_code)]
pub const DEFAULT_CONFIG_TOML: &str = r##"
# emubridge configuration

[backend]
url = "ws://localhost:8765"
reconnect_delay_ms = 2000
call_timeout_ms = 5000
# Send a WebSocket ping this often; 0 disables the heartbeat
heartbeat_interval_ms = 0
heartbeat_timeout_ms = 10000
# Stop after this many consecutive failed connects; 0 retries forever
max_reconnect_attempts = 0

[logging]
# stderr, file or both (stdout is reserved for the MCP stream)
output = "stderr"
# filter = "info"
# Log file name under the state dir, for the file and both outputs
# file_name = "emubridge.log"
"##;
