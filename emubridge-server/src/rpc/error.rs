//! Per-call failure taxonomy

/// Why a backend call did not produce a result
///
/// Every variant is delivered to exactly one caller. Malformed inbound frames
/// never become an `RpcError`: they cannot be attributed to a call and are
/// logged and dropped by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// No open connection when the call was issued
    #[error("Emulator bridge is not connected")]
    NotConnected,

    /// No response within the call's deadline
    #[error("RPC {method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// Connection dropped while the call was pending
    #[error("Emulator bridge disconnected: {0}")]
    Disconnected(String),

    /// Backend answered with an error envelope
    #[error("{0}")]
    Remote(String),

    /// Frame could not be written to the socket
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RpcError {
    /// Whether the failure came from the link rather than the backend
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Disconnected(_) | Self::Transport(_)
        )
    }
}
