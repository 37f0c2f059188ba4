//! Backend RPC layer
//!
//! [`RpcClient`] is the only entry point the MCP adapter uses. It pairs the
//! [`ConnectionManager`] (link lifecycle) with the [`CallCorrelator`]
//! (matching responses to calls) and applies the configured call timeout.

mod connection;
mod correlator;
mod error;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use emubridge_protocol::Params;
use serde_json::Value;
use tokio::sync::watch;

use crate::config::BackendConfig;

use connection::{ConnectionManager, ConnectionSettings};
use correlator::CallCorrelator;
use transport::{HeartbeatConfig, WsConnector};

pub use connection::ConnectionState;
pub use error::RpcError;
pub use transport::Connector;

/// Handle for issuing calls to the backend
#[derive(Clone)]
pub struct RpcClient {
    connection: Arc<ConnectionManager>,
    correlator: Arc<CallCorrelator>,
    call_timeout: Duration,
}

impl RpcClient {
    /// Create a client that talks WebSocket to the configured backend
    pub fn new(config: &BackendConfig) -> Self {
        let heartbeat = (config.heartbeat_interval_ms > 0).then(|| HeartbeatConfig {
            interval: Duration::from_millis(config.heartbeat_interval_ms),
            timeout: Duration::from_millis(config.heartbeat_timeout_ms),
        });
        Self::with_connector(config, Arc::new(WsConnector::new(heartbeat)))
    }

    /// Create a client over an arbitrary transport
    pub fn with_connector(config: &BackendConfig, connector: Arc<dyn Connector>) -> Self {
        let correlator = Arc::new(CallCorrelator::new());
        let settings = ConnectionSettings {
            url: config.url.clone(),
            reconnect_delay: config.reconnect_delay(),
            max_reconnect_attempts: config.max_reconnect_attempts,
        };
        let connection = ConnectionManager::new(settings, connector, Arc::clone(&correlator));

        Self {
            connection,
            correlator,
            call_timeout: config.call_timeout(),
        }
    }

    /// Start connecting if not already connected
    pub fn connect(&self) {
        self.connection.ensure_connection();
    }

    /// Call a backend method with the default timeout
    pub async fn call(&self, method: &str, params: Option<Params>) -> Result<Value, RpcError> {
        self.call_with_timeout(method, params, self.call_timeout).await
    }

    /// Call a backend method with an explicit timeout
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Params>,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        self.correlator
            .call(self.connection.as_ref(), method, params, timeout)
            .await
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// Number of calls currently awaiting a response
    pub fn pending_calls(&self) -> usize {
        self.correlator.pending_count()
    }

    pub fn shutdown(&self) {
        self.connection.shutdown();
    }
}
