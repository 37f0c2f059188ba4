//! Backend connection lifecycle
//!
//! Owns the single persistent link to the backend: opening it on demand,
//! decoding inbound frames, and reconnecting after a fixed delay whenever it
//! drops.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use emubridge_protocol::decode_response;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::correlator::{CallCorrelator, EnvelopeSink};
use super::error::RpcError;
use super::transport::{Connector, Link, Outbound, SendAck};

/// Connection state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link; a reconnect may be scheduled
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Link established, calls may be sent
    Open,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// State and outbound half of the current link, changed together
struct Slot {
    state: ConnectionState,
    writer: Option<mpsc::UnboundedSender<Outbound>>,
}

/// Connection settings
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: String,
    pub reconnect_delay: Duration,
    /// Consecutive failed attempts before giving up; 0 retries forever
    pub max_reconnect_attempts: u32,
}

/// Manages the persistent backend connection
pub struct ConnectionManager {
    settings: ConnectionSettings,
    connector: Arc<dyn Connector>,
    correlator: Arc<CallCorrelator>,
    slot: Mutex<Slot>,
    state_tx: watch::Sender<ConnectionState>,
    /// Token of the one reconnect timer still allowed to fire
    reconnect_timer: Mutex<Option<u64>>,
    timer_seq: AtomicU64,
    failed_attempts: AtomicU32,
    shutdown: AtomicBool,
}

impl ConnectionManager {
    pub fn new(
        settings: ConnectionSettings,
        connector: Arc<dyn Connector>,
        correlator: Arc<CallCorrelator>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            settings,
            connector,
            correlator,
            slot: Mutex::new(Slot {
                state: ConnectionState::Disconnected,
                writer: None,
            }),
            state_tx,
            reconnect_timer: Mutex::new(None),
            timer_seq: AtomicU64::new(0),
            failed_attempts: AtomicU32::new(0),
            shutdown: AtomicBool::new(false),
        })
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.slot.lock().state
    }

    /// Follow state transitions
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Start connecting unless a link is open or already being opened
    pub fn ensure_connection(self: &Arc<Self>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        {
            let mut slot = self.slot.lock();
            if slot.state != ConnectionState::Disconnected {
                return;
            }
            self.set_state(&mut slot, ConnectionState::Connecting);
        }

        let this = Arc::clone(self);
        tokio::spawn(async move { this.establish().await });
    }

    async fn establish(self: Arc<Self>) {
        info!(url = %self.settings.url, "Attempting connection to backend");

        let Link {
            outgoing,
            mut incoming,
        } = match self.connector.connect(&self.settings.url).await {
            Ok(link) => link,
            Err(e) => {
                let attempts = self.failed_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(
                    url = %self.settings.url,
                    error = %e,
                    attempts,
                    "Failed to connect to backend"
                );
                self.handle_disconnect(format!("connect failed: {}", e));
                return;
            }
        };

        {
            let mut slot = self.slot.lock();
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("Shutdown requested during connect, dropping link");
                self.set_state(&mut slot, ConnectionState::Disconnected);
                return;
            }
            slot.writer = Some(outgoing);
            self.set_state(&mut slot, ConnectionState::Open);
        }
        self.failed_attempts.store(0, Ordering::SeqCst);
        if let Some(token) = self.reconnect_timer.lock().take() {
            debug!(token, "Connection opened, discarding scheduled reconnect");
        }
        info!(url = %self.settings.url, "Connected to backend");

        while let Some(raw) = incoming.recv().await {
            self.on_message(&raw);
        }

        info!(url = %self.settings.url, "Backend connection closed");
        self.handle_disconnect("connection closed".into());
    }

    /// Decode one inbound frame and hand it to the correlator
    fn on_message(&self, raw: &str) {
        match decode_response(raw) {
            Ok(response) => {
                self.correlator.on_response(response);
            }
            Err(e) => {
                warn!(error = %e, len = raw.len(), "Dropping malformed frame from backend");
            }
        }
    }

    fn handle_disconnect(self: &Arc<Self>, reason: String) {
        {
            let mut slot = self.slot.lock();
            slot.writer = None;
            self.set_state(&mut slot, ConnectionState::Disconnected);
        }

        // State is already Disconnected, so no new call can slip in after this
        self.correlator.fail_all(RpcError::Disconnected(reason));
        self.schedule_reconnect();
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let max = self.settings.max_reconnect_attempts;
        let failed = self.failed_attempts.load(Ordering::SeqCst);
        if max > 0 && failed >= max {
            error!(
                url = %self.settings.url,
                attempts = failed,
                "Giving up on backend after repeated connection failures"
            );
            return;
        }

        let token = {
            let mut timer = self.reconnect_timer.lock();
            if timer.is_some() {
                debug!("Reconnect already scheduled");
                return;
            }
            let token = self.timer_seq.fetch_add(1, Ordering::SeqCst);
            *timer = Some(token);
            token
        };

        let delay = self.settings.reconnect_delay;
        debug!(token, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(this) = weak.upgrade() else {
                return;
            };
            {
                let mut timer = this.reconnect_timer.lock();
                if *timer != Some(token) {
                    debug!(token, "Stale reconnect timer, ignoring");
                    return;
                }
                *timer = None;
            }
            this.ensure_connection();
        });
    }

    /// Stop reconnecting, close the link and fail everything in flight
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down backend connection");

        {
            let mut slot = self.slot.lock();
            // Dropping the writer makes the pump close the socket
            slot.writer = None;
            self.set_state(&mut slot, ConnectionState::Disconnected);
        }

        self.correlator
            .fail_all(RpcError::Disconnected("shutting down".into()));
    }

    fn set_state(&self, slot: &mut Slot, state: ConnectionState) {
        if slot.state != state {
            debug!(from = %slot.state, to = %state, "Connection state changed");
        }
        slot.state = state;
        self.state_tx.send_replace(state);
    }
}

impl EnvelopeSink for ConnectionManager {
    fn is_open(&self) -> bool {
        self.slot.lock().state == ConnectionState::Open
    }

    fn send_frame(&self, text: String) -> Result<SendAck, RpcError> {
        let slot = self.slot.lock();
        let writer = match (&slot.state, &slot.writer) {
            (ConnectionState::Open, Some(writer)) => writer,
            _ => return Err(RpcError::NotConnected),
        };

        let (ack, ack_rx) = oneshot::channel();
        writer
            .send(Outbound { text, ack })
            .map_err(|_| RpcError::NotConnected)?;
        Ok(ack_rx)
    }
}
