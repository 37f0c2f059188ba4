//! Transport seam between the connection manager and the socket
//!
//! A [`Connector`] opens one connection and hands back a [`Link`]: a pair of
//! channels owned by a background I/O task. The link is closed when its
//! `incoming` channel ends.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::error::RpcError;

/// Upper bound on the WebSocket handshake
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Acknowledgement for one outbound frame
pub type SendAck = oneshot::Receiver<Result<(), RpcError>>;

/// One outbound text frame and the channel its send result goes to
#[derive(Debug)]
pub struct Outbound {
    pub text: String,
    pub ack: oneshot::Sender<Result<(), RpcError>>,
}

/// An established connection, seen as channels
#[derive(Debug)]
pub struct Link {
    /// Frames to transmit
    pub outgoing: mpsc::UnboundedSender<Outbound>,
    /// Inbound text frames; `None` from `recv` means the link closed
    pub incoming: mpsc::UnboundedReceiver<String>,
}

/// Opens connections to the backend
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, RpcError>>;
}

/// WebSocket ping schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between pings
    pub interval: Duration,
    /// Silence after which the link is considered dead
    pub timeout: Duration,
}

/// Production connector over `tokio-tungstenite`
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    heartbeat: Option<HeartbeatConfig>,
}

impl WsConnector {
    pub fn new(heartbeat: Option<HeartbeatConfig>) -> Self {
        Self { heartbeat }
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Link, RpcError>> {
        let url = url.to_string();
        let heartbeat = self.heartbeat;

        async move {
            let (ws, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()))
                .await
                .map_err(|_| {
                    RpcError::Transport(format!(
                        "handshake with {} timed out after {}s",
                        url,
                        CONNECT_TIMEOUT.as_secs()
                    ))
                })?
                .map_err(|e| RpcError::Transport(e.to_string()))?;

            let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
            let (incoming_tx, incoming) = mpsc::unbounded_channel();

            tokio::spawn(run_pump(ws, outgoing_rx, incoming_tx, heartbeat));

            Ok(Link { outgoing, incoming })
        }
        .boxed()
    }
}

/// Shuttle frames between the socket and the link channels until either side ends
async fn run_pump(
    ws: WsStream,
    mut outgoing: mpsc::UnboundedReceiver<Outbound>,
    incoming: mpsc::UnboundedSender<String>,
    heartbeat: Option<HeartbeatConfig>,
) {
    let (mut sink, mut stream) = ws.split();
    let mut last_seen = Instant::now();
    let mut ticker = heartbeat.map(|hb| {
        let mut interval = tokio::time::interval_at(Instant::now() + hb.interval, hb.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            frame = outgoing.recv() => {
                let Some(Outbound { text, ack }) = frame else {
                    debug!("Link dropped by owner, closing socket");
                    let _ = sink.close().await;
                    break;
                };
                match sink.send(WsMessage::Text(text.into())).await {
                    Ok(()) => {
                        let _ = ack.send(Ok(()));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to write frame to backend");
                        let _ = ack.send(Err(RpcError::Transport(e.to_string())));
                        break;
                    }
                }
            }

            message = stream.next() => {
                match message {
                    Some(Ok(WsMessage::Text(text))) => {
                        last_seen = Instant::now();
                        if incoming.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        last_seen = Instant::now();
                        match String::from_utf8(data.to_vec()) {
                            Ok(text) => {
                                if incoming.send(text).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "Dropping non UTF-8 binary frame"),
                        }
                    }
                    // tungstenite queues the pong reply itself
                    Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {
                        last_seen = Instant::now();
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(frame = ?frame, "Backend closed the connection");
                        break;
                    }
                    Some(Ok(WsMessage::Frame(_))) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Failed to read from backend");
                        break;
                    }
                    None => break,
                }
            }

            _ = next_tick(&mut ticker) => {
                if let Some(hb) = heartbeat {
                    if last_seen.elapsed() > hb.timeout {
                        warn!(
                            silent_ms = last_seen.elapsed().as_millis() as u64,
                            "Heartbeat timeout exceeded, dropping connection"
                        );
                        break;
                    }
                }
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    warn!(error = %e, "Failed to send heartbeat ping");
                    break;
                }
                debug!("Heartbeat ping sent");
            }
        }
    }

    debug!("Socket pump exiting");
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
