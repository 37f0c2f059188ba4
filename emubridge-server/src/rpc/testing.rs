//! Channel-backed transport for exercising the RPC layer without sockets

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use emubridge_protocol::{decode_request, encode_response, RequestEnvelope, ResponseEnvelope};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;

use super::transport::{Connector, Link, Outbound};
use super::{ConnectionState, RpcClient, RpcError};
use crate::config::BackendConfig;

/// Connector that hands each successful link's far end to the test
pub(crate) struct FakeConnector {
    attempts: AtomicUsize,
    refuse: AtomicBool,
    links_tx: mpsc::UnboundedSender<FakeBackend>,
}

impl FakeConnector {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<FakeBackend>) {
        let (links_tx, links_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            attempts: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            links_tx,
        });
        (connector, links_rx)
    }

    /// Connect attempts so far, successful or not
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Make subsequent attempts fail
    pub(crate) fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

impl Connector for FakeConnector {
    fn connect(&self, _url: &str) -> BoxFuture<'static, Result<Link, RpcError>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return async { Err(RpcError::Transport("connection refused".into())) }.boxed();
        }

        let (outgoing, requests) = mpsc::unbounded_channel();
        let (responses, incoming) = mpsc::unbounded_channel();
        let _ = self.links_tx.send(FakeBackend {
            requests,
            responses,
        });

        async move { Ok(Link { outgoing, incoming }) }.boxed()
    }
}

/// Far end of a fake link; dropping it closes the connection
pub(crate) struct FakeBackend {
    requests: mpsc::UnboundedReceiver<Outbound>,
    responses: mpsc::UnboundedSender<String>,
}

impl FakeBackend {
    /// Next raw outbound frame, left unacknowledged
    pub(crate) async fn next_outbound(&mut self) -> Outbound {
        self.requests.recv().await.expect("link closed")
    }

    /// Next request, acknowledged as written
    pub(crate) async fn next_request(&mut self) -> RequestEnvelope {
        let Outbound { text, ack } = self.next_outbound().await;
        let _ = ack.send(Ok(()));
        decode_request(&text).expect("client sent an undecodable request")
    }

    pub(crate) fn reply(&self, id: impl Into<String>, result: Value) {
        let frame = encode_response(&ResponseEnvelope::success(id, result)).unwrap();
        self.send_raw(&frame);
    }

    pub(crate) fn reply_error(&self, id: impl Into<String>, message: Option<&str>) {
        let response = ResponseEnvelope::failure(id, message.map(str::to_string));
        let frame = encode_response(&response).unwrap();
        self.send_raw(&frame);
    }

    pub(crate) fn send_raw(&self, frame: &str) {
        let _ = self.responses.send(frame.to_string());
    }
}

/// Backend settings with fast, deterministic timing
pub(crate) fn test_backend_config() -> BackendConfig {
    BackendConfig {
        url: "ws://fake.invalid:1".into(),
        ..BackendConfig::default()
    }
}

pub(crate) async fn wait_for_state(client: &RpcClient, wanted: ConnectionState) {
    let mut state_rx = client.subscribe_state();
    state_rx
        .wait_for(|state| *state == wanted)
        .await
        .expect("state channel closed");
}

/// Client connected to a fresh fake backend
pub(crate) async fn open_client(
    config: &BackendConfig,
) -> (
    RpcClient,
    Arc<FakeConnector>,
    mpsc::UnboundedReceiver<FakeBackend>,
    FakeBackend,
) {
    let (connector, mut links) = FakeConnector::new();
    let client = RpcClient::with_connector(config, connector.clone());
    client.connect();

    let backend = links.recv().await.expect("no link established");
    wait_for_state(&client, ConnectionState::Open).await;
    (client, connector, links, backend)
}
