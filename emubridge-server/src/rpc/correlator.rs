//! Request/response correlation
//!
//! Every outbound call gets a fresh UUID and an entry in the pending set. The
//! entry owns the call's completion sender, so whichever path removes it
//! (response, timeout, disconnect, or the caller going away) is the only one
//! able to settle the call.

use std::collections::HashMap;
use std::time::Duration;

use emubridge_protocol::{encode_request, Params, RequestEnvelope, ResponseEnvelope, ResponseOutcome};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::error::RpcError;
use super::transport::SendAck;

/// Where encoded request frames are written
pub trait EnvelopeSink: Send + Sync {
    /// Whether a connection is currently open
    fn is_open(&self) -> bool;

    /// Queue one frame for transmission
    ///
    /// The returned receiver reports whether the frame reached the socket.
    fn send_frame(&self, text: String) -> Result<SendAck, RpcError>;
}

/// Whole milliseconds in a duration, saturating at `u64::MAX`
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A call awaiting its response
struct PendingCall {
    method: String,
    completion: oneshot::Sender<Result<Value, RpcError>>,
}

/// Tracks in-flight calls and routes responses back to their callers
#[derive(Default)]
pub struct CallCorrelator {
    pending: Mutex<HashMap<Uuid, PendingCall>>,
}

/// Removes a pending entry when the call future finishes or is dropped
struct PendingGuard<'a> {
    pending: &'a Mutex<HashMap<Uuid, PendingCall>>,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

impl CallCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a call and wait for its outcome
    ///
    /// Fails immediately with [`RpcError::NotConnected`] when the sink is not
    /// open; in that case nothing is registered and no frame is sent.
    pub async fn call(
        &self,
        sink: &dyn EnvelopeSink,
        method: &str,
        params: Option<Params>,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        if !sink.is_open() {
            return Err(RpcError::NotConnected);
        }

        let id = Uuid::new_v4();
        let request = RequestEnvelope::new(id, method, params);
        let frame = encode_request(&request).map_err(|e| RpcError::Transport(e.to_string()))?;

        let (completion, rx) = oneshot::channel();
        self.pending.lock().insert(
            id,
            PendingCall {
                method: method.to_string(),
                completion,
            },
        );
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        trace!(%id, method, "Sending backend request");
        let ack = sink.send_frame(frame)?;

        let outcome = tokio::time::timeout(timeout, async {
            // A dropped ack means the link went away; the disconnect path
            // settles the call in that case.
            if let Ok(Err(e)) = ack.await {
                return Err(e);
            }
            rx.await
                .unwrap_or_else(|_| Err(RpcError::Disconnected("call abandoned".into())))
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = millis(timeout);
                warn!(%id, method, timeout_ms, "Backend call timed out");
                Err(RpcError::Timeout {
                    method: method.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    /// Settle the pending call a response belongs to
    ///
    /// Returns false when no pending call matches; such responses are ignored.
    pub fn on_response(&self, response: ResponseEnvelope) -> bool {
        let Ok(id) = Uuid::parse_str(&response.id) else {
            debug!(id = %response.id, "Ignoring response with foreign id");
            return false;
        };

        let Some(call) = self.pending.lock().remove(&id) else {
            debug!(%id, "Ignoring response for unknown or settled call");
            return false;
        };

        let outcome = match response.outcome {
            ResponseOutcome::Result(value) => Ok(value),
            ResponseOutcome::Error(err) => Err(RpcError::Remote(err.message().to_string())),
        };
        trace!(%id, method = %call.method, ok = outcome.is_ok(), "Backend response matched");
        let _ = call.completion.send(outcome);
        true
    }

    /// Reject every pending call with the same error
    pub fn fail_all(&self, reason: RpcError) -> usize {
        let drained: Vec<PendingCall> = self.pending.lock().drain().map(|(_, call)| call).collect();
        let count = drained.len();
        if count > 0 {
            debug!(count, reason = %reason, "Failing pending backend calls");
        }
        for call in drained {
            let _ = call.completion.send(Err(reason.clone()));
        }
        count
    }

    /// Number of calls awaiting a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
