//! emubridge-protocol: Wire definitions for backend communication
//!
//! This crate defines the envelopes exchanged with the emulator backend over
//! its persistent WebSocket connection, and the JSON text codec used to turn
//! them into frames.
//!
//! Every frame is a standalone JSON object:
//!
//! - request: `{"id": "...", "method": "...", "params": {...}}`
//! - success: `{"id": "...", "result": <any>}`
//! - failure: `{"id": "...", "error": {"message": "..."}}`

pub mod codec;
pub mod envelope;

// Re-export main types at crate root
pub use codec::{decode_request, decode_response, encode_request, encode_response, CodecError};
pub use envelope::{Params, RemoteError, RequestEnvelope, ResponseEnvelope, ResponseOutcome};

/// Default backend address when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "ws://localhost:8765";

/// Message used when the backend sends an error envelope without a message
pub const UNKNOWN_ERROR_MESSAGE: &str = "unknown error";
