//! Request and response envelopes

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UNKNOWN_ERROR_MESSAGE;

/// Named call parameters
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Request sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Correlation identifier, echoed back by the backend
    pub id: String,
    /// Opaque backend method name
    pub method: String,
    /// Call parameters (an empty object when the call has none)
    #[serde(default)]
    pub params: Params,
}

impl RequestEnvelope {
    /// Create a request for the given correlation id
    pub fn new(id: Uuid, method: impl Into<String>, params: Option<Params>) -> Self {
        Self {
            id: id.to_string(),
            method: method.into(),
            params: params.unwrap_or_default(),
        }
    }
}

/// Response received from the backend
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    /// Correlation identifier of the request this answers
    pub id: String,
    /// Either a result value or an error description
    pub outcome: ResponseOutcome,
}

impl ResponseEnvelope {
    /// Create a success response
    pub fn success(id: impl Into<String>, result: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            outcome: ResponseOutcome::Result(result),
        }
    }

    /// Create an error response
    pub fn failure(id: impl Into<String>, message: Option<String>) -> Self {
        Self {
            id: id.into(),
            outcome: ResponseOutcome::Error(RemoteError { message }),
        }
    }

    /// Whether this response carries an error
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ResponseOutcome::Error(_))
    }
}

/// Payload of a response envelope
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// The call succeeded with this value
    Result(serde_json::Value),
    /// The backend reported a failure
    Error(RemoteError),
}

/// Error description reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RemoteError {
    /// Message to surface to the caller
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(UNKNOWN_ERROR_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_new_defaults_params() {
        let id = Uuid::new_v4();
        let request = RequestEnvelope::new(id, "reset", None);

        assert_eq!(request.id, id.to_string());
        assert_eq!(request.method, "reset");
        assert!(request.params.is_empty());
    }

    #[test]
    fn test_request_new_keeps_params() {
        let mut params = Params::new();
        params.insert("count".into(), serde_json::json!(4));

        let request = RequestEnvelope::new(Uuid::new_v4(), "step", Some(params));
        assert_eq!(request.params["count"], 4);
    }

    #[test]
    fn test_remote_error_message_default() {
        let err = RemoteError { message: None };
        assert_eq!(err.message(), "unknown error");
    }

    #[test]
    fn test_remote_error_message_from_backend() {
        let err = RemoteError {
            message: Some("no ROM loaded".into()),
        };
        assert_eq!(err.message(), "no ROM loaded");
    }

    #[test]
    fn test_response_is_error() {
        assert!(ResponseEnvelope::failure("a", None).is_error());
        assert!(!ResponseEnvelope::success("a", serde_json::Value::Null).is_error());
    }
}
