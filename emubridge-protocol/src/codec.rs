//! JSON text codec for backend frames

use serde_json::Value;

use crate::envelope::{RemoteError, RequestEnvelope, ResponseEnvelope, ResponseOutcome};

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame is not valid JSON
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Frame is JSON but not an envelope
    #[error("Invalid envelope: {0}")]
    InvalidShape(String),

    /// Envelope could not be serialized
    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Serialize a request into a text frame
pub fn encode_request(request: &RequestEnvelope) -> Result<String, CodecError> {
    serde_json::to_string(request).map_err(CodecError::Encode)
}

/// Parse a request text frame (backend side)
pub fn decode_request(text: &str) -> Result<RequestEnvelope, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(CodecError::Malformed)?;
    serde_json::from_value(value).map_err(|e| CodecError::InvalidShape(e.to_string()))
}

/// Serialize a response into a text frame (backend side)
pub fn encode_response(response: &ResponseEnvelope) -> Result<String, CodecError> {
    let value = match &response.outcome {
        ResponseOutcome::Result(result) => serde_json::json!({
            "id": response.id,
            "result": result,
        }),
        ResponseOutcome::Error(error) => serde_json::json!({
            "id": response.id,
            "error": error,
        }),
    };
    serde_json::to_string(&value).map_err(CodecError::Encode)
}

/// Parse a response text frame
///
/// The `error` member wins over `result` when both are present. Error members
/// that are falsy (`null`, `false`, `0`, `""`) count as absent, matching how
/// backends written in loosely typed languages emit them. A missing `result`
/// decodes as `null`.
pub fn decode_response(text: &str) -> Result<ResponseEnvelope, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(CodecError::Malformed)?;

    let Value::Object(mut object) = value else {
        return Err(CodecError::InvalidShape("expected a JSON object".into()));
    };

    let id = match object.remove("id") {
        Some(Value::String(id)) => id,
        Some(other) => {
            return Err(CodecError::InvalidShape(format!(
                "id must be a string, got {}",
                type_name(&other)
            )))
        }
        None => return Err(CodecError::InvalidShape("missing id".into())),
    };

    let outcome = match object.remove("error") {
        Some(error) if is_truthy(&error) => {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(String::from);
            ResponseOutcome::Error(RemoteError { message })
        }
        _ => ResponseOutcome::Result(object.remove("result").unwrap_or(Value::Null)),
    };

    Ok(ResponseEnvelope { id, outcome })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
