//! Gateway protocol schema
//!
//! Defines the wire format for gateway frames. Every message on the socket
//! is a JSON object discriminated by its `type` field.

use serde::{Deserialize, Serialize};

/// Lowest gateway protocol revision this client accepts
pub const PROTOCOL_MIN: u32 = 3;

/// Highest gateway protocol revision this client accepts
pub const PROTOCOL_MAX: u32 = 3;

/// Gateway frame - Top-level message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayFrame {
    /// Request from client
    #[serde(rename = "req")]
    Request(RequestFrame),
    /// Response from server, correlated to a request by id
    #[serde(rename = "res")]
    Response(ResponseFrame),
    /// Event pushed by server
    #[serde(rename = "event")]
    Event(EventFrame),
}

/// Request frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation ID, fresh per request
    pub id: String,
    /// Method name
    pub method: String,
    /// Parameters
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Correlation ID of the request this answers
    pub id: String,
    /// Whether the request was accepted
    #[serde(default)]
    pub ok: bool,
    /// Result payload; failed responses may carry failure detail here too
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    /// Error details (failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

/// Event frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name, e.g. `connect.challenge`, `chat`, `agent`
    pub event: String,
    /// Event payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Error details carried by a failed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    /// Machine-readable code
    #[serde(default)]
    pub code: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
    /// Additional detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RequestFrame {
    /// Create a new request frame
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: serde_json::Value) -> Self {
        RequestFrame {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

impl ResponseFrame {
    /// Create a success response
    pub fn success(id: impl Into<String>, payload: serde_json::Value) -> Self {
        ResponseFrame {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Create an error response
    pub fn error(id: impl Into<String>, error: ErrorShape) -> Self {
        ResponseFrame {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}

impl EventFrame {
    /// Create a new event
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        EventFrame {
            event: event.into(),
            payload: Some(payload),
        }
    }
}

impl ErrorShape {
    /// Create a new error shape
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorShape {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

/// Parse one inbound message tolerantly.
///
/// Unknown frame types and malformed JSON yield `None`; the caller discards
/// them rather than failing the call.
pub fn parse_frame(text: &str) -> Option<GatewayFrame> {
    serde_json::from_str(text).ok()
}
