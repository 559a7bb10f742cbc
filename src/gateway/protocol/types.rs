//! Gateway protocol types
//!
//! Connect handshake parameters and chat payload models for the Clawdbot
//! gateway, protocol revision 3.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::{PROTOCOL_MAX, PROTOCOL_MIN};

// ============================================================================
// Connect handshake
// ============================================================================

/// Params for the `connect` method
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    /// Lowest protocol revision the client accepts
    pub min_protocol: u32,
    /// Highest protocol revision the client accepts
    pub max_protocol: u32,
    /// Client identity
    pub client: ClientInfo,
    /// Requested role
    pub role: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Capabilities advertised by the client
    pub caps: Vec<String>,
    /// Commands advertised by the client
    pub commands: Vec<String>,
    /// Permissions map
    pub permissions: Value,
    /// Token auth; the token may be empty, the server decides
    pub auth: ConnectAuth,
    /// Client locale
    pub locale: String,
    /// User agent string
    pub user_agent: String,
}

/// Client identity advertised during connect
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client ID
    pub id: String,
    /// Client version
    pub version: String,
    /// Platform
    pub platform: String,
    /// Connection mode
    pub mode: String,
}

/// Token auth carried inside connect params
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectAuth {
    /// Shared token
    pub token: String,
}

impl ConnectParams {
    /// Identity used by the read-only status probe.
    pub fn status_probe(token: impl Into<String>) -> Self {
        Self::operator(
            "henry-hq-status-check",
            "operator",
            vec![scopes::OPERATOR_READ.to_string()],
            "henry-hq-status-check",
            token,
        )
    }

    /// Identity used by the read/write terminal chat client.
    pub fn webchat(token: impl Into<String>) -> Self {
        Self::operator(
            "webchat",
            "webchat",
            vec![
                scopes::OPERATOR_READ.to_string(),
                scopes::OPERATOR_WRITE.to_string(),
            ],
            "henry-hq-terminal",
            token,
        )
    }

    fn operator(
        client_id: &str,
        mode: &str,
        scopes: Vec<String>,
        agent_name: &str,
        token: impl Into<String>,
    ) -> Self {
        ConnectParams {
            min_protocol: PROTOCOL_MIN,
            max_protocol: PROTOCOL_MAX,
            client: ClientInfo {
                id: client_id.to_string(),
                version: crate::VERSION.to_string(),
                platform: "web".to_string(),
                mode: mode.to_string(),
            },
            role: "operator".to_string(),
            scopes,
            caps: Vec::new(),
            commands: Vec::new(),
            permissions: Value::Object(Default::default()),
            auth: ConnectAuth {
                token: token.into(),
            },
            locale: "en-AU".to_string(),
            user_agent: format!("{}/{}", agent_name, crate::VERSION),
        }
    }
}

// ============================================================================
// Chat operations
// ============================================================================

/// Params for `chat.send`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendParams {
    /// Message text
    pub message: String,
    /// Session the message belongs to
    pub session_key: String,
    /// Idempotency key, fresh per send
    pub idempotency_key: String,
}

/// Params for `chat.history`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    /// Session to read
    pub session_key: String,
    /// Maximum number of messages
    pub limit: u32,
    /// Whether tool calls are included
    pub include_tools: bool,
}

/// One message from session history.
///
/// The gateway's message shape varies across revisions; only the fields the
/// dashboard reads are modeled, each tolerantly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role, e.g. `user` or `assistant`
    #[serde(default)]
    pub role: String,
    /// Message content, either a plain string or an array of content blocks
    #[serde(default)]
    pub content: Value,
    /// Timestamp in whatever shape the gateway sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,
}

impl ChatMessage {
    /// Flatten string-or-blocks content into plain text.
    ///
    /// Block arrays contribute only their `text`-typed blocks; anything else
    /// renders as empty.
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            Value::Array(blocks) => blocks
                .iter()
                .filter_map(|block| {
                    if block.get("type").and_then(Value::as_str) != Some("text") {
                        return None;
                    }
                    block.get("text").and_then(Value::as_str)
                })
                .collect(),
            _ => String::new(),
        }
    }
}

/// Result of a successful status probe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    /// Agent info as reported by the gateway
    pub agent: Value,
    /// Active model name, `unknown` when the gateway does not report one
    pub model: String,
    /// When the probe connected
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// Method, event, and scope names
// ============================================================================

/// Methods this client sends
pub mod methods {
    /// Connect handshake
    pub const CONNECT: &str = "connect";
    /// Send a chat message
    pub const CHAT_SEND: &str = "chat.send";
    /// Fetch session history
    pub const CHAT_HISTORY: &str = "chat.history";
}

/// Events this client recognizes
pub mod events {
    /// Pre-connect challenge; connect is sent once this arrives
    pub const CONNECT_CHALLENGE: &str = "connect.challenge";
    /// Streamed chat content
    pub const CHAT: &str = "chat";
    /// Agent run lifecycle
    pub const AGENT: &str = "agent";
}

/// Operator scopes requested during connect
pub mod scopes {
    /// Read sessions and status
    pub const OPERATOR_READ: &str = "operator.read";
    /// Send messages
    pub const OPERATOR_WRITE: &str = "operator.write";
}
