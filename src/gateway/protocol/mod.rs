//! Gateway protocol
//!
//! Wire format and typed payloads for talking to the Clawdbot gateway,
//! following its WebSocket protocol:
//!
//! - **JSON frames** discriminated by a `type` field (`req`, `res`, `event`)
//! - **Request-response correlation** by frame id
//! - **Event streaming** for challenge delivery and chat output

pub mod schema;
pub mod types;

pub use schema::{parse_frame, ErrorShape, EventFrame, GatewayFrame, RequestFrame, ResponseFrame};
pub use types::{
    events, methods, scopes, ChatMessage, ChatSendParams, ClientInfo, ConnectAuth, ConnectParams,
    GatewayStatus, HistoryParams,
};
