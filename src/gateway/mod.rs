//! Gateway module - RPC client for the Clawdbot control plane
//!
//! Henry HQ never talks to the assistant directly; everything flows through
//! the local Clawdbot gateway's WebSocket control plane.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Clawdbot Gateway                     │
//! │              ws://127.0.0.1:18789                   │
//! └───────────────────────┬─────────────────────────────┘
//!                         │ one connection per call
//!           ┌─────────────┼─────────────┐
//!           │             │             │
//!           ▼             ▼             ▼
//!      ┌─────────┐   ┌─────────┐   ┌─────────┐
//!      │ Status  │   │ History │   │  Send   │
//!      │  probe  │   │  fetch  │   │ message │
//!      └─────────┘   └─────────┘   └─────────┘
//! ```
//!
//! Each operation dials a fresh connection, performs the shared connect
//! handshake, runs exactly one request, and closes. There is no pooling and
//! no retry; concurrent callers are isolated by construction.

pub mod client;
pub mod protocol;
pub mod stream;
pub mod transport;

pub use client::GatewayClient;
pub use protocol::{ChatMessage, GatewayStatus};
pub use transport::{Transport, WsTransport};

/// Redact any `token=` query value in a gateway URL for display.
///
/// The token must never reach logs or HTTP responses in the clear.
pub fn redact_token(url: &str) -> String {
    let Some(start) = url.find("token=") else {
        return url.to_string();
    };
    let value_start = start + "token=".len();
    let value_end = url[value_start..]
        .find('&')
        .map(|offset| value_start + offset)
        .unwrap_or(url.len());
    if value_end == value_start {
        return url.to_string();
    }
    format!("{}***{}", &url[..value_start], &url[value_end..])
}
