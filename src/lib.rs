//! # Henry HQ
//!
//! Backend for the Henry HQ personal dashboard: a Rust client for the
//! Clawdbot assistant gateway plus the HTTP API the dashboard UI talks to.
//!
//! ## Features
//!
//! - **Gateway RPC Client:** Single-shot correlated calls over WebSocket with
//!   a challenge-tolerant connect handshake
//! - **Streamed Replies:** Incremental assistant output folded into one final
//!   text per call
//! - **Dashboard API:** Axum routes for status, chat history, and the
//!   terminal
//! - **Layered Config:** Defaults, config file (JSON5/TOML), environment

pub mod config;
pub mod error;
pub mod gateway;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::GatewayClient;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
