//! Configuration types
//!
//! Core configuration types for Henry HQ: the gateway connection and the
//! dashboard HTTP server.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Clawdbot gateway connection
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Dashboard HTTP server
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gateway: GatewayConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    ///
    /// Layered precedence: defaults, then the config file (if present), then
    /// environment variable overrides.
    pub fn from_env() -> crate::error::Result<Self> {
        crate::config::load_config()
    }
}

/// Gateway connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket endpoint of the Clawdbot gateway
    #[serde(default = "default_gateway_url")]
    pub url: String,
    /// Operator token. May be empty; the gateway decides whether to accept
    /// anonymous local clients.
    #[serde(skip_serializing, default = "default_secret")]
    pub token: SecretString,
    /// Deadline for a status probe, including connection establishment
    #[serde(with = "humantime_serde", default = "default_status_timeout")]
    pub status_timeout: Duration,
    /// Deadline for a history fetch
    #[serde(with = "humantime_serde", default = "default_history_timeout")]
    pub history_timeout: Duration,
    /// Deadline for a send call, covering the whole streamed reply
    #[serde(with = "humantime_serde", default = "default_send_timeout")]
    pub send_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            url: default_gateway_url(),
            token: default_secret(),
            status_timeout: default_status_timeout(),
            history_timeout: default_history_timeout(),
            send_timeout: default_send_timeout(),
        }
    }
}

impl GatewayConfig {
    /// Whether a non-empty token is configured.
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().is_empty()
    }
}

fn default_gateway_url() -> String {
    "ws://127.0.0.1:18789".to_string()
}

fn default_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_status_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_history_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Dashboard HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}
