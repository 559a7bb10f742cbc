//! Gateway transport
//!
//! The duplex text-message channel one call runs over. `WsTransport` is the
//! real WebSocket transport; unit tests substitute scripted transports
//! through the `Transport` trait.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Error, Result};
use crate::gateway::redact_token;

/// One duplex text-message channel to the gateway.
///
/// A transport is owned by exactly one call for its whole lifetime and is
/// closed once that call settles.
#[async_trait]
pub trait Transport: Send {
    /// Send one outbound text message.
    async fn send(&mut self, text: String) -> Result<()>;

    /// Receive the next inbound text message.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection. Non-text
    /// messages are skipped.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Close the connection. Close failures are swallowed; the call already
    /// has its result by the time this runs.
    async fn close(&mut self);
}

/// WebSocket transport to the Clawdbot gateway
pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Open a WebSocket connection to `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        let (inner, _) = connect_async(url).await.map_err(|err| {
            Error::Connection(format!("{err}. Is Clawdbot running?"))
        })?;
        debug!(url = %redact_token(url), "gateway connection open");
        Ok(WsTransport { inner })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.inner.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        while let Some(message) = self.inner.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(text.to_string())),
                Message::Close(_) => return Ok(None),
                // Ping/pong are answered by tungstenite itself; this protocol
                // has no binary frames.
                _ => continue,
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
