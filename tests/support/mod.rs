//! Scripted in-process gateway for integration tests.
//!
//! Binds a real WebSocket listener on an ephemeral port and replays a fixed
//! script against every connection, so the tests drive the production
//! transport end to end. Responses echo the correlation id of whatever
//! request the client actually sent.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use henry_hq::config::GatewayConfig;
use secrecy::SecretString;

/// One step of a scripted gateway conversation, executed in order.
#[derive(Clone, Debug)]
pub enum Step {
    /// Emit an event frame.
    Event(&'static str, Value),
    /// Await the next request frame and answer it, echoing its id.
    Respond {
        ok: bool,
        payload: Option<Value>,
        error: Option<Value>,
    },
    /// Await the next request frame and leave it unanswered.
    Swallow,
    /// Close the connection.
    Close,
    /// Wait before the next step.
    Pause(Duration),
}

impl Step {
    pub fn ack(payload: Value) -> Self {
        Step::Respond {
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn reject(message: &str) -> Self {
        Step::Respond {
            ok: false,
            payload: None,
            error: Some(json!({ "message": message })),
        }
    }
}

/// In-process gateway replaying one script per accepted connection.
pub struct MockGateway {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<Value>>>,
    accept_loop: JoinHandle<()>,
}

impl MockGateway {
    pub async fn spawn(script: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock gateway");
        let addr = listener.local_addr().expect("mock gateway addr");
        let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let script = script.clone();
                let sink = sink.clone();
                tokio::spawn(async move {
                    let _ = serve_connection(stream, script, sink).await;
                });
            }
        });

        MockGateway {
            addr,
            received,
            accept_loop,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Every frame the gateway has received so far, oldest first.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// Methods of the received request frames, in arrival order.
    pub fn received_methods(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|frame| frame["method"].as_str().map(str::to_string))
            .collect()
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

/// Gateway config pointed at the mock, with timeouts short enough for tests.
pub fn gateway_config(url: &str) -> GatewayConfig {
    GatewayConfig {
        url: url.to_string(),
        token: SecretString::from("integration-token".to_string()),
        status_timeout: Duration::from_millis(900),
        history_timeout: Duration::from_millis(900),
        send_timeout: Duration::from_secs(3),
    }
}

async fn serve_connection(
    stream: TcpStream,
    script: Vec<Step>,
    sink: Arc<Mutex<Vec<Value>>>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;

    for step in script {
        match step {
            Step::Event(event, payload) => {
                let frame = json!({ "type": "event", "event": event, "payload": payload });
                ws.send(Message::Text(frame.to_string().into())).await?;
            }
            Step::Respond { ok, payload, error } => {
                let Some(request) = next_request(&mut ws, &sink).await? else {
                    return Ok(());
                };
                let mut frame = json!({ "type": "res", "id": request["id"], "ok": ok });
                if let Some(payload) = payload {
                    frame["payload"] = payload;
                }
                if let Some(error) = error {
                    frame["error"] = error;
                }
                ws.send(Message::Text(frame.to_string().into())).await?;
            }
            Step::Swallow => {
                if next_request(&mut ws, &sink).await?.is_none() {
                    return Ok(());
                }
            }
            Step::Close => {
                let _ = ws.close(None).await;
                return Ok(());
            }
            Step::Pause(duration) => {
                tokio::time::sleep(duration).await;
            }
        }
    }

    // Script done; keep reading until the client hangs up so its close
    // handshake does not error.
    while let Some(message) = ws.next().await {
        match message? {
            Message::Text(text) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    sink.lock().unwrap().push(value);
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

async fn next_request(
    ws: &mut WebSocketStream<TcpStream>,
    sink: &Arc<Mutex<Vec<Value>>>,
) -> Result<Option<Value>, tokio_tungstenite::tungstenite::Error> {
    while let Some(message) = ws.next().await {
        match message? {
            Message::Text(text) => {
                if let Ok(value) = serde_json::from_str::<Value>(&text) {
                    sink.lock().unwrap().push(value.clone());
                    return Ok(Some(value));
                }
            }
            Message::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}
