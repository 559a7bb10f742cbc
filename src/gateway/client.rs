//! Gateway RPC client
//!
//! One operation per invocation: every call dials a fresh connection,
//! performs the connect handshake, runs exactly one correlated request, folds
//! any streamed output into a single result, and closes the socket. A global
//! deadline covers the whole call including connection establishment.
//!
//! The handshake tolerates both gateway generations with one code path:
//! servers that emit a `connect.challenge` event before accepting requests,
//! and servers that expect connect immediately. The client waits a short
//! readiness grace for a challenge and sends connect on whichever comes
//! first, never more than once.

use std::time::Duration;

use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use tokio::time::{sleep, sleep_until, timeout_at, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::gateway::protocol::{
    events, methods, parse_frame, ChatMessage, ChatSendParams, ConnectParams, GatewayFrame,
    GatewayStatus, HistoryParams, RequestFrame, ResponseFrame,
};
use crate::gateway::stream::{scan_event, Settle, StreamAction};
use crate::gateway::transport::{Transport, WsTransport};

/// How long to wait after the socket opens for a `connect.challenge` before
/// sending connect unprompted. Challenging gateways emit the event right
/// after accepting the socket, so this stays short.
const CHALLENGE_GRACE: Duration = Duration::from_millis(250);

/// How long to keep draining trailing deltas after an agent lifecycle
/// completion.
const COMPLETION_DRAIN: Duration = Duration::from_millis(500);

/// Session key the terminal sends under.
const WEBCHAT_SESSION: &str = "webchat";

/// Reply when the send ack already carried the final state and nothing
/// streamed.
const SENT_FALLBACK: &str = "Message sent to Henry.";

/// Reply when the stream completed without any recognizable text.
const PROCESSED_FALLBACK: &str = "Henry processed your message.";

/// Single-shot RPC client for the Clawdbot gateway.
///
/// Cheap to clone; carries no connection state. Concurrent operations each
/// dial their own connection and never share one.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
}

impl GatewayClient {
    /// Create a client for the configured gateway.
    pub fn new(config: GatewayConfig) -> Self {
        GatewayClient { config }
    }

    /// The configured gateway endpoint.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Probe the gateway: connect, authenticate, and report the agent and
    /// model info carried on the handshake ack.
    pub async fn check_status(&self) -> Result<GatewayStatus> {
        let deadline = Instant::now() + self.config.status_timeout;
        let mut transport = self.dial(deadline).await?;
        match run_call(&mut transport, Operation::Status, &self.config, deadline).await? {
            Outcome::Status(status) => Ok(status),
            outcome => Err(mismatched(outcome)),
        }
    }

    /// Fetch recent messages for one session.
    pub async fn fetch_history(&self, session_key: &str, limit: u32) -> Result<Vec<ChatMessage>> {
        let deadline = Instant::now() + self.config.history_timeout;
        let mut transport = self.dial(deadline).await?;
        let op = Operation::History {
            session_key: session_key.to_string(),
            limit,
        };
        match run_call(&mut transport, op, &self.config, deadline).await? {
            Outcome::History(messages) => Ok(messages),
            outcome => Err(mismatched(outcome)),
        }
    }

    /// Send a message to Henry and wait for the complete streamed reply.
    pub async fn send_message(&self, text: &str) -> Result<String> {
        let deadline = Instant::now() + self.config.send_timeout;
        let mut transport = self.dial(deadline).await?;
        let op = Operation::Send {
            text: text.to_string(),
        };
        match run_call(&mut transport, op, &self.config, deadline).await? {
            Outcome::Text(reply) => Ok(reply),
            outcome => Err(mismatched(outcome)),
        }
    }

    async fn dial(&self, deadline: Instant) -> Result<WsTransport> {
        match timeout_at(deadline, WsTransport::connect(&self.config.url)).await {
            Ok(transport) => transport,
            Err(_) => Err(Error::Timeout("gateway connection timed out".to_string())),
        }
    }
}

fn mismatched(outcome: Outcome) -> Error {
    Error::Internal(format!("call settled with a mismatched outcome: {outcome:?}"))
}

/// The one request a call performs after the shared handshake.
#[derive(Debug, Clone)]
enum Operation {
    Status,
    History { session_key: String, limit: u32 },
    Send { text: String },
}

/// Terminal value of a call before operation-specific unwrapping.
#[derive(Debug)]
enum Outcome {
    Status(GatewayStatus),
    History(Vec<ChatMessage>),
    Text(String),
}

/// Where a call stands between dial and settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Socket open, connect not sent yet. Left on challenge arrival or
    /// readiness grace expiry.
    AwaitingChallenge,
    /// Connect sent, ack pending.
    Handshaking,
    /// Operation request sent, response or stream pending.
    OperationInFlight,
}

/// Mutable state of the single pending call on a connection.
struct PendingCall {
    phase: Phase,
    /// Correlation id of the connect request.
    connect_id: String,
    /// Correlation id of the operation request, once sent.
    request_id: Option<String>,
    /// Streamed reply text in arrival order.
    acc: String,
}

impl PendingCall {
    fn new() -> Self {
        PendingCall {
            phase: Phase::AwaitingChallenge,
            connect_id: new_call_id(),
            request_id: None,
            acc: String::new(),
        }
    }
}

/// What woke the call loop.
enum Wake {
    /// The readiness grace expired without a challenge.
    Readiness,
    /// The call deadline elapsed.
    Deadline,
    /// One inbound message, or `None` on peer close.
    Inbound(Option<String>),
}

/// Drive one operation to its terminal action over an open transport.
///
/// The transport is closed on every path, exactly once, before the result is
/// returned.
async fn run_call<T: Transport>(
    transport: &mut T,
    op: Operation,
    config: &GatewayConfig,
    deadline: Instant,
) -> Result<Outcome> {
    let mut call = PendingCall::new();
    let result = drive(transport, &mut call, &op, config, deadline).await;
    transport.close().await;
    result
}

async fn drive<T: Transport>(
    transport: &mut T,
    call: &mut PendingCall,
    op: &Operation,
    config: &GatewayConfig,
    deadline: Instant,
) -> Result<Outcome> {
    let expiry = sleep_until(deadline);
    tokio::pin!(expiry);
    let readiness = sleep(CHALLENGE_GRACE);
    tokio::pin!(readiness);

    loop {
        let wake = tokio::select! {
            _ = &mut readiness, if call.phase == Phase::AwaitingChallenge => Wake::Readiness,
            _ = &mut expiry => Wake::Deadline,
            inbound = transport.recv() => Wake::Inbound(inbound?),
        };

        match wake {
            Wake::Readiness => send_connect(transport, call, op, config).await?,
            Wake::Deadline => return settle_on_deadline(op, call),
            Wake::Inbound(None) => return settle_on_close(op, call),
            Wake::Inbound(Some(text)) => {
                let Some(frame) = parse_frame(&text) else {
                    debug!("discarding unparseable gateway frame");
                    continue;
                };
                match frame {
                    GatewayFrame::Event(event) => {
                        let payload = event.payload.unwrap_or(Value::Null);
                        if call.phase == Phase::AwaitingChallenge
                            && event.event == events::CONNECT_CHALLENGE
                        {
                            send_connect(transport, call, op, config).await?;
                        } else if call.phase == Phase::OperationInFlight {
                            if let Some(outcome) =
                                apply_stream_event(transport, call, op, &event.event, &payload, deadline)
                                    .await
                            {
                                return Ok(outcome);
                            }
                        }
                    }
                    GatewayFrame::Response(res) => {
                        if let Some(outcome) =
                            handle_response(transport, call, op, config, res).await?
                        {
                            return Ok(outcome);
                        }
                    }
                    // Servers do not issue requests to this client.
                    GatewayFrame::Request(_) => {}
                }
            }
        }
    }
}

/// Send the connect request. Runs at most once per call; both the challenge
/// and the readiness grace funnel through here, and the phase change
/// disarms whichever trigger did not fire.
async fn send_connect<T: Transport>(
    transport: &mut T,
    call: &mut PendingCall,
    op: &Operation,
    config: &GatewayConfig,
) -> Result<()> {
    let token = config.token.expose_secret();
    let params = match op {
        Operation::Status => ConnectParams::status_probe(token),
        Operation::History { .. } | Operation::Send { .. } => ConnectParams::webchat(token),
    };
    send_request(
        transport,
        &call.connect_id,
        methods::CONNECT,
        serde_json::to_value(&params)?,
    )
    .await?;
    call.phase = Phase::Handshaking;
    Ok(())
}

async fn send_request<T: Transport>(
    transport: &mut T,
    id: &str,
    method: &str,
    params: Value,
) -> Result<()> {
    let frame = GatewayFrame::Request(RequestFrame::new(id, method, params));
    debug!(method, id, "sending gateway request");
    transport.send(serde_json::to_string(&frame)?).await
}

/// Handle a response frame. Responses that do not match the pending request
/// id for the current phase are dropped.
async fn handle_response<T: Transport>(
    transport: &mut T,
    call: &mut PendingCall,
    op: &Operation,
    config: &GatewayConfig,
    res: ResponseFrame,
) -> Result<Option<Outcome>> {
    if call.phase == Phase::Handshaking && res.id == call.connect_id {
        if !res.ok {
            let reason = failure_reason(&res)
                .unwrap_or_else(|| "gateway rejected the connect handshake".to_string());
            return Err(Error::Auth(reason));
        }
        debug!("gateway handshake accepted");
        return match op {
            Operation::Status => {
                let payload = res.payload.unwrap_or(Value::Null);
                Ok(Some(Outcome::Status(status_from_payload(&payload))))
            }
            Operation::History { session_key, limit } => {
                let id = new_call_id();
                let params = HistoryParams {
                    session_key: session_key.clone(),
                    limit: *limit,
                    include_tools: false,
                };
                send_request(
                    transport,
                    &id,
                    methods::CHAT_HISTORY,
                    serde_json::to_value(&params)?,
                )
                .await?;
                call.request_id = Some(id);
                call.phase = Phase::OperationInFlight;
                Ok(None)
            }
            Operation::Send { text } => {
                let id = new_call_id();
                let params = ChatSendParams {
                    message: text.clone(),
                    session_key: WEBCHAT_SESSION.to_string(),
                    idempotency_key: new_call_id(),
                };
                send_request(
                    transport,
                    &id,
                    methods::CHAT_SEND,
                    serde_json::to_value(&params)?,
                )
                .await?;
                call.request_id = Some(id);
                call.phase = Phase::OperationInFlight;
                Ok(None)
            }
        };
    }

    if call.phase == Phase::OperationInFlight && call.request_id.as_deref() == Some(res.id.as_str())
    {
        return match op {
            Operation::Status => Ok(None),
            Operation::History { .. } => {
                if !res.ok {
                    let reason = failure_reason(&res)
                        .unwrap_or_else(|| "failed to fetch history".to_string());
                    return Err(Error::Request(reason));
                }
                let payload = res.payload.unwrap_or(Value::Null);
                Ok(Some(Outcome::History(messages_from_payload(&payload))))
            }
            Operation::Send { .. } => {
                if !res.ok {
                    // chat.send rejections describe themselves on the
                    // payload rather than the error shape.
                    let reason = res
                        .payload
                        .as_ref()
                        .and_then(|payload| payload.get("message"))
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| failure_reason(&res))
                        .unwrap_or_else(|| "chat.send failed".to_string());
                    return Err(Error::Request(reason));
                }
                // An ack that already carries the final state settles the
                // call; an ack with a run id means a stream follows.
                if let Some(payload) = res.payload.as_ref() {
                    let settled = payload.get("status").and_then(Value::as_str) == Some("ok")
                        && !payload.get("runId").map(is_truthy).unwrap_or(false);
                    if settled {
                        return Ok(Some(Outcome::Text(final_text(&call.acc, SENT_FALLBACK))));
                    }
                }
                Ok(None)
            }
        };
    }

    Ok(None)
}

/// Fold one stream event into the pending send. Other operations consume no
/// stream events.
async fn apply_stream_event<T: Transport>(
    transport: &mut T,
    call: &mut PendingCall,
    op: &Operation,
    event: &str,
    payload: &Value,
    deadline: Instant,
) -> Option<Outcome> {
    if !matches!(op, Operation::Send { .. }) {
        return None;
    }
    let mut drain_requested = false;
    for action in scan_event(event, payload) {
        match action {
            StreamAction::Append(text) => call.acc.push_str(&text),
            StreamAction::Complete(Settle::Now) => {
                return Some(Outcome::Text(final_text(&call.acc, PROCESSED_FALLBACK)));
            }
            StreamAction::Complete(Settle::Drain) => drain_requested = true,
        }
    }
    if drain_requested {
        drain_trailing(transport, call, deadline).await;
        return Some(Outcome::Text(final_text(&call.acc, PROCESSED_FALLBACK)));
    }
    None
}

/// Keep appending recognized fragments for a short window after an agent
/// lifecycle completion. Bounded by the call deadline; transport failures
/// end the window early since the reply is already settled.
async fn drain_trailing<T: Transport>(
    transport: &mut T,
    call: &mut PendingCall,
    deadline: Instant,
) {
    let settle_at = (Instant::now() + COMPLETION_DRAIN).min(deadline);
    loop {
        let inbound = tokio::select! {
            _ = sleep_until(settle_at) => break,
            inbound = transport.recv() => inbound,
        };
        let Ok(Some(text)) = inbound else { break };
        let Some(GatewayFrame::Event(event)) = parse_frame(&text) else {
            continue;
        };
        let payload = event.payload.unwrap_or(Value::Null);
        for action in scan_event(&event.event, &payload) {
            match action {
                StreamAction::Append(text) => call.acc.push_str(&text),
                StreamAction::Complete(Settle::Now) => return,
                StreamAction::Complete(Settle::Drain) => {}
            }
        }
    }
}

fn settle_on_deadline(op: &Operation, call: &PendingCall) -> Result<Outcome> {
    if let Operation::Send { .. } = op {
        if !call.acc.is_empty() {
            // A cut-short reply beats an error.
            return Ok(Outcome::Text(call.acc.clone()));
        }
        return Err(Error::Timeout(
            "Henry may be busy. Try again in a moment.".to_string(),
        ));
    }
    Err(Error::Timeout(
        "gateway did not respond before the deadline".to_string(),
    ))
}

fn settle_on_close(op: &Operation, call: &PendingCall) -> Result<Outcome> {
    if call.phase != Phase::OperationInFlight {
        return Err(Error::Connection(
            "gateway disconnected before the handshake completed".to_string(),
        ));
    }
    if let Operation::Send { .. } = op {
        if !call.acc.is_empty() {
            return Ok(Outcome::Text(call.acc.clone()));
        }
    }
    Err(Error::Connection(
        "gateway closed the connection before a response arrived".to_string(),
    ))
}

fn failure_reason(res: &ResponseFrame) -> Option<String> {
    res.error
        .as_ref()
        .map(|error| error.message.clone())
        .filter(|message| !message.is_empty())
}

fn status_from_payload(payload: &Value) -> GatewayStatus {
    let agent = payload
        .get("agent")
        .filter(|agent| is_truthy(agent))
        .cloned()
        .unwrap_or_else(|| json!({}));
    let model = payload
        .get("model")
        .and_then(Value::as_str)
        .or_else(|| {
            payload
                .get("agent")
                .and_then(|agent| agent.get("model"))
                .and_then(Value::as_str)
        })
        .unwrap_or("unknown")
        .to_string();
    GatewayStatus {
        agent,
        model,
        connected_at: Utc::now(),
    }
}

fn messages_from_payload(payload: &Value) -> Vec<ChatMessage> {
    payload
        .get("messages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn final_text(acc: &str, fallback: &str) -> String {
    if acc.is_empty() {
        fallback.to_string()
    } else {
        acc.to_string()
    }
}

fn new_call_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// JavaScript-style truthiness, used where the wire shape predates typing.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::protocol::{ErrorShape, EventFrame};
    use async_trait::async_trait;
    use secrecy::SecretString;
    use std::collections::VecDeque;

    // ---- scripted transport ----

    enum MockStep {
        /// Deliver this raw text to the client.
        Deliver(String),
        /// Hold delivery until the client has sent `n` requests in total.
        AwaitSend(usize),
        /// Respond to the most recently sent request.
        Reply {
            ok: bool,
            payload: Option<Value>,
            error: Option<ErrorShape>,
        },
        /// Close the connection.
        Close,
        /// Fail the next receive with a transport error.
        Fail(String),
    }

    struct MockTransport {
        script: VecDeque<MockStep>,
        sent: Vec<String>,
        closed: usize,
    }

    impl MockTransport {
        fn new(script: Vec<MockStep>) -> Self {
            MockTransport {
                script: script.into(),
                sent: Vec::new(),
                closed: 0,
            }
        }

        fn last_request_id(&self) -> String {
            match parse_frame(self.sent.last().expect("no request sent yet")) {
                Some(GatewayFrame::Request(req)) => req.id,
                other => panic!("last sent frame is not a request: {other:?}"),
            }
        }

        fn sent_request(&self, index: usize) -> RequestFrame {
            match parse_frame(&self.sent[index]) {
                Some(GatewayFrame::Request(req)) => req,
                other => panic!("sent[{index}] is not a request: {other:?}"),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&mut self, text: String) -> Result<()> {
            self.sent.push(text);
            Ok(())
        }

        async fn recv(&mut self) -> Result<Option<String>> {
            loop {
                match self.script.front() {
                    Some(MockStep::AwaitSend(n)) if self.sent.len() >= *n => {
                        self.script.pop_front();
                    }
                    Some(MockStep::AwaitSend(_)) | None => {
                        // Nothing to deliver; hold the line open.
                        std::future::pending::<()>().await;
                        unreachable!()
                    }
                    Some(MockStep::Deliver(_)) => {
                        let Some(MockStep::Deliver(text)) = self.script.pop_front() else {
                            unreachable!()
                        };
                        return Ok(Some(text));
                    }
                    Some(MockStep::Reply { .. }) => {
                        let Some(MockStep::Reply { ok, payload, error }) = self.script.pop_front()
                        else {
                            unreachable!()
                        };
                        let frame = GatewayFrame::Response(ResponseFrame {
                            id: self.last_request_id(),
                            ok,
                            payload,
                            error,
                        });
                        return Ok(Some(serde_json::to_string(&frame).unwrap()));
                    }
                    Some(MockStep::Close) => {
                        self.script.pop_front();
                        return Ok(None);
                    }
                    Some(MockStep::Fail(_)) => {
                        let Some(MockStep::Fail(message)) = self.script.pop_front() else {
                            unreachable!()
                        };
                        return Err(Error::Connection(message));
                    }
                }
            }
        }

        async fn close(&mut self) {
            self.closed += 1;
        }
    }

    // ---- script helpers ----

    fn event(name: &str, payload: Value) -> MockStep {
        MockStep::Deliver(
            serde_json::to_string(&GatewayFrame::Event(EventFrame::new(name, payload))).unwrap(),
        )
    }

    fn reply_ok(payload: Value) -> MockStep {
        MockStep::Reply {
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    fn reply_err(message: &str) -> MockStep {
        MockStep::Reply {
            ok: false,
            payload: None,
            error: Some(ErrorShape::new("ERR", message)),
        }
    }

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            url: "ws://127.0.0.1:18789".to_string(),
            token: SecretString::from("test-token".to_string()),
            status_timeout: Duration::from_secs(2),
            history_timeout: Duration::from_secs(2),
            send_timeout: Duration::from_secs(5),
        }
    }

    async fn run(
        mock: &mut MockTransport,
        op: Operation,
        config: &GatewayConfig,
        timeout: Duration,
    ) -> Result<Outcome> {
        let deadline = Instant::now() + timeout;
        run_call(mock, op, config, deadline).await
    }

    // ---- handshake ----

    #[tokio::test]
    async fn test_challenge_triggers_exactly_one_connect() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            event(events::CONNECT_CHALLENGE, json!({"nonce": "n1"})),
            event(events::CONNECT_CHALLENGE, json!({"nonce": "n2"})),
            MockStep::AwaitSend(1),
            reply_ok(json!({"model": "opus", "agent": {"name": "henry"}})),
        ]);

        let outcome = run(&mut mock, Operation::Status, &config, Duration::from_secs(2)).await;

        match outcome {
            Ok(Outcome::Status(status)) => {
                assert_eq!(status.model, "opus");
                assert_eq!(status.agent["name"], "henry");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        // A duplicate challenge must not produce a second connect.
        assert_eq!(mock.sent.len(), 1);
        let connect = mock.sent_request(0);
        assert_eq!(connect.method, "connect");
        assert_eq!(connect.params["auth"]["token"], "test-token");
        assert_eq!(connect.params["client"]["id"], "henry-hq-status-check");
        assert_eq!(mock.closed, 1);
    }

    #[tokio::test]
    async fn test_quiet_server_gets_connect_after_grace() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({"agent": {"model": "sonnet"}})),
        ]);

        let started = std::time::Instant::now();
        let outcome = run(&mut mock, Operation::Status, &config, Duration::from_secs(2)).await;

        match outcome {
            Ok(Outcome::Status(status)) => assert_eq!(status.model, "sonnet"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert_eq!(mock.sent.len(), 1);
        assert_eq!(mock.closed, 1);
    }

    #[tokio::test]
    async fn test_auth_rejection_stops_before_the_operation() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            event(events::CONNECT_CHALLENGE, json!({})),
            MockStep::AwaitSend(1),
            reply_err("bad token"),
        ]);

        let op = Operation::Send {
            text: "hello".to_string(),
        };
        let outcome = run(&mut mock, op, &config, Duration::from_secs(2)).await;

        match outcome {
            Err(Error::Auth(message)) => assert!(message.contains("bad token")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        // No chat.send may follow a failed handshake.
        assert_eq!(mock.sent.len(), 1);
        assert_eq!(mock.closed, 1);
    }

    #[tokio::test]
    async fn test_status_defaults_when_payload_is_bare() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![MockStep::AwaitSend(1), reply_ok(json!({}))]);

        let outcome = run(&mut mock, Operation::Status, &config, Duration::from_secs(2)).await;

        match outcome {
            Ok(Outcome::Status(status)) => {
                assert_eq!(status.model, "unknown");
                assert_eq!(status.agent, json!({}));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    // ---- send ----

    fn send_op(text: &str) -> Operation {
        Operation::Send {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_streams_deltas_to_completion() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            event(events::CONNECT_CHALLENGE, json!({})),
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"runId": "r1"})),
            event("chat", json!({"type": "text", "text": "Hel"})),
            event("chat", json!({"type": "text_delta", "text": "lo"})),
            event("chat", json!({"type": "done"})),
        ]);

        let outcome = run(&mut mock, send_op("hi Henry"), &config, Duration::from_secs(5)).await;

        match outcome {
            Ok(Outcome::Text(reply)) => assert_eq!(reply, "Hello"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        let send = mock.sent_request(1);
        assert_eq!(send.method, "chat.send");
        assert_eq!(send.params["message"], "hi Henry");
        assert_eq!(send.params["sessionKey"], "webchat");
        assert!(!send.params["idempotencyKey"].as_str().unwrap().is_empty());
        assert_ne!(send.id, mock.sent_request(0).id);
        assert_eq!(mock.closed, 1);
    }

    #[tokio::test]
    async fn test_send_ack_with_final_state_resolves_without_stream() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"status": "ok"})),
        ]);

        let outcome = run(&mut mock, send_op("ping"), &config, Duration::from_secs(5)).await;

        match outcome {
            Ok(Outcome::Text(reply)) => assert_eq!(reply, SENT_FALLBACK),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_rejection_carries_server_reason() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            MockStep::Reply {
                ok: false,
                payload: Some(json!({"message": "workspace is busy"})),
                error: None,
            },
        ]);

        let outcome = run(&mut mock, send_op("x"), &config, Duration::from_secs(5)).await;

        match outcome {
            Err(Error::Request(message)) => assert!(message.contains("workspace is busy")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(mock.closed, 1);
    }

    #[tokio::test]
    async fn test_unrelated_frames_are_skipped() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            // A response for an id this call never issued.
            MockStep::Deliver(r#"{"type":"res","id":"bogus","ok":true}"#.to_string()),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"runId": "r1"})),
            MockStep::Deliver("not json".to_string()),
            MockStep::Deliver(r#"{"type":"ping","id":"1"}"#.to_string()),
            event("presence", json!({"status": "online"})),
            event("chat", json!({"type": "typing"})),
            event("chat", json!({"type": "text", "text": "ok!"})),
            event("chat", json!({"done": true})),
        ]);

        let outcome = run(&mut mock, send_op("x"), &config, Duration::from_secs(5)).await;

        match outcome {
            Ok(Outcome::Text(reply)) => assert_eq!(reply, "ok!"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_completion_without_text_uses_fallback() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"runId": "r1"})),
            event("chat", json!({"type": "done"})),
        ]);

        let outcome = run(&mut mock, send_op("x"), &config, Duration::from_secs(5)).await;

        match outcome {
            Ok(Outcome::Text(reply)) => assert_eq!(reply, PROCESSED_FALLBACK),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_agent_completion_drains_trailing_text() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"runId": "r1"})),
            event("agent", json!({"type": "text", "text": "Running"})),
            event("agent", json!({"type": "done"})),
            event("agent", json!({"type": "text", "text": " late"})),
            event("chat", json!({"type": "done"})),
        ]);

        let outcome = run(&mut mock, send_op("x"), &config, Duration::from_secs(5)).await;

        match outcome {
            Ok(Outcome::Text(reply)) => assert_eq!(reply, "Running late"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    // ---- deadlines ----

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let config = test_config();
        let started = std::time::Instant::now();
        let mut mock = MockTransport::new(vec![MockStep::AwaitSend(1)]);

        let outcome = run(
            &mut mock,
            Operation::Status,
            &config,
            Duration::from_millis(300),
        )
        .await;

        match outcome {
            Err(Error::Timeout(_)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300));
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(mock.closed, 1);
    }

    #[tokio::test]
    async fn test_send_timeout_without_text_is_an_error() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"runId": "r1"})),
        ]);

        let outcome = run(&mut mock, send_op("x"), &config, Duration::from_millis(400)).await;

        match outcome {
            Err(Error::Timeout(message)) => assert!(message.contains("busy")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_timeout_with_partial_text_resolves() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"runId": "r1"})),
            event("chat", json!({"type": "text", "text": "partial an"})),
        ]);

        let outcome = run(&mut mock, send_op("x"), &config, Duration::from_millis(400)).await;

        match outcome {
            Ok(Outcome::Text(reply)) => assert_eq!(reply, "partial an"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(mock.closed, 1);
    }

    // ---- disconnects ----

    #[tokio::test]
    async fn test_close_before_handshake_is_a_connection_error() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![MockStep::Close]);

        let outcome = run(&mut mock, Operation::Status, &config, Duration::from_secs(2)).await;

        match outcome {
            Err(Error::Connection(message)) => assert!(message.contains("handshake")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(mock.closed, 1);
    }

    #[tokio::test]
    async fn test_close_after_partial_text_resolves() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"runId": "r1"})),
            event("chat", json!({"type": "text", "text": "Hi"})),
            MockStep::Close,
        ]);

        let outcome = run(&mut mock, send_op("x"), &config, Duration::from_secs(5)).await;

        match outcome {
            Ok(Outcome::Text(reply)) => assert_eq!(reply, "Hi"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_midstream_without_text_is_a_connection_error() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_ok(json!({"runId": "r1"})),
            MockStep::Close,
        ]);

        let outcome = run(&mut mock, send_op("x"), &config, Duration::from_secs(5)).await;

        match outcome {
            Err(Error::Connection(_)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_fails_the_call_and_still_closes() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            MockStep::Fail("connection reset".to_string()),
        ]);

        let outcome = run(&mut mock, Operation::Status, &config, Duration::from_secs(2)).await;

        match outcome {
            Err(Error::Connection(message)) => assert!(message.contains("connection reset")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(mock.closed, 1);
    }

    // ---- history ----

    #[tokio::test]
    async fn test_history_fetch_parses_messages() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            // Stream events never settle a history call.
            event("chat", json!({"type": "text", "text": "noise"})),
            reply_ok(json!({"messages": [
                {"role": "user", "content": "what's on today?"},
                {"role": "assistant", "content": [{"type": "text", "text": "Two meetings."}]},
            ]})),
        ]);

        let op = Operation::History {
            session_key: "main".to_string(),
            limit: 25,
        };
        let outcome = run(&mut mock, op, &config, Duration::from_secs(2)).await;

        match outcome {
            Ok(Outcome::History(messages)) => {
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[0].role, "user");
                assert_eq!(messages[1].text(), "Two meetings.");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let history = mock.sent_request(1);
        assert_eq!(history.method, "chat.history");
        assert_eq!(history.params["sessionKey"], "main");
        assert_eq!(history.params["limit"], 25);
        assert_eq!(history.params["includeTools"], false);
        assert_eq!(mock.closed, 1);
    }

    #[tokio::test]
    async fn test_history_rejection_is_a_request_error() {
        let config = test_config();
        let mut mock = MockTransport::new(vec![
            MockStep::AwaitSend(1),
            reply_ok(json!({})),
            MockStep::AwaitSend(2),
            reply_err("no such session"),
        ]);

        let op = Operation::History {
            session_key: "missing".to_string(),
            limit: 10,
        };
        let outcome = run(&mut mock, op, &config, Duration::from_secs(2)).await;

        match outcome {
            Err(Error::Request(message)) => assert!(message.contains("no such session")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
