//! HTTP API for the Henry HQ dashboard.
//!
//! A thin axum layer over [`GatewayClient`]: every route runs exactly one
//! gateway call and maps the typed failure onto an HTTP status. The status
//! route is the one exception; it always answers 200 and reports
//! `online`/`offline` in the body so the dashboard widget can render either
//! state without special-casing transport errors.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::config::Config;
use crate::error::Error;
use crate::gateway::{redact_token, GatewayClient};

/// Session the chat view reads from when the query string names none.
const DEFAULT_SESSION_KEY: &str = "main";

/// History page size when the query string names none.
const DEFAULT_HISTORY_LIMIT: u32 = 100;

// ---- App State ----

#[derive(Clone)]
pub struct AppState {
    pub client: GatewayClient,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            client: GatewayClient::new(config.gateway.clone()),
            config,
        }
    }
}

// ---- Error Handling ----

/// Wraps [`Error`] so handlers can use `?`, carrying the error-to-status
/// mapping for the whole API surface.
struct AppError(Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Connection(_) | Error::Auth(_) => StatusCode::BAD_GATEWAY,
            Error::Request(_) | Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match &self.0 {
            // InvalidInput originates in this layer with a user-facing
            // reason; skip the taxonomy prefix.
            Error::InvalidInput(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message() }));
        (self.status(), body).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

// ---- Query / Body Types ----

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(rename = "sessionKey")]
    session_key: Option<String>,
    limit: Option<u32>,
}

#[derive(Deserialize)]
struct SendBody {
    #[serde(default)]
    message: String,
}

// ---- Handlers ----

async fn health(State(state): State<AppState>) -> Json<Value> {
    let token = state.config.gateway.token.expose_secret();
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "config": {
            "gatewayUrl": redact_token(&state.config.gateway.url),
            "tokenLength": token.len(),
            "tokenPreview": token_preview(token),
        }
    }))
}

/// Probe the gateway and report either state with HTTP 200; the widget
/// renders `offline` rather than an error page.
async fn gateway_status(State(state): State<AppState>) -> Json<Value> {
    let gateway_url = redact_token(&state.config.gateway.url);
    match state.client.check_status().await {
        Ok(status) => Json(json!({
            "status": "online",
            "gatewayUrl": gateway_url,
            "agent": status.agent,
            "model": status.model,
            "connectedAt": status.connected_at,
        })),
        Err(err) => {
            warn!(error = %err, "gateway status probe failed");
            Json(json!({
                "status": "offline",
                "gatewayUrl": gateway_url,
                "error": err.to_string(),
            }))
        }
    }
}

async fn chat_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Response {
    let session_key = params
        .session_key
        .unwrap_or_else(|| DEFAULT_SESSION_KEY.to_string());
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    match state.client.fetch_history(&session_key, limit).await {
        Ok(messages) => Json(json!({
            "messages": messages,
            "sessionKey": session_key,
        }))
        .into_response(),
        Err(err) => {
            warn!(error = %err, session_key = %session_key, "history fetch failed");
            let err = AppError(err);
            // The chat view expects a messages array even on failure.
            let body = Json(json!({ "error": err.message(), "messages": [] }));
            (err.status(), body).into_response()
        }
    }
}

async fn terminal_send(
    State(state): State<AppState>,
    Json(body): Json<SendBody>,
) -> Result<Json<Value>, AppError> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError(Error::InvalidInput(
            "Message is required".to_string(),
        )));
    }

    let response = state.client.send_message(message).await.map_err(|err| {
        warn!(error = %err, "terminal send failed");
        err
    })?;

    Ok(Json(json!({
        "response": response,
        "timestamp": Utc::now(),
    })))
}

// ---- Router ----

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/gateway/status", get(gateway_status))
        .route("/chat/history", get(chat_history))
        .route("/terminal/send", post(terminal_send));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}

fn token_preview(token: &str) -> String {
    if token.is_empty() {
        "not set".to_string()
    } else {
        format!("{}...", token.chars().take(6).collect::<String>())
    }
}
