//! Streamed event recognition
//!
//! The gateway streams send-message output as `chat` and `agent` events whose
//! payload shapes differ across gateway revisions. Recognition is a fixed,
//! ordered list of predicates; each maps one event to at most one action, and
//! a single event can both contribute text and complete the stream.

use serde_json::Value;

use crate::gateway::protocol::events;

/// What one recognizer decided about an inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAction {
    /// Append a text fragment to the accumulator.
    Append(String),
    /// The reply is finished.
    Complete(Settle),
}

/// How promptly to settle once a completion is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Resolve right away.
    Now,
    /// Drain trailing deltas briefly, then resolve. Agent lifecycle events
    /// can land before the final text fragments do.
    Drain,
}

type Recognizer = fn(&str, &Value) -> Option<StreamAction>;

/// Recognizers in evaluation order. Text from earlier entries lands in the
/// accumulator before a completion from a later entry settles the call.
const RECOGNIZERS: &[Recognizer] = &[
    assistant_content,
    chat_done,
    chat_delta,
    chat_turn_complete,
    agent_done,
    agent_delta,
];

/// Evaluate every recognizer against one event, in order.
pub fn scan_event(event: &str, payload: &Value) -> Vec<StreamAction> {
    RECOGNIZERS
        .iter()
        .filter_map(|recognize| recognize(event, payload))
        .collect()
}

/// `chat` payloads carrying a whole or partial assistant message.
fn assistant_content(event: &str, payload: &Value) -> Option<StreamAction> {
    if event != events::CHAT {
        return None;
    }
    if payload.get("role").and_then(Value::as_str) != Some("assistant") {
        return None;
    }
    match payload.get("content") {
        Some(Value::String(text)) if !text.is_empty() => {
            Some(StreamAction::Append(text.clone()))
        }
        Some(Value::Array(blocks)) => {
            let text: String = blocks.iter().filter_map(block_text).collect();
            if text.is_empty() {
                None
            } else {
                Some(StreamAction::Append(text))
            }
        }
        _ => None,
    }
}

fn block_text(block: &Value) -> Option<&str> {
    if block.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    block
        .get("text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

/// Generic completion markers on `chat` payloads.
fn chat_done(event: &str, payload: &Value) -> Option<StreamAction> {
    if event != events::CHAT {
        return None;
    }
    let kind = payload.get("type").and_then(Value::as_str);
    let done = matches!(kind, Some("done") | Some("complete"))
        || payload.get("status").and_then(Value::as_str) == Some("done")
        || payload.get("done").and_then(Value::as_bool) == Some(true);
    done.then_some(StreamAction::Complete(Settle::Now))
}

/// Incremental text deltas on `chat` payloads.
fn chat_delta(event: &str, payload: &Value) -> Option<StreamAction> {
    if event != events::CHAT {
        return None;
    }
    let kind = payload.get("type").and_then(Value::as_str);
    if !matches!(kind, Some("text") | Some("text_delta")) {
        return None;
    }
    payload
        .get("text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| StreamAction::Append(text.to_string()))
}

/// Message and turn lifecycle completion on `chat` payloads.
fn chat_turn_complete(event: &str, payload: &Value) -> Option<StreamAction> {
    if event != events::CHAT {
        return None;
    }
    let kind = payload.get("type").and_then(Value::as_str);
    matches!(kind, Some("message_complete") | Some("turn_complete"))
        .then_some(StreamAction::Complete(Settle::Now))
}

/// Run lifecycle completion on `agent` payloads. Settles after a short drain
/// window since the last text fragments can trail the lifecycle marker.
fn agent_done(event: &str, payload: &Value) -> Option<StreamAction> {
    if event != events::AGENT {
        return None;
    }
    let kind = payload.get("type").and_then(Value::as_str);
    let done = matches!(kind, Some("done") | Some("complete"))
        || payload.get("status").and_then(Value::as_str) == Some("done");
    done.then_some(StreamAction::Complete(Settle::Drain))
}

/// Text fragments on `agent` payloads. Unlike `chat`, only the plain `text`
/// shape counts here.
fn agent_delta(event: &str, payload: &Value) -> Option<StreamAction> {
    if event != events::AGENT {
        return None;
    }
    if payload.get("type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    payload
        .get("text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| StreamAction::Append(text.to_string()))
}
