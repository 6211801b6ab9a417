// src/mcp/envelope.rs
//! JSON-RPC 2.0 envelopes and the line accumulator that reassembles a
//! response split across physical lines.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::mcp::error::{McpError, Result};

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Serialize)]
pub struct Request<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

#[derive(Debug, Serialize)]
pub struct Notification<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub params: P,
}

#[derive(Debug, Serialize)]
pub struct ToolCallParams<'a> {
    pub name: &'a str,
    pub arguments: Value,
}

/// Reassembly state for inbound lines.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Accumulator {
    #[default]
    Idle,
    Buffering(String),
}

impl Accumulator {
    /// Feed one non-empty line. Returns a parsed value once the buffered text
    /// forms valid JSON; otherwise keeps (or starts) buffering.
    pub fn feed(&mut self, line: &str) -> Option<Value> {
        match std::mem::take(self) {
            Accumulator::Idle => match serde_json::from_str::<Value>(line) {
                Ok(v) => Some(v),
                Err(_) => {
                    *self = Accumulator::Buffering(line.to_string());
                    None
                }
            },
            Accumulator::Buffering(mut partial) => {
                partial.push('\n');
                partial.push_str(line);
                if let Ok(v) = serde_json::from_str::<Value>(&partial) {
                    return Some(v);
                }
                // A complete envelope on its own line means the buffer was junk.
                if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(line) {
                    return Some(v);
                }
                *self = Accumulator::Buffering(partial);
                None
            }
        }
    }

    pub fn is_buffering(&self) -> bool {
        matches!(self, Accumulator::Buffering(_))
    }
}

/// What an inbound JSON value means for a pending call.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Has `method` and no `result`: an event, never the answer.
    Notification { method: String },
    /// Has `result` or `error`.
    Answer(Map<String, Value>),
    /// An object with none of the above that still carries an id.
    Bare { id: Option<Value> },
    /// Not an object at all.
    Other,
}

pub fn classify(value: Value) -> Incoming {
    let Value::Object(map) = value else {
        return Incoming::Other;
    };
    if map.contains_key("method") && !map.contains_key("result") {
        let method = map
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        return Incoming::Notification { method };
    }
    if map.contains_key("result") || map.contains_key("error") {
        return Incoming::Answer(map);
    }
    Incoming::Bare {
        id: map.get("id").cloned(),
    }
}

/// Turn an accepted answer into the call's outcome.
pub fn into_result(mut answer: Map<String, Value>) -> Result<Value> {
    if let Some(err) = answer.remove("error") {
        let (code, message) = match &err {
            Value::Object(o) => (
                o.get("code").and_then(Value::as_i64),
                o.get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            ),
            Value::String(s) => (None, s.clone()),
            other => (None, other.to_string()),
        };
        return Err(McpError::Protocol { code, message });
    }
    answer
        .remove("result")
        .ok_or_else(|| McpError::MalformedResponse("missing 'result' field".into()))
}

/// Id carried by an envelope, when it is a non-negative integer.
pub fn envelope_id(map: &Map<String, Value>) -> Option<u64> {
    map.get("id").and_then(Value::as_u64)
}
