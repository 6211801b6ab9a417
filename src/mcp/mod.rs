// src/mcp/mod.rs
pub mod client;
pub mod envelope;
pub mod error;

pub use client::{McpClient, SearchWebParams};
pub use error::McpError;

use std::time::Duration;

use once_cell::sync::Lazy;
use serde_json::Value;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

/// The process's own stdin/stdout is one pipe; exchanges over it take turns.
static AMBIENT: Lazy<Mutex<Option<McpClient>>> = Lazy::new(|| Mutex::new(None));

/// Exclusive access to the client bound to this process's stdio. The guard is
/// held for a whole exchange so concurrent categories cannot interleave lines.
pub async fn lock_ambient(
    timeout: Duration,
    strict_ids: bool,
) -> MappedMutexGuard<'static, McpClient> {
    let guard = AMBIENT.lock().await;
    MutexGuard::map(guard, |slot| {
        let client = slot.get_or_insert_with(|| McpClient::attach_stdio(timeout));
        client.set_timeout(timeout);
        client.set_strict_ids(strict_ids);
        client
    })
}

/// Unwrap a `tools/call` result into the tool's own JSON payload.
///
/// Servers either wrap the payload as `{content:[{type:"text",text:"<json>"}]}`
/// (optionally with `isError`) or return it directly.
pub fn unwrap_tool_result(result: Value) -> anyhow::Result<Value> {
    let Value::Object(map) = &result else {
        return Ok(result);
    };
    let Some(content) = map.get("content").and_then(Value::as_array) else {
        return Ok(result);
    };
    let text: String = content
        .iter()
        .filter(|c| c.get("type").and_then(Value::as_str).unwrap_or("text") == "text")
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");
    if map.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        anyhow::bail!("tool reported an error: {}", text.trim());
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(v) => Ok(v),
        Err(_) if map.contains_key("results") => Ok(result),
        Err(e) => Err(anyhow::anyhow!("tool returned non-JSON text content: {e}")),
    }
}
