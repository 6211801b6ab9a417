// src/ingest/providers/llm_output.rs
//! Shared parsing for the model-backed providers: pull the model's text out of
//! a chat-completions or Responses API body, find the `{"items": [...]}`
//! object in it, and normalize each item.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ingest::types::{CanonicalItem, Category, ItemDetail, SearchWindow};
use crate::ingest::{
    clean_subreddit, coerce_relevance, dedup_by_url, extract_author_handle, extract_subreddit,
    is_reddit_discussion_url, is_x_url, item_id, normalize_text, resolve_date, str_field,
};

static RE_ITEMS_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{[\s\S]*"items"[\s\S]*\}"#).unwrap());

const DEFAULT_RELEVANCE: f64 = 0.5;
const ERROR_BODY_LIMIT: usize = 300;

/// Decode a provider reply as JSON. A non-2xx status is an error carrying the
/// body's `error.message` (or `message`), else the start of the raw body.
pub async fn read_json(resp: reqwest::Response, provider: &str) -> Result<Value> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let msg = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .or_else(|| v.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.chars().take(ERROR_BODY_LIMIT).collect());
        bail!("{provider} returned HTTP {status}: {msg}");
    }
    resp.json::<Value>()
        .await
        .with_context(|| format!("{provider} response body"))
}

/// The model's output text. An `error` member in the body is an error.
pub fn output_text(resp: &Value) -> Result<String> {
    if let Some(err) = resp.get("error").filter(|e| !e.is_null()) {
        let msg = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        bail!("provider API error: {msg}");
    }

    match resp.get("output") {
        Some(Value::String(s)) if !s.is_empty() => return Ok(s.clone()),
        Some(Value::Array(parts)) => {
            for part in parts {
                if let Some(text) = responses_part_text(part) {
                    return Ok(text);
                }
            }
        }
        _ => {}
    }

    if let Some(choices) = resp.get("choices").and_then(Value::as_array) {
        for choice in choices {
            if let Some(text) = choice
                .pointer("/message/content")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
            {
                return Ok(text.to_string());
            }
        }
    }

    if let Some(text) = resp.get("output_text").and_then(Value::as_str) {
        if !text.is_empty() {
            return Ok(text.to_string());
        }
    }

    let keys: Vec<&str> = resp
        .as_object()
        .map(|m| m.keys().map(String::as_str).collect())
        .unwrap_or_default();
    warn!(target: "ingest", ?keys, "no output text in provider response");
    Ok(String::new())
}

fn responses_part_text(part: &Value) -> Option<String> {
    match part {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(obj) => {
            if obj.get("type").and_then(Value::as_str) == Some("message") {
                let content = obj.get("content")?.as_array()?;
                return content.iter().find_map(|c| {
                    (c.get("type").and_then(Value::as_str) == Some("output_text"))
                        .then(|| c.get("text").and_then(Value::as_str))
                        .flatten()
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                });
            }
            obj.get("text")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        }
        _ => None,
    }
}

/// The `items` array of the first `{..."items"...}` object in `text`.
pub fn extract_items(text: &str) -> Vec<Value> {
    let Some(m) = RE_ITEMS_OBJECT.find(text) else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(m.as_str()) {
        Ok(v) => v
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Err(e) => {
            debug!(target: "ingest", error = %e, "items object is not valid JSON");
            Vec::new()
        }
    }
}

/// Forum items from a model response: host checked, date validated, window applied.
pub fn reddit_items(
    items: &[Value],
    window: &SearchWindow,
    today: NaiveDate,
) -> Vec<CanonicalItem> {
    let mut out = Vec::new();
    for item in items.iter().filter(|i| i.is_object()) {
        let url = str_field(item, &["url"]);
        if url.is_empty() || !is_reddit_discussion_url(url) {
            continue;
        }
        let title = normalize_text(str_field(item, &["title"]));
        let why = normalize_text(str_field(item, &["why_relevant"]));
        let subreddit = match clean_subreddit(str_field(item, &["subreddit"])) {
            s if s.is_empty() => extract_subreddit(url),
            s => s,
        };
        let signal = resolve_date(item_date(item).as_deref(), url, &why, &title, today);
        if !window.admits(signal.date()) {
            continue;
        }
        out.push(CanonicalItem::new(
            item_id(Category::Reddit, str_field(item, &["id"]), url),
            url.to_string(),
            title,
            ItemDetail::Reddit { subreddit },
            signal,
            coerce_relevance(item.get("relevance"), DEFAULT_RELEVANCE),
            why,
        ));
    }
    dedup_by_url(out)
}

/// Social items from a model response.
pub fn x_items(items: &[Value], window: &SearchWindow, today: NaiveDate) -> Vec<CanonicalItem> {
    let mut out = Vec::new();
    for item in items.iter().filter(|i| i.is_object()) {
        let url = str_field(item, &["url"]);
        if url.is_empty() || !is_x_url(url) {
            continue;
        }
        let text = normalize_text(str_field(item, &["text", "title"]));
        let why = normalize_text(str_field(item, &["why_relevant"]));
        let handle = match str_field(item, &["author_handle"]).trim_start_matches('@') {
            "" => extract_author_handle(url),
            h => h.to_string(),
        };
        let signal = resolve_date(item_date(item).as_deref(), url, &why, &text, today);
        if !window.admits(signal.date()) {
            continue;
        }
        out.push(CanonicalItem::new(
            item_id(Category::X, str_field(item, &["id"]), url),
            url.to_string(),
            text,
            ItemDetail::X {
                author_handle: handle,
            },
            signal,
            coerce_relevance(item.get("relevance"), DEFAULT_RELEVANCE),
            why,
        ));
    }
    dedup_by_url(out)
}

/// Models sometimes emit the date as a non-string; only strings are candidates.
fn item_date(item: &Value) -> Option<String> {
    item.get("date").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_completion_content_is_found() {
        let resp = json!({"choices":[{"message":{"content":"here {\"items\":[]}"}}]});
        assert_eq!(output_text(&resp).unwrap(), r#"here {"items":[]}"#);
    }

    #[test]
    fn responses_output_message_is_found() {
        let resp = json!({"output":[
            {"type":"web_search_call","status":"completed"},
            {"type":"message","content":[{"type":"output_text","text":"{\"items\":[1]}"}]}
        ]});
        assert_eq!(output_text(&resp).unwrap(), r#"{"items":[1]}"#);
    }

    #[test]
    fn error_member_is_an_error() {
        let resp = json!({"error":{"message":"quota exceeded"}});
        assert!(output_text(&resp)
            .unwrap_err()
            .to_string()
            .contains("quota exceeded"));
        let ok = json!({"error": null, "output": "x"});
        assert_eq!(output_text(&ok).unwrap(), "x");
    }

    #[test]
    fn items_are_extracted_from_prose() {
        let text = "Sure! Here you go:\n```json\n{\"items\": [{\"url\": \"u\"}]}\n```";
        let items = extract_items(text);
        assert_eq!(items.len(), 1);
        assert!(extract_items("no json here").is_empty());
        assert!(extract_items("{\"items\": [broken").is_empty());
    }
}
