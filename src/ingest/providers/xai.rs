// src/ingest/providers/xai.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::ingest::providers::llm_output::{extract_items, output_text, read_json, x_items};
use crate::ingest::types::{
    CanonicalItem, CategorySearch, Depth, SearchRequest, SearchWindow, SourceTag,
};

pub const XAI_RESPONSES_URL: &str = "https://api.x.ai/v1/responses";

pub fn item_range(depth: Depth) -> (u32, u32) {
    depth.pick(((8, 12), (20, 30), (40, 60)))
}

pub fn request_timeout(depth: Depth) -> Duration {
    Duration::from_secs(depth.pick((60, 90, 120)))
}

pub fn prompt(topic: &str, window: &SearchWindow, depth: Depth) -> String {
    let (min, max) = item_range(depth);
    format!(
        r#"Search X for posts about: {topic}

Find {min}-{max} relevant posts from {from} to {to}.

Return ONLY valid JSON in this exact format:
{{
  "items": [
    {{
      "text": "Post text",
      "url": "https://x.com/handle/status/123",
      "author_handle": "handle",
      "date": "YYYY-MM-DD or null",
      "why_relevant": "Brief explanation",
      "relevance": 0.85
    }}
  ]
}}"#,
        from = window.from,
        to = window.to,
    )
}

/// Responses API body with the `x_search` tool bounded by the window.
pub fn request_body(model: &str, topic: &str, window: &SearchWindow, depth: Depth) -> Value {
    json!({
        "model": model,
        "tools": [{
            "type": "x_search",
            "from_date": window.from.format("%Y-%m-%d").to_string(),
            "to_date": window.to.format("%Y-%m-%d").to_string(),
        }],
        "input": prompt(topic, window, depth),
    })
}

/// Social search through xAI.
pub struct XaiSearch {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl XaiSearch {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
            endpoint: XAI_RESPONSES_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

pub fn parse_response(resp: &Value, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
    let text = output_text(resp)?;
    Ok(x_items(&extract_items(&text), &req.window, req.today))
}

#[async_trait]
impl CategorySearch for XaiSearch {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
        debug!(target: "xai", model = %self.model, depth = ?req.depth, "searching x");
        let body = request_body(&self.model, &req.topic, &req.window, req.depth);
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(request_timeout(req.depth))
            .json(&body)
            .send()
            .await
            .context("xai request")?;
        let resp = read_json(resp, "xai").await?;
        parse_response(&resp, req)
    }

    fn source(&self) -> SourceTag {
        SourceTag::Xai
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x_search_is_bounded_by_window() {
        let w = SearchWindow::parse("2026-01-01", "2026-01-30").unwrap();
        let v = request_body("grok-4-1-fast", "widget safety", &w, Depth::Deep);
        assert_eq!(v["tools"][0]["type"], "x_search");
        assert_eq!(v["tools"][0]["from_date"], "2026-01-01");
        assert_eq!(v["tools"][0]["to_date"], "2026-01-30");
        assert!(v["input"].as_str().unwrap().contains("40-60"));
    }
}
