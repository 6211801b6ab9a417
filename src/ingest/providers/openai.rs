// src/ingest/providers/openai.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::ingest::providers::llm_output::{extract_items, output_text, read_json, reddit_items};
use crate::ingest::types::{CanonicalItem, CategorySearch, Depth, SearchRequest, SourceTag};

pub const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

pub fn item_range(depth: Depth) -> (u32, u32) {
    depth.pick(((8, 12), (20, 30), (50, 70)))
}

pub fn request_timeout(depth: Depth) -> Duration {
    Duration::from_secs(depth.pick((60, 90, 120)))
}

pub fn prompt(topic: &str, depth: Depth) -> String {
    let (min, max) = item_range(depth);
    format!(
        r#"Search Reddit for discussions about: {topic}

Use web search to find {min}-{max} relevant Reddit threads from the last 30 days.
For each thread URL you find, extract the title, the full URL, the subreddit,
the date if visible, and why it is relevant to "{topic}".

Return ONLY valid JSON in this exact format:
{{
  "items": [
    {{
      "title": "Actual thread title from Reddit",
      "url": "https://www.reddit.com/r/subreddit/comments/...",
      "subreddit": "subreddit_name",
      "date": "YYYY-MM-DD or null if unknown",
      "why_relevant": "Brief explanation of relevance to {topic}",
      "relevance": 0.85
    }}
  ]
}}

relevance is 0.0 to 1.0. date must be YYYY-MM-DD or null."#
    )
}

/// Request body for the Responses API with `web_search` limited to reddit.com.
pub fn request_body(model: &str, topic: &str, depth: Depth) -> Value {
    json!({
        "model": model,
        "tools": [{
            "type": "web_search",
            "filters": { "allowed_domains": ["reddit.com"] }
        }],
        "include": ["web_search_call.action.sources"],
        "input": prompt(topic, depth),
    })
}

/// Forum search through the OpenAI Responses API.
pub struct OpenAiReddit {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiReddit {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
            endpoint: OPENAI_RESPONSES_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

pub fn parse_response(resp: &Value, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
    let text = output_text(resp)?;
    Ok(reddit_items(&extract_items(&text), &req.window, req.today))
}

#[async_trait]
impl CategorySearch for OpenAiReddit {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
        debug!(target: "openai", model = %self.model, depth = ?req.depth, "searching reddit");
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(request_timeout(req.depth))
            .json(&request_body(&self.model, &req.topic, req.depth))
            .send()
            .await
            .context("openai request")?;
        let resp = read_json(resp, "openai").await?;
        parse_response(&resp, req)
    }

    fn source(&self) -> SourceTag {
        SourceTag::OpenAi
    }
}
