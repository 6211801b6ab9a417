// src/ingest/providers/openrouter.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::ingest::providers::llm_output::{extract_items, output_text, read_json, reddit_items};
use crate::ingest::types::{CanonicalItem, CategorySearch, Depth, SearchRequest, SourceTag};

pub const OPENROUTER_CHAT_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Requested thread range per depth.
pub fn item_range(depth: Depth) -> (u32, u32) {
    depth.pick(((15, 25), (30, 50), (70, 100)))
}

pub fn request_timeout(depth: Depth) -> Duration {
    Duration::from_secs(depth.pick((90, 120, 180)))
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Plugin<'a> {
    id: &'a str,
    source: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    plugins: Vec<Plugin<'a>>,
    temperature: f32,
}

pub fn prompt(topic: &str, depth: Depth) -> String {
    let (min, max) = item_range(depth);
    format!(
        r#"Find Reddit discussion threads about: {topic}

Search for the core subject with "site:reddit.com" and include every relevant thread you find.
Set date to "YYYY-MM-DD" if you can determine it, otherwise null. Dates are verified afterwards.
URLs must contain "/r/" and "/comments/". Reject developers.reddit.com and business.reddit.com.
Find {min}-{max} threads.

Return JSON:
{{
  "items": [
    {{
      "title": "Thread title",
      "url": "https://www.reddit.com/r/sub/comments/xyz/title/",
      "subreddit": "subreddit_name",
      "date": "YYYY-MM-DD or null",
      "why_relevant": "Why relevant",
      "relevance": 0.85
    }}
  ]
}}"#
    )
}

/// Forum search through OpenRouter chat completions with the `web` plugin.
pub struct OpenRouterReddit {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenRouterReddit {
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
            endpoint: OPENROUTER_CHAT_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn fetch(&self, req: &SearchRequest) -> Result<Value> {
        let prompt = prompt(&req.topic, req.depth);
        let body = Req {
            model: &self.model,
            messages: vec![Msg {
                role: "user",
                content: &prompt,
            }],
            plugins: vec![Plugin {
                id: "web",
                source: "exa",
            }],
            temperature: 0.0,
        };
        debug!(target: "openrouter", model = %self.model, depth = ?req.depth, "searching reddit");
        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "last30days")
            .timeout(request_timeout(req.depth))
            .json(&body)
            .send()
            .await
            .context("openrouter request")?;
        read_json(resp, "openrouter").await
    }
}

/// Normalize a chat-completions body into forum items.
pub fn parse_response(resp: &Value, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
    let text = output_text(resp)?;
    Ok(reddit_items(&extract_items(&text), &req.window, req.today))
}

#[async_trait]
impl CategorySearch for OpenRouterReddit {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
        let resp = self.fetch(req).await?;
        parse_response(&resp, req)
    }

    fn source(&self) -> SourceTag {
        SourceTag::OpenRouter
    }
}
