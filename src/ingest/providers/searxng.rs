// src/ingest/providers/searxng.rs
//! Any category through the SearXNG tool server, reached over the JSON-RPC
//! protocol client.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::dates::extract_date_signals_at;
use crate::ingest::types::{
    CanonicalItem, Category, CategorySearch, DateSignal, Depth, ItemDetail, SearchRequest,
    SearchWindow, SourceTag,
};
use crate::ingest::{
    coerce_relevance, dedup_by_url, extract_author_handle, extract_domain, extract_subreddit,
    id_from_url, is_reddit_discussion_url, is_x_url, normalize_text, str_field, timestamp_date,
    truncate_chars,
};
use crate::mcp::{lock_ambient, unwrap_tool_result, McpClient, McpError, SearchWebParams};
use crate::resolve::McpLaunch;

const CLIENT_NAME: &str = "last30days";
const WHY_MAX_CHARS: usize = 200;
const DATE_FIELDS: &[&str] = &["publication_date", "publish_date", "publishedDate"];

/// Most items kept per category after filtering.
pub fn max_items(depth: Depth) -> usize {
    depth.pick((25, 50, 100))
}

/// `search_web` arguments for a category.
pub fn query_for(category: Category, topic: &str) -> SearchWebParams {
    let topic = topic.trim();
    let params = match category {
        Category::Reddit => SearchWebParams::new(format!("{topic} site:reddit.com"), "social media"),
        Category::X => SearchWebParams::new(
            format!("{topic} site:x.com OR {topic} site:twitter.com"),
            "social media",
        ),
        Category::Web => SearchWebParams::new(topic, "general"),
    };
    params.time_range("month")
}

pub struct SearxngSearch {
    category: Category,
    launch: McpLaunch,
    timeout: Duration,
    strict_ids: bool,
}

impl SearxngSearch {
    pub fn new(category: Category, launch: McpLaunch, timeout: Duration) -> Self {
        Self {
            category,
            launch,
            timeout,
            strict_ids: false,
        }
    }

    pub fn with_strict_ids(mut self, strict: bool) -> Self {
        self.strict_ids = strict;
        self
    }

    async fn call(&self, params: &SearchWebParams) -> Result<Value> {
        match &self.launch {
            McpLaunch::Spawn(argv) => {
                let mut client =
                    McpClient::spawn(argv, self.timeout)?.with_strict_ids(self.strict_ids);
                let outcome: std::result::Result<Value, McpError> = async {
                    client
                        .initialize(CLIENT_NAME, env!("CARGO_PKG_VERSION"))
                        .await?;
                    client.search_web(params).await
                }
                .await;
                client.close().await;
                Ok(outcome?)
            }
            McpLaunch::AttachedStdio => {
                let mut client = lock_ambient(self.timeout, self.strict_ids).await;
                Ok(client.search_web(params).await?)
            }
        }
    }
}

#[async_trait]
impl CategorySearch for SearxngSearch {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
        let params = query_for(self.category, &req.topic);
        debug!(target: "ingest", category = %self.category, query = %params.query, "searxng search");
        let raw = self.call(&params).await?;
        let payload = unwrap_tool_result(raw)?;
        parse_results(self.category, &payload, &req.window, req.today, max_items(req.depth))
    }

    fn source(&self) -> SourceTag {
        SourceTag::SearxngMcp
    }
}

/// Normalize a SearXNG `{results:[...]}` payload for one category.
pub fn parse_results(
    category: Category,
    payload: &Value,
    window: &SearchWindow,
    today: NaiveDate,
    max: usize,
) -> Result<Vec<CanonicalItem>> {
    if let Some(err) = payload.get("error").filter(|e| !e.is_null()) {
        bail!("searxng error: {err}");
    }
    let results = payload
        .get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let mut out = Vec::new();
    for r in results.iter().filter(|r| r.is_object()) {
        let url = str_field(r, &["url"]);
        if url.is_empty() {
            continue;
        }
        let title = normalize_text(str_field(r, &["title"]));
        let snippet = normalize_text(str_field(r, &["content"]));

        let detail = match category {
            Category::Reddit => {
                if !is_reddit_discussion_url(url) {
                    continue;
                }
                let subreddit = extract_subreddit(url);
                if subreddit.is_empty() {
                    continue;
                }
                ItemDetail::Reddit { subreddit }
            }
            Category::X => {
                if !is_x_url(url) {
                    continue;
                }
                ItemDetail::X {
                    author_handle: extract_author_handle(url),
                }
            }
            Category::Web => ItemDetail::Web {
                source_domain: extract_domain(url),
            },
        };

        let signal = match timestamp_date(str_field(r, DATE_FIELDS)) {
            Some(d) => DateSignal::high(d),
            None => extract_date_signals_at(url, &snippet, &title, today),
        };
        if !window.admits(signal.date()) {
            continue;
        }

        let display = if category == Category::X && title.is_empty() {
            snippet.clone()
        } else {
            title
        };
        out.push(CanonicalItem::new(
            id_from_url(category, url),
            url.to_string(),
            display,
            detail,
            signal,
            coerce_relevance(r.get("score"), 0.0),
            truncate_chars(&snippet, WHY_MAX_CHARS),
        ));
    }

    let mut out = dedup_by_url(out);
    out.truncate(max);
    Ok(out)
}
