// src/ingest/providers/bird.rs
//! X search through the locally installed `bird` CLI.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

use crate::dates::extract_date_signals_at;
use crate::ingest::types::{
    CanonicalItem, Category, CategorySearch, DateSignal, Depth, ItemDetail, SearchRequest,
    SearchWindow, SourceTag,
};
use crate::ingest::{
    dedup_by_url, extract_author_handle, is_x_url, item_id, normalize_text, str_field,
    timestamp_date,
};

/// CLI results carry no score; every tweet gets the same relevance.
const BIRD_RELEVANCE: f64 = 0.7;

pub fn result_count(depth: Depth) -> u32 {
    depth.pick((12, 30, 60))
}

pub fn cli_timeout(depth: Depth) -> Duration {
    Duration::from_secs(depth.pick((30, 45, 60)))
}

pub struct BirdSearch {
    bin: String,
}

impl BirdSearch {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// `bird search <topic> --since <from> -n <count> --json`
    pub fn args(req: &SearchRequest) -> Vec<String> {
        vec![
            "search".to_string(),
            req.topic.clone(),
            "--since".to_string(),
            req.window.from.format("%Y-%m-%d").to_string(),
            "-n".to_string(),
            result_count(req.depth).to_string(),
            "--json".to_string(),
        ]
    }
}

#[async_trait]
impl CategorySearch for BirdSearch {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(Self::args(req)).kill_on_drop(true);
        debug!(target: "bird", topic = %req.topic, depth = ?req.depth, "searching x");

        let budget = cli_timeout(req.depth);
        let out = tokio::time::timeout(budget, cmd.output())
            .await
            .map_err(|_| anyhow!("bird search timed out after {budget:?}"))?
            .with_context(|| format!("running {}", self.bin))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            if stderr.is_empty() {
                bail!("bird search failed ({})", out.status);
            }
            bail!("bird search failed: {stderr}");
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        parse_output(&stdout, &req.window, req.today)
    }

    fn source(&self) -> SourceTag {
        SourceTag::Bird
    }
}

/// Parse `bird --json` output: an array of tweets or an object holding one.
pub fn parse_output(
    stdout: &str,
    window: &SearchWindow,
    today: NaiveDate,
) -> Result<Vec<CanonicalItem>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let v: Value = serde_json::from_str(trimmed).context("bird output is not JSON")?;
    if let Some(err) = v.get("error").and_then(Value::as_str) {
        bail!("bird reported an error: {err}");
    }
    let tweets: &[Value] = match &v {
        Value::Array(a) => a.as_slice(),
        Value::Object(_) => ["tweets", "items", "results"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };

    let mut out = Vec::with_capacity(tweets.len());
    for tweet in tweets.iter().filter(|t| t.is_object()) {
        if let Some(item) = tweet_item(tweet, today) {
            if window.admits(item.date()) {
                out.push(item);
            }
        }
    }
    Ok(dedup_by_url(out))
}

fn tweet_item(tweet: &Value, today: NaiveDate) -> Option<CanonicalItem> {
    let id = match tweet.get("id") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let text = normalize_text(str_field(tweet, &["text", "full_text"]));

    let mut handle = tweet
        .pointer("/author/username")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();
    if handle.is_empty() {
        handle = str_field(tweet, &["username", "author_handle"]).to_string();
    }
    let handle = handle.trim_start_matches('@').to_string();

    let url = match str_field(tweet, &["url", "permanentUrl"]) {
        "" if !handle.is_empty() && !id.is_empty() => {
            format!("https://x.com/{handle}/status/{id}")
        }
        "" => return None,
        u => u.to_string(),
    };
    if !is_x_url(&url) {
        debug!(target: "bird", %url, "dropping tweet with a non-platform url");
        return None;
    }
    let handle = if handle.is_empty() {
        extract_author_handle(&url)
    } else {
        handle
    };

    let signal = match timestamp_date(str_field(tweet, &["createdAt", "created_at"])) {
        Some(d) => DateSignal::high(d),
        None => extract_date_signals_at(&url, &text, "", today),
    };

    let provided_id = if id.is_empty() {
        String::new()
    } else {
        format!("X{id}")
    };
    Some(CanonicalItem::new(
        item_id(Category::X, &provided_id, &url),
        url,
        text,
        ItemDetail::X {
            author_handle: handle,
        },
        signal,
        BIRD_RELEVANCE,
        String::new(),
    ))
}
