// tests/e2e.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use last30days::config::Config;
use last30days::fanout::Job;
use last30days::ingest::providers::openrouter;
use last30days::ingest::types::{
    CanonicalItem, Category, CategorySearch, DateConfidence, SearchRequest, SourceTag,
};
use last30days::ingest::{apply_date_detection, HostWebResult};
use last30days::pipeline::{run_jobs, run_search_with, RunRequest};
use last30days::resolve::{Availability, EffectiveSources, SearchMode, SourceRequest};
use serde_json::{json, Value};
use std::sync::Arc;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// 2026-01-01..=2026-01-30
fn widget_run() -> RunRequest {
    RunRequest {
        days: 29,
        today: Some(d("2026-01-30")),
        ..RunRequest::new("widget safety")
    }
}

/// Forum adapter that answers with a canned chat-completions body and runs
/// the real normalizer over it.
struct CannedForum(Value);

#[async_trait]
impl CategorySearch for CannedForum {
    async fn search(&self, req: &SearchRequest) -> anyhow::Result<Vec<CanonicalItem>> {
        openrouter::parse_response(&self.0, req)
    }

    fn source(&self) -> SourceTag {
        SourceTag::OpenRouter
    }
}

fn forum_body() -> Value {
    let items = json!({"items": [
        {"title": "January thread", "url": "https://www.reddit.com/r/widgets/comments/a1/january/",
         "subreddit": "widgets", "date": "2026-01-15", "relevance": 0.8},
        {"title": "December thread", "url": "https://www.reddit.com/r/widgets/comments/d1/december/",
         "subreddit": "widgets", "date": "2025-12-01", "relevance": 0.8}
    ]});
    json!({"choices": [{"message": {"content": items.to_string()}}]})
}

#[tokio::test]
async fn only_the_january_forum_item_survives() {
    let run = widget_run();
    let adapter: Arc<dyn CategorySearch> = Arc::new(CannedForum(forum_body()));
    let jobs: Vec<Job> = vec![(Category::Reddit, adapter)];

    let report = run_jobs(&run, jobs, &Config::default()).await.unwrap();
    assert_eq!(report.window.from, d("2026-01-01"));
    assert_eq!(report.window.to, d("2026-01-30"));

    let reddit = &report.results[&Category::Reddit];
    assert_eq!(reddit.source, SourceTag::OpenRouter);
    assert_eq!(reddit.items.len(), 1);
    assert_eq!(reddit.items[0].title, "January thread");
    assert_eq!(reddit.items[0].date(), Some(d("2026-01-15")));
}

#[test]
fn url_date_alone_is_high_confidence() {
    let raw = vec![HostWebResult {
        url: "https://news.example.com/2026/01/24/some-article".into(),
        title: "Some article".into(),
        snippet: String::new(),
    }];
    let items = apply_date_detection(
        raw,
        &last30days::ingest::types::SearchWindow::parse("2026-01-01", "2026-01-30").unwrap(),
        d("2026-01-30"),
    );
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].date(), Some(d("2026-01-24")));
    assert_eq!(items[0].date_confidence(), DateConfidence::High);

    let v = serde_json::to_value(&items[0]).unwrap();
    assert_eq!(v["date"], "2026-01-24");
    assert_eq!(v["date_confidence"], "high");
    assert_eq!(v["source_domain"], "news.example.com");
}

#[tokio::test]
async fn bare_machine_falls_back_to_host_web_search() {
    let cfg = Config::default();
    let report = run_search_with(&cfg, &widget_run(), &Availability::default())
        .await
        .unwrap();

    assert_eq!(report.mode, SearchMode::None);
    assert_eq!(report.sources, EffectiveSources::Web);
    assert!(report.warning.is_none());
    assert_eq!(report.results.len(), 1);
    let web = &report.results[&Category::Web];
    assert_eq!(web.source, SourceTag::HostWebsearch);
    assert!(web.items.is_empty());
}

#[tokio::test]
async fn keyed_request_on_bare_machine_warns() {
    let cfg = Config::default();
    let run = RunRequest {
        sources: SourceRequest::Reddit,
        ..widget_run()
    };
    let report = run_search_with(&cfg, &run, &Availability::default())
        .await
        .unwrap();
    assert_eq!(report.sources, EffectiveSources::Web);
    assert!(report.warning.is_some());
}

#[tokio::test]
async fn report_serializes_with_category_keys() {
    let report = run_search_with(&Config::default(), &widget_run(), &Availability::default())
        .await
        .unwrap();
    let v = serde_json::to_value(&report).unwrap();
    assert_eq!(v["topic"], "widget safety");
    assert_eq!(v["window"]["from"], "2026-01-01");
    assert_eq!(v["mode"], "none");
    assert_eq!(v["sources"], "web");
    assert_eq!(v["results"]["web"]["source"], "host_websearch");
    assert_eq!(v["results"]["web"]["items"], json!([]));
}

#[tokio::test]
async fn blank_topic_is_rejected() {
    let run = RunRequest {
        topic: "   ".into(),
        ..widget_run()
    };
    assert!(run_jobs(&run, Vec::new(), &Config::default()).await.is_err());
}

#[tokio::test]
async fn oversized_day_count_does_not_panic() {
    let run = RunRequest {
        days: 4_000_000_000,
        ..widget_run()
    };
    let w = run.window();
    assert_eq!(w.from, NaiveDate::MIN);
    assert_eq!(w.to, d("2026-01-30"));

    let jobs: Vec<Job> = Vec::new();
    let report = run_jobs(&run, jobs, &Config::default()).await.unwrap();
    assert_eq!(report.window, w);
}
