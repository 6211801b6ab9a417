// tests/fanout.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use last30days::fanout::{fan_out, FanoutOptions, Job};
use last30days::ingest::types::{
    CanonicalItem, Category, CategorySearch, DateSignal, ItemDetail, SearchRequest, SearchWindow,
    SourceTag,
};
use std::sync::Arc;
use std::time::Duration;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn request() -> SearchRequest {
    SearchRequest {
        topic: "widget safety".into(),
        window: SearchWindow::parse("2026-01-01", "2026-01-30").unwrap(),
        depth: Default::default(),
        today: d("2026-01-30"),
    }
}

fn web_item(url: &str, date: Option<&str>) -> CanonicalItem {
    CanonicalItem::new(
        format!("W-{url}"),
        url.to_string(),
        "t".into(),
        ItemDetail::Web {
            source_domain: "example.com".into(),
        },
        date.map(|s| DateSignal::high(d(s))).unwrap_or(DateSignal::Unknown),
        0.5,
        String::new(),
    )
}

enum Behavior {
    Items(Vec<CanonicalItem>),
    Fail,
    Panic,
    Hang,
}

struct Stub {
    tag: SourceTag,
    behavior: Behavior,
}

#[async_trait]
impl CategorySearch for Stub {
    async fn search(&self, _req: &SearchRequest) -> anyhow::Result<Vec<CanonicalItem>> {
        match &self.behavior {
            Behavior::Items(items) => Ok(items.clone()),
            Behavior::Fail => anyhow::bail!("upstream exploded"),
            Behavior::Panic => panic!("adapter bug"),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }

    fn source(&self) -> SourceTag {
        self.tag
    }
}

fn job(category: Category, tag: SourceTag, behavior: Behavior) -> Job {
    let adapter: Arc<dyn CategorySearch> = Arc::new(Stub { tag, behavior });
    (category, adapter)
}

fn quick_opts() -> FanoutOptions {
    FanoutOptions {
        category_timeout: Duration::from_millis(300),
        join_timeout: Duration::from_secs(5),
        workers: 3,
    }
}

#[tokio::test]
async fn one_failing_category_does_not_affect_siblings() {
    let jobs = vec![
        job(Category::Reddit, SourceTag::OpenRouter, Behavior::Fail),
        job(
            Category::X,
            SourceTag::Bird,
            Behavior::Items(vec![web_item("https://x.com/a/status/1", Some("2026-01-10"))]),
        ),
        job(
            Category::Web,
            SourceTag::SearxngMcp,
            Behavior::Items(vec![web_item("https://example.com/a", None)]),
        ),
    ];
    let out = fan_out(jobs, request(), &quick_opts()).await;

    assert_eq!(out.len(), 3);
    assert_eq!(out[&Category::Reddit].source, SourceTag::Error);
    assert!(out[&Category::Reddit].items.is_empty());
    assert_eq!(out[&Category::X].source, SourceTag::Bird);
    assert_eq!(out[&Category::X].items.len(), 1);
    assert_eq!(out[&Category::Web].source, SourceTag::SearxngMcp);
    assert_eq!(out[&Category::Web].items.len(), 1);
}

#[tokio::test]
async fn panics_and_timeouts_become_errors() {
    let jobs = vec![
        job(Category::Reddit, SourceTag::OpenAi, Behavior::Panic),
        job(Category::X, SourceTag::Xai, Behavior::Hang),
        job(Category::Web, SourceTag::HostWebsearch, Behavior::Items(vec![])),
    ];
    let started = std::time::Instant::now();
    let out = fan_out(jobs, request(), &quick_opts()).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(out[&Category::Reddit].source, SourceTag::Error);
    assert_eq!(out[&Category::X].source, SourceTag::Error);
    assert_eq!(out[&Category::Web].source, SourceTag::HostWebsearch);
}

#[tokio::test]
async fn join_timeout_keeps_finished_categories() {
    let jobs = vec![
        job(
            Category::Reddit,
            SourceTag::OpenRouter,
            Behavior::Items(vec![web_item("https://example.com/r", Some("2026-01-05"))]),
        ),
        job(Category::X, SourceTag::Bird, Behavior::Hang),
    ];
    let opts = FanoutOptions {
        category_timeout: Duration::from_secs(60),
        join_timeout: Duration::from_millis(300),
        workers: 3,
    };
    let out = fan_out(jobs, request(), &opts).await;

    assert_eq!(out.len(), 2);
    assert_eq!(out[&Category::Reddit].items.len(), 1);
    assert_eq!(out[&Category::X].source, SourceTag::Error);
}

#[tokio::test]
async fn out_of_window_items_are_dropped_at_the_boundary() {
    let jobs = vec![job(
        Category::Web,
        SourceTag::HostWebsearch,
        Behavior::Items(vec![
            web_item("https://example.com/in", Some("2026-01-30")),
            web_item("https://example.com/out", Some("2026-01-31")),
            web_item("https://example.com/undated", None),
        ]),
    )];
    let out = fan_out(jobs, request(), &quick_opts()).await;
    let urls: Vec<_> = out[&Category::Web].items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["https://example.com/in", "https://example.com/undated"]);
}

#[tokio::test]
async fn empty_job_list_is_an_empty_map() {
    let out = fan_out(Vec::new(), request(), &quick_opts()).await;
    assert!(out.is_empty());
}
