// src/fanout.rs
//! Concurrent per-category search. Every requested category gets an entry in
//! the result map, whatever happens to its adapter.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ingest::types::{
    Category, CategorySearch, Depth, ProviderResult, SearchRequest, SourceTag,
};

/// One worker per category.
pub const WORKERS: usize = 3;
const JOIN_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutOptions {
    pub category_timeout: Duration,
    pub join_timeout: Duration,
    pub workers: usize,
}

impl FanoutOptions {
    pub fn for_depth(depth: Depth, category_timeout: Option<Duration>) -> Self {
        let category_timeout = category_timeout.unwrap_or_else(|| depth.category_timeout());
        Self {
            category_timeout,
            join_timeout: category_timeout + JOIN_SLACK,
            workers: WORKERS,
        }
    }
}

pub type Job = (Category, Arc<dyn CategorySearch>);

/// Run every job concurrently and collect one `ProviderResult` per category.
///
/// Failures, panics and timeouts inside a category become an empty result
/// tagged `error`. If the join deadline passes, finished categories are kept
/// and the rest are aborted and reported as errors.
pub async fn fan_out(
    jobs: Vec<Job>,
    req: SearchRequest,
    opts: &FanoutOptions,
) -> BTreeMap<Category, ProviderResult> {
    crate::metrics::ensure_described();

    let requested: Vec<Category> = jobs.iter().map(|(c, _)| *c).collect();
    let req = Arc::new(req);
    let permits = Arc::new(Semaphore::new(opts.workers.max(1)));
    let budget = opts.category_timeout;

    let mut set = JoinSet::new();
    for (category, adapter) in jobs {
        let req = req.clone();
        let permits = permits.clone();
        set.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let result = run_category(category, adapter, req, budget).await;
            (category, result)
        });
    }

    let deadline = Instant::now() + opts.join_timeout;
    let mut results = BTreeMap::new();
    loop {
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok((category, result)))) => {
                results.insert(category, result);
            }
            Ok(Some(Err(e))) => {
                warn!(target: "fanout", error = %e, "category worker did not finish");
            }
            Ok(None) => break,
            Err(_) => {
                warn!(
                    target: "fanout",
                    pending = set.len(),
                    timeout = ?opts.join_timeout,
                    "join timeout; keeping partial results"
                );
                set.abort_all();
                break;
            }
        }
    }

    for category in requested {
        results.entry(category).or_insert_with(|| {
            counter!("search_category_errors_total", "category" => category.as_str())
                .increment(1);
            ProviderResult::error()
        });
    }
    results
}

/// Cancels the search task when the worker is dropped, including when the
/// join deadline aborts the worker.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_category(
    category: Category,
    adapter: Arc<dyn CategorySearch>,
    req: Arc<SearchRequest>,
    budget: Duration,
) -> ProviderResult {
    let started = Instant::now();
    let source = adapter.source();
    debug!(target: "fanout", %category, %source, "category started");

    // Own task so a panic stays inside this category.
    let task = tokio::spawn({
        let req = req.clone();
        async move { adapter.search(&req).await }
    });
    let _abort = AbortOnDrop(task.abort_handle());

    let result = match tokio::time::timeout(budget, task).await {
        Ok(Ok(Ok(items))) => {
            let mut items = items;
            items.retain(|it| req.window.admits(it.date()));
            ProviderResult::new(items, source)
        }
        Ok(Ok(Err(e))) => {
            warn!(target: "fanout", %category, %source, error = ?e, "category search failed");
            ProviderResult::error()
        }
        Ok(Err(e)) => {
            warn!(target: "fanout", %category, %source, error = %e, "category search panicked");
            ProviderResult::error()
        }
        Err(_) => {
            warn!(target: "fanout", %category, %source, timeout = ?budget, "category search timed out");
            ProviderResult::error()
        }
    };

    histogram!("search_category_ms", "category" => category.as_str())
        .record(started.elapsed().as_secs_f64() * 1000.0);
    if result.source == SourceTag::Error {
        counter!("search_category_errors_total", "category" => category.as_str()).increment(1);
    } else {
        counter!("search_items_total", "category" => category.as_str())
            .increment(result.items.len() as u64);
    }
    debug!(
        target: "fanout",
        %category,
        source = %result.source,
        items = result.items.len(),
        "category finished"
    );
    result
}
