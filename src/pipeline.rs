// src/pipeline.rs
//! One run: probe → resolve → validate → adapters → fan-out.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::dates::local_today;
use crate::fanout::{fan_out, FanoutOptions, Job};
use crate::ingest::providers::{build_adapter, http_client};
use crate::ingest::types::{Category, Depth, ProviderResult, SearchRequest, SearchWindow};
use crate::resolve::{
    available_sources, resolve, validate_sources, Availability, EffectiveSources, SearchMode,
    SourceRequest,
};

pub const DEFAULT_DAYS: u32 = 30;
/// Upper bound the CLI accepts for `--days`.
pub const MAX_DAYS: u32 = 3650;

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub topic: String,
    pub sources: SourceRequest,
    pub depth: Depth,
    pub days: u32,
    pub include_web: bool,
    /// Pin "today"; the local date when `None`.
    pub today: Option<NaiveDate>,
}

impl RunRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            sources: SourceRequest::Auto,
            depth: Depth::Default,
            days: DEFAULT_DAYS,
            include_web: false,
            today: None,
        }
    }

    pub fn window(&self) -> SearchWindow {
        SearchWindow::last_days(self.days, self.today.unwrap_or_else(local_today))
    }
}

/// What the binary prints.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub topic: String,
    pub window: SearchWindow,
    pub mode: SearchMode,
    pub sources: EffectiveSources,
    pub warning: Option<String>,
    pub results: BTreeMap<Category, ProviderResult>,
}

impl SearchReport {
    pub fn item_count(&self) -> usize {
        self.results.values().map(|r| r.items.len()).sum()
    }
}

pub async fn run_search(cfg: &Config, run: &RunRequest) -> Result<SearchReport> {
    let avail = Availability::probe(cfg).await;
    run_search_with(cfg, run, &avail).await
}

/// Same as [`run_search`] against an already probed machine.
pub async fn run_search_with(
    cfg: &Config,
    run: &RunRequest,
    avail: &Availability,
) -> Result<SearchReport> {
    let resolution = resolve(avail);
    let (sources, warning) =
        validate_sources(run.sources, available_sources(&resolution), run.include_web);
    if let Some(w) = &warning {
        warn!(target: "resolve", requested = ?run.sources, effective = %sources, "{w}");
    }

    let http = http_client()?;
    let jobs: Vec<Job> = sources
        .categories()
        .iter()
        .map(|&c| (c, build_adapter(cfg, c, resolution.provider(c), &http)))
        .collect();

    info!(target: "resolve", requested = ?run.sources, effective = %sources, "sources validated");

    let mut report = run_jobs(run, jobs, cfg).await?;
    report.mode = resolution.mode;
    report.sources = sources;
    report.warning = warning;
    Ok(report)
}

/// Fan out prepared adapters for a run. The report carries no resolution
/// details; callers that resolved fill them in.
pub async fn run_jobs(run: &RunRequest, jobs: Vec<Job>, cfg: &Config) -> Result<SearchReport> {
    let topic = run.topic.trim();
    if topic.is_empty() {
        bail!("topic must not be empty");
    }
    let today = run.today.unwrap_or_else(local_today);
    let window = SearchWindow::last_days(run.days, today);
    let req = SearchRequest {
        topic: topic.to_string(),
        window,
        depth: run.depth,
        today,
    };
    let opts = FanoutOptions::for_depth(run.depth, cfg.category_timeout);
    let results = fan_out(jobs, req, &opts).await;

    let report = SearchReport {
        topic: topic.to_string(),
        window,
        mode: SearchMode::None,
        sources: EffectiveSources::None,
        warning: None,
        results,
    };
    info!(target: "fanout", topic, items = report.item_count(), "run finished");
    Ok(report)
}
