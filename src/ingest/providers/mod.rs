// src/ingest/providers/mod.rs
pub mod bird;
pub mod host;
pub mod llm_output;
pub mod openai;
pub mod openrouter;
pub mod searxng;
pub mod xai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::models::ModelVendor;
use crate::config::Config;
use crate::ingest::types::{Category, CategorySearch};
use crate::resolve::Provider;

/// Shared HTTP client for the direct-API providers. Per-request timeouts are
/// set by each provider from the depth table.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("last30days/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("building HTTP client")
}

/// Concrete adapter for the provider the resolver picked.
pub fn build_adapter(
    cfg: &Config,
    category: Category,
    provider: &Provider,
    http: &reqwest::Client,
) -> Arc<dyn CategorySearch> {
    let key = |k: &Option<String>| k.clone().unwrap_or_default();
    match provider {
        Provider::OpenRouter => Arc::new(openrouter::OpenRouterReddit::new(
            http.clone(),
            key(&cfg.openrouter_api_key),
            cfg.model_for(ModelVendor::OpenRouter),
        )),
        Provider::OpenAi => Arc::new(openai::OpenAiReddit::new(
            http.clone(),
            key(&cfg.openai_api_key),
            cfg.model_for(ModelVendor::OpenAi),
        )),
        Provider::Xai => Arc::new(xai::XaiSearch::new(
            http.clone(),
            key(&cfg.xai_api_key),
            cfg.model_for(ModelVendor::Xai),
        )),
        Provider::Bird => Arc::new(bird::BirdSearch::new(cfg.bird_bin.clone())),
        Provider::Searxng(launch) => Arc::new(
            searxng::SearxngSearch::new(category, launch.clone(), cfg.mcp_timeout)
                .with_strict_ids(cfg.mcp_strict_ids),
        ),
        Provider::HostWebsearch => Arc::new(host::HostWebSearch),
        Provider::Unavailable { reason } => Arc::new(host::UnavailableSource {
            category,
            reason: reason.clone(),
        }),
    }
}
