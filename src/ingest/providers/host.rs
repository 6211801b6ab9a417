// src/ingest/providers/host.rs
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::ingest::types::{CanonicalItem, Category, CategorySearch, SearchRequest, SourceTag};

/// Web search the host performs itself. Nothing is fetched here; the host
/// runs the search and feeds its raw results through
/// [`crate::ingest::apply_date_detection`].
pub struct HostWebSearch;

#[async_trait]
impl CategorySearch for HostWebSearch {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
        info!(target: "ingest", topic = %req.topic, "web search delegated to host");
        Ok(Vec::new())
    }

    fn source(&self) -> SourceTag {
        SourceTag::HostWebsearch
    }
}

/// A category nothing can serve. Produces an empty result tagged `none`.
pub struct UnavailableSource {
    pub category: Category,
    pub reason: String,
}

#[async_trait]
impl CategorySearch for UnavailableSource {
    async fn search(&self, _req: &SearchRequest) -> Result<Vec<CanonicalItem>> {
        info!(target: "ingest", category = %self.category, reason = %self.reason, "category unavailable");
        Ok(Vec::new())
    }

    fn source(&self) -> SourceTag {
        SourceTag::None
    }
}
