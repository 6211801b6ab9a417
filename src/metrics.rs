// src/metrics.rs
use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register metric descriptions once per process. Safe to call from anywhere;
/// without an installed recorder the macros are no-ops.
pub fn ensure_described() {
    DESCRIBED.get_or_init(describe_all);
}

fn describe_all() {
    describe_counter!(
        "search_items_total",
        "Items returned per category after normalization and date filtering."
    );
    describe_counter!(
        "search_category_errors_total",
        "Categories that ended in an error."
    );
    describe_histogram!(
        "search_category_ms",
        "Wall time of one category search in milliseconds."
    );
    describe_counter!("mcp_requests_total", "JSON-RPC requests sent.");
    describe_counter!(
        "mcp_notifications_skipped_total",
        "Notification lines discarded while waiting for an answer."
    );
    describe_counter!("mcp_errors_total", "Failed JSON-RPC requests by kind.");
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        // Describe against the recorder just installed, even if an earlier
        // call ran with none.
        describe_all();
        DESCRIBED.get_or_init(|| ());
        Ok(Self { handle })
    }

    /// Exposition text of everything recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
