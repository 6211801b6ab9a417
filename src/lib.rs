// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod dates;
pub mod fanout;
pub mod ingest;
pub mod mcp;
pub mod metrics;
pub mod pipeline;
pub mod resolve;

pub use crate::config::Config;
pub use crate::ingest::types::{CanonicalItem, Category, ProviderResult, SourceTag};
pub use crate::pipeline::{run_search, RunRequest, SearchReport};
