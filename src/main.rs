//! last30days: what Reddit, X and the web said about a topic recently.
//! Prints one JSON report to stdout; logs go to stderr.

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use last30days::config::Config;
use last30days::ingest::types::Depth;
use last30days::metrics::Metrics;
use last30days::pipeline::{run_search, RunRequest, DEFAULT_DAYS, MAX_DAYS};
use last30days::resolve::SourceRequest;

#[derive(Parser)]
#[command(name = "last30days")]
#[command(about = "Recent Reddit, X and web discussion about a topic", long_about = None)]
#[command(version)]
struct Cli {
    /// Topic to research
    #[arg(required = true, num_args = 1..)]
    topic: Vec<String>,

    /// auto | reddit | x | both | web
    #[arg(long, default_value = "auto")]
    sources: SourceRequest,

    /// quick | default | deep
    #[arg(long, default_value = "default")]
    depth: Depth,

    /// Window length in days, ending today
    #[arg(long, default_value_t = DEFAULT_DAYS, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_DAYS)))]
    days: u32,

    /// Add general web search alongside Reddit/X
    #[arg(long)]
    include_web: bool,

    /// Write Prometheus metrics to stderr after the run
    #[arg(long)]
    print_metrics: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Compact logs on stderr; stdout carries the report and, in attached-stdio
/// mode, the protocol itself.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "last30days=debug,warn"
    } else {
        "last30days=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(io::stderr))
        .init();
}

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = Config::load().context("loading configuration")?;
    let metrics = if cli.print_metrics {
        match Metrics::install() {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(error = ?e, "metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let run = RunRequest {
        sources: cli.sources,
        depth: cli.depth,
        days: cli.days,
        include_web: cli.include_web,
        ..RunRequest::new(cli.topic.join(" "))
    };
    let report = run_search(&cfg, &run).await?;
    print_stdout(&serde_json::to_string_pretty(&report).context("serializing report")?)?;

    if let Some(m) = metrics {
        eprintln!("{}", m.render());
    }
    Ok(())
}
