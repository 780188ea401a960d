use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use geolog::config::Config;
use geolog::pipeline::Pipeline;
use geolog::sink::{drain_into, JsonLinesSink};

#[derive(Parser)]
#[command(name = "geolog")]
#[command(about = "Enrich gzip access logs with client country codes", long_about = None)]
struct Cli {
    /// Path to a gzip-compressed access log
    path: PathBuf,
    /// Lines enriched concurrently per batch
    #[arg(long)]
    batch_size: Option<usize>,
    /// Records written to the output per write
    #[arg(long)]
    sink_batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, records to stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(size) = cli.batch_size {
        config.pipeline.batch_size = size;
    }
    if let Some(size) = cli.sink_batch_size {
        config.sink.batch_size = size;
    }

    let pipeline = Pipeline::from_config(&config).context("failed to set up enrichment pipeline")?;
    info!(
        path = %cli.path.display(),
        batch_size = pipeline.batch_size(),
        "Processing access log"
    );

    let records = pipeline.process_file(&cli.path).await?;
    let sink = JsonLinesSink::new(tokio::io::stdout());
    let written = drain_into(records, &sink, config.sink.batch_size).await?;

    let stats = pipeline.stats().snapshot();
    info!(
        written,
        lines = stats.lines,
        batches = stats.batches,
        degraded = stats.degraded,
        rejected = stats.rejected,
        failed = stats.failed,
        cached_clients = pipeline.cache().len(),
        "Access log processed"
    );

    Ok(())
}
