use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use w3cstat::analytics::{Aggregator, Resolution};
use w3cstat::config::Config;
use w3cstat::ingest;
use w3cstat::output::WriterSink;

#[derive(Parser)]
#[command(name = "w3cstat")]
#[command(about = "Summarize W3C access logs into time-bucketed traffic statistics", long_about = None)]
struct Cli {
    /// Log files, or directories to search for log files
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Bucket width (week, day, hour, minute)
    #[arg(short, long)]
    resolution: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print progress notes to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration; flags win over the environment
    let mut config = Config::from_env()?;
    if let Some(resolution) = cli.resolution {
        config.report.resolution = resolution;
    }
    if let Some(output) = cli.output {
        config.report.output = Some(output);
    }
    config.report.verbose |= cli.verbose;

    init_tracing(config.report.verbose);

    let resolution: Resolution = config
        .report
        .resolution
        .parse()
        .context("invalid report resolution")?;

    // Ctrl-C stops loading at the next file or line, and the report at the
    // next bucket or resource row
    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = Arc::clone(&cancelled);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping report");
                cancelled.store(true, Ordering::Relaxed);
            }
        });
    }

    let paths = cli.paths;
    let input = config.input.clone();
    let stop = Arc::clone(&cancelled);
    let loaded = tokio::task::spawn_blocking(move || {
        ingest::load_paths(&paths, &input, &|| stop.load(Ordering::Relaxed))
    })
    .await?
    .context("failed to load log files")?;

    if loaded.interrupted {
        warn!(
            "Loading cancelled after {} files, no report written",
            loaded.files_read
        );
        return Ok(());
    }

    info!(
        "Read {} records from {} files ({} lines skipped)",
        loaded.records.len(),
        loaded.files_read,
        loaded.skipped_lines
    );

    let output = config.report.output.clone();
    let stop = Arc::clone(&cancelled);
    tokio::task::spawn_blocking(move || -> Result<()> {
        let aggregator = Aggregator::new(resolution);
        let mut notes = |note: &str| info!("{note}");
        let is_cancelled = || stop.load(Ordering::Relaxed);

        match output {
            Some(path) => {
                let mut sink = WriterSink::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                aggregator.run(&loaded.records, &mut sink, &mut notes, &is_cancelled)?;
                info!("Wrote {} lines to {}", sink.lines_written(), path.display());
                sink.finish()?;
            }
            None => {
                let mut sink = WriterSink::stdout();
                aggregator.run(&loaded.records, &mut sink, &mut notes, &is_cancelled)?;
                sink.finish()?;
            }
        }
        Ok(())
    })
    .await??;

    if cancelled.load(Ordering::Relaxed) {
        warn!("Report is incomplete: aggregation was cancelled");
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
