//! Glucowatch CLI
//!
//! Command-line interface for the adaptive CGM polling service:
//! - Run the polling loop
//! - Fetch the current reading once
//! - Generate a starter config file

use anyhow::Context;
use clap::{Parser, Subcommand};
use glucowatch::config::{generate_default_config, Config};
use glucowatch::poller::Poller;
use glucowatch::scheduler::ReadingScheduler;
use glucowatch::source::{NightscoutSource, ReadingSource};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "glucowatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Adaptive CGM polling service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the source continuously, aligned to the sensor's cadence
    Run,

    /// Fetch and print the current reading once
    Fetch {
        /// Print the full batch instead of just the newest reading
        #[arg(long)]
        all: bool,
    },

    /// Write a commented default config file to stdout
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_logging(&config);

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Fetch { all } => fetch(config, all).await,
        Commands::InitConfig => {
            print!("{}", generate_default_config());
            Ok(())
        }
    }
}

/// Initialize logging per the config (env filter still wins)
fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("glucowatch={}", config.logging.level)),
    );

    if config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// The continuous polling loop
async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Glucowatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Source: {}", config.source.base_url);

    let fetch_count = config.source.fetch_count;
    let source = Arc::new(
        NightscoutSource::new(config.source).context("failed to build the reading source")?,
    );

    let poller = Poller::new(source, fetch_count);
    let scheduler = ReadingScheduler::new(config.scheduler, poller.clone());
    poller.attach_scheduler(scheduler.clone());

    poller.start().await;

    // Log each new reading as it lands until ctrl-c.
    let mut latest = poller.latest();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = latest.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(reading) = latest.borrow_and_update().clone() {
                    let status = scheduler.status().await;
                    tracing::info!(
                        mgdl = reading.mgdl,
                        mmol = %format!("{:.1}", reading.mmol()),
                        trend = %reading.trend.map(|t| t.arrow()).unwrap_or("-"),
                        next_poll = ?status.next_expected_arrival,
                        "new reading"
                    );
                }
            }
        }
    }

    tracing::info!("Shutting down...");
    poller.stop().await;
    tracing::info!("Glucowatch shutdown complete");
    Ok(())
}

/// One-shot fetch for scripting and sanity checks
async fn fetch(config: Config, all: bool) -> anyhow::Result<()> {
    let fetch_count = config.source.fetch_count;
    let source =
        NightscoutSource::new(config.source).context("failed to build the reading source")?;

    let readings = source
        .fetch_recent(fetch_count)
        .await
        .context("fetch failed")?;

    if readings.is_empty() {
        anyhow::bail!("the source returned no readings");
    }

    if all {
        for reading in &readings {
            println!(
                "{}  {:>5.0} mg/dL  {}",
                reading.timestamp.format("%Y-%m-%d %H:%M:%S"),
                reading.mgdl,
                reading.trend.map(|t| t.arrow()).unwrap_or("-")
            );
        }
    } else {
        let newest = &readings[0];
        println!(
            "{} mg/dL ({:.1} mmol/L) {}  at {}",
            newest.mgdl,
            newest.mmol(),
            newest.trend.map(|t| t.arrow()).unwrap_or("-"),
            newest.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
