use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use clap::Parser;
use log::{error, info};
use rustls::crypto::{CryptoProvider, ring};

use unijob_collector::config::Config;
use unijob_collector::pipeline::{Pipeline, import_snapshot};
use unijob_collector::sink::Sink;
use unijob_collector::sources::Registry;

/// Collects university job listings into a CSV snapshot and SQLite.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the JSON configuration
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Run a single pass even if a schedule is configured
    #[arg(long)]
    once: bool,

    /// Load an existing snapshot CSV into the database and exit
    #[arg(long, value_name = "CSV")]
    import: Option<PathBuf>,
}

// ------------------------------------------------------------
// Application entry point
// ------------------------------------------------------------
//
// Responsibilities:
// - Initialize the rustls crypto backend and logging
// - Load configuration
// - Register every enabled source once
// - Run the pipeline once, or on the configured interval
//
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // rustls >= 0.23 needs an explicit process-wide provider,
    // installed before the first TLS connection.
    CryptoProvider::install_default(ring::default_provider())
        .map_err(|_| anyhow!("rustls CryptoProvider already installed"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let sink = Sink::new(&config.snapshot, &config.database)?;

    // --------------------------------------------------------
    // Import mode: snapshot file → database, no collection
    // --------------------------------------------------------
    if let Some(path) = args.import {
        let report = import_snapshot(&sink, &path).await?;
        return match report.failure_cause {
            None => Ok(()),
            Some(cause) => Err(anyhow!("import aborted: {cause}")),
        };
    }

    let registry = Registry::from_config(&config)?;
    info!("{} sources registered", registry.len());

    let schedule = config.schedule.clone().filter(|_| !args.once);
    let pipeline = Pipeline::new(config, registry, sink);

    // --------------------------------------------------------
    // Single run
    // --------------------------------------------------------
    let Some(schedule) = schedule else {
        let report = pipeline.run_once().await?;
        return match report.failure_cause.or(report.snapshot_error) {
            None => Ok(()),
            Some(cause) => Err(anyhow!("run finished with errors: {cause}")),
        };
    };

    // --------------------------------------------------------
    // Scheduled runs
    //
    // A failed run is logged and the next tick runs as usual.
    // Runs never overlap: the next tick waits for this one.
    // --------------------------------------------------------
    let period = Duration::from_secs(schedule.interval_secs);
    info!("running every {period:?}");

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = pipeline.run_once().await {
            error!("run failed: {e}");
        }
    }
}
