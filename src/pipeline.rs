use std::path::Path;

use log::{error, info, warn};

use crate::collector::pool::TaskPool;
use crate::config::Config;
use crate::error::RunError;
use crate::events::spawn_consumer;
use crate::merge::merge;
use crate::metrics::{METRICS, RuntimeMetrics};
use crate::sink::snapshot::read_snapshot;
use crate::sink::{CommitReport, Sink};
use crate::sources::Registry;
use crate::util;

/// One collect → merge → commit pass over every enabled source.
///
/// The pipeline holds no per-run state, so `run_once` can be
/// called repeatedly from a schedule. Overlapping calls against
/// the same database are the caller's problem.
pub struct Pipeline {
    config: Config,
    registry: Registry,
    pool: TaskPool,
    sink: Sink,
}

impl Pipeline {
    pub fn new(config: Config, registry: Registry, sink: Sink) -> Self {
        let pool = TaskPool::new(config.pool.concurrency);
        Self {
            config,
            registry,
            pool,
            sink,
        }
    }

    pub fn sink(&self) -> &Sink {
        &self.sink
    }

    pub async fn run_once(&self) -> Result<CommitReport, RunError> {
        RuntimeMetrics::add(&METRICS.runs_started, 1);

        let tasks = self.registry.tasks(&self.config);
        if tasks.is_empty() {
            return Err(RunError::NoSources);
        }

        let attempted = tasks.len();
        info!(
            "run started: {attempted} sources, concurrency {}",
            self.pool.concurrency()
        );

        let (events, consumer) = spawn_consumer();
        let results = self.pool.run(tasks, &events).await;

        // Let the consumer flush every source line before the summary.
        drop(events);
        if let Err(e) = consumer.await {
            warn!("event consumer stopped abnormally: {e}");
        }

        let table = merge(results, util::today());

        if table.all_sources_failed() {
            let err = RunError::AllSourcesFailed { attempted };
            error!("{err}");
            return Err(err);
        }

        if !table.failed_sources.is_empty() {
            warn!(
                "{} of {attempted} sources failed this run: {}",
                table.failed_sources.len(),
                table.failed_sources.join(", ")
            );
        }

        for (uni, count) in table.counts_by_source() {
            info!("  {uni}: {count} positions");
        }
        info!("merged {} positions for {}", table.len(), table.scrape_date);

        let report = self.sink.commit(&table).await;
        log_report(&report);
        info!("[METRICS] {}", METRICS.summary());

        Ok(report)
    }
}

/// Loads an existing snapshot file into the database without
/// collecting anything.
pub async fn import_snapshot(sink: &Sink, path: &Path) -> anyhow::Result<CommitReport> {
    let table = read_snapshot(path, util::today())?;
    info!("importing {} rows from {}", table.len(), path.display());

    let report = sink.load_only(&table, path).await;
    log_report(&report);
    Ok(report)
}

fn log_report(report: &CommitReport) {
    match serde_json::to_string(report) {
        Ok(json) => info!("commit report: {json}"),
        Err(_) => info!("commit report: {report:?}"),
    }
}
