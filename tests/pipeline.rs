use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use serde_json::json;
use url::Url;

use unijob_collector::config::Config;
use unijob_collector::error::RunError;
use unijob_collector::pipeline::{Pipeline, import_snapshot};
use unijob_collector::schema::RawListing;
use unijob_collector::sink::{RelationalStatus, Sink};
use unijob_collector::sink::snapshot::read_snapshot;
use unijob_collector::sources::Registry;
use unijob_collector::sources::adapter::SourceCollector;

struct Listing(usize);

#[async_trait::async_trait]
impl SourceCollector for Listing {
    fn kind(&self) -> &'static str {
        "fixture"
    }

    async fn collect(&self, _entry: &Url) -> anyhow::Result<Vec<RawListing>> {
        Ok((0..self.0)
            .map(|i| RawListing::new(format!("Position {i}"), format!("/jobs/{i}")))
            .collect())
    }
}

struct Hang;

#[async_trait::async_trait]
impl SourceCollector for Hang {
    fn kind(&self) -> &'static str {
        "fixture"
    }

    async fn collect(&self, _entry: &Url) -> anyhow::Result<Vec<RawListing>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }
}

struct Broken;

#[async_trait::async_trait]
impl SourceCollector for Broken {
    fn kind(&self) -> &'static str {
        "fixture"
    }

    async fn collect(&self, _entry: &Url) -> anyhow::Result<Vec<RawListing>> {
        Err(anyhow!("connection reset"))
    }
}

fn config(dir: &Path, names: &[&str]) -> Config {
    let sources: Vec<_> = names
        .iter()
        .map(|name| {
            json!({
                "name": name,
                "kind": "paged_listing",
                "url": format!("https://{}.example.edu", name.to_lowercase()),
                "timeout_secs": 1
            })
        })
        .collect();

    let raw = json!({
        "sources": sources,
        "pool": { "concurrency": 2 },
        "snapshot": { "path": dir.join("tables/job_data.csv") },
        "database": { "url": format!("sqlite://{}", dir.join("jobs.db").display()) }
    });

    Config::from_json(&raw.to_string()).unwrap()
}

fn pipeline(config: Config, registry: Registry) -> Pipeline {
    let sink = Sink::new(&config.snapshot, &config.database).unwrap();
    Pipeline::new(config, registry, sink)
}

#[tokio::test]
async fn partial_failure_still_commits_successful_sources() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["UNSW", "ANU", "USYD"]);

    let mut registry = Registry::default();
    registry.register("UNSW", Arc::new(Listing(10)));
    registry.register("ANU", Arc::new(Listing(0)));
    registry.register("USYD", Arc::new(Hang));

    let pipeline = pipeline(config, registry);
    let report = pipeline.run_once().await.unwrap();

    assert_eq!(report.rows_written, 10);
    assert_eq!(report.relational_status, RelationalStatus::Committed);
    assert!(report.failure_cause.is_none());
    assert!(report.snapshot_error.is_none());
    assert_eq!(pipeline.sink().store().count().await.unwrap(), 10);

    let snapshot = read_snapshot(
        &dir.path().join("tables/job_data.csv"),
        chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
    )
    .unwrap();
    assert_eq!(snapshot.len(), 10);
    assert!(snapshot.rows.iter().all(|r| r.uni_name == "UNSW"));
    assert!(snapshot
        .rows
        .iter()
        .all(|r| r.link.starts_with("https://unsw.example.edu/jobs/")));
}

#[tokio::test]
async fn all_sources_failing_leaves_storage_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["UQ", "USYD"]);

    let mut registry = Registry::default();
    registry.register("UQ", Arc::new(Broken));
    registry.register("USYD", Arc::new(Broken));

    let err = pipeline(config, registry).run_once().await.unwrap_err();

    assert!(matches!(err, RunError::AllSourcesFailed { attempted: 2 }));
    assert!(!dir.path().join("tables/job_data.csv").exists());
}

#[tokio::test]
async fn unregistered_sources_are_not_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["UQ"]);

    let err = pipeline(config, Registry::default()).run_once().await.unwrap_err();

    assert!(matches!(err, RunError::NoSources));
}

#[tokio::test]
async fn snapshot_can_be_imported_into_a_fresh_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), &["UNSW"]);

    let mut registry = Registry::default();
    registry.register("UNSW", Arc::new(Listing(42)));
    pipeline(config, registry).run_once().await.unwrap();

    let other = tempfile::tempdir().unwrap();
    let fresh = self::config(other.path(), &["UNSW"]);
    let sink = Sink::new(&fresh.snapshot, &fresh.database).unwrap();

    let report = import_snapshot(&sink, &dir.path().join("tables/job_data.csv"))
        .await
        .unwrap();

    assert_eq!(report.relational_status, RelationalStatus::Committed);
    assert_eq!(report.rows_written, 42);
    assert_eq!(sink.store().count().await.unwrap(), 42);
}
