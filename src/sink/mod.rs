//! Sink: persists a merged table
//!
//! Two independent steps per commit:
//! - `snapshot`: flat CSV file, fully replaced
//! - `store`: relational table, replaced in batched transactions
//!
//! A failure in one step never undoes the other.

pub mod snapshot;
pub mod store;

use std::path::{Path, PathBuf};

use log::{error, warn};
use serde::Serialize;

use crate::config::{DatabaseConfig, SnapshotConfig};
use crate::error::LoadError;
use crate::metrics::{METRICS, RuntimeMetrics};
use crate::schema::MergedTable;

use store::{JobStore, LoadState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationalStatus {
    Committed,
    Aborted,
}

/// Returned to whoever triggered the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Rows committed to the relational store
    pub rows_written: usize,
    pub snapshot_path: String,
    pub snapshot_error: Option<String>,
    pub relational_status: RelationalStatus,
    pub failure_cause: Option<String>,

    /// Cumulative row count at each batch commit
    pub batch_commits: Vec<usize>,
}

pub struct Sink {
    snapshot_path: PathBuf,
    stale_paths: Vec<PathBuf>,
    store: JobStore,
    allow_empty_overwrite: bool,
}

impl Sink {
    pub fn new(snapshot: &SnapshotConfig, database: &DatabaseConfig) -> anyhow::Result<Self> {
        let store = JobStore::connect_lazy(&database.url, database.batch_size)?;
        Ok(Self::with_store(snapshot, store, database.allow_empty_overwrite))
    }

    pub fn with_store(snapshot: &SnapshotConfig, store: JobStore, allow_empty_overwrite: bool) -> Self {
        Self {
            snapshot_path: snapshot.path.clone(),
            stale_paths: snapshot.stale_paths.clone(),
            store,
            allow_empty_overwrite,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Writes the snapshot, then replaces the relational table.
    ///
    /// An empty table is refused outright (neither step runs)
    /// unless `allow_empty_overwrite` is set, so a run in which
    /// every source came back empty cannot wipe good data.
    pub async fn commit(&self, table: &MergedTable) -> CommitReport {
        let snapshot_path = self.snapshot_path.display().to_string();

        if let Some(report) = self.refuse_empty(table, &snapshot_path) {
            return report;
        }

        // The table is owned in memory, so a snapshot failure
        // does not stop the relational load.
        let snapshot_error =
            match snapshot::write_snapshot(table, &self.snapshot_path, &self.stale_paths) {
                Ok(()) => None,
                Err(e) => {
                    RuntimeMetrics::add(&METRICS.snapshot_errors, 1);
                    error!("snapshot write failed: {e}");
                    Some(e.to_string())
                }
            };

        self.load(table, snapshot_path, snapshot_error).await
    }

    /// Relational step only, for tables read back from an existing
    /// snapshot file at `source`.
    pub async fn load_only(&self, table: &MergedTable, source: &Path) -> CommitReport {
        let snapshot_path = source.display().to_string();

        if let Some(report) = self.refuse_empty(table, &snapshot_path) {
            return report;
        }

        self.load(table, snapshot_path, None).await
    }

    fn refuse_empty(&self, table: &MergedTable, snapshot_path: &str) -> Option<CommitReport> {
        if !table.is_empty() || self.allow_empty_overwrite {
            return None;
        }

        let cause = LoadError::EmptyTable.to_string();
        warn!("{cause}; snapshot {snapshot_path} and database left untouched");

        Some(CommitReport {
            rows_written: 0,
            snapshot_path: snapshot_path.to_string(),
            snapshot_error: Some(cause.clone()),
            relational_status: RelationalStatus::Aborted,
            failure_cause: Some(cause),
            batch_commits: Vec::new(),
        })
    }

    async fn load(
        &self,
        table: &MergedTable,
        snapshot_path: String,
        snapshot_error: Option<String>,
    ) -> CommitReport {
        let outcome = self.store.replace_all(&table.rows).await;

        let relational_status = match outcome.state {
            LoadState::Committed => RelationalStatus::Committed,
            _ => RelationalStatus::Aborted,
        };

        CommitReport {
            rows_written: outcome.rows_written,
            snapshot_path,
            snapshot_error,
            relational_status,
            failure_cause: outcome.error.map(|e| e.to_string()),
            batch_commits: outcome.batch_commits,
        }
    }
}
