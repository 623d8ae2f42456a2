use std::time::Duration;

use thiserror::Error;

/// Why a single SourceTask produced no rows.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{0:#}")]
    Failed(#[from] anyhow::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("collector panicked: {0}")]
    Panicked(String),

    #[error("task cancelled")]
    Cancelled,
}

/// A collector failure attributed to its source.
///
/// Non-fatal: logged by the pool and excluded from the merge.
#[derive(Debug, Error)]
#[error("source {source_name} failed: {cause}")]
pub struct SourceFailure {
    pub source_name: String,
    pub cause: CollectError,
}

impl SourceFailure {
    pub fn new(source_name: impl Into<String>, cause: CollectError) -> Self {
        Self {
            source_name: source_name.into(),
            cause,
        }
    }
}

/// Run-level failures that stop the pipeline before the Sink.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("all {attempted} sources failed, nothing to commit")]
    AllSourcesFailed { attempted: usize },

    #[error("no source tasks could be built from the configuration")]
    NoSources,
}

/// Failure writing the flat-file snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("snapshot {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },
}

/// Failure during the relational load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not open a database session: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("could not ensure schema: {0}")]
    Schema(#[source] sqlx::Error),

    #[error("batch {batch_index} failed at row {row_index}: {source}")]
    Batch {
        batch_index: usize,
        row_index: usize,
        #[source]
        source: sqlx::Error,
    },

    #[error("refusing to replace stored snapshot with an empty table")]
    EmptyTable,
}
