use std::fmt;
use std::str::FromStr;

use log::{debug, error, info, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Connection, Sqlite, Transaction};

use crate::error::LoadError;
use crate::metrics::{METRICS, RuntimeMetrics};
use crate::schema::JobRow;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        job_title TEXT NOT NULL,
        uni_name  TEXT NOT NULL,
        link      TEXT NOT NULL
    )
"#;

const CLEAR_TABLE: &str = "DELETE FROM jobs";

const INSERT_JOB: &str = "INSERT INTO jobs (job_title, uni_name, link) VALUES (?, ?, ?)";

/// Relational load progress for one run.
///
/// Idle → SchemaEnsured → OldRowsCleared → Inserting(i) → Committed | Aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    SchemaEnsured,
    OldRowsCleared,
    Inserting(usize),
    Committed,
    Aborted,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Inserting(batch) => write!(f, "Inserting(batch {batch})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// What one `replace_all` call achieved.
#[derive(Debug)]
pub struct LoadOutcome {
    pub state: LoadState,

    /// Rows durably committed by this run
    pub rows_written: usize,

    /// Cumulative row count after each commit
    pub batch_commits: Vec<usize>,

    pub error: Option<LoadError>,
}

impl LoadOutcome {
    fn new() -> Self {
        Self {
            state: LoadState::Idle,
            rows_written: 0,
            batch_commits: Vec::new(),
            error: None,
        }
    }

    fn advance(&mut self, next: LoadState) {
        debug!("load: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// SQLite-backed job table.
///
/// CONSISTENCY:
/// - The clear and the first batch share one transaction, so
///   readers see either the previous snapshot or a table that
///   already holds new rows, never an empty table in between.
/// - Later batches commit separately. A failure in batch `i`
///   leaves batches `0..i` committed; whole-run atomicity is
///   not offered.
/// - Concurrent runs against the same database must be excluded
///   by the caller.
#[derive(Clone)]
pub struct JobStore {
    pool: SqlitePool,
    batch_size: usize,
}

impl JobStore {
    /// Validates the URL now; the first connection is opened on
    /// first use so an unreachable database aborts a load instead
    /// of preventing startup.
    pub fn connect_lazy(url: &str, batch_size: usize) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_lazy_with(options);
        Ok(Self::from_pool(pool, batch_size))
    }

    pub fn from_pool(pool: SqlitePool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
    }

    /// Replaces the table's contents with `rows`.
    ///
    /// Every statement runs on one acquired connection. Never
    /// fails outright; failures are reported in the outcome.
    pub async fn replace_all(&self, rows: &[JobRow]) -> LoadOutcome {
        let mut outcome = LoadOutcome::new();

        match self.load(rows, &mut outcome).await {
            Ok(()) => {
                outcome.advance(LoadState::Committed);
                info!(
                    "relational load committed: {} rows in {} batches",
                    outcome.rows_written,
                    outcome.batch_commits.len()
                );
            }
            Err(e) => {
                outcome.advance(LoadState::Aborted);
                RuntimeMetrics::add(&METRICS.loads_aborted, 1);
                error!(
                    "relational load aborted after {} committed rows: {e}",
                    outcome.rows_written
                );
                outcome.error = Some(e);
            }
        }

        outcome
    }

    async fn load(&self, rows: &[JobRow], outcome: &mut LoadOutcome) -> Result<(), LoadError> {
        let mut conn = self.pool.acquire().await.map_err(LoadError::Connect)?;

        sqlx::query(CREATE_TABLE)
            .execute(&mut *conn)
            .await
            .map_err(LoadError::Schema)?;
        outcome.advance(LoadState::SchemaEnsured);

        // An empty table still needs one transaction to clear old rows.
        let batches: Vec<&[JobRow]> = if rows.is_empty() {
            vec![rows]
        } else {
            rows.chunks(self.batch_size).collect()
        };

        for (batch_index, batch) in batches.into_iter().enumerate() {
            let first_row = outcome.rows_written;

            let mut tx = conn.begin().await.map_err(|source| LoadError::Batch {
                batch_index,
                row_index: first_row,
                source,
            })?;

            if batch_index == 0 {
                if let Err(source) = sqlx::query(CLEAR_TABLE).execute(&mut *tx).await {
                    return Err(abort(tx, batch_index, first_row, source).await);
                }
                outcome.advance(LoadState::OldRowsCleared);
            }

            outcome.advance(LoadState::Inserting(batch_index));

            for (offset, row) in batch.iter().enumerate() {
                let inserted = sqlx::query(INSERT_JOB)
                    .bind(&row.title)
                    .bind(&row.uni_name)
                    .bind(&row.link)
                    .execute(&mut *tx)
                    .await;

                if let Err(source) = inserted {
                    return Err(abort(tx, batch_index, first_row + offset, source).await);
                }
            }

            tx.commit().await.map_err(|source| LoadError::Batch {
                batch_index,
                row_index: first_row + batch.len().saturating_sub(1),
                source,
            })?;

            outcome.rows_written += batch.len();
            outcome.batch_commits.push(outcome.rows_written);
            RuntimeMetrics::add(&METRICS.batches_committed, 1);
            RuntimeMetrics::add(&METRICS.rows_written, batch.len());
            debug!(
                "batch {batch_index} committed, {}/{} rows",
                outcome.rows_written,
                rows.len()
            );
        }

        Ok(())
    }
}

/// Rolls back the in-flight batch and builds the error naming
/// the offending row.
async fn abort(
    tx: Transaction<'_, Sqlite>,
    batch_index: usize,
    row_index: usize,
    source: sqlx::Error,
) -> LoadError {
    error!("batch {batch_index} failed at row {row_index}: {source}");

    if let Err(e) = tx.rollback().await {
        warn!("rollback of batch {batch_index} failed: {e}");
    }

    LoadError::Batch {
        batch_index,
        row_index,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<JobRow> {
        (0..n)
            .map(|i| JobRow {
                title: format!("Job {i}"),
                uni_name: "UNSW".into(),
                link: format!("https://unsw.example.edu/jobs/{i}"),
            })
            .collect()
    }

    async fn store(dir: &tempfile::TempDir) -> JobStore {
        let url = format!("sqlite://{}", dir.path().join("jobs.db").display());
        JobStore::connect_lazy(&url, 100).unwrap()
    }

    async fn install_poison_trigger(store: &JobStore) {
        sqlx::query(CREATE_TABLE).execute(store.pool()).await.unwrap();
        sqlx::query(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON jobs \
             WHEN NEW.job_title = 'poison' \
             BEGIN SELECT RAISE(ABORT, 'poisoned row'); END",
        )
        .execute(store.pool())
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn commits_every_hundred_rows_then_remainder() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let outcome = store.replace_all(&rows(250)).await;

        assert_eq!(outcome.state, LoadState::Committed);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.batch_commits, [100, 200, 250]);
        assert_eq!(outcome.rows_written, 250);
        assert_eq!(store.count().await.unwrap(), 250);
    }

    #[tokio::test]
    async fn failure_mid_batch_keeps_only_committed_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        install_poison_trigger(&store).await;

        let mut data = rows(250);
        data[150].title = "poison".into();

        let outcome = store.replace_all(&data).await;

        assert_eq!(outcome.state, LoadState::Aborted);
        assert_eq!(outcome.batch_commits, [100]);
        assert_eq!(outcome.rows_written, 100);
        assert!(matches!(
            outcome.error,
            Some(LoadError::Batch {
                batch_index: 1,
                row_index: 150,
                ..
            })
        ));
        assert_eq!(store.count().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn failure_in_first_batch_preserves_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        assert_eq!(store.replace_all(&rows(30)).await.state, LoadState::Committed);
        install_poison_trigger(&store).await;

        let mut data = rows(50);
        data[10].title = "poison".into();
        let outcome = store.replace_all(&data).await;

        assert_eq!(outcome.state, LoadState::Aborted);
        assert_eq!(outcome.rows_written, 0);
        assert_eq!(store.count().await.unwrap(), 30);
    }

    #[tokio::test]
    async fn reload_replaces_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        store.replace_all(&rows(120)).await;
        let second = store.replace_all(&rows(120)).await;

        assert_eq!(second.state, LoadState::Committed);
        assert_eq!(store.count().await.unwrap(), 120);
    }

    #[tokio::test]
    async fn empty_load_clears_table() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        store.replace_all(&rows(5)).await;

        let outcome = store.replace_all(&[]).await;

        assert_eq!(outcome.state, LoadState::Committed);
        assert_eq!(outcome.batch_commits, [0]);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unreachable_database_aborts_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}",
            dir.path().join("missing/dir/jobs.db").display()
        );
        let store = JobStore::connect_lazy(&url, 100).unwrap();

        let outcome = store.replace_all(&rows(3)).await;

        assert_eq!(outcome.state, LoadState::Aborted);
        assert_eq!(outcome.rows_written, 0);
        assert!(matches!(outcome.error, Some(LoadError::Connect(_))));
    }

    #[tokio::test]
    async fn schema_failure_aborts_before_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");

        // A database file that exists but has no jobs table.
        let setup = JobStore::connect_lazy(&format!("sqlite://{}", path.display()), 100).unwrap();
        sqlx::query("CREATE TABLE unrelated (id INTEGER)")
            .execute(setup.pool())
            .await
            .unwrap();
        setup.pool().close().await;

        let store =
            JobStore::connect_lazy(&format!("sqlite://{}?mode=ro", path.display()), 100).unwrap();
        let outcome = store.replace_all(&rows(3)).await;

        assert_eq!(outcome.state, LoadState::Aborted);
        assert_eq!(outcome.rows_written, 0);
        assert!(outcome.batch_commits.is_empty());
        assert!(matches!(outcome.error, Some(LoadError::Schema(_))));
    }
}
