use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;

/// Process-wide counters for the collector.
///
/// Purpose:
/// - Track source outcomes across runs
/// - Track rows collected and persisted
/// - Track batch commits and aborted loads
///
/// Design:
/// - Lock-free (Atomics)
/// - Safe in async + multithreaded contexts
#[derive(Default)]
pub struct RuntimeMetrics {
    pub runs_started: AtomicUsize,

    // Sources
    pub sources_started: AtomicUsize,
    pub sources_succeeded: AtomicUsize,
    pub sources_failed: AtomicUsize,

    // Rows
    pub rows_collected: AtomicUsize,
    pub rows_dropped: AtomicUsize,
    pub rows_written: AtomicUsize,

    // Sink
    pub batches_committed: AtomicUsize,
    pub loads_aborted: AtomicUsize,
    pub snapshot_errors: AtomicUsize,
}

impl RuntimeMetrics {
    pub fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// One line, same shape every run, so it can be grepped.
    pub fn summary(&self) -> String {
        format!(
            "runs={} src_started={} src_ok={} src_failed={} collected={} dropped={} written={} batches={} aborted={} snapshot_err={}",
            self.runs_started.load(Ordering::Relaxed),
            self.sources_started.load(Ordering::Relaxed),
            self.sources_succeeded.load(Ordering::Relaxed),
            self.sources_failed.load(Ordering::Relaxed),
            self.rows_collected.load(Ordering::Relaxed),
            self.rows_dropped.load(Ordering::Relaxed),
            self.rows_written.load(Ordering::Relaxed),
            self.batches_committed.load(Ordering::Relaxed),
            self.loads_aborted.load(Ordering::Relaxed),
            self.snapshot_errors.load(Ordering::Relaxed),
        )
    }
}

/// Global metrics registry (singleton)
pub static METRICS: Lazy<Arc<RuntimeMetrics>> =
    Lazy::new(|| Arc::new(RuntimeMetrics::default()));
