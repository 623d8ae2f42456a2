//! Structured run events
//!
//! Source tasks never write log lines about their own outcome.
//! They emit `RunEvent`s into one channel, and a single consumer
//! task turns them into ordered log output and metric updates.

use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::metrics::{METRICS, RuntimeMetrics};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Started,
    Finished { rows: usize, dropped: usize },
    Failed { cause: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    pub source: String,
    pub phase: Phase,
}

/// Cheap, cloneable handle held by every source task.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl EventSender {
    pub fn emit(&self, source: &str, phase: Phase) {
        // Consumer gone means the run is shutting down; nothing to report to.
        let _ = self.tx.send(RunEvent {
            source: source.to_string(),
            phase,
        });
    }
}

/// Totals observed by the consumer over its lifetime.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventTally {
    pub started: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Spawns the consumer.
///
/// The returned handle resolves once every `EventSender` clone
/// has been dropped and the channel is drained.
pub fn spawn_consumer() -> (EventSender, JoinHandle<EventTally>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<RunEvent>();

    let handle = tokio::spawn(async move {
        let mut tally = EventTally::default();

        while let Some(event) = rx.recv().await {
            match &event.phase {
                Phase::Started => {
                    tally.started += 1;
                    RuntimeMetrics::add(&METRICS.sources_started, 1);
                    info!("[{}] collecting", event.source);
                }
                Phase::Finished { rows, dropped } => {
                    tally.succeeded += 1;
                    RuntimeMetrics::add(&METRICS.sources_succeeded, 1);
                    RuntimeMetrics::add(&METRICS.rows_collected, *rows);
                    RuntimeMetrics::add(&METRICS.rows_dropped, *dropped);
                    if *dropped > 0 {
                        warn!(
                            "[{}] done: {} listings ({} malformed rows dropped)",
                            event.source, rows, dropped
                        );
                    } else {
                        info!("[{}] done: {} listings", event.source, rows);
                    }
                }
                Phase::Failed { cause } => {
                    tally.failed += 1;
                    RuntimeMetrics::add(&METRICS.sources_failed, 1);
                    warn!("[{}] failed: {}", event.source, cause);
                }
            }
        }

        tally
    });

    (EventSender { tx }, handle)
}
