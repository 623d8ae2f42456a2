use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::collector::task::SourceTask;
use crate::error::{CollectError, SourceFailure};
use crate::events::{EventSender, Phase};
use crate::schema::SourceResult;

/// Runs SourceTasks with bounded concurrency.
///
/// GUARANTEES:
/// - One result per submitted task, `Ok` or `Failed`
/// - Errors, timeouts and panics stay inside their task
/// - `run` itself never fails
///
/// Results come back in completion order, which varies from
/// run to run.
///
/// TODO:
/// - Per-source retry policy, if a flaky portal ever needs one
#[derive(Debug, Clone, Copy)]
pub struct TaskPool {
    concurrency: usize,
}

impl TaskPool {
    /// `concurrency` of 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run(&self, tasks: Vec<SourceTask>, events: &EventSender) -> Vec<SourceResult> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();
        let mut names = HashMap::with_capacity(tasks.len());

        for task in tasks {
            let name = task.name().to_string();
            let permits = permits.clone();
            let events = events.clone();

            let handle = set.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = permits.acquire_owned().await.ok();
                events.emit(task.name(), Phase::Started);
                task.execute().await
            });

            names.insert(handle.id(), name);
        }

        let mut results = Vec::with_capacity(names.len());

        // Single aggregation point: completed tasks are drained here
        // one at a time, in whatever order they finish.
        while let Some(joined) = set.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, outcome)) => (id, outcome),
                Err(err) => {
                    let id = err.id();
                    let cause = if err.is_panic() {
                        CollectError::Panicked(panic_message(err.into_panic()))
                    } else {
                        CollectError::Cancelled
                    };
                    (id, Err(cause))
                }
            };

            let name = names
                .remove(&id)
                .unwrap_or_else(|| format!("<task {id}>"));

            let result = match outcome {
                Ok(collected) => {
                    events.emit(
                        &name,
                        Phase::Finished {
                            rows: collected.rows.len(),
                            dropped: collected.dropped,
                        },
                    );
                    SourceResult::ok(name, collected.rows)
                }
                Err(cause) => {
                    events.emit(
                        &name,
                        Phase::Failed {
                            cause: cause.to_string(),
                        },
                    );
                    SourceResult::failed(SourceFailure::new(name, cause))
                }
            };

            results.push(result);
        }

        results
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
