//! The drain: one end-to-end pass over the queue, running every
//! currently-eligible task until none remain.
//!
//! Tasks within one drain run strictly one at a time; later tasks may
//! depend on earlier ones succeeding. At most one drain is active per
//! queue, enforced by the [`RunGate`]. There is no cancellation: a drain
//! runs until the selector yields nothing, and a drain after a crash
//! simply resumes from whatever the store still holds.

use std::sync::Arc;

use tracing::{debug, error};

use crate::domain::TaskMetadata;
use crate::error::{RunError, StorageError};
use crate::executor::TaskExecutor;
use crate::selector::{self, QueryCriteria};
use crate::singleflight::RunGate;
use crate::store::QueueStorage;

pub struct QueueRunRequest {
    storage: Arc<dyn QueueStorage>,
    executor: TaskExecutor,
    gate: Arc<RunGate>,
}

impl QueueRunRequest {
    pub fn new(storage: Arc<dyn QueueStorage>, executor: TaskExecutor, gate: Arc<RunGate>) -> Self {
        Self {
            storage,
            executor,
            gate,
        }
    }

    pub fn gate(&self) -> &Arc<RunGate> {
        &self.gate
    }

    /// Run one drain. Errors are absorbed and logged, never raised: the
    /// queue degrades silently rather than destabilizing the host app.
    pub async fn run(&self) {
        let Some(_permit) = self.gate.try_acquire() else {
            debug!("a drain is already running; skipping");
            return;
        };

        if let Err(err) = self.run_tasks().await {
            error!(%err, "queue drain ended early");
        }
        // _permit drops here, releasing the gate even on early exit.
    }

    async fn run_tasks(&self) -> Result<(), StorageError> {
        debug!("queue starting to run tasks");
        let mut tasks_to_run = self.storage.inventory().await?;
        let total = tasks_to_run.len();

        let mut criteria = QueryCriteria::default();
        let mut last_failed: Option<TaskMetadata> = None;

        loop {
            let Some(entry) =
                selector::next_task(&tasks_to_run, last_failed.as_ref(), &mut criteria).cloned()
            else {
                debug!(total, "queue done running tasks");
                break;
            };
            // The chosen entry is not reconsidered this drain, whatever
            // its outcome.
            tasks_to_run.retain(|e| e.task_id != entry.task_id);
            debug!(
                task_id = %entry.task_id,
                left = tasks_to_run.len(),
                total,
                "queue tasks left to run"
            );

            let task = match self.storage.get(entry.task_id).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    // Dangling entry: no payload record, so it can never
                    // run. Delete it now rather than leave it to loop
                    // forever, and treat it as a failure for exclusion.
                    error!(task_id = %entry.task_id, "inventory entry has no stored task; deleting it");
                    self.storage.delete(entry.task_id).await?;
                    last_failed = Some(entry);
                    continue;
                }
                Err(StorageError::Json(err)) => {
                    // The record exists but does not decode; equally
                    // unrecoverable.
                    error!(task_id = %entry.task_id, %err, "stored task is unreadable; deleting it");
                    self.storage.delete(entry.task_id).await?;
                    last_failed = Some(entry);
                    continue;
                }
                Err(err) => return Err(err),
            };

            match self.executor.run(&task).await {
                Ok(()) => {
                    debug!(task_id = %entry.task_id, "task ran successfully; deleting");
                    self.storage.delete(entry.task_id).await?;
                    last_failed = None;
                }
                Err(RunError::Terminal(reason)) => {
                    error!(task_id = %entry.task_id, %reason, "task can never succeed; deleting");
                    self.storage.delete(entry.task_id).await?;
                    last_failed = Some(entry);
                }
                Err(RunError::Retryable(reason)) => {
                    let run_results = task.run_results.incremented();
                    debug!(
                        task_id = %entry.task_id,
                        %reason,
                        total_runs = run_results.total_runs,
                        "task run failed; keeping for a future drain"
                    );
                    self.storage
                        .update_run_results(entry.task_id, run_results)
                        .await?;
                    last_failed = Some(entry);
                }
            }
        }

        Ok(())
    }
}
