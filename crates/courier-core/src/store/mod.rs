//! Queue storage: the durable inventory + per-task payload records.

mod file;

pub use file::FileQueueStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Inventory, QueueStatus, QueueTask, RunResults, TaskGroup, TaskId, TaskMetadata, TaskType,
};
use crate::error::StorageError;

/// Durable storage port for one site's queue.
///
/// All operations on one storage instance are mutually exclusive, so
/// inventory reads/writes and payload reads/writes never interleave
/// inconsistently even when enqueue (caller thread) races the drain
/// (background task). Every mutation is persisted before the call
/// returns.
#[async_trait]
pub trait QueueStorage: Send + Sync {
    fn site_id(&self) -> &crate::domain::SiteId;

    /// The ordered inventory; insertion order is arrival order.
    async fn inventory(&self) -> Result<Inventory, StorageError>;

    /// Persist a new task (payload record first, then inventory entry)
    /// and return its generated id plus the post-create status.
    async fn create(
        &self,
        task_type: TaskType,
        data: serde_json::Value,
        group_start: Option<TaskGroup>,
        blocking_groups: Vec<TaskGroup>,
    ) -> Result<(TaskId, QueueStatus), StorageError>;

    /// Load one full task. `Ok(None)` when no payload record exists.
    async fn get(&self, task_id: TaskId) -> Result<Option<QueueTask>, StorageError>;

    /// Rewrite a task's run history. Returns `false` when the task does
    /// not exist.
    async fn update_run_results(
        &self,
        task_id: TaskId,
        run_results: RunResults,
    ) -> Result<bool, StorageError>;

    /// Remove the inventory entry and the payload record as a unit. If
    /// the payload removal fails the inventory entry is restored and the
    /// error reported; callers treat that as transient, not data loss.
    async fn delete(&self, task_id: TaskId) -> Result<QueueStatus, StorageError>;

    /// Purge tasks created before `older_than`, except tasks that start
    /// a group (expiring those risks months of dependent data never
    /// sending). Returns the purged entries.
    async fn delete_expired(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<TaskMetadata>, StorageError>;
}
