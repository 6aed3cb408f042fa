//! Read-only queue summaries returned to callers.

use serde::{Deserialize, Serialize};

use super::{SiteId, TaskId};

/// Snapshot of the queue for one site, recomputed from inventory length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub site_id: SiteId,
    pub num_tasks_in_queue: usize,
}

/// Result of an enqueue. Enqueue never raises to the caller: a
/// persistence failure is reported here (and logged) instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueModifyResult {
    pub success: bool,
    /// Id of the created task; `None` when persistence failed.
    pub task_id: Option<TaskId>,
    /// Queue status after the modification; `None` when storage was
    /// unreachable and no trustworthy count exists.
    pub status: Option<QueueStatus>,
}

impl QueueModifyResult {
    pub fn persisted(task_id: TaskId, status: QueueStatus) -> Self {
        Self {
            success: true,
            task_id: Some(task_id),
            status: Some(status),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            task_id: None,
            status: None,
        }
    }
}
