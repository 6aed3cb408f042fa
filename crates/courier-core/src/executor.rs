//! Task execution: dispatch one loaded task to the remote runner.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::{QueueTask, TaskType};
use crate::error::RunError;
use crate::ports::TaskRunner;

/// Dispatches strictly on the task's declared type, decoding the payload
/// into the shape that operation expects. An unknown type or an
/// undecodable payload is terminal: the task is reported failed without
/// any network call. Whether to retry is the drain's decision, never
/// the executor's.
pub struct TaskExecutor {
    runner: Arc<dyn TaskRunner>,
}

impl TaskExecutor {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self { runner }
    }

    pub async fn run(&self, task: &QueueTask) -> Result<(), RunError> {
        let task_type: TaskType = task
            .task_type
            .parse()
            .map_err(|err| RunError::Terminal(format!("{err}; cannot ever run this task")))?;

        debug!(task_id = %task.storage_id, %task_type, "executing task");

        match task_type {
            TaskType::IdentifyProfile => self.runner.identify_profile(decode(task)?).await,
            TaskType::TrackEvent => self.runner.track_event(decode(task)?).await,
            TaskType::RegisterDeviceToken => self.runner.register_device_token(decode(task)?).await,
            TaskType::DeletePushToken => self.runner.delete_device_token(decode(task)?).await,
            TaskType::TrackPushMetric => self.runner.track_push_metric(decode(task)?).await,
        }
    }
}

fn decode<T: DeserializeOwned>(task: &QueueTask) -> Result<T, RunError> {
    serde_json::from_value(task.data.clone()).map_err(|err| {
        RunError::Terminal(format!(
            "payload of {} task {} does not decode: {err}",
            task.task_type, task.storage_id
        ))
    })
}
