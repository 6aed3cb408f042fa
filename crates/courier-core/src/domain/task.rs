//! The persisted task record and its type tag.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::TaskId;

/// The five remote operations the queue knows how to perform.
///
/// Stored records keep the type as a plain string so that a queue file
/// written by a newer release (with types this build does not know) still
/// deserializes; the executor treats an unparseable type as terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    IdentifyProfile,
    TrackEvent,
    RegisterDeviceToken,
    DeletePushToken,
    TrackPushMetric,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::IdentifyProfile => "IdentifyProfile",
            TaskType::TrackEvent => "TrackEvent",
            TaskType::RegisterDeviceToken => "RegisterDeviceToken",
            TaskType::DeletePushToken => "DeletePushToken",
            TaskType::TrackPushMetric => "TrackPushMetric",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored type string does not map to any known
/// operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown task type: {0}")]
pub struct UnknownTaskType(pub String);

impl FromStr for TaskType {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IdentifyProfile" => Ok(TaskType::IdentifyProfile),
            "TrackEvent" => Ok(TaskType::TrackEvent),
            "RegisterDeviceToken" => Ok(TaskType::RegisterDeviceToken),
            "DeletePushToken" => Ok(TaskType::DeletePushToken),
            "TrackPushMetric" => Ok(TaskType::TrackPushMetric),
            other => Err(UnknownTaskType(other.to_string())),
        }
    }
}

/// Execution history of a task. Persisted so progress survives restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResults {
    pub total_runs: u32,
}

impl RunResults {
    pub fn new(total_runs: u32) -> Self {
        Self { total_runs }
    }

    /// History after one more failed run.
    pub fn incremented(self) -> Self {
        Self {
            total_runs: self.total_runs + 1,
        }
    }
}

/// One durable unit of work. Immutable once created except for
/// `run_results`, which is rewritten after each failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueTask {
    pub storage_id: TaskId,
    /// Raw type tag; see [`TaskType`] for why this is a string here.
    #[serde(rename = "type")]
    pub task_type: String,
    /// Opaque payload, interpreted only by the executor keyed on the type.
    pub data: serde_json::Value,
    pub run_results: RunResults,
}
