//! Inventory metadata: the lightweight projection of a task used to pick
//! what runs next without loading full payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// One inventory entry. Invariant: every stored task has exactly one
/// entry with the same id, and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    /// Group this task is the head of, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_start: Option<String>,
    /// Groups this task belongs to for exclusion purposes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_member: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// The ordered inventory; insertion order is arrival order.
pub type Inventory = Vec<TaskMetadata>;

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn entry() -> TaskMetadata {
        TaskMetadata {
            task_id: TaskId::from_ulid(Ulid::new()),
            task_type: "TrackEvent".to_string(),
            group_start: None,
            group_member: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn group_fields_are_omitted_when_unset() {
        let value = serde_json::to_value(entry()).unwrap();
        assert!(value.get("groupStart").is_none());
        assert!(value.get("group_start").is_none());
        assert!(value.get("group_member").is_none());
    }

    #[test]
    fn deserializes_without_group_fields() {
        let id = TaskId::from_ulid(Ulid::new());
        let json = format!(
            r#"{{"task_id":"{id}","type":"TrackEvent","created_at":"2024-01-01T00:00:00Z"}}"#
        );

        let entry: TaskMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(entry.task_id, id);
        assert!(entry.group_start.is_none());
        assert!(entry.group_member.is_empty());
    }

    #[test]
    fn serde_round_trip_with_groups() {
        let mut e = entry();
        e.group_start = Some("identify:p1".to_string());
        e.group_member = vec!["push-token:t1".to_string()];

        let json = serde_json::to_string(&e).unwrap();
        let back: TaskMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
