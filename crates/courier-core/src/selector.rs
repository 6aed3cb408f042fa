//! Task selection for one drain pass.
//!
//! The criteria is a plain value owned by the drain loop: created empty
//! at drain start, grown as group starts fail, discarded at drain end.
//! It is never shared between drains.

use std::collections::HashSet;

use crate::domain::TaskMetadata;

/// Groups excluded for the remainder of the current drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCriteria {
    excluded_groups: HashSet<String>,
}

impl QueryCriteria {
    /// Record a failed task. Only tasks that start a group poison
    /// anything; an ordinary failure excludes no one else.
    pub fn update_from_failure(&mut self, failed: &TaskMetadata) {
        if let Some(group) = &failed.group_start {
            self.excluded_groups.insert(group.clone());
        }
    }

    pub fn is_excluded(&self, entry: &TaskMetadata) -> bool {
        entry
            .group_member
            .iter()
            .any(|group| self.excluded_groups.contains(group))
    }

}

/// Pick the next eligible task: first update the criteria from the most
/// recent failure, then return the first candidate not in an excluded
/// group. Returns `None` when every remaining candidate is excluded,
/// which deliberately ends the drain early; a future drain starts with
/// fresh criteria.
pub fn next_task<'a>(
    candidates: &'a [TaskMetadata],
    last_failed: Option<&TaskMetadata>,
    criteria: &mut QueryCriteria,
) -> Option<&'a TaskMetadata> {
    if let Some(failed) = last_failed {
        criteria.update_from_failure(failed);
    }

    candidates.iter().find(|entry| !criteria.is_excluded(entry))
}
