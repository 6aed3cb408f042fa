//! Task groups: the ordering/exclusion relationships between tasks.
//!
//! A task can *start* a group (e.g. "identify profile 42") and can be a
//! *member* of groups it depends on. During one drain, a failed group
//! start excludes every member of that group; a fresh drain starts over.

use std::fmt;

/// Logical group a task can start or belong to. Rendered to a stable
/// string for the inventory file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskGroup {
    /// All work that depends on profile `0` being identified.
    IdentifyProfile(String),
    /// All work that depends on push token `0` being registered.
    RegisterPushToken(String),
}

impl fmt::Display for TaskGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskGroup::IdentifyProfile(identifier) => write!(f, "identify:{identifier}"),
            TaskGroup::RegisterPushToken(token) => write!(f, "push-token:{token}"),
        }
    }
}
