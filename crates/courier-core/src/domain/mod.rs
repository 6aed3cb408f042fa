//! Domain model for the background queue (ids, tasks, inventory metadata,
//! groups, payloads, status snapshots).

pub mod group;
pub mod ids;
pub mod metadata;
pub mod payloads;
pub mod status;
pub mod task;

pub use self::group::TaskGroup;
pub use self::ids::{SiteId, TaskId};
pub use self::metadata::{Inventory, TaskMetadata};
pub use self::payloads::{
    DeletePushTokenPayload, Device, Event, EventType, IdentifyProfilePayload, MetricEvent,
    RegisterDeviceTokenPayload, TrackEventPayload, TrackPushMetricPayload,
};
pub use self::status::{QueueModifyResult, QueueStatus};
pub use self::task::{QueueTask, RunResults, TaskType, UnknownTaskType};
