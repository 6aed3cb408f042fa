//! courier-core
//!
//! Offline-durable background task queue for customer-engagement
//! tracking. Tasks are persisted to disk at enqueue time and drained to
//! the backend later, surviving process death and offline periods.
//!
//! # Module layout
//! - **domain**: task records, metadata, groups, payload types, ids
//! - **ports**: abstraction seams (Clock, TaskRunner)
//! - **store**: the on-disk inventory + payload layout
//! - **selector**: group-aware choice of the next runnable task
//! - **singleflight**: the one-drain-at-a-time gate
//! - **executor**: payload decode + dispatch to the [`ports::TaskRunner`]
//! - **drain**: the run loop tying store, selector and executor together
//! - **timer**: one-shot delayed drain scheduling
//! - **queue**: the facade the embedding SDK calls
//! - **registry**: one queue per site id

pub mod domain;
pub mod drain;
pub mod error;
pub mod executor;
pub mod ports;
pub mod queue;
pub mod registry;
pub mod selector;
pub mod singleflight;
pub mod store;
pub mod timer;

pub use domain::{
    Device, Event, EventType, MetricEvent, QueueModifyResult, QueueStatus, SiteId, TaskGroup,
    TaskId, TaskType,
};
pub use error::{RunError, StorageError};
pub use ports::{Clock, SystemClock, TaskRunner};
pub use queue::{Queue, QueueConfig};
pub use registry::QueueRegistry;
pub use store::{FileQueueStorage, QueueStorage};
