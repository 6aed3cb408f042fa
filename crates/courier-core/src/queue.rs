//! The queue facade: the one entry point collaborators use.
//!
//! Enqueue converts a user action into a persisted task, then evaluates
//! the batching policy: drain immediately once enough tasks are pending,
//! otherwise schedule a one-shot delayed drain. Enqueue never blocks the
//! caller on network I/O and never raises — a persistence failure is
//! logged loudly and reported in the returned result.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::domain::{
    Device, Event, EventType, IdentifyProfilePayload, MetricEvent, QueueModifyResult, QueueStatus,
    SiteId, TaskGroup, TaskType, TrackEventPayload, TrackPushMetricPayload,
};
use crate::domain::{DeletePushTokenPayload, RegisterDeviceTokenPayload, TaskMetadata};
use crate::drain::QueueRunRequest;
use crate::executor::TaskExecutor;
use crate::ports::{Clock, TaskRunner};
use crate::singleflight::RunGate;
use crate::store::QueueStorage;
use crate::timer::DrainTimer;

/// Batching knobs, owned by the embedding SDK.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Pending-task count at which a drain starts immediately.
    pub min_tasks_in_queue: usize,
    /// Delay before a drain when the count threshold is not met.
    pub drain_delay: Duration,
    /// Age beyond which non-group-start tasks are purged.
    pub task_expired_after: chrono::Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            min_tasks_in_queue: 10,
            drain_delay: Duration::from_secs(30),
            task_expired_after: chrono::Duration::days(3),
        }
    }
}

pub struct Queue {
    site_id: SiteId,
    storage: Arc<dyn QueueStorage>,
    run_request: Arc<QueueRunRequest>,
    timer: DrainTimer,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
}

impl Queue {
    pub fn new(
        storage: Arc<dyn QueueStorage>,
        runner: Arc<dyn TaskRunner>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Self {
        let site_id = storage.site_id().clone();
        let run_request = Arc::new(QueueRunRequest::new(
            Arc::clone(&storage),
            TaskExecutor::new(runner),
            Arc::new(RunGate::new()),
        ));
        Self {
            site_id,
            storage,
            run_request,
            timer: DrainTimer::new(),
            config,
            clock,
        }
    }

    pub fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    /// Queue an identify for `new_identifier`.
    ///
    /// A first-time identify, or a change of identified profile, starts
    /// the group every dependent task blocks on. Re-identifying the same
    /// profile (just updating attributes) starts no group, but still
    /// waits for the previous identify to have succeeded.
    pub async fn identify_profile(
        &self,
        new_identifier: &str,
        old_identifier: Option<&str>,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> QueueModifyResult {
        let first_time = old_identifier.is_none();
        let changing = old_identifier.is_some_and(|old| old != new_identifier);

        let group_start = (first_time || changing)
            .then(|| TaskGroup::IdentifyProfile(new_identifier.to_string()));
        let blocking_groups = match old_identifier {
            Some(old) => vec![TaskGroup::IdentifyProfile(old.to_string())],
            None => vec![],
        };

        self.add_task(
            TaskType::IdentifyProfile,
            &IdentifyProfilePayload {
                identifier: new_identifier.to_string(),
                attributes,
            },
            group_start,
            blocking_groups,
        )
        .await
    }

    /// Queue a custom event for an identified profile. Blocked while the
    /// profile's identify is still failing.
    pub async fn track(
        &self,
        identified_profile_id: &str,
        name: &str,
        event_type: EventType,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> QueueModifyResult {
        let event = Event {
            name: name.to_string(),
            event_type,
            data: attributes,
            timestamp: Some(self.clock.now().timestamp()),
        };

        self.add_task(
            TaskType::TrackEvent,
            &TrackEventPayload {
                identifier: identified_profile_id.to_string(),
                event,
            },
            None,
            vec![TaskGroup::IdentifyProfile(
                identified_profile_id.to_string(),
            )],
        )
        .await
    }

    /// Queue a push-token registration. Starts the token's group and is
    /// blocked while the owning profile's identify is still failing.
    pub async fn register_device_token(
        &self,
        identified_profile_id: &str,
        device: Device,
    ) -> QueueModifyResult {
        let group_start = TaskGroup::RegisterPushToken(device.token.clone());
        self.add_task(
            TaskType::RegisterDeviceToken,
            &RegisterDeviceTokenPayload {
                profile_identified: identified_profile_id.to_string(),
                device,
            },
            Some(group_start),
            vec![TaskGroup::IdentifyProfile(
                identified_profile_id.to_string(),
            )],
        )
        .await
    }

    /// Queue a push-token removal. Only runs after the token's
    /// registration has succeeded.
    pub async fn delete_device_token(
        &self,
        identified_profile_id: &str,
        device_token: &str,
    ) -> QueueModifyResult {
        self.add_task(
            TaskType::DeletePushToken,
            &DeletePushTokenPayload {
                profile_identified: identified_profile_id.to_string(),
                device_token: device_token.to_string(),
            },
            None,
            vec![TaskGroup::RegisterPushToken(device_token.to_string())],
        )
        .await
    }

    /// Queue a push delivery metric. Blocked while the token's
    /// registration is still failing.
    pub async fn track_metric(
        &self,
        delivery_id: &str,
        device_token: &str,
        event: MetricEvent,
    ) -> QueueModifyResult {
        self.add_task(
            TaskType::TrackPushMetric,
            &TrackPushMetricPayload {
                delivery_id: delivery_id.to_string(),
                device_token: device_token.to_string(),
                event,
                timestamp: self.clock.now().timestamp(),
            },
            None,
            vec![TaskGroup::RegisterPushToken(device_token.to_string())],
        )
        .await
    }

    /// Persist one task and re-evaluate the batching policy. The
    /// generic escape hatch the typed helpers above are built on.
    pub async fn add_task<T: Serialize>(
        &self,
        task_type: TaskType,
        payload: &T,
        group_start: Option<TaskGroup>,
        blocking_groups: Vec<TaskGroup>,
    ) -> QueueModifyResult {
        info!(site_id = %self.site_id, %task_type, "adding queue task");

        let data = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                error!(%task_type, %err, "queue task payload does not serialize; task dropped");
                return QueueModifyResult::failed();
            }
        };

        match self
            .storage
            .create(task_type, data, group_start, blocking_groups)
            .await
        {
            Ok((task_id, status)) => {
                self.process_queue_status(&status);
                QueueModifyResult::persisted(task_id, status)
            }
            Err(err) => {
                // Best-effort contract: the enqueue is lost, the host app
                // is not.
                error!(%task_type, %err, "failed to persist queue task; task dropped");
                QueueModifyResult::failed()
            }
        }
    }

    fn process_queue_status(&self, status: &QueueStatus) {
        debug!(pending = status.num_tasks_in_queue, "processing queue status");

        if status.num_tasks_in_queue >= self.config.min_tasks_in_queue {
            info!("queue met criteria to run automatically");
            self.run_async();
        } else {
            let run_request = Arc::clone(&self.run_request);
            let scheduled = self
                .timer
                .schedule_if_not_already(self.config.drain_delay, move || {
                    debug!("drain timer fired; running queue");
                    tokio::spawn(async move { run_request.run().await });
                });
            if scheduled {
                info!(delay = ?self.config.drain_delay, "scheduled queue to run later");
            }
        }
    }

    /// Drain on a background task; never blocks the caller.
    pub fn run_async(&self) {
        self.timer.cancel();
        let run_request = Arc::clone(&self.run_request);
        tokio::spawn(async move { run_request.run().await });
    }

    /// Drain now, on this task. A drain already in progress makes this a
    /// silent, bounded no-op.
    pub async fn run(&self) {
        self.timer.cancel();
        self.run_request.run().await;
    }

    /// Purge expired tasks (never group starts). Errors are absorbed.
    pub async fn delete_expired_tasks(&self) -> Vec<TaskMetadata> {
        let threshold = self.clock.now() - self.config.task_expired_after;
        match self.storage.delete_expired(threshold).await {
            Ok(expired) => expired,
            Err(err) => {
                error!(%err, "failed to delete expired queue tasks");
                Vec::new()
            }
        }
    }

    /// Current pending-count snapshot.
    pub async fn status(&self) -> QueueStatus {
        let pending = match self.storage.inventory().await {
            Ok(inventory) => inventory.len(),
            Err(err) => {
                error!(%err, "failed to read queue inventory for status");
                0
            }
        };
        QueueStatus {
            site_id: self.site_id.clone(),
            num_tasks_in_queue: pending,
        }
    }
}
