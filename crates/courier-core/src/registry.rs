//! Per-tenant queue registry.
//!
//! Each site id owns exactly one [`Queue`] (and therefore one run gate
//! and one drain timer). The registry hands out shared handles so every
//! collaborator working with a site talks to the same instance.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::domain::SiteId;
use crate::ports::{Clock, SystemClock, TaskRunner};
use crate::queue::{Queue, QueueConfig};
use crate::store::FileQueueStorage;

pub struct QueueRegistry {
    storage_root: PathBuf,
    runner: Arc<dyn TaskRunner>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
    queues: Mutex<HashMap<SiteId, Arc<Queue>>>,
}

impl QueueRegistry {
    pub fn new(
        storage_root: impl Into<PathBuf>,
        runner: Arc<dyn TaskRunner>,
        config: QueueConfig,
    ) -> Self {
        Self::with_clock(storage_root, runner, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        storage_root: impl Into<PathBuf>,
        runner: Arc<dyn TaskRunner>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Self {
        Self {
            storage_root: storage_root.into(),
            runner,
            clock,
            config,
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// The queue for `site_id`, created on first use.
    pub fn get_or_create(&self, site_id: &SiteId) -> Arc<Queue> {
        let mut queues = self.queues.lock().unwrap();
        if let Some(queue) = queues.get(site_id) {
            return Arc::clone(queue);
        }

        let storage = Arc::new(FileQueueStorage::new(
            &self.storage_root,
            site_id.clone(),
            Arc::clone(&self.clock),
        ));
        let queue = Arc::new(Queue::new(
            storage,
            Arc::clone(&self.runner),
            Arc::clone(&self.clock),
            self.config.clone(),
        ));
        queues.insert(site_id.clone(), Arc::clone(&queue));
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoopRunner;

    #[async_trait]
    impl TaskRunner for NoopRunner {
        async fn identify_profile(
            &self,
            _: crate::domain::IdentifyProfilePayload,
        ) -> Result<(), RunError> {
            Ok(())
        }
        async fn track_event(
            &self,
            _: crate::domain::TrackEventPayload,
        ) -> Result<(), RunError> {
            Ok(())
        }
        async fn register_device_token(
            &self,
            _: crate::domain::RegisterDeviceTokenPayload,
        ) -> Result<(), RunError> {
            Ok(())
        }
        async fn delete_device_token(
            &self,
            _: crate::domain::DeletePushTokenPayload,
        ) -> Result<(), RunError> {
            Ok(())
        }
        async fn track_push_metric(
            &self,
            _: crate::domain::TrackPushMetricPayload,
        ) -> Result<(), RunError> {
            Ok(())
        }
    }

    #[test]
    fn same_site_gets_the_same_queue_instance() {
        let dir = TempDir::new().unwrap();
        let registry =
            QueueRegistry::new(dir.path(), Arc::new(NoopRunner), QueueConfig::default());

        let a = registry.get_or_create(&SiteId::new("site-1"));
        let b = registry.get_or_create(&SiteId::new("site-1"));

        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_sites_get_independent_queues() {
        let dir = TempDir::new().unwrap();
        let registry =
            QueueRegistry::new(dir.path(), Arc::new(NoopRunner), QueueConfig::default());

        let a = registry.get_or_create(&SiteId::new("site-1"));
        let b = registry.get_or_create(&SiteId::new("site-2"));

        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.site_id(), b.site_id());
    }
}
