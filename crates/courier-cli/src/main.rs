use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use courier_core::domain::{
    DeletePushTokenPayload, IdentifyProfilePayload, RegisterDeviceTokenPayload, TrackEventPayload,
    TrackPushMetricPayload,
};
use courier_core::{
    Device, EventType, MetricEvent, QueueConfig, QueueRegistry, RunError, SiteId, TaskRunner,
};

/// Fake backend: rejects the first N calls, then accepts everything.
/// Stands in for the real HTTP client to demo the retry/group behavior.
struct FlakyBackend {
    remaining_failures: AtomicU32,
}

impl FlakyBackend {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }

    fn call(&self, what: String) -> Result<(), RunError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            println!("  backend REJECTED {what} (failures left={left})");
            return Err(RunError::Retryable("simulated network failure".into()));
        }
        println!("  backend accepted {what}");
        Ok(())
    }
}

#[async_trait]
impl TaskRunner for FlakyBackend {
    async fn identify_profile(&self, p: IdentifyProfilePayload) -> Result<(), RunError> {
        self.call(format!("identify {}", p.identifier))
    }

    async fn track_event(&self, p: TrackEventPayload) -> Result<(), RunError> {
        self.call(format!("event '{}' for {}", p.event.name, p.identifier))
    }

    async fn register_device_token(&self, p: RegisterDeviceTokenPayload) -> Result<(), RunError> {
        self.call(format!("register token {}", p.device.token))
    }

    async fn delete_device_token(&self, p: DeletePushTokenPayload) -> Result<(), RunError> {
        self.call(format!("delete token {}", p.device_token))
    }

    async fn track_push_metric(&self, p: TrackPushMetricPayload) -> Result<(), RunError> {
        self.call(format!("metric {:?} for {}", p.event, p.delivery_id))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_core=info".into()),
        )
        .init();

    let storage_dir = tempfile::tempdir().expect("temp storage dir");

    // Identify fails twice before going through; everything blocked on
    // it stays queued until it succeeds.
    let backend = Arc::new(FlakyBackend::new(2));
    let registry = QueueRegistry::new(
        storage_dir.path(),
        backend,
        QueueConfig {
            min_tasks_in_queue: 100,
            drain_delay: Duration::from_secs(3600),
            ..QueueConfig::default()
        },
    );
    let queue = registry.get_or_create(&SiteId::new("demo-site"));

    queue
        .identify_profile("alice", None, serde_json::Map::new())
        .await;
    queue
        .track("alice", "app_opened", EventType::Event, serde_json::Map::new())
        .await;
    queue
        .register_device_token(
            "alice",
            Device {
                token: "fcm-token-1".into(),
                platform: "android".into(),
                last_used: 0,
                attributes: serde_json::Map::new(),
            },
        )
        .await;
    queue
        .track_metric("delivery-1", "fcm-token-1", MetricEvent::Opened)
        .await;

    println!(
        "enqueued {} tasks",
        queue.status().await.num_tasks_in_queue
    );

    for attempt in 1.. {
        println!("--- drain {attempt} ---");
        queue.run().await;
        let pending = queue.status().await.num_tasks_in_queue;
        println!("pending after drain {attempt}: {pending}");
        if pending == 0 {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    println!("queue empty; all tasks delivered");
}
