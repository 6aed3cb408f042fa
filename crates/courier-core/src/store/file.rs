//! File-backed queue storage.
//!
//! Layout, sandboxed per site id so tenants never share files:
//!
//! ```text
//! <root>/
//!   <site-id>/
//!     queue/
//!       inventory.json
//!       tasks/
//!         <task-id>.json
//! ```
//!
//! One internal async mutex serializes every operation; the critical
//! section covers both the inventory and the payload file so the two can
//! never be observed mid-update.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error};
use ulid::Ulid;

use super::QueueStorage;
use crate::domain::{
    Inventory, QueueStatus, QueueTask, RunResults, SiteId, TaskGroup, TaskId, TaskMetadata,
    TaskType,
};
use crate::error::StorageError;
use crate::ports::Clock;

pub struct FileQueueStorage {
    site_id: SiteId,
    queue_dir: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl FileQueueStorage {
    pub fn new(root: impl AsRef<Path>, site_id: SiteId, clock: Arc<dyn Clock>) -> Self {
        let queue_dir = root.as_ref().join(site_id.as_str()).join("queue");
        Self {
            site_id,
            queue_dir,
            clock,
            lock: Mutex::new(()),
        }
    }

    fn inventory_path(&self) -> PathBuf {
        self.queue_dir.join("inventory.json")
    }

    pub(crate) fn task_path(&self, task_id: TaskId) -> PathBuf {
        self.queue_dir.join("tasks").join(format!("{task_id}.json"))
    }

    fn status(&self, inventory: &Inventory) -> QueueStatus {
        QueueStatus {
            site_id: self.site_id.clone(),
            num_tasks_in_queue: inventory.len(),
        }
    }

    fn new_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        TaskId::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    // Helpers below assume the caller holds `self.lock`.

    async fn read_inventory(&self) -> Result<Inventory, StorageError> {
        let path = self.inventory_path();
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(inventory) => Ok(inventory),
            Err(err) => {
                // An undecodable inventory would fail every future drain.
                // Set the file aside and start over; payload files it
                // pointed at stay on disk but are never selected again.
                error!(%err, "inventory does not decode; quarantining it and starting empty");
                let _ = fs::rename(&path, path.with_extension("json.corrupt")).await;
                Ok(Vec::new())
            }
        }
    }

    async fn write_inventory(&self, inventory: &Inventory) -> Result<(), StorageError> {
        fs::create_dir_all(&self.queue_dir).await?;
        let bytes = serde_json::to_vec(inventory)?;
        fs::write(self.inventory_path(), bytes).await?;
        Ok(())
    }

    async fn read_task(&self, task_id: TaskId) -> Result<Option<QueueTask>, StorageError> {
        match fs::read(self.task_path(task_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_task(&self, task: &QueueTask) -> Result<(), StorageError> {
        let path = self.task_path(task.storage_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(task)?;
        fs::write(path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl QueueStorage for FileQueueStorage {
    fn site_id(&self) -> &SiteId {
        &self.site_id
    }

    async fn inventory(&self) -> Result<Inventory, StorageError> {
        let _guard = self.lock.lock().await;
        self.read_inventory().await
    }

    async fn create(
        &self,
        task_type: TaskType,
        data: serde_json::Value,
        group_start: Option<TaskGroup>,
        blocking_groups: Vec<TaskGroup>,
    ) -> Result<(TaskId, QueueStatus), StorageError> {
        let _guard = self.lock.lock().await;

        let mut inventory = self.read_inventory().await?;
        let task_id = self.new_task_id();
        let task = QueueTask {
            storage_id: task_id,
            task_type: task_type.to_string(),
            data,
            run_results: RunResults::default(),
        };

        // Payload record first: once an entry is in the inventory, the
        // drain assumes the payload exists.
        self.write_task(&task).await?;

        inventory.push(TaskMetadata {
            task_id,
            task_type: task_type.to_string(),
            group_start: group_start.map(|g| g.to_string()),
            group_member: blocking_groups.iter().map(|g| g.to_string()).collect(),
            created_at: self.clock.now(),
        });

        if let Err(err) = self.write_inventory(&inventory).await {
            // Don't leave a payload record no entry points at.
            let _ = fs::remove_file(self.task_path(task_id)).await;
            return Err(err);
        }

        debug!(%task_id, %task_type, "created queue task");
        Ok((task_id, self.status(&inventory)))
    }

    async fn get(&self, task_id: TaskId) -> Result<Option<QueueTask>, StorageError> {
        let _guard = self.lock.lock().await;
        self.read_task(task_id).await
    }

    async fn update_run_results(
        &self,
        task_id: TaskId,
        run_results: RunResults,
    ) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().await;

        let Some(mut task) = self.read_task(task_id).await? else {
            return Ok(false);
        };
        task.run_results = run_results;
        self.write_task(&task).await?;
        Ok(true)
    }

    async fn delete(&self, task_id: TaskId) -> Result<QueueStatus, StorageError> {
        let _guard = self.lock.lock().await;

        let mut inventory = self.read_inventory().await?;
        let Some(position) = inventory.iter().position(|e| e.task_id == task_id) else {
            // Entry already gone; make sure no orphan payload remains.
            match fs::remove_file(self.task_path(task_id)).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            return Ok(self.status(&inventory));
        };

        // Entry out of the inventory first, so a crash mid-delete leaves a
        // task the drain will never try to run rather than a dangling
        // entry.
        let removed = inventory.remove(position);
        self.write_inventory(&inventory).await?;

        match fs::remove_file(self.task_path(task_id)).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                // Put the entry back so inventory and payload records stay
                // consistent; the caller retries on a future drain.
                error!(%task_id, %err, "failed to remove task payload; restoring inventory entry");
                inventory.insert(position, removed);
                self.write_inventory(&inventory).await?;
                return Err(err.into());
            }
        }

        debug!(%task_id, "deleted queue task");
        Ok(self.status(&inventory))
    }

    async fn delete_expired(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<Vec<TaskMetadata>, StorageError> {
        let _guard = self.lock.lock().await;

        let inventory = self.read_inventory().await?;
        let (expired, kept): (Vec<_>, Vec<_>) = inventory
            .into_iter()
            .partition(|e| e.group_start.is_none() && e.created_at < older_than);

        if expired.is_empty() {
            return Ok(expired);
        }

        debug!(count = expired.len(), %older_than, "deleting expired queue tasks");
        self.write_inventory(&kept).await?;
        for entry in &expired {
            // These tasks start no group, so a straggling payload file is
            // harmless; ignore removal errors.
            let _ = fs::remove_file(self.task_path(entry.task_id)).await;
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> FileQueueStorage {
        FileQueueStorage::new(dir.path(), SiteId::new("site-1"), Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn empty_storage_has_empty_inventory() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        assert!(storage.inventory().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let (task_id, status) = storage
            .create(
                TaskType::TrackEvent,
                json!({"identifier": "p1"}),
                None,
                vec![TaskGroup::IdentifyProfile("p1".into())],
            )
            .await
            .unwrap();

        assert_eq!(status.num_tasks_in_queue, 1);

        let task = storage.get(task_id).await.unwrap().unwrap();
        assert_eq!(task.task_type, "TrackEvent");
        assert_eq!(task.data["identifier"], "p1");
        assert_eq!(task.run_results.total_runs, 0);

        let inventory = storage.inventory().await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].task_id, task_id);
        assert_eq!(inventory[0].group_member, vec!["identify:p1".to_string()]);
        assert!(inventory[0].group_start.is_none());
    }

    #[tokio::test]
    async fn inventory_preserves_arrival_order() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let mut ids = Vec::new();
        for i in 0..3 {
            let (id, _) = storage
                .create(TaskType::TrackEvent, json!({ "n": i }), None, vec![])
                .await
                .unwrap();
            ids.push(id);
        }

        let inventory = storage.inventory().await.unwrap();
        let listed: Vec<_> = inventory.iter().map(|e| e.task_id).collect();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let task_id = {
            let storage = storage(&dir);
            let (id, _) = storage
                .create(TaskType::IdentifyProfile, json!({"identifier": "p1"}), None, vec![])
                .await
                .unwrap();
            storage
                .update_run_results(id, RunResults::new(2))
                .await
                .unwrap();
            id
        };

        // A fresh instance over the same directory sees the same queue.
        let reopened = storage(&dir);
        let inventory = reopened.inventory().await.unwrap();
        assert_eq!(inventory.len(), 1);

        let task = reopened.get(task_id).await.unwrap().unwrap();
        assert_eq!(task.run_results.total_runs, 2);
    }

    #[tokio::test]
    async fn delete_removes_entry_and_payload() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let (task_id, _) = storage
            .create(TaskType::TrackEvent, json!({}), None, vec![])
            .await
            .unwrap();

        let status = storage.delete(task_id).await.unwrap();
        assert_eq!(status.num_tasks_in_queue, 0);
        assert!(storage.get(task_id).await.unwrap().is_none());
        assert!(storage.inventory().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_of_unknown_task_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let (kept, _) = storage
            .create(TaskType::TrackEvent, json!({}), None, vec![])
            .await
            .unwrap();

        let phantom = TaskId::from_ulid(Ulid::new());
        let status = storage.delete(phantom).await.unwrap();
        assert_eq!(status.num_tasks_in_queue, 1);
        assert!(storage.get(kept).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_payload_removal_restores_inventory_entry() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let (task_id, _) = storage
            .create(TaskType::TrackEvent, json!({}), None, vec![])
            .await
            .unwrap();

        // Make the payload path undeletable by remove_file: swap the file
        // for a non-empty directory.
        let path = storage.task_path(task_id);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("pin"), b"x").unwrap();

        storage.delete(task_id).await.unwrap_err();

        // The entry is still selectable on a future drain.
        let inventory = storage.inventory().await.unwrap();
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory[0].task_id, task_id);
    }

    #[tokio::test]
    async fn corrupt_inventory_is_quarantined_and_reset() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        storage
            .create(TaskType::TrackEvent, json!({}), None, vec![])
            .await
            .unwrap();
        std::fs::write(storage.inventory_path(), b"{truncated mid-wri").unwrap();

        // The broken file is set aside rather than poisoning every read.
        assert!(storage.inventory().await.unwrap().is_empty());
        assert!(
            storage
                .inventory_path()
                .with_extension("json.corrupt")
                .exists()
        );

        // The queue accepts new work again.
        let (_, status) = storage
            .create(TaskType::TrackEvent, json!({}), None, vec![])
            .await
            .unwrap();
        assert_eq!(status.num_tasks_in_queue, 1);
    }

    #[tokio::test]
    async fn update_run_results_returns_false_for_missing_task() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);

        let phantom = TaskId::from_ulid(Ulid::new());
        let updated = storage
            .update_run_results(phantom, RunResults::new(1))
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn expiry_skips_group_start_tasks() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let storage =
            FileQueueStorage::new(dir.path(), SiteId::new("site-1"), Arc::clone(&clock) as _);

        let (old_plain, _) = storage
            .create(TaskType::TrackEvent, json!({}), None, vec![])
            .await
            .unwrap();
        let (old_group_start, _) = storage
            .create(
                TaskType::IdentifyProfile,
                json!({"identifier": "p1"}),
                Some(TaskGroup::IdentifyProfile("p1".into())),
                vec![],
            )
            .await
            .unwrap();

        clock.advance(chrono::Duration::days(10));
        let (fresh, _) = storage
            .create(TaskType::TrackEvent, json!({}), None, vec![])
            .await
            .unwrap();

        let threshold = clock.now() - chrono::Duration::days(3);
        let expired = storage.delete_expired(threshold).await.unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].task_id, old_plain);

        let remaining: Vec<_> = storage
            .inventory()
            .await
            .unwrap()
            .iter()
            .map(|e| e.task_id)
            .collect();
        assert_eq!(remaining, vec![old_group_start, fresh]);
        assert!(storage.get(old_plain).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fixed_clock_pins_task_id_timestamps() {
        let dir = TempDir::new().unwrap();
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let storage = FileQueueStorage::new(dir.path(), SiteId::new("site-1"), clock as _);

        let (task_id, _) = storage
            .create(TaskType::TrackEvent, json!({}), None, vec![])
            .await
            .unwrap();

        assert_eq!(
            task_id.as_ulid().timestamp_ms(),
            start.timestamp_millis() as u64
        );
    }
}
