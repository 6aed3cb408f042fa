//! One-shot drain timer.
//!
//! At most one timer is pending per queue: scheduling while one is
//! already pending is a no-op, and starting a drain cancels it.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
pub struct DrainTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DrainTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` to fire after `delay` unless a timer is
    /// already pending. Returns whether this call scheduled it.
    pub fn schedule_if_not_already<F>(&self, delay: Duration, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pending = self.pending.lock().unwrap();
        if let Some(handle) = pending.as_ref()
            && !handle.is_finished()
        {
            return false;
        }

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }));
        debug!(?delay, "scheduled drain timer");
        true
    }

    /// Abort the pending timer, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().unwrap().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn fires_once_after_delay() {
        let timer = DrainTimer::new();
        let fired = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&fired);
        let scheduled = timer.schedule_if_not_already(Duration::from_millis(10), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduled);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_schedule_is_refused_while_pending() {
        let timer = DrainTimer::new();
        let fired = Arc::new(AtomicU32::new(0));

        let f1 = Arc::clone(&fired);
        assert!(timer.schedule_if_not_already(Duration::from_millis(20), move || {
            f1.fetch_add(1, Ordering::SeqCst);
        }));
        let f2 = Arc::clone(&fired);
        assert!(!timer.schedule_if_not_already(Duration::from_millis(20), move || {
            f2.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_prevents_firing() {
        let timer = DrainTimer::new();
        let fired = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&fired);
        timer.schedule_if_not_already(Duration::from_millis(10), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn can_reschedule_after_firing() {
        let timer = DrainTimer::new();
        let fired = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&fired);
        timer.schedule_if_not_already(Duration::from_millis(5), move || {
            f.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(30)).await;

        let f = Arc::clone(&fired);
        assert!(timer.schedule_if_not_already(Duration::from_millis(5), move || {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
