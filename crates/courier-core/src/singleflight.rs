//! Single-flight gate for drains.
//!
//! At most one drain executes task side effects at a time per queue
//! instance (so per site id). Concurrent drain requests collapse into a
//! silent no-op rather than queueing.

use std::sync::atomic::{AtomicBool, Ordering};

/// One boolean of state: is a drain currently running?
#[derive(Debug, Default)]
pub struct RunGate {
    running: AtomicBool,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test-and-set in one step. `Some(permit)` means the caller owns the
    /// drain; `None` means another drain is active and the caller must
    /// return immediately without running anything.
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| RunPermit { gate: self })
    }

    fn release(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Permit to run one drain. Releasing happens on `Drop`, so the gate
/// cannot stay locked if the drain unwinds.
#[derive(Debug)]
pub struct RunPermit<'a> {
    gate: &'a RunGate,
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
