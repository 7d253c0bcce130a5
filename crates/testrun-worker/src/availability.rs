//! Process-wide worker availability.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use testrun_core::WorkerAvailability;
use tracing::debug;

/// Tracks whether a task is in flight on this worker.
///
/// The only way to mark the worker busy is [`WorkerState::try_acquire`],
/// and the only way back is through the returned lease, so a task can
/// neither leave the worker busy nor free it twice.
#[derive(Debug, Default)]
pub struct WorkerState {
    busy: AtomicBool,
    releases: AtomicU64,
}

impl WorkerState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn availability(&self) -> WorkerAvailability {
        if self.busy.load(Ordering::SeqCst) {
            WorkerAvailability::Busy
        } else {
            WorkerAvailability::Available
        }
    }

    /// Mark the worker busy, unless it already is.
    pub fn try_acquire(self: &Arc<Self>) -> Option<AvailabilityLease> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        debug!("Worker marked busy");
        Some(AvailabilityLease {
            state: Arc::clone(self),
            released: false,
        })
    }

    /// Number of leases released since startup.
    pub fn completed_tasks(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Proof that the worker is busy with one task.
///
/// Releasing is explicit so the executor controls exactly when the worker
/// turns available; dropping an unreleased lease (early return, panic)
/// releases it as well.
#[derive(Debug)]
pub struct AvailabilityLease {
    state: Arc<WorkerState>,
    released: bool,
}

impl AvailabilityLease {
    /// Mark the worker available. Returns false if already released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.state.busy.store(false, Ordering::SeqCst);
        self.state.releases.fetch_add(1, Ordering::SeqCst);
        debug!("Worker marked available");
        true
    }
}

impl Drop for AvailabilityLease {
    fn drop(&mut self) {
        self.release();
    }
}
