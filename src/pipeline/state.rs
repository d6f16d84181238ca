//! Published snapshot plus the single-flight refresh flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;

use crate::models::Snapshot;

/// Thread-safe holder of the current snapshot with atomic swap for
/// lock-free reads.
pub struct SnapshotStore {
    current: ArcSwap<Snapshot>,
    running: AtomicBool,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(Snapshot::default())
    }
}

impl SnapshotStore {
    pub fn new(initial: Snapshot) -> Self {
        Self {
            current: ArcSwap::new(Arc::new(initial)),
            running: AtomicBool::new(false),
        }
    }

    /// The published snapshot. The returned `Arc` stays consistent even if a
    /// refresh publishes while the caller is still reading.
    pub fn load(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replace the published snapshot in one step.
    pub fn publish(&self, snapshot: Snapshot) {
        self.current.store(Arc::new(snapshot));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Enter the Running state. `None` when a refresh is already running.
    pub fn try_begin(self: &Arc<Self>) -> Option<RefreshPermit> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RefreshPermit {
                store: Arc::clone(self),
            })
    }
}

/// Proof of being the one running refresh. Dropping it returns the store to
/// Idle, including on early return or panic.
pub struct RefreshPermit {
    store: Arc<SnapshotStore>,
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        self.store.running.store(false, Ordering::SeqCst);
    }
}
