//! Debounced snapshot push scheduler.
//!
//! Every local mutation notifies the scheduler; it arms (or re-arms) a
//! timer and pushes one snapshot of the *current* state when the trip has
//! been quiet for the debounce window. A burst of edits therefore costs a
//! single push carrying all of them.

use crate::remote::RemoteAdapter;
use crate::store::TripState;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Quiet window before a push fires.
pub const DEBOUNCE: Duration = Duration::from_millis(800);

/// Cancel-and-replace debounce around [`RemoteAdapter::push`].
pub struct SyncScheduler {
    adapter: Arc<dyn RemoteAdapter>,
    state: Arc<RwLock<TripState>>,
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(adapter: Arc<dyn RemoteAdapter>, state: Arc<RwLock<TripState>>) -> Self {
        Self::with_delay(adapter, state, DEBOUNCE)
    }

    pub fn with_delay(
        adapter: Arc<dyn RemoteAdapter>,
        state: Arc<RwLock<TripState>>,
        delay: Duration,
    ) -> Self {
        Self {
            adapter,
            state,
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Record that local state changed. Any armed timer is cancelled and a
    /// fresh one starts; the snapshot is taken when the timer fires, not
    /// now, so the push always carries the latest state.
    pub fn notify_mutated(&self) {
        let mut pending = self.pending.lock().expect("scheduler lock poisoned");
        if let Some(armed) = pending.take() {
            armed.abort();
        }

        let adapter = Arc::clone(&self.adapter);
        let state = Arc::clone(&self.state);
        let delay = self.delay;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let snapshot = state.read().await.snapshot();
            if let Err(err) = adapter.push(&snapshot).await {
                // local state stays authoritative, the next edit re-arms
                tracing::warn!("snapshot push failed: {err}");
            }
        }));
    }

    /// Cancel any armed push. Edits made but not yet pushed are only in
    /// the local store until the next notify.
    pub fn shutdown(&self) {
        if let Some(armed) = self
            .pending
            .lock()
            .expect("scheduler lock poisoned")
            .take()
        {
            armed.abort();
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
