//! Debounced post-install refresh.
//!
//! Every [`Refresh::schedule`] call (re)arms a single delayed task. The store
//! is refreshed once the quiescence window has passed without another call,
//! so a burst of installs produces one refresh.

use log::{debug, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::store::Store;

#[cfg_attr(test, mockall::automock)]
pub trait Refresh: Send + Sync {
    /// Arm (or re-arm) the deferred refresh.
    fn schedule(&self);
}

pub struct RefreshScheduler {
    store: Arc<dyn Store>,
    quiescence: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(store: Arc<dyn Store>, quiescence: Duration) -> Self {
        Self {
            store,
            quiescence,
            pending: Mutex::new(None),
        }
    }

    /// True while a refresh is armed and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Disarm the pending refresh, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            debug!("Cancelling pending refresh");
            handle.abort();
        }
    }

    /// Wait until the pending refresh (if any) has run.
    pub async fn wait(&self) {
        let handle = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            if e.is_panic() {
                warn!("Post-install refresh panicked: {}", e);
            } else {
                debug!("Pending refresh was cancelled");
            }
        }
    }
}

impl Refresh for RefreshScheduler {
    fn schedule(&self) {
        let store = Arc::clone(&self.store);
        let deadline = Instant::now() + self.quiescence;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            debug!("Refresh re-armed before firing");
            previous.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            debug!("Quiescence window elapsed; refreshing store");
            if let Err(e) = store.refresh() {
                warn!("Post-install refresh failed: {:#}", e);
            }
        }));
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
