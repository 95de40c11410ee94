use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::dao::session_store::SessionStore;

/// Currently installed persistence backend plus the degraded-mode flag.
///
/// The application starts degraded until a store is installed.
pub struct StorageHandle {
    store: RwLock<Option<Arc<dyn SessionStore>>>,
    degraded: watch::Sender<bool>,
}

impl StorageHandle {
    pub fn new() -> Self {
        let (degraded, _rx) = watch::channel(true);
        Self {
            store: RwLock::new(None),
            degraded,
        }
    }

    /// Handle already serving `store`, used by tests and the in-memory backend.
    pub fn with_store(store: Arc<dyn SessionStore>) -> Self {
        let (degraded, _rx) = watch::channel(false);
        Self {
            store: RwLock::new(Some(store)),
            degraded,
        }
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn SessionStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a store implementation and leave degraded mode.
    pub async fn install(&self, store: Arc<dyn SessionStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.set_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn set_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }
}

impl Default for StorageHandle {
    fn default() -> Self {
        Self::new()
    }
}
