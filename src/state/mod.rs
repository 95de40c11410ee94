pub mod broadcaster;
pub mod collector;
pub mod leaderboard;
pub mod question;
pub mod recorder;
pub mod registry;
pub mod roster;
pub mod scoring;
pub mod session;
pub mod state_machine;
pub mod storage;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    state::{broadcaster::EventHub, registry::SessionRegistry, storage::StorageHandle},
};

pub use self::state_machine::{ApplyError, DiscardError, Plan, PlanError, PlanId, Snapshot};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration, storage, live sessions and their event hubs.
pub struct AppState {
    config: AppConfig,
    storage: Arc<StorageHandle>,
    hub: Arc<EventHub>,
    registry: SessionRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_storage(config, Arc::new(StorageHandle::new()))
    }

    /// Construct the state around an existing storage handle.
    pub fn with_storage(config: AppConfig, storage: Arc<StorageHandle>) -> SharedState {
        let hub = Arc::new(EventHub::new(config.event_capacity, config.event_history));
        let registry = SessionRegistry::new(
            hub.clone(),
            storage.clone(),
            config.pin_length,
            config.session_settings(),
        );
        Arc::new(Self {
            config,
            storage,
            hub,
            registry,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Installed persistence backend and degraded flag.
    pub fn storage(&self) -> &Arc<StorageHandle> {
        &self.storage
    }

    /// Per-session broadcast hubs backing the event streams.
    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        self.storage.is_degraded()
    }
}
