//! Session-wide holder for the reference data fetched at startup.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::models::GameData;

/// Thread-safe handle to the game data; empty until the startup fetch completes.
#[derive(Clone, Default)]
pub struct GameDataStore {
    inner: Arc<RwLock<Option<Arc<GameData>>>>,
}

impl GameDataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store that is already populated.
    pub fn with_data(data: GameData) -> Self {
        let store = Self::new();
        store.install(data);
        store
    }

    /// Install freshly fetched data, replacing anything held before.
    pub fn install(&self, data: GameData) {
        info!(
            cities = data.cities().len(),
            segments = data.segments().len(),
            tickets = data.tickets().len(),
            "Game data installed"
        );
        *self.inner.write() = Some(Arc::new(data));
    }

    /// Shared snapshot of the current data, if loaded.
    pub fn snapshot(&self) -> Option<Arc<GameData>> {
        self.inner.read().clone()
    }

    /// Whether the startup fetch has completed.
    pub fn is_loaded(&self) -> bool {
        self.inner.read().is_some()
    }
}
