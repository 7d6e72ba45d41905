//! Application state shared across handlers.

use std::sync::Arc;

use tokio::sync::watch;

use crate::db::{Database, ItemRepository};
use crate::relay::RelayState;
use crate::ws::WsHub;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Database,
    /// Item repository.
    pub items: ItemRepository,
    /// WebSocket hub holding the live subscriber set.
    pub hub: Arc<WsHub>,
    /// Relay state, published by the relay for the health probe.
    pub relay_state: watch::Receiver<RelayState>,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        db: Database,
        hub: Arc<WsHub>,
        relay_state: watch::Receiver<RelayState>,
        cors_origins: Vec<String>,
    ) -> Self {
        let items = ItemRepository::new(db.pool().clone());
        Self {
            db,
            items,
            hub,
            relay_state,
            cors_origins,
        }
    }
}
