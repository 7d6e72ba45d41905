//! Test utilities and common setup.

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;

use joist::api::{self, AppState};
use joist::config::AppConfig;
use joist::db::Database;
use joist::relay::RelayState;
use joist::ws::WsHub;

/// Create a test application.
///
/// The pool is lazy, so no database has to be reachable for the endpoints
/// these tests exercise.
pub fn test_app() -> Router {
    let config = AppConfig::default();
    let db = Database::connect_lazy(&config.database).unwrap();
    let hub = Arc::new(WsHub::new());

    let (state_tx, state_rx) = watch::channel(RelayState::Listening);
    // The receiver keeps reporting the last value after the sender is gone.
    drop(state_tx);

    let state = AppState::new(db, hub, state_rx, config.cors.origins);
    api::create_router(state)
}
