//! HTTP API module.
//!
//! REST endpoints for item CRUD, the health probe, the embedded test
//! client, and the WebSocket subscriber endpoint.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use handlers::HealthResponse;
pub use routes::create_router;
pub use state::AppState;
