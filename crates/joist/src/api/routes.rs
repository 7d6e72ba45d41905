//! API route definitions.

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::ws;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state);

    // Tracing layer with request timing
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/ws", get(ws::ws_handler))
        .route("/api/items", get(handlers::list_items))
        .route("/api/items", post(handlers::create_item))
        .route("/api/items/{item_id}", get(handlers::get_item))
        .route("/api/items/{item_id}", put(handlers::update_item))
        .route("/api/items/{item_id}", delete(handlers::delete_item))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(state: &AppState) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];

    let headers = [header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN];

    let origins: Vec<HeaderValue> = state
        .cors_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}
