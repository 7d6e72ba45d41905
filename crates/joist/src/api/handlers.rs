//! API request handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::Html,
};
use serde::Serialize;
use tracing::instrument;

use crate::db::{Item, NewItem};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// "connected" while the pool can hand out connections.
    pub database: String,
    /// Relay state: "listening" when the change stream is live.
    pub relay: String,
}

/// Health check endpoint.
///
/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = if state.db.is_connected() {
        "connected"
    } else {
        "disconnected"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        relay: state.relay_state.borrow().as_str().to_string(),
    })
}

/// Embedded browser test client.
///
/// GET /
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../assets/index.html"))
}

/// List all items, newest first.
///
/// GET /api/items
#[instrument(skip(state))]
pub async fn list_items(State(state): State<AppState>) -> ApiResult<Json<Vec<Item>>> {
    let items = state.items.list().await?;
    Ok(Json(items))
}

/// Get a specific item by id.
///
/// GET /api/items/{item_id}
#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
) -> ApiResult<Json<Item>> {
    let item = state
        .items
        .get(item_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("item {item_id}")))?;
    Ok(Json(item))
}

/// Create a new item.
///
/// POST /api/items
#[instrument(skip(state, body))]
pub async fn create_item(
    State(state): State<AppState>,
    Json(body): Json<NewItem>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let item = state.items.create(&body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Replace an existing item.
///
/// PUT /api/items/{item_id}
#[instrument(skip(state, body))]
pub async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
    Json(body): Json<NewItem>,
) -> ApiResult<Json<Item>> {
    let item = state
        .items
        .update(item_id, &body)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("item {item_id}")))?;
    Ok(Json(item))
}

/// Delete an item.
///
/// DELETE /api/items/{item_id}
#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let removed = state.items.delete(item_id).await?;
    if !removed {
        return Err(ApiError::not_found(format!("item {item_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
