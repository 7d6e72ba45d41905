//! API integration tests.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

mod common;
use common::test_app;

/// Test that the health endpoint reports pool and relay state.
#[tokio::test]
async fn test_health_endpoint() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "connected");
    assert_eq!(json["relay"], "listening");
    assert!(json["version"].is_string());
}

/// Test that the root serves the embedded browser client.
#[tokio::test]
async fn test_index_serves_test_client() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();

    assert!(html.contains("<!DOCTYPE html>"));
    assert!(html.contains("Joist"));
    assert!(html.contains("/ws"));
}

/// Unknown routes return 404.
#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nope")
                .method(Method::GET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Wrong method on a known route returns 405.
#[tokio::test]
async fn test_wrong_method_returns_405() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .method(Method::DELETE)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

/// A create body that is not JSON is rejected before any database work.
#[tokio::test]
async fn test_create_item_rejects_non_json_body() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/items")
                .method(Method::POST)
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    // Missing content-type for a Json extractor.
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}
