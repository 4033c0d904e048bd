//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use orders_queue::InMemoryQueue;
use orders_test_support::{FixedClock, SequenceIds};
use tower::ServiceExt;
use uuid::Uuid;

use orders_api::routes;
use orders_api::state::AppState;

/// Queue name used across all integration tests.
pub const QUEUE: &str = "orders";

/// Fixed timestamp used across all integration tests.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Build the full app router over `broker`, handing out `ids` as order
/// identifiers. Uses the same route structure as `main.rs`.
pub fn build_test_app(broker: Arc<InMemoryQueue>, ids: Vec<Uuid>) -> Router {
    let app_state = AppState::new(
        Arc::new(FixedClock(fixed_time())),
        Arc::new(SequenceIds::new(ids)),
        broker,
        QUEUE,
    );

    routes::router().with_state(app_state)
}

/// Send a POST request with a JSON body and return the response. A body
/// that is not JSON comes back as `Value::Null`.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, headers, json)
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();

    (status, json)
}
