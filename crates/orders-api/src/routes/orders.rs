//! Routes for order submission.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use axum::{Json, Router, routing::post};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use orders_producer::application::command_handlers;
use orders_producer::domain::commands;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /orders.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Customer placing the order.
    pub customer_name: String,
    /// Order total, as a JSON number. Every digit is kept.
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub amount: Decimal,
}

/// Response body returned once the order is on the queue.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAccepted {
    /// Identifier assigned to the order.
    pub order_id: Uuid,
}

/// POST /orders
#[instrument(skip(state, request), fields(customer = %request.customer_name))]
async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = commands::SubmitOrder {
        customer_name: request.customer_name,
        amount: request.amount,
    };

    info!("handling submit_order command");

    let event = command_handlers::handle_submit_order(
        &command,
        state.clock.as_ref(),
        state.ids.as_ref(),
        &state.publisher,
    )
    .await?;

    let order_id = event.order_id();
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, format!("/orders/{order_id}"))],
        Json(OrderAccepted { order_id }),
    ))
}

/// Returns the router for order submission.
pub fn router() -> Router<AppState> {
    Router::new().route("/orders", post(create_order))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::{TimeZone, Utc};
    use orders_core::event::OrderCreatedEvent;
    use orders_core::queue::MessageQueue;
    use orders_test_support::{FailingQueue, FixedClock, RecordingQueue, SequenceIds};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app_state_with(queue: Arc<dyn MessageQueue>, order_id: Uuid) -> AppState {
        AppState::new(
            Arc::new(FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())),
            Arc::new(SequenceIds::new(vec![order_id])),
            queue,
            "orders",
        )
    }

    fn post_orders(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/orders")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_order_returns_202_with_order_id_and_location() {
        // Arrange
        let order_id = Uuid::new_v4();
        let queue = Arc::new(RecordingQueue::new());
        let app = router().with_state(app_state_with(queue.clone(), order_id));

        // Act
        let response = app
            .oneshot(post_orders(r#"{"customerName":"Ana","amount":42.50}"#))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.headers()[header::LOCATION],
            format!("/orders/{order_id}").as_str()
        );

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(json["orderId"], order_id.to_string());

        let sent = queue.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "orders");
        let event = OrderCreatedEvent::from_payload(&sent[0].1.body).unwrap();
        assert_eq!(event.order_id(), order_id);
        assert_eq!(event.customer_name(), "Ana");
        assert_eq!(event.amount(), Decimal::new(4250, 2));
    }

    #[tokio::test]
    async fn test_create_order_publishes_high_precision_amount_verbatim() {
        // Arrange
        let order_id = Uuid::new_v4();
        let queue = Arc::new(RecordingQueue::new());
        let app = router().with_state(app_state_with(queue.clone(), order_id));

        // Act
        let response = app
            .oneshot(post_orders(
                r#"{"customerName":"Ana","amount":1234567890123456789012345.678}"#,
            ))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let sent = queue.sent();
        let event = OrderCreatedEvent::from_payload(&sent[0].1.body).unwrap();
        assert_eq!(
            event.amount().to_string(),
            "1234567890123456789012345.678"
        );
        let wire = String::from_utf8(sent[0].1.body.clone()).unwrap();
        assert!(wire.contains(r#""Amount":1234567890123456789012345.678"#));
    }

    #[tokio::test]
    async fn test_create_order_returns_422_for_missing_amount() {
        // Arrange
        let queue = Arc::new(RecordingQueue::new());
        let app = router().with_state(app_state_with(queue.clone(), Uuid::new_v4()));

        // Act
        let response = app
            .oneshot(post_orders(r#"{"customerName":"Ana"}"#))
            .await
            .unwrap();

        // Assert: axum rejects the body before anything is published.
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(queue.sent().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_returns_400_for_invalid_json() {
        let queue = Arc::new(RecordingQueue::new());
        let app = router().with_state(app_state_with(queue.clone(), Uuid::new_v4()));

        let response = app.oneshot(post_orders("{not json")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(queue.sent().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_returns_503_when_queue_unreachable() {
        // Arrange
        let app = router().with_state(app_state_with(Arc::new(FailingQueue), Uuid::new_v4()));

        // Act
        let response = app
            .oneshot(post_orders(r#"{"customerName":"Ana","amount":42.50}"#))
            .await
            .unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = serde_json::from_slice(&body_bytes).unwrap();

        assert_eq!(json["error"], "queue_unavailable");
    }
}
