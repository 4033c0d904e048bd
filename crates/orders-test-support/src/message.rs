//! Builders for broker deliveries.

use chrono::Utc;
use orders_core::message::{JSON_CONTENT_TYPE, ReceivedMessage};
use uuid::Uuid;

/// A first delivery of `body` with a fresh message id and lock token.
#[must_use]
pub fn received_message(body: impl Into<Vec<u8>>) -> ReceivedMessage {
    let message_id = Uuid::new_v4().to_string();
    ReceivedMessage {
        correlation_id: message_id.clone(),
        message_id,
        content_type: JSON_CONTENT_TYPE.to_owned(),
        subject: None,
        body: body.into(),
        lock_token: Uuid::new_v4(),
        delivery_count: 1,
        enqueued_at: Utc::now(),
    }
}
