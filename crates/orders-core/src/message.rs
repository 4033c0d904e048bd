//! Message envelopes exchanged with the broker.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::event::DomainEvent;

/// Content type of every JSON-encoded event body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A message handed to the broker for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// Broker-visible message identifier.
    pub message_id: String,
    /// Identifier of the business transaction the message belongs to.
    pub correlation_id: String,
    /// MIME type of `body`.
    pub content_type: String,
    /// Event type name, if the body is an event.
    pub subject: Option<String>,
    /// Opaque payload.
    pub body: Vec<u8>,
}

impl QueueMessage {
    /// Wraps an event: message and correlation identifiers are both set to
    /// the event's correlation id.
    pub fn from_event<E: DomainEvent>(event: &E) -> Self {
        let id = event.correlation_id().to_string();
        Self {
            message_id: id.clone(),
            correlation_id: id,
            content_type: JSON_CONTENT_TYPE.to_owned(),
            subject: Some(event.event_type().to_owned()),
            body: event.to_payload(),
        }
    }
}

/// A message delivered by the broker under a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Broker-visible message identifier.
    pub message_id: String,
    /// Identifier of the business transaction the message belongs to.
    pub correlation_id: String,
    /// MIME type of `body`.
    pub content_type: String,
    /// Event type name, if any.
    pub subject: Option<String>,
    /// Opaque payload.
    pub body: Vec<u8>,
    /// Token that settles or renews this delivery. Fresh on every delivery.
    pub lock_token: Uuid,
    /// How many times the message has been delivered, this delivery included.
    pub delivery_count: u32,
    /// When the broker accepted the message.
    pub enqueued_at: DateTime<Utc>,
}
