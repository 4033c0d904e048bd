//! Integration events published on the order queue.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait that all events published to a queue implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (carried as the message subject).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON bytes.
    fn to_payload(&self) -> Vec<u8>;

    /// Identifier linking the event to its business transaction. Doubles as
    /// the message identifier.
    fn correlation_id(&self) -> Uuid;
}

/// Emitted by the producer once per accepted order.
///
/// Fields are private: the event is built once by the producer and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    #[serde(rename = "OrderId")]
    order_id: Uuid,
    #[serde(rename = "CustomerName")]
    customer_name: String,
    #[serde(rename = "Amount", with = "rust_decimal::serde::arbitrary_precision")]
    amount: Decimal,
    #[serde(rename = "CreatedAtUtc")]
    created_at: DateTime<Utc>,
}

impl OrderCreatedEvent {
    /// Event type name used as the message subject.
    pub const EVENT_TYPE: &'static str = "orders.order_created";

    /// Builds a new event. No validation is applied to the name or amount.
    #[must_use]
    pub fn new(
        order_id: Uuid,
        customer_name: String,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id,
            customer_name,
            amount,
            created_at,
        }
    }

    /// Decodes an event from a message body.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body is not a valid event.
    pub fn from_payload(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// The order identifier.
    #[must_use]
    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    /// The customer name, verbatim from the request.
    #[must_use]
    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    /// The order amount, verbatim from the request.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// When the producer built the event.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl DomainEvent for OrderCreatedEvent {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn to_payload(&self) -> Vec<u8> {
        // Serialization of derived Serialize types with string keys is infallible.
        serde_json::to_vec(self).expect("OrderCreatedEvent serialization is infallible")
    }

    fn correlation_id(&self) -> Uuid {
        self.order_id
    }
}
