//! Publishes order events to the order queue.

use std::sync::Arc;

use orders_core::error::TransportError;
use orders_core::event::{DomainEvent, OrderCreatedEvent};
use orders_core::message::QueueMessage;
use orders_core::queue::MessageQueue;
use tracing::debug;

/// Sends `OrderCreatedEvent`s to a named queue through the shared client
/// handle.
#[derive(Clone)]
pub struct OrderPublisher {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
}

impl std::fmt::Debug for OrderPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPublisher")
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}

impl OrderPublisher {
    /// Creates a publisher for `queue_name`.
    #[must_use]
    pub fn new(queue: Arc<dyn MessageQueue>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
        }
    }

    /// Name of the queue events are published to.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Publishes `event` with a single send attempt.
    ///
    /// # Errors
    ///
    /// Returns the `TransportError` of the failed send. No retry is made.
    pub async fn publish(&self, event: &OrderCreatedEvent) -> Result<(), TransportError> {
        let message = QueueMessage::from_event(event);
        debug!(
            message_id = %message.message_id,
            subject = event.event_type(),
            queue = %self.queue_name,
            "sending message"
        );
        self.queue.send(&self.queue_name, message).await
    }
}
