//! Command handlers for order submission.

use orders_core::clock::Clock;
use orders_core::error::TransportError;
use orders_core::event::OrderCreatedEvent;
use orders_core::id::IdGenerator;
use tracing::{info, warn};

use crate::application::publisher::OrderPublisher;
use crate::domain::commands::SubmitOrder;

/// Handles the `SubmitOrder` command: assigns an identifier and timestamp,
/// builds the event, and publishes it once.
///
/// # Errors
///
/// Returns `TransportError` if the queue is unreachable or rejects the
/// message. The caller must resubmit the whole request to retry.
pub async fn handle_submit_order(
    command: &SubmitOrder,
    clock: &dyn Clock,
    ids: &dyn IdGenerator,
    publisher: &OrderPublisher,
) -> Result<OrderCreatedEvent, TransportError> {
    let event = OrderCreatedEvent::new(
        ids.next_id(),
        command.customer_name.clone(),
        command.amount,
        clock.now(),
    );

    if let Err(err) = publisher.publish(&event).await {
        warn!(order_id = %event.order_id(), error = %err, "failed to publish order");
        return Err(err);
    }

    info!(order_id = %event.order_id(), queue = publisher.queue_name(), "order published");
    Ok(event)
}
