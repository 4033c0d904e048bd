//! Message handlers.

use std::time::Duration;

use async_trait::async_trait;
use orders_core::error::HandlerError;
use orders_core::event::OrderCreatedEvent;
use orders_core::message::ReceivedMessage;
use tracing::info;

/// Handles one delivered message. An `Err` makes the processor abandon the
/// message; `Ok` makes it complete the message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process `message`.
    async fn handle(&self, message: &ReceivedMessage) -> Result<(), HandlerError>;
}

/// The business work performed for each order.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Process `event`.
    async fn process(&self, event: &OrderCreatedEvent) -> Result<(), HandlerError>;
}

/// Placeholder unit of work that waits for a fixed delay and succeeds.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedWork {
    delay: Duration,
}

impl SimulatedWork {
    /// Delay used when none is configured.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

    /// Creates a unit of work that takes `delay` per order.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedWork {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY)
    }
}

#[async_trait]
impl UnitOfWork for SimulatedWork {
    async fn process(&self, _event: &OrderCreatedEvent) -> Result<(), HandlerError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Decodes `OrderCreatedEvent` messages and runs a unit of work on them.
#[derive(Debug)]
pub struct OrderCreatedHandler<W> {
    work: W,
}

impl<W: UnitOfWork> OrderCreatedHandler<W> {
    /// Creates a handler that runs `work` for every decoded order.
    #[must_use]
    pub fn new(work: W) -> Self {
        Self { work }
    }
}

#[async_trait]
impl<W: UnitOfWork> MessageHandler for OrderCreatedHandler<W> {
    async fn handle(&self, message: &ReceivedMessage) -> Result<(), HandlerError> {
        let event = OrderCreatedEvent::from_payload(&message.body)?;

        info!(
            order_id = %event.order_id(),
            customer = event.customer_name(),
            "processing order"
        );

        self.work.process(&event).await?;

        info!(order_id = %event.order_id(), "order processed");
        Ok(())
    }
}
