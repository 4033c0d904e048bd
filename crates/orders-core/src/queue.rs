//! Message queue transport abstraction.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::TransportError;
use crate::message::{QueueMessage, ReceivedMessage};

/// Client handle for an at-least-once message broker with per-message locks.
///
/// One handle is created at startup and shared, as `Arc<dyn MessageQueue>`,
/// by every publisher and processor in the process.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Enqueue a message on `queue`.
    async fn send(&self, queue: &str, message: QueueMessage) -> Result<(), TransportError>;

    /// Receive up to `max_messages` messages, waiting at most `max_wait` for
    /// the first one. Each returned message is locked to the caller and its
    /// delivery count incremented. An empty batch means nothing arrived in
    /// time.
    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError>;

    /// Remove a locked message permanently.
    async fn complete(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError>;

    /// Release a locked message so it can be redelivered immediately.
    async fn abandon(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError>;

    /// Extend the lock on a message by the broker's lock duration.
    async fn renew_lock(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError>;

    /// Move a locked message out of the active queue, recording `reason`.
    async fn dead_letter(
        &self,
        queue: &str,
        lock_token: Uuid,
        reason: &str,
    ) -> Result<(), TransportError>;
}
