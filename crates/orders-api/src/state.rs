//! Shared application state.

use std::sync::Arc;

use orders_core::clock::Clock;
use orders_core::id::IdGenerator;
use orders_core::queue::MessageQueue;
use orders_producer::application::publisher::OrderPublisher;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock stamping new orders.
    pub clock: Arc<dyn Clock>,
    /// Source of order identifiers.
    pub ids: Arc<dyn IdGenerator>,
    /// Publisher bound to the order queue.
    pub publisher: OrderPublisher,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create new application state publishing to `queue_name` on `queue`.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        queue: Arc<dyn MessageQueue>,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            clock,
            ids,
            publisher: OrderPublisher::new(queue, queue_name),
        }
    }
}
