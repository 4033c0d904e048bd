//! Orders Queue: broker adapters implementing `MessageQueue`.
//!
//! `InMemoryQueue` is an embedded broker for single-process use and tests.
//! `PgQueue` keeps messages in PostgreSQL so separate producer and worker
//! processes can share a queue.

use std::sync::Arc;

use orders_core::error::TransportError;
use orders_core::queue::MessageQueue;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

pub mod config;
pub mod memory;
pub mod pg_queue;
pub mod schema;

pub use config::QueueConfig;
pub use memory::{DeadLetteredMessage, InMemoryQueue};
pub use pg_queue::PgQueue;

/// Connection string prefix selecting the embedded broker.
pub const MEMORY_SCHEME: &str = "memory://";

/// Builds the queue client handle for `connection_string`.
///
/// `memory://` selects an `InMemoryQueue`; `postgres://` and `postgresql://`
/// connect a `PgQueue` and make sure its table exists.
///
/// # Errors
///
/// Returns `TransportError::Unreachable` for an unknown scheme or when the
/// database cannot be reached.
pub async fn connect(connection_string: &str) -> Result<Arc<dyn MessageQueue>, TransportError> {
    if connection_string.starts_with(MEMORY_SCHEME) {
        info!("using embedded in-memory queue");
        return Ok(Arc::new(InMemoryQueue::new()));
    }

    if connection_string.starts_with("postgres://")
        || connection_string.starts_with("postgresql://")
    {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let queue = PgQueue::new(pool);
        queue.ensure_schema().await?;
        info!("using PostgreSQL queue");
        return Ok(Arc::new(queue));
    }

    // Only the scheme is echoed back: the rest may carry credentials.
    let scheme = connection_string.split("://").next().unwrap_or_default();
    Err(TransportError::Unreachable(format!(
        "unsupported queue connection string scheme: {scheme}"
    )))
}
