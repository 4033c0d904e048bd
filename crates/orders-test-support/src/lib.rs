//! Shared test mocks and utilities for the orders pipeline.

mod clock;
mod ids;
mod message;
mod queue;

pub use clock::FixedClock;
pub use ids::SequenceIds;
pub use message::received_message;
pub use queue::{FailingQueue, RecordingQueue};
