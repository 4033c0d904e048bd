//! Order identifier generation.
//!
//! In production identifiers are random UUIDs. Tests inject a generator that
//! hands out a predetermined sequence.

use uuid::Uuid;

/// Source of fresh order identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns an identifier that has not been issued before.
    fn next_id(&self) -> Uuid;
}

/// Generates random version 4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}
