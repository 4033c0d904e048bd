//! Test identifiers: deterministic `IdGenerator` implementation for tests.

use std::sync::Mutex;

use orders_core::id::IdGenerator;
use uuid::Uuid;

/// Hands out identifiers from a predetermined sequence. Panics if the
/// sequence is exhausted.
#[derive(Debug)]
pub struct SequenceIds {
    ids: Mutex<std::vec::IntoIter<Uuid>>,
}

impl SequenceIds {
    /// Create a generator that returns `ids` in order.
    #[must_use]
    pub fn new(ids: Vec<Uuid>) -> Self {
        Self {
            ids: Mutex::new(ids.into_iter()),
        }
    }
}

impl IdGenerator for SequenceIds {
    fn next_id(&self) -> Uuid {
        self.ids
            .lock()
            .unwrap()
            .next()
            .expect("SequenceIds exhausted")
    }
}
