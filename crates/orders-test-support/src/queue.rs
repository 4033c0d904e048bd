//! Test queues: mock `MessageQueue` implementations for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use orders_core::error::TransportError;
use orders_core::message::{QueueMessage, ReceivedMessage};
use orders_core::queue::MessageQueue;
use uuid::Uuid;

/// A queue that records every call. `receive` hands out the deliveries queued
/// with [`RecordingQueue::with_messages`]; when none are left it sleeps for `max_wait`
/// and returns an empty batch. All other calls succeed.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    pending: Mutex<VecDeque<ReceivedMessage>>,
    sent: Mutex<Vec<(String, QueueMessage)>>,
    completed: Mutex<Vec<Uuid>>,
    abandoned: Mutex<Vec<Uuid>>,
    renewed: Mutex<Vec<Uuid>>,
    dead_lettered: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingQueue {
    /// Create an empty recording queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recording queue that will deliver `messages` in order.
    #[must_use]
    pub fn with_messages(messages: Vec<ReceivedMessage>) -> Self {
        let queue = Self::new();
        queue.pending.lock().unwrap().extend(messages);
        queue
    }

    /// Returns a snapshot of all `(queue, message)` pairs that were sent.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn sent(&self) -> Vec<(String, QueueMessage)> {
        self.sent.lock().unwrap().clone()
    }

    /// Lock tokens passed to `complete`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn completed(&self) -> Vec<Uuid> {
        self.completed.lock().unwrap().clone()
    }

    /// Lock tokens passed to `abandon`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn abandoned(&self) -> Vec<Uuid> {
        self.abandoned.lock().unwrap().clone()
    }

    /// Lock tokens passed to `renew_lock`, one entry per call.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn renewed(&self) -> Vec<Uuid> {
        self.renewed.lock().unwrap().clone()
    }

    /// `(lock token, reason)` pairs passed to `dead_letter`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn dead_lettered(&self) -> Vec<(Uuid, String)> {
        self.dead_lettered.lock().unwrap().clone()
    }

    /// Number of deliveries settled in any way so far.
    ///
    /// # Panics
    ///
    /// Panics if an internal mutex is poisoned.
    pub fn settled_count(&self) -> usize {
        self.completed.lock().unwrap().len()
            + self.abandoned.lock().unwrap().len()
            + self.dead_lettered.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageQueue for RecordingQueue {
    async fn send(&self, queue: &str, message: QueueMessage) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((queue.to_owned(), message));
        Ok(())
    }

    async fn receive(
        &self,
        _queue: &str,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let batch: Vec<ReceivedMessage> = {
            let mut pending = self.pending.lock().unwrap();
            let take = max_messages.min(pending.len());
            pending.drain(..take).collect()
        };
        if batch.is_empty() {
            tokio::time::sleep(max_wait).await;
        }
        Ok(batch)
    }

    async fn complete(&self, _queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        self.completed.lock().unwrap().push(lock_token);
        Ok(())
    }

    async fn abandon(&self, _queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        self.abandoned.lock().unwrap().push(lock_token);
        Ok(())
    }

    async fn renew_lock(&self, _queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        self.renewed.lock().unwrap().push(lock_token);
        Ok(())
    }

    async fn dead_letter(
        &self,
        _queue: &str,
        lock_token: Uuid,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.dead_lettered
            .lock()
            .unwrap()
            .push((lock_token, reason.to_owned()));
        Ok(())
    }
}

/// A queue whose every call fails as unreachable. Useful for testing
/// error-handling paths.
#[derive(Debug)]
pub struct FailingQueue;

fn unreachable() -> TransportError {
    TransportError::Unreachable("connection refused".into())
}

#[async_trait]
impl MessageQueue for FailingQueue {
    async fn send(&self, _queue: &str, _message: QueueMessage) -> Result<(), TransportError> {
        Err(unreachable())
    }

    async fn receive(
        &self,
        _queue: &str,
        _max_messages: usize,
        _max_wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        Err(unreachable())
    }

    async fn complete(&self, _queue: &str, _lock_token: Uuid) -> Result<(), TransportError> {
        Err(unreachable())
    }

    async fn abandon(&self, _queue: &str, _lock_token: Uuid) -> Result<(), TransportError> {
        Err(unreachable())
    }

    async fn renew_lock(&self, _queue: &str, _lock_token: Uuid) -> Result<(), TransportError> {
        Err(unreachable())
    }

    async fn dead_letter(
        &self,
        _queue: &str,
        _lock_token: Uuid,
        _reason: &str,
    ) -> Result<(), TransportError> {
        Err(unreachable())
    }
}
