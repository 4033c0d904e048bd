//! Embedded in-memory broker.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use orders_core::error::TransportError;
use orders_core::message::{QueueMessage, ReceivedMessage};
use orders_core::queue::MessageQueue;

/// A message moved out of the active queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetteredMessage {
    /// The original message.
    pub message: QueueMessage,
    /// Deliveries made before it was dead-lettered.
    pub delivery_count: u32,
    /// Why it was dead-lettered.
    pub reason: String,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    message: QueueMessage,
    delivery_count: u32,
    enqueued_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Lease {
    stored: StoredMessage,
    locked_until: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    leased: HashMap<Uuid, Lease>,
    dead_letters: Vec<DeadLetteredMessage>,
}

impl QueueState {
    /// Returns messages whose lock ran out to the front of the ready list.
    /// Yields how many were moved.
    fn reclaim_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<Uuid> = self
            .leased
            .iter()
            .filter(|(_, lease)| lease.locked_until <= now)
            .map(|(token, _)| *token)
            .collect();

        let reclaimed = expired.len();
        for token in expired {
            if let Some(lease) = self.leased.remove(&token) {
                debug!(
                    message_id = %lease.stored.message.message_id,
                    lock_token = %token,
                    "message lock expired"
                );
                self.ready.push_front(lease.stored);
            }
        }
        reclaimed
    }

    /// When the earliest current lock runs out.
    fn next_expiry(&self) -> Option<Instant> {
        self.leased.values().map(|lease| lease.locked_until).min()
    }

    fn take_lease(&mut self, lock_token: Uuid) -> Result<Lease, TransportError> {
        self.leased
            .remove(&lock_token)
            .ok_or(TransportError::LockLost(lock_token))
    }
}

/// At-least-once broker held in process memory.
///
/// Every delivery locks the message for `lock_duration`. Expired locks are
/// reclaimed on the next operation against the same queue, or when a waiting
/// `receive` reaches the earliest expiry. The message becomes deliverable
/// again with its delivery count preserved.
#[derive(Debug)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueState>>,
    arrivals: Notify,
    lock_duration: Duration,
}

impl InMemoryQueue {
    /// Lock duration used by [`InMemoryQueue::new`].
    pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(60);

    /// Creates an empty broker with the default lock duration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_lock_duration(Self::DEFAULT_LOCK_DURATION)
    }

    /// Creates an empty broker whose deliveries stay locked for
    /// `lock_duration` unless renewed.
    #[must_use]
    pub fn with_lock_duration(lock_duration: Duration) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            arrivals: Notify::new(),
            lock_duration,
        }
    }

    /// Messages on `queue` that are not dead-lettered, locked ones included.
    pub fn len(&self, queue: &str) -> usize {
        self.inspect_queue(queue, |state| state.ready.len() + state.leased.len())
            .unwrap_or_default()
    }

    /// Whether `queue` holds no active messages.
    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Snapshot of the dead-lettered messages of `queue`.
    pub fn dead_lettered(&self, queue: &str) -> Vec<DeadLetteredMessage> {
        self.inspect_queue(queue, |state| state.dead_letters.clone())
            .unwrap_or_default()
    }

    /// Runs `f` on the state of `queue`, creating it on first use. Expired
    /// locks are reclaimed first.
    fn with_queue<T>(&self, queue: &str, f: impl FnOnce(&mut QueueState) -> T) -> T {
        let (result, reclaimed) = {
            let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
            let state = queues.entry(queue.to_owned()).or_default();
            let reclaimed = state.reclaim_expired(Instant::now());
            (f(state), reclaimed)
        };
        if reclaimed > 0 {
            self.arrivals.notify_waiters();
        }
        result
    }

    /// Like [`Self::with_queue`], but never creates state for an unknown
    /// queue.
    fn inspect_queue<T>(&self, queue: &str, f: impl FnOnce(&QueueState) -> T) -> Option<T> {
        let (result, reclaimed) = {
            let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
            let state = queues.get_mut(queue)?;
            let reclaimed = state.reclaim_expired(Instant::now());
            (f(&*state), reclaimed)
        };
        if reclaimed > 0 {
            self.arrivals.notify_waiters();
        }
        Some(result)
    }

    /// Leases up to `max_messages` ready messages. Also yields the earliest
    /// lock expiry, at which a waiting receiver should look again.
    fn lease_batch(
        &self,
        queue: &str,
        max_messages: usize,
    ) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let locked_until = now + self.lock_duration;

        self.with_queue(queue, |state| {
            let take = max_messages.min(state.ready.len());
            let mut batch = Vec::with_capacity(take);
            for mut stored in state.ready.drain(..take).collect::<Vec<_>>() {
                stored.delivery_count += 1;
                let lock_token = Uuid::new_v4();
                batch.push(ReceivedMessage {
                    message_id: stored.message.message_id.clone(),
                    correlation_id: stored.message.correlation_id.clone(),
                    content_type: stored.message.content_type.clone(),
                    subject: stored.message.subject.clone(),
                    body: stored.message.body.clone(),
                    lock_token,
                    delivery_count: stored.delivery_count,
                    enqueued_at: stored.enqueued_at,
                });
                state.leased.insert(
                    lock_token,
                    Lease {
                        stored,
                        locked_until,
                    },
                );
            }
            (batch, state.next_expiry())
        })
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn send(&self, queue: &str, message: QueueMessage) -> Result<(), TransportError> {
        self.with_queue(queue, |state| {
            state.ready.push_back(StoredMessage {
                message,
                delivery_count: 0,
                enqueued_at: Utc::now(),
            });
        });
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: usize,
        max_wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let deadline = Instant::now() + max_wait;

        loop {
            // Register interest before looking, so a send racing with the
            // check below still wakes us.
            let arrival = self.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let (batch, next_expiry) = self.lease_batch(queue, max_messages);
            if !batch.is_empty() || max_messages == 0 {
                return Ok(batch);
            }

            // A lock running out makes its message deliverable again.
            let wake_at = next_expiry.map_or(deadline, |expiry| expiry.min(deadline));
            if tokio::time::timeout_at(wake_at, arrival).await.is_err() && wake_at >= deadline {
                return Ok(Vec::new());
            }
        }
    }

    async fn complete(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        self.with_queue(queue, |state| {
            state.take_lease(lock_token).map(|_| ())
        })
    }

    async fn abandon(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        self.with_queue(queue, |state| {
            let lease = state.take_lease(lock_token)?;
            state.ready.push_front(lease.stored);
            Ok(())
        })?;
        self.arrivals.notify_waiters();
        Ok(())
    }

    async fn renew_lock(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        let now = Instant::now();
        let locked_until = now + self.lock_duration;

        self.with_queue(queue, |state| {
            let lease = state
                .leased
                .get_mut(&lock_token)
                .ok_or(TransportError::LockLost(lock_token))?;
            lease.locked_until = locked_until;
            Ok(())
        })
    }

    async fn dead_letter(
        &self,
        queue: &str,
        lock_token: Uuid,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.with_queue(queue, |state| {
            let lease = state.take_lease(lock_token)?;
            state.dead_letters.push(DeadLetteredMessage {
                message: lease.stored.message,
                delivery_count: lease.stored.delivery_count,
                reason: reason.to_owned(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const QUEUE: &str = "orders";
    const NO_WAIT: Duration = Duration::ZERO;

    fn message(id: &str) -> QueueMessage {
        QueueMessage {
            message_id: id.to_owned(),
            correlation_id: id.to_owned(),
            content_type: "application/json".to_owned(),
            subject: Some("orders.order_created".to_owned()),
            body: format!(r#"{{"id":"{id}"}}"#).into_bytes(),
        }
    }

    #[tokio::test]
    async fn test_receive_returns_sent_message_with_metadata() {
        let queue = InMemoryQueue::new();
        queue.send(QUEUE, message("m-1")).await.unwrap();

        let batch = queue.receive(QUEUE, 10, NO_WAIT).await.unwrap();

        assert_eq!(batch.len(), 1);
        let delivery = &batch[0];
        assert_eq!(delivery.message_id, "m-1");
        assert_eq!(delivery.correlation_id, "m-1");
        assert_eq!(delivery.content_type, "application/json");
        assert_eq!(delivery.subject.as_deref(), Some("orders.order_created"));
        assert_eq!(delivery.delivery_count, 1);
    }

    #[tokio::test]
    async fn test_receive_respects_max_messages() {
        let queue = InMemoryQueue::new();
        for i in 0..5 {
            queue.send(QUEUE, message(&format!("m-{i}"))).await.unwrap();
        }

        let first = queue.receive(QUEUE, 3, NO_WAIT).await.unwrap();
        let second = queue.receive(QUEUE, 3, NO_WAIT).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn test_locked_message_is_not_redelivered() {
        let queue = InMemoryQueue::new();
        queue.send(QUEUE, message("m-1")).await.unwrap();

        let first = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap();
        let second = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(queue.len(QUEUE), 1);
    }

    #[tokio::test]
    async fn test_queues_are_isolated_by_name() {
        let queue = InMemoryQueue::new();
        queue.send("a", message("m-1")).await.unwrap();

        assert!(queue.receive("b", 1, NO_WAIT).await.unwrap().is_empty());
        assert_eq!(queue.receive("a", 1, NO_WAIT).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_complete_removes_message() {
        let queue = InMemoryQueue::new();
        queue.send(QUEUE, message("m-1")).await.unwrap();
        let delivery = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap().remove(0);

        queue.complete(QUEUE, delivery.lock_token).await.unwrap();

        assert!(queue.is_empty(QUEUE));
    }

    #[tokio::test]
    async fn test_complete_twice_reports_lock_lost() {
        let queue = InMemoryQueue::new();
        queue.send(QUEUE, message("m-1")).await.unwrap();
        let delivery = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap().remove(0);
        queue.complete(QUEUE, delivery.lock_token).await.unwrap();

        let err = queue.complete(QUEUE, delivery.lock_token).await.unwrap_err();

        assert!(matches!(err, TransportError::LockLost(token) if token == delivery.lock_token));
    }

    #[tokio::test]
    async fn test_abandon_makes_message_immediately_redeliverable() {
        let queue = InMemoryQueue::new();
        queue.send(QUEUE, message("m-1")).await.unwrap();
        let first = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap().remove(0);

        queue.abandon(QUEUE, first.lock_token).await.unwrap();
        let second = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap().remove(0);

        assert_eq!(second.message_id, "m-1");
        assert_eq!(second.delivery_count, 2);
        assert_ne!(second.lock_token, first.lock_token);
    }

    #[tokio::test]
    async fn test_expired_lock_returns_message_to_queue() {
        let queue = InMemoryQueue::with_lock_duration(Duration::from_millis(20));
        queue.send(QUEUE, message("m-1")).await.unwrap();
        let first = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap().remove(0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap();

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].delivery_count, 2);
        let err = queue.complete(QUEUE, first.lock_token).await.unwrap_err();
        assert!(matches!(err, TransportError::LockLost(_)));
    }

    #[tokio::test]
    async fn test_waiting_receive_picks_up_message_when_lock_expires() {
        let queue = InMemoryQueue::with_lock_duration(Duration::from_millis(50));
        queue.send(QUEUE, message("m-1")).await.unwrap();
        queue.receive(QUEUE, 1, NO_WAIT).await.unwrap();
        let started = Instant::now();

        let redelivered = queue
            .receive(QUEUE, 1, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].delivery_count, 2);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_inspecting_unknown_queue_does_not_create_it() {
        let queue = InMemoryQueue::new();

        assert_eq!(queue.len("never-used"), 0);
        assert!(queue.is_empty("never-used"));
        assert!(queue.dead_lettered("never-used").is_empty());

        assert!(queue.queues.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_renew_lock_keeps_message_locked() {
        let queue = InMemoryQueue::with_lock_duration(Duration::from_millis(250));
        queue.send(QUEUE, message("m-1")).await.unwrap();
        let delivery = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap().remove(0);

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            queue.renew_lock(QUEUE, delivery.lock_token).await.unwrap();
        }

        assert!(queue.receive(QUEUE, 1, NO_WAIT).await.unwrap().is_empty());
        queue.complete(QUEUE, delivery.lock_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_renew_unknown_lock_reports_lock_lost() {
        let queue = InMemoryQueue::new();

        let err = queue.renew_lock(QUEUE, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, TransportError::LockLost(_)));
    }

    #[tokio::test]
    async fn test_dead_letter_moves_message_out_of_queue() {
        let queue = InMemoryQueue::new();
        queue.send(QUEUE, message("m-1")).await.unwrap();
        let delivery = queue.receive(QUEUE, 1, NO_WAIT).await.unwrap().remove(0);

        queue
            .dead_letter(QUEUE, delivery.lock_token, "poison")
            .await
            .unwrap();

        assert!(queue.is_empty(QUEUE));
        let dead = queue.dead_lettered(QUEUE);
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].message.message_id, "m-1");
        assert_eq!(dead[0].delivery_count, 1);
        assert_eq!(dead[0].reason, "poison");
    }

    #[tokio::test]
    async fn test_receive_returns_empty_batch_after_max_wait() {
        let queue = InMemoryQueue::new();

        let batch = queue
            .receive(QUEUE, 1, Duration::from_millis(20))
            .await
            .unwrap();

        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_waiting_receive_wakes_on_send() {
        let queue = Arc::new(InMemoryQueue::new());
        let receiver = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.receive(QUEUE, 1, Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.send(QUEUE, message("m-1")).await.unwrap();

        let batch = tokio::time::timeout(Duration::from_secs(1), receiver)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(batch.len(), 1);
    }
}
