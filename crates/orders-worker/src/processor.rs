//! Message processor: a dispatcher task feeding a bounded worker pool.
//!
//! The dispatcher only asks the broker for as many messages as there are idle
//! workers, so a received message never waits in a buffer while its lock
//! runs down. Each in-flight message gets its own lock renewal task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use orders_core::error::HandlerError;
use orders_core::message::ReceivedMessage;
use orders_core::queue::MessageQueue;
use orders_runtime::shutdown::ShutdownListener;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::handler::MessageHandler;

/// Tuning knobs for a [`MessageProcessor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorOptions {
    /// Upper bound on messages being handled at the same time.
    pub max_concurrent_calls: usize,
    /// How long after receipt the processor keeps renewing a message lock.
    pub max_auto_lock_renewal: Duration,
    /// Time between two lock renewals of the same message.
    pub lock_renewal_interval: Duration,
    /// How long one receive call may wait for messages.
    pub receive_wait: Duration,
    /// Pause after a failed receive before trying again.
    pub error_backoff: Duration,
    /// Deliveries after which a failing message is dead-lettered instead of
    /// abandoned. `None` abandons forever.
    pub max_delivery_count: Option<u32>,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_concurrent_calls: 5,
            max_auto_lock_renewal: Duration::from_secs(5 * 60),
            lock_renewal_interval: Duration::from_secs(20),
            receive_wait: Duration::from_secs(5),
            error_backoff: Duration::from_secs(1),
            max_delivery_count: Some(10),
        }
    }
}

impl ProcessorOptions {
    /// Whether a failed delivery with `delivery_count` has used up its budget.
    #[must_use]
    pub fn should_dead_letter(&self, delivery_count: u32) -> bool {
        self.max_delivery_count
            .is_some_and(|max| delivery_count >= max)
    }
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Handled successfully and removed from the queue.
    Completed,
    /// Handler failed; returned to the queue for redelivery.
    Abandoned,
    /// Handler failed on its last allowed delivery; moved out of the queue.
    DeadLettered,
}

/// Totals reported when a processor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Messages completed.
    pub completed: u64,
    /// Messages abandoned.
    pub abandoned: u64,
    /// Messages dead-lettered.
    pub dead_lettered: u64,
    /// Settle calls the broker refused; those messages return once their
    /// lock expires.
    pub settle_failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    abandoned: AtomicU64,
    dead_lettered: AtomicU64,
    settle_failures: AtomicU64,
}

impl Counters {
    fn record(&self, settlement: Settlement) {
        let counter = match settlement {
            Settlement::Completed => &self.completed,
            Settlement::Abandoned => &self.abandoned,
            Settlement::DeadLettered => &self.dead_lettered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ProcessorStats {
        ProcessorStats {
            completed: self.completed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            settle_failures: self.settle_failures.load(Ordering::Relaxed),
        }
    }
}

/// A received message travelling to a worker together with its pool slot.
struct Delivery {
    message: ReceivedMessage,
    _slot: OwnedSemaphorePermit,
}

/// State shared by the dispatcher and every worker.
struct PoolContext {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
    options: ProcessorOptions,
    handler: Arc<dyn MessageHandler>,
    counters: Counters,
}

/// Consumes one queue with bounded concurrency until shut down.
pub struct MessageProcessor {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
    options: ProcessorOptions,
    handler: Arc<dyn MessageHandler>,
}

impl std::fmt::Debug for MessageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageProcessor")
            .field("queue_name", &self.queue_name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl MessageProcessor {
    /// Creates a processor for `queue_name`.
    #[must_use]
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        queue_name: impl Into<String>,
        options: ProcessorOptions,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            options,
            handler,
        }
    }

    /// Processes messages until `shutdown` fires, then stops receiving, lets
    /// in-flight messages finish and settle, and returns the totals.
    pub async fn run(self, mut shutdown: ShutdownListener) -> ProcessorStats {
        let pool_size = self.options.max_concurrent_calls.max(1);
        let context = Arc::new(PoolContext {
            queue: self.queue,
            queue_name: self.queue_name,
            options: self.options,
            handler: self.handler,
            counters: Counters::default(),
        });

        let slots = Arc::new(Semaphore::new(pool_size));
        let (tx, rx) = mpsc::channel::<Delivery>(pool_size);
        let rx = Arc::new(Mutex::new(rx));

        let workers: Vec<JoinHandle<()>> = (0..pool_size)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&rx),
                    Arc::clone(&context),
                ))
            })
            .collect();

        info!(
            queue = %context.queue_name,
            max_concurrent_calls = pool_size,
            "message processor started"
        );

        dispatch(&context, &slots, &tx, &mut shutdown).await;

        info!(queue = %context.queue_name, "draining in-flight messages");
        drop(tx);
        for worker in workers {
            if let Err(err) = worker.await {
                error!(error = %err, "worker task failed");
            }
        }

        let stats = context.counters.snapshot();
        info!(
            queue = %context.queue_name,
            completed = stats.completed,
            abandoned = stats.abandoned,
            dead_lettered = stats.dead_lettered,
            settle_failures = stats.settle_failures,
            "message processor stopped"
        );
        stats
    }
}

/// Receives messages while there is free capacity, until shutdown.
async fn dispatch(
    context: &PoolContext,
    slots: &Arc<Semaphore>,
    tx: &mpsc::Sender<Delivery>,
    shutdown: &mut ShutdownListener,
) {
    loop {
        let first = tokio::select! {
            biased;
            () = shutdown.cancelled() => return,
            permit = Arc::clone(slots).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };
        let mut permits = vec![first];
        while let Ok(permit) = Arc::clone(slots).try_acquire_owned() {
            permits.push(permit);
        }

        let received = tokio::select! {
            biased;
            () = shutdown.cancelled() => return,
            received = context.queue.receive(
                &context.queue_name,
                permits.len(),
                context.options.receive_wait,
            ) => received,
        };

        match received {
            Ok(messages) => {
                // Unused permits are released when `permits` runs out.
                for (message, slot) in messages.into_iter().zip(permits) {
                    debug!(
                        message_id = %message.message_id,
                        delivery_count = message.delivery_count,
                        "message received"
                    );
                    if tx.send(Delivery { message, _slot: slot }).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                error!(queue = %context.queue_name, error = %err, "failed to receive messages");
                drop(permits);
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => return,
                    () = tokio::time::sleep(context.options.error_backoff) => {}
                }
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Delivery>>>,
    context: Arc<PoolContext>,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some(Delivery { message, _slot }) = next else {
            break;
        };

        let span = info_span!(
            "message",
            worker_id,
            message_id = %message.message_id,
            correlation_id = %message.correlation_id,
            delivery_count = message.delivery_count,
        );
        process(&context, message).instrument(span).await;
    }
    debug!(worker_id, "worker stopped");
}

/// Handles one message under lock renewal and settles it.
async fn process(context: &Arc<PoolContext>, message: ReceivedMessage) {
    let renewal = tokio::spawn(
        renew_lock(
            Arc::clone(&context.queue),
            context.queue_name.clone(),
            message.lock_token,
            context.options.lock_renewal_interval,
            context.options.max_auto_lock_renewal,
        )
        .in_current_span(),
    );

    let outcome = run_handler(Arc::clone(&context.handler), message.clone()).await;
    renewal.abort();

    match outcome {
        Ok(()) => complete(context, &message).await,
        Err(err) => {
            error!(error = %err, "error processing message");
            fail(context, &message, &err).await
        }
    }
}

/// Runs the handler on its own task so that a panic is contained to the one
/// message.
async fn run_handler(
    handler: Arc<dyn MessageHandler>,
    message: ReceivedMessage,
) -> Result<(), HandlerError> {
    let task = tokio::spawn(async move { handler.handle(&message).await }.in_current_span());
    match task.await {
        Ok(outcome) => outcome,
        Err(err) => Err(HandlerError::Processing(format!("handler panicked: {err}"))),
    }
}

async fn complete(context: &PoolContext, message: &ReceivedMessage) {
    match context
        .queue
        .complete(&context.queue_name, message.lock_token)
        .await
    {
        Ok(()) => {
            info!("message completed");
            context.counters.record(Settlement::Completed);
        }
        Err(err) => {
            error!(error = %err, "failed to complete message");
            context.counters.settle_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

async fn fail(
    context: &PoolContext,
    message: &ReceivedMessage,
    cause: &HandlerError,
) {
    let (settlement, result) = if context.options.should_dead_letter(message.delivery_count) {
        let reason = cause.to_string();
        (
            Settlement::DeadLettered,
            context
                .queue
                .dead_letter(&context.queue_name, message.lock_token, &reason)
                .await,
        )
    } else {
        (
            Settlement::Abandoned,
            context
                .queue
                .abandon(&context.queue_name, message.lock_token)
                .await,
        )
    };

    match result {
        Ok(()) => {
            warn!(settlement = ?settlement, "message not completed");
            context.counters.record(settlement);
        }
        Err(err) => {
            error!(error = %err, settlement = ?settlement, "failed to settle message");
            context.counters.settle_failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Renews the lock every `interval` until `window` has passed since the
/// call, or a renewal fails.
async fn renew_lock(
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
    lock_token: Uuid,
    interval: Duration,
    window: Duration,
) {
    let deadline = Instant::now() + window;
    loop {
        let next = Instant::now() + interval;
        if next > deadline {
            debug!("lock renewal window exhausted");
            return;
        }
        tokio::time::sleep_until(next).await;

        if let Err(err) = queue.renew_lock(&queue_name, lock_token).await {
            warn!(error = %err, "failed to renew message lock");
            return;
        }
        debug!("message lock renewed");
    }
}
