//! `PostgreSQL` implementation of the `MessageQueue` trait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio::time::Instant;
use uuid::Uuid;

use orders_core::error::TransportError;
use orders_core::message::{QueueMessage, ReceivedMessage};
use orders_core::queue::MessageQueue;

use crate::schema::CREATE_QUEUE_TABLE;

/// How often an idle `receive` looks for new rows.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const SEND_SQL: &str = r"
INSERT INTO queue_messages (queue_name, message_id, correlation_id, content_type, subject, body)
VALUES ($1, $2, $3, $4, $5, $6)
";

const RECEIVE_SQL: &str = r"
UPDATE queue_messages
SET lock_token = gen_random_uuid(),
    locked_until = NOW() + make_interval(secs => $3),
    delivery_count = delivery_count + 1
WHERE id IN (
    SELECT id FROM queue_messages
    WHERE queue_name = $1
      AND dead_lettered_at IS NULL
      AND (locked_until IS NULL OR locked_until < NOW())
    ORDER BY id
    LIMIT $2
    FOR UPDATE SKIP LOCKED
)
RETURNING message_id, correlation_id, content_type, subject, body,
          lock_token, delivery_count, enqueued_at
";

const COMPLETE_SQL: &str = r"
DELETE FROM queue_messages
WHERE queue_name = $1 AND lock_token = $2 AND locked_until >= NOW()
";

const ABANDON_SQL: &str = r"
UPDATE queue_messages
SET lock_token = NULL, locked_until = NULL
WHERE queue_name = $1 AND lock_token = $2 AND locked_until >= NOW()
";

const RENEW_SQL: &str = r"
UPDATE queue_messages
SET locked_until = NOW() + make_interval(secs => $3)
WHERE queue_name = $1 AND lock_token = $2 AND locked_until >= NOW()
";

const DEAD_LETTER_SQL: &str = r"
UPDATE queue_messages
SET lock_token = NULL, locked_until = NULL,
    dead_lettered_at = NOW(), dead_letter_reason = $3
WHERE queue_name = $1 AND lock_token = $2 AND locked_until >= NOW()
";

/// PostgreSQL-backed message broker.
///
/// Receivers claim rows with `FOR UPDATE SKIP LOCKED`, so any number of
/// worker processes can share a queue.
#[derive(Debug, Clone)]
pub struct PgQueue {
    pool: PgPool,
    lock_duration: Duration,
}

impl PgQueue {
    /// Lock duration used by [`PgQueue::new`].
    pub const DEFAULT_LOCK_DURATION: Duration = Duration::from_secs(60);

    /// Creates a new `PgQueue`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_duration: Self::DEFAULT_LOCK_DURATION,
        }
    }

    /// Overrides how long a delivery stays locked without renewal.
    #[must_use]
    pub fn with_lock_duration(mut self, lock_duration: Duration) -> Self {
        self.lock_duration = lock_duration;
        self
    }

    /// Creates the message table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the DDL cannot be executed.
    pub async fn ensure_schema(&self) -> Result<(), TransportError> {
        sqlx::raw_sql(CREATE_QUEUE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(transport_error)?;
        Ok(())
    }

    async fn claim(
        &self,
        queue: &str,
        max_messages: usize,
    ) -> Result<Vec<ReceivedMessage>, TransportError> {
        let limit = i64::try_from(max_messages).unwrap_or(i64::MAX);
        let rows = sqlx::query(RECEIVE_SQL)
            .bind(queue)
            .bind(limit)
            .bind(self.lock_duration.as_secs_f64())
            .fetch_all(&self.pool)
            .await
            .map_err(transport_error)?;

        rows.iter().map(to_received_message).collect()
    }

    /// Runs a settlement statement and maps "no row touched" to `LockLost`.
    async fn settle(
        &self,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
        lock_token: Uuid,
    ) -> Result<(), TransportError> {
        let result = query.execute(&self.pool).await.map_err(transport_error)?;
        if result.rows_affected() == 0 {
            return Err(TransportError::LockLost(lock_token));
        }
        Ok(())
    }
}

fn transport_error(err: sqlx::Error) -> TransportError {
    match err {
        sqlx::Error::Database(db_err) => TransportError::Rejected(db_err.to_string()),
        other => TransportError::Unreachable(other.to_string()),
    }
}

fn to_received_message(row: &PgRow) -> Result<ReceivedMessage, TransportError> {
    let delivery_count: i32 = row.try_get("delivery_count").map_err(transport_error)?;
    let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at").map_err(transport_error)?;

    Ok(ReceivedMessage {
        message_id: row.try_get("message_id").map_err(transport_error)?,
        correlation_id: row.try_get("correlation_id").map_err(transport_error)?,
        content_type: row.try_get("content_type").map_err(transport_error)?,
        subject: row.try_get("subject").map_err(transport_error)?,
        body: row.try_get("body").map_err(transport_error)?,
        lock_token: row.try_get("lock_token").map_err(transport_error)?,
        delivery_count: u32::try_from(delivery_count).unwrap_or_default(),
        enqueued_at,
    })
}

#[async_trait]
impl MessageQueue for PgQueue {
    async fn send(&self, queue: &str, message: QueueMessage) -> Result<(), TransportError> {
        sqlx::query(SEND_SQL)
            .bind(queue)
            .bind(&message.message_id)
            .bind(&message.correlation_id)
            .bind(&message.content_type)
            .bind(&message.subject)
            .bind(&message.body)
            .execute(&self.pool)
            .await
            .map_err(transport_error)?;
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
            let batch = self.claim(queue, max_messages).await?;
            let now = Instant::now();
            if !batch.is_empty() || max_messages == 0 || now >= deadline {
                return Ok(batch);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn complete(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        self.settle(
            sqlx::query(COMPLETE_SQL).bind(queue).bind(lock_token),
            lock_token,
        )
        .await
    }

    async fn abandon(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        self.settle(
            sqlx::query(ABANDON_SQL).bind(queue).bind(lock_token),
            lock_token,
        )
        .await
    }

    async fn renew_lock(&self, queue: &str, lock_token: Uuid) -> Result<(), TransportError> {
        self.settle(
            sqlx::query(RENEW_SQL)
                .bind(queue)
                .bind(lock_token)
                .bind(self.lock_duration.as_secs_f64()),
            lock_token,
        )
        .await
    }

    async fn dead_letter(
        &self,
        queue: &str,
        lock_token: Uuid,
        reason: &str,
    ) -> Result<(), TransportError> {
        self.settle(
            sqlx::query(DEAD_LETTER_SQL)
                .bind(queue)
                .bind(lock_token)
                .bind(reason),
            lock_token,
        )
        .await
    }
}
