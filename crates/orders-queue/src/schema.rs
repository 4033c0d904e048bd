//! PostgreSQL queue schema.

/// SQL to create the message table. Kept in step with `migrations/`.
pub const CREATE_QUEUE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS queue_messages (
    id                 BIGSERIAL PRIMARY KEY,
    queue_name         VARCHAR(255) NOT NULL,
    message_id         VARCHAR(255) NOT NULL,
    correlation_id     VARCHAR(255) NOT NULL,
    content_type       VARCHAR(255) NOT NULL,
    subject            VARCHAR(255),
    body               BYTEA NOT NULL,
    delivery_count     INTEGER NOT NULL DEFAULT 0,
    enqueued_at        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    lock_token         UUID,
    locked_until       TIMESTAMPTZ,
    dead_lettered_at   TIMESTAMPTZ,
    dead_letter_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_queue_messages_ready
    ON queue_messages (queue_name, id)
    WHERE dead_lettered_at IS NULL;

CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_messages_lock_token
    ON queue_messages (lock_token)
    WHERE lock_token IS NOT NULL;
";
