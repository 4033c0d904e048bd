//! Error taxonomy shared by the producer, the worker and the broker adapters.

use thiserror::Error;
use uuid::Uuid;

/// A call against the message broker failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The broker could not be reached (connection refused, pool exhausted, ...).
    #[error("queue transport unreachable: {0}")]
    Unreachable(String),

    /// The broker answered but refused the operation.
    #[error("queue transport rejected the operation: {0}")]
    Rejected(String),

    /// The message lock expired or was never held, so the message can no
    /// longer be settled through this lock token.
    #[error("message lock {0} lost")]
    LockLost(Uuid),
}

/// A message handler failed. Always results in the message being abandoned
/// (or dead-lettered), never in the worker stopping.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The message body is not a valid event payload.
    #[error("malformed message payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The unit of work reported a failure.
    #[error("processing failed: {0}")]
    Processing(String),
}

/// Process configuration could not be read.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// An environment variable is set but cannot be parsed.
    #[error("{key} is invalid: {reason}")]
    Invalid {
        /// The offending variable.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
