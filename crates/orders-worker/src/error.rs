//! Worker startup errors.

use orders_core::error::{ConfigError, TransportError};
use orders_runtime::telemetry::TelemetryError;
use thiserror::Error;

/// Errors that prevent the worker from starting. Once the processor runs,
/// nothing is fatal.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The queue could not be reached.
    #[error("queue error: {0}")]
    Transport(#[from] TransportError),

    /// Tracing could not be initialised.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
}
