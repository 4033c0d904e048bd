//! Queue connection settings shared by the API and the worker.

use orders_core::error::ConfigError;

/// Where to find the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Broker connection string (`memory://`, `postgres://...`).
    pub connection_string: String,
    /// Name of the queue carrying order events.
    pub queue_name: String,
}

impl QueueConfig {
    /// Queue name used when `QUEUE_NAME` is not set.
    pub const DEFAULT_QUEUE_NAME: &'static str = "orders";

    /// Reads `QUEUE_CONNECTION_STRING` and `QUEUE_NAME` from the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the connection string is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the connection string is not set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let connection_string = lookup("QUEUE_CONNECTION_STRING")
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::Missing("QUEUE_CONNECTION_STRING"))?;
        let queue_name = lookup("QUEUE_NAME")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_QUEUE_NAME.to_owned());

        Ok(Self {
            connection_string,
            queue_name,
        })
    }
}
