//! API server configuration, read from the environment.

use orders_core::error::ConfigError;
use orders_queue::QueueConfig;

/// Everything the API binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Queue orders are published to.
    pub queue: QueueConfig,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl ApiConfig {
    /// Host used when `HOST` is not set.
    pub const DEFAULT_HOST: &'static str = "0.0.0.0";
    /// Port used when `PORT` is not set.
    pub const DEFAULT_PORT: u16 = 3000;

    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the queue connection string is missing or
    /// `PORT` is not a valid port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the queue connection string is missing or
    /// `PORT` is not a valid port number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let queue = QueueConfig::from_lookup(&lookup)?;
        let host = lookup("HOST")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_HOST.to_owned());
        let port = match lookup("PORT") {
            Some(raw) if !raw.trim().is_empty() => {
                raw.trim().parse().map_err(|e| ConfigError::Invalid {
                    key: "PORT",
                    reason: format!("must be a valid u16: {e}"),
                })?
            }
            _ => Self::DEFAULT_PORT,
        };

        Ok(Self { queue, host, port })
    }
}
