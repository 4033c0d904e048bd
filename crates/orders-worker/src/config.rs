//! Worker configuration, read from the environment.

use std::time::Duration;

use orders_core::error::ConfigError;
use orders_queue::QueueConfig;

use crate::processor::ProcessorOptions;

const DEFAULT_WORK_DELAY_MS: u64 = 1_000;

/// Everything the worker binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Queue to consume.
    pub queue: QueueConfig,
    /// Processor tuning.
    pub processor: ProcessorOptions,
    /// Simulated processing time per order.
    pub work_delay: Duration,
}

impl WorkerConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// Recognised keys: `QUEUE_CONNECTION_STRING`, `QUEUE_NAME`,
    /// `MAX_CONCURRENT_CALLS`, `MAX_AUTO_LOCK_RENEWAL_SECS`,
    /// `LOCK_RENEWAL_INTERVAL_SECS`, `MAX_DELIVERY_COUNT` (0 disables
    /// dead-lettering) and `WORK_DELAY_MS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let queue = QueueConfig::from_lookup(&lookup)?;
        let defaults = ProcessorOptions::default();

        let max_concurrent_calls =
            parse_or(&lookup, "MAX_CONCURRENT_CALLS", defaults.max_concurrent_calls)?;
        if max_concurrent_calls == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_CONCURRENT_CALLS",
                reason: "must be at least 1".into(),
            });
        }

        let max_auto_lock_renewal = Duration::from_secs(parse_or(
            &lookup,
            "MAX_AUTO_LOCK_RENEWAL_SECS",
            defaults.max_auto_lock_renewal.as_secs(),
        )?);

        let lock_renewal_interval = Duration::from_secs(parse_or(
            &lookup,
            "LOCK_RENEWAL_INTERVAL_SECS",
            defaults.lock_renewal_interval.as_secs(),
        )?);
        if lock_renewal_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "LOCK_RENEWAL_INTERVAL_SECS",
                reason: "must be at least 1".into(),
            });
        }

        let max_delivery_count = match parse_or(
            &lookup,
            "MAX_DELIVERY_COUNT",
            defaults.max_delivery_count.unwrap_or(0),
        )? {
            0 => None,
            count => Some(count),
        };

        let work_delay =
            Duration::from_millis(parse_or(&lookup, "WORK_DELAY_MS", DEFAULT_WORK_DELAY_MS)?);

        Ok(Self {
            queue,
            processor: ProcessorOptions {
                max_concurrent_calls,
                max_auto_lock_renewal,
                lock_renewal_interval,
                max_delivery_count,
                ..defaults
            },
            work_delay,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
