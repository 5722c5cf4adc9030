//! Worker configuration, read from the environment.

use std::str::FromStr;
use std::time::Duration;

use chronicle_pipeline::retry::RetryPolicy;

use crate::error::WorkerError;

/// Everything the worker needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Upper bound of the connection pool.
    pub max_connections: u32,
    /// Pending events read per outbox query.
    pub outbox_batch_size: usize,
    /// Pause between outbox drains.
    pub poll_interval: Duration,
    /// Publication attempts per event, including the first.
    pub publish_max_attempts: u32,
    /// Backoff before the second publication attempt.
    pub publish_backoff: Duration,
}

impl WorkerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Config` if `DATABASE_URL` is unset, a numeric
    /// variable does not parse, or the poll interval is zero.
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// # Errors
    ///
    /// See [`WorkerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WorkerError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                WorkerError::Config("DATABASE_URL environment variable must be set".into())
            })?;

        let poll_interval_ms: u64 = parse_or(&lookup, "OUTBOX_POLL_INTERVAL_MS", 1000)?;
        if poll_interval_ms == 0 {
            return Err(WorkerError::Config(
                "OUTBOX_POLL_INTERVAL_MS must be greater than zero".into(),
            ));
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            outbox_batch_size: parse_or(&lookup, "OUTBOX_BATCH_SIZE", 100)?,
            poll_interval: Duration::from_millis(poll_interval_ms),
            publish_max_attempts: parse_or(&lookup, "PUBLISH_MAX_ATTEMPTS", 3)?,
            publish_backoff: Duration::from_millis(parse_or(&lookup, "PUBLISH_BACKOFF_MS", 50)?),
        })
    }

    /// The retry policy for publications.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.publish_max_attempts, self.publish_backoff)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, WorkerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| WorkerError::Config(format!("{key} must be a valid number: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        // Arrange
        let env = lookup(&[("DATABASE_URL", "postgres://localhost/chronicle")]);

        // Act
        let config = WorkerConfig::from_lookup(env).unwrap();

        // Assert
        assert_eq!(config.database_url, "postgres://localhost/chronicle");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.outbox_batch_size, 100);
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(3, Duration::from_millis(50))
        );
    }

    #[test]
    fn test_overrides_are_parsed() {
        let env = lookup(&[
            ("DATABASE_URL", "postgres://db/chronicle"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("OUTBOX_BATCH_SIZE", "25"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("PUBLISH_MAX_ATTEMPTS", " 5 "),
            ("PUBLISH_BACKOFF_MS", "10"),
        ]);

        let config = WorkerConfig::from_lookup(env).unwrap();

        assert_eq!(config.max_connections, 4);
        assert_eq!(config.outbox_batch_size, 25);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.publish_max_attempts, 5);
        assert_eq!(config.publish_backoff, Duration::from_millis(10));
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = WorkerConfig::from_lookup(lookup(&[("OUTBOX_BATCH_SIZE", "25")]));

        match result {
            Err(WorkerError::Config(message)) => assert!(message.contains("DATABASE_URL")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_number_is_a_config_error() {
        let env = lookup(&[
            ("DATABASE_URL", "postgres://db/chronicle"),
            ("OUTBOX_POLL_INTERVAL_MS", "soon"),
        ]);

        let result = WorkerConfig::from_lookup(env);

        match result {
            Err(WorkerError::Config(message)) => {
                assert!(message.starts_with("OUTBOX_POLL_INTERVAL_MS"));
            }
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_poll_interval_is_a_config_error() {
        let env = lookup(&[
            ("DATABASE_URL", "postgres://db/chronicle"),
            ("OUTBOX_POLL_INTERVAL_MS", "0"),
        ]);

        let result = WorkerConfig::from_lookup(env);

        match result {
            Err(WorkerError::Config(message)) => {
                assert!(message.contains("greater than zero"));
            }
            other => panic!("expected Config, got {other:?}"),
        }
    }
}
