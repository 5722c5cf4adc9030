//! Chronicle worker error types.

use chronicle_core::error::DomainError;
use thiserror::Error;

/// Startup and runtime errors for the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The pipeline reported an error it could not contain.
    #[error("pipeline error: {0}")]
    Domain(#[from] DomainError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = WorkerError::Config("DATABASE_URL environment variable must be set".into());

        assert_eq!(
            err.to_string(),
            "configuration error: DATABASE_URL environment variable must be set"
        );
    }

    #[test]
    fn test_domain_error_converts() {
        let err: WorkerError = DomainError::Infrastructure("connection refused".into()).into();

        assert!(matches!(err, WorkerError::Domain(_)));
        assert_eq!(
            err.to_string(),
            "pipeline error: infrastructure error: connection refused"
        );
    }
}
