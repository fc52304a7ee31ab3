//! Application error types for catalog-sync
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use std::time::Duration;

use thiserror::Error;

/// Classified failure from the remote catalog API
///
/// Variants map one-to-one onto the transport-level conditions the retry
/// layer cares about, so retryability can be decided without string matching.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Request or attempt exceeded its deadline
    #[error("network timeout after {0:?}")]
    Timeout(Duration),

    /// Connection refused or reset by the remote host
    #[error("connection refused")]
    ConnectionRefused,

    /// Hostname could not be resolved
    #[error("DNS resolution failed: {0}")]
    Dns(String),

    /// Rate limited by upstream (HTTP 429)
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// HTTP error status from the remote server
    #[error("server error: HTTP {0}")]
    ServerError(u16),

    /// Response body could not be decoded
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Resource does not exist upstream
    #[error("resource not found")]
    NotFound,

    /// Credentials rejected by upstream
    #[error("unauthorized")]
    Unauthorized,

    /// Any other network-level failure
    #[error("network error: {0}")]
    Network(String),
}

/// Marker error produced when a single attempt exceeds its per-attempt deadline
///
/// The retry layer converts this into the operation's own error type via
/// `From`, so the regular classifier decides what happens next.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
#[error("attempt timed out after {0:?}")]
pub struct AttemptTimeout(pub Duration);

impl From<AttemptTimeout> for SyncError {
    fn from(t: AttemptTimeout) -> Self {
        SyncError::Timeout(t.0)
    }
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;
}

impl RetryableError for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            // Retryable errors
            SyncError::Timeout(_) => true,
            SyncError::ConnectionRefused => true,
            SyncError::Dns(_) => true,
            SyncError::RateLimited(_) => true,
            SyncError::ServerError(code) if *code >= 500 => true,
            SyncError::Network(_) => true,

            // Non-retryable errors
            SyncError::InvalidData(_) => false,
            SyncError::NotFound => false,
            SyncError::Unauthorized => false,
            SyncError::ServerError(_) => false, // 4xx errors
        }
    }
}

/// Terminal outcome of the resilient execution stack
///
/// Transient failures never escape the executor; callers only ever see one of
/// these three shapes.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResilienceError<E>
where
    E: std::fmt::Debug + std::fmt::Display,
{
    /// All attempts failed; carries the attempt count and the last error
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        /// Total number of invocations made
        attempts: u32,
        /// The error from the final attempt
        last_error: E,
    },

    /// Call rejected without being attempted; carries the earliest retry time
    #[error("circuit open, retry after {retry_after:?}")]
    CircuitOpen {
        /// Instant after which the breaker will allow a probe call
        retry_after: tokio::time::Instant,
    },

    /// Non-retryable failure, surfaced as-is
    #[error("{0}")]
    Permanent(E),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Asynchronous SQLite driver error
    #[error("database error: {0}")]
    Async(#[from] tokio_rusqlite::Error),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Constraint violation
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config file: {0}")]
    FileRead(String),

    /// Config content could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Config value failed validation
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fatal pipeline errors
///
/// Per-item and per-page failures are absorbed into the run statistics; only
/// these conditions abort a sync run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The starting page could not be fetched, so the page count is unknown
    #[error("failed to bootstrap pagination: {0}")]
    Bootstrap(ResilienceError<SyncError>),

    /// Storage failed outside the per-item fan-out (e.g. reset, status update)
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

/// Application-level error type
///
/// Aggregates all domain-specific error types for the binary's top level.
#[derive(Debug, Error)]
pub enum AppError {
    /// Remote sync error
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline error
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test 1: SyncError message formatting
    #[test]
    fn test_sync_error_messages() {
        assert_eq!(
            SyncError::Timeout(Duration::from_secs(30)).to_string(),
            "network timeout after 30s"
        );
        assert_eq!(
            SyncError::RateLimited(60).to_string(),
            "rate limited, retry after 60 seconds"
        );
        assert_eq!(
            SyncError::ServerError(503).to_string(),
            "server error: HTTP 503"
        );
        assert_eq!(
            SyncError::InvalidData("bad json".to_string()).to_string(),
            "invalid data: bad json"
        );
    }

    // Test 2: RetryableError classification table
    #[test]
    fn test_sync_error_retryable() {
        // Retryable errors
        assert!(SyncError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(SyncError::ConnectionRefused.is_retryable());
        assert!(SyncError::Dns("no such host".to_string()).is_retryable());
        assert!(SyncError::RateLimited(30).is_retryable());
        assert!(SyncError::ServerError(500).is_retryable());
        assert!(SyncError::ServerError(503).is_retryable());
        assert!(SyncError::Network("connection reset".to_string()).is_retryable());

        // Non-retryable errors
        assert!(!SyncError::InvalidData("bad format".to_string()).is_retryable());
        assert!(!SyncError::NotFound.is_retryable());
        assert!(!SyncError::Unauthorized.is_retryable());
        assert!(!SyncError::ServerError(404).is_retryable()); // 4xx
        assert!(!SyncError::ServerError(422).is_retryable());
    }

    // Test 3: AttemptTimeout converts into a retryable SyncError
    #[test]
    fn test_attempt_timeout_conversion() {
        let err: SyncError = AttemptTimeout(Duration::from_millis(250)).into();
        assert_eq!(err, SyncError::Timeout(Duration::from_millis(250)));
        assert!(err.is_retryable());
    }

    // Test 4: ResilienceError messages
    #[test]
    fn test_resilience_error_messages() {
        let err: ResilienceError<SyncError> = ResilienceError::RetryExhausted {
            attempts: 4,
            last_error: SyncError::ServerError(502),
        };
        assert_eq!(
            err.to_string(),
            "retries exhausted after 4 attempts: server error: HTTP 502"
        );

        let err: ResilienceError<SyncError> = ResilienceError::Permanent(SyncError::NotFound);
        assert_eq!(err.to_string(), "resource not found");
    }

    // Test 5: From trait conversions for AppError
    #[test]
    fn test_app_error_from_sync_error() {
        let sync_err = SyncError::ConnectionRefused;
        let app_err: AppError = sync_err.into();

        match app_err {
            AppError::Sync(SyncError::ConnectionRefused) => (),
            _ => panic!("Expected AppError::Sync(SyncError::ConnectionRefused)"),
        }
    }

    // Test 6: DbError from rusqlite::Error
    #[test]
    fn test_db_error_from_sqlite() {
        let sqlite_err = rusqlite::Error::InvalidParameterName("test".to_string());
        let db_err: DbError = sqlite_err.into();

        match db_err {
            DbError::Sqlite(_) => (),
            _ => panic!("Expected DbError::Sqlite"),
        }
    }

    // Test 7: PipelineError display includes the terminal resilience error
    #[test]
    fn test_pipeline_error_display() {
        let err = PipelineError::Bootstrap(ResilienceError::RetryExhausted {
            attempts: 3,
            last_error: SyncError::Timeout(Duration::from_secs(10)),
        });
        assert_eq!(
            err.to_string(),
            "failed to bootstrap pagination: retries exhausted after 3 attempts: network timeout after 10s"
        );
    }

    // Test 8: ConfigError messages
    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::FileRead("missing".to_string()).to_string(),
            "failed to read config file: missing"
        );
        assert_eq!(
            ConfigError::Parse("bad yaml".to_string()).to_string(),
            "failed to parse config: bad yaml"
        );
    }

    // Test 9: SyncError Clone and PartialEq
    #[test]
    fn test_sync_error_clone_and_eq() {
        let err1 = SyncError::RateLimited(30);
        let err2 = err1.clone();
        assert_eq!(err1, err2);
        assert_ne!(err1, SyncError::RateLimited(60));
    }
}
