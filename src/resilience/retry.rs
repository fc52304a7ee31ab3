//! Retry executor for handling transient failures with exponential backoff
//!
//! Each attempt is raced against the configured per-attempt deadline; a timed
//! out attempt is classified like any other failure. Only exhaustion or a
//! non-retryable error escapes to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{AttemptTimeout, ResilienceError, RetryableError};
use crate::resilience::backoff::Backoff;

/// Custom retryability decision, also given the 0-based attempt index
pub type RetryPredicate<E> = Arc<dyn Fn(&E, u32) -> bool + Send + Sync>;

/// Observer invoked with `(error, next_attempt_number, delay)` before each sleep
pub type RetryObserver<E> = Arc<dyn Fn(&E, u32, Duration) + Send + Sync>;

/// Retry executor with exponential backoff support
pub struct RetryManager<E> {
    config: RetryConfig,
    backoff: Backoff,
    predicate: Option<RetryPredicate<E>>,
    on_retry: Option<RetryObserver<E>>,
}

impl<E> Clone for RetryManager<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            backoff: self.backoff.clone(),
            predicate: self.predicate.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> RetryManager<E> {
    /// Create a new RetryManager with the given configuration
    pub fn new(config: RetryConfig) -> Self {
        let backoff = Backoff::from_config(&config);
        Self {
            config,
            backoff,
            predicate: None,
            on_retry: None,
        }
    }

    /// Create a RetryManager with default configuration
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Override the default classifier with a custom predicate
    ///
    /// The predicate also receives the 0-based attempt index, so callers can
    /// cap retries differently per error kind.
    pub fn with_predicate(mut self, predicate: impl Fn(&E, u32) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// Register an observer invoked before every retry sleep
    pub fn with_observer(mut self, observer: impl Fn(&E, u32, Duration) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Get the retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an async operation with retry logic
    ///
    /// The operation is retried up to `max_retries` times for retryable
    /// failures, waiting an exponentially increasing, jittered delay between
    /// attempts. A per-attempt timeout (when configured) converts a slow
    /// attempt into a retryable timeout error.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + From<AttemptTimeout> + std::fmt::Debug + std::fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            let outcome = match self.config.attempt_timeout() {
                Some(limit) => match tokio::time::timeout(limit, operation()).await {
                    Ok(result) => result,
                    // The loser future is dropped; in-flight I/O teardown is
                    // best effort and may lag the deadline.
                    Err(_) => Err(E::from(AttemptTimeout(limit))),
                },
                None => operation().await,
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retryable = match &self.predicate {
                Some(predicate) => predicate(&err, attempt),
                None => err.is_retryable(),
            };

            if !retryable {
                debug!(attempt = attempt + 1, error = %err, "Non-retryable error");
                return Err(ResilienceError::Permanent(err));
            }

            if attempt >= self.config.max_retries {
                warn!(
                    attempts = attempt + 1,
                    max_retries = self.config.max_retries,
                    error = %err,
                    "Max retries exhausted"
                );
                return Err(ResilienceError::RetryExhausted {
                    attempts: attempt + 1,
                    last_error: err,
                });
            }

            let delay = self.backoff.delay_for(attempt, &mut rand::thread_rng());
            debug!(
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                backoff_ms = delay.as_millis(),
                error = %err,
                "Retrying after transient error"
            );

            if let Some(observer) = &self.on_retry {
                observer(&err, attempt + 1, delay);
            }

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
