//! Resilient executor composing retry, circuit breaking, and fallback
//!
//! Composition order, outermost to innermost:
//! fallback ∘ circuit breaker ∘ retry ∘ per-attempt timeout ∘ operation.
//! The breaker gates whether the retry loop runs at all; when it is open no
//! network call happens and degraded resolution starts immediately.

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::error::{AttemptTimeout, ResilienceError, RetryableError};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::fallback::FallbackCache;
use crate::resilience::retry::RetryManager;

/// Fallback function given the terminal error, may produce a substitute value
pub type FallbackFn<T, E> = Arc<dyn Fn(&ResilienceError<E>) -> Option<T> + Send + Sync>;

/// One dependency's resilient call path
///
/// Construct one executor per downstream dependency; the breaker and cache it
/// holds are that dependency's shared health state.
pub struct ResilientExecutor<T, E>
where
    E: std::fmt::Debug + std::fmt::Display,
{
    retry: RetryManager<E>,
    breaker: Arc<CircuitBreaker>,
    cache: Arc<FallbackCache<T>>,
    fallback_value: Option<T>,
    fallback_fn: Option<FallbackFn<T, E>>,
}

impl<T, E> ResilientExecutor<T, E>
where
    T: Clone,
    E: RetryableError + From<AttemptTimeout> + std::fmt::Debug + std::fmt::Display,
{
    /// Create an executor from its three layers
    pub fn new(
        retry: RetryManager<E>,
        breaker: Arc<CircuitBreaker>,
        cache: Arc<FallbackCache<T>>,
    ) -> Self {
        Self {
            retry,
            breaker,
            cache,
            fallback_value: None,
            fallback_fn: None,
        }
    }

    /// Set a static value served when every other resolution step fails
    pub fn with_fallback_value(mut self, value: T) -> Self {
        self.fallback_value = Some(value);
        self
    }

    /// Set a fallback function consulted with the terminal error
    pub fn with_fallback_fn(
        mut self,
        fallback: impl Fn(&ResilienceError<E>) -> Option<T> + Send + Sync + 'static,
    ) -> Self {
        self.fallback_fn = Some(Arc::new(fallback));
        self
    }

    /// The circuit breaker shared by this executor
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Execute an operation under the full resilience stack
    ///
    /// On success the result is cached under `cache_key` for degraded serving
    /// later. On a terminal failure, resolution order is: fresh cache entry,
    /// fallback function, static fallback value, then the error itself.
    pub async fn execute<F, Fut>(
        &self,
        cache_key: &str,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(open) = self.breaker.try_acquire() {
            let terminal = ResilienceError::CircuitOpen {
                retry_after: open.retry_after,
            };
            return self.degrade(cache_key, terminal);
        }

        match self.retry.execute(operation).await {
            Ok(value) => {
                self.breaker.record_success();
                self.cache.set(cache_key, value.clone());
                Ok(value)
            }
            Err(terminal) => {
                // Exhausted retries are a dependency-health signal; a
                // non-retryable answer is not, the dependency did respond.
                if matches!(terminal, ResilienceError::RetryExhausted { .. }) {
                    self.breaker.record_failure();
                }
                self.degrade(cache_key, terminal)
            }
        }
    }

    fn degrade(&self, cache_key: &str, terminal: ResilienceError<E>) -> Result<T, ResilienceError<E>> {
        if let Some(value) = self.cache.get(cache_key) {
            warn!(key = cache_key, error = %terminal, "Serving stale fallback value");
            return Ok(value);
        }
        if let Some(fallback) = &self.fallback_fn {
            if let Some(value) = fallback(&terminal) {
                warn!(key = cache_key, error = %terminal, "Serving computed fallback value");
                return Ok(value);
            }
        }
        if let Some(value) = &self.fallback_value {
            warn!(key = cache_key, error = %terminal, "Serving static fallback value");
            return Ok(value.clone());
        }
        Err(terminal)
    }
}
