//! Resilient remote-operation execution
//!
//! This module provides the failure-handling stack used for every remote
//! call: exponential backoff with jitter, per-attempt timeouts, retry with
//! error classification, a circuit breaker per dependency, and a TTL-bounded
//! fallback cache for degraded operation.
//!
//! # Components
//!
//! - [`backoff`]: pure delay computation with injectable randomness
//! - [`retry`]: retry executor with per-attempt deadlines and observers
//! - [`circuit_breaker`]: per-dependency gate with closed/open/half-open states
//! - [`fallback`]: time-bounded last-good-value cache
//! - [`executor`]: the composed fallback ∘ breaker ∘ retry ∘ timeout call path

pub mod backoff;
pub mod circuit_breaker;
pub mod executor;
pub mod fallback;
pub mod retry;

// Re-export main types for convenience
pub use backoff::Backoff;
pub use circuit_breaker::{CircuitBreaker, CircuitOpen, CircuitState};
pub use executor::ResilientExecutor;
pub use fallback::FallbackCache;
pub use retry::RetryManager;
