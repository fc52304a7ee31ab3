//! Run statistics and final report
//!
//! One `SyncStats` instance lives for the duration of a pipeline run. The
//! counters are mutated atomically by completion callbacks firing from many
//! concurrent workers; the error list is append-only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Result of processing one page: a plain value, no shared state
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    /// Page number
    pub page: u32,
    /// Items synchronized successfully
    pub succeeded: u32,
    /// Items that failed
    pub failed: u32,
    /// Newly created search chunks
    pub chunks_created: u32,
    /// Page-level error, set when the listing itself could not be fetched
    pub error: Option<String>,
}

impl PageOutcome {
    /// Outcome for a page whose listing fetch failed
    pub fn listing_failed(page: u32, error: String) -> Self {
        Self {
            page,
            succeeded: 0,
            failed: 0,
            chunks_created: 0,
            error: Some(error),
        }
    }
}

/// Result of processing one item within a page
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    /// Whether the detail fetch succeeded
    pub fetched: bool,
    /// Whether the product and its offer were upserted
    pub upserted: bool,
    /// Newly created search chunks
    pub chunks_created: u32,
    /// Error message, set when the item failed at any stage
    pub error: Option<String>,
}

/// Monotonic counters for one pipeline run
#[derive(Debug, Default)]
pub struct SyncStats {
    pages_processed: AtomicU64,
    products_fetched: AtomicU64,
    offers_upserted: AtomicU64,
    chunks_indexed: AtomicU64,
    errors: Mutex<Vec<String>>,
}

impl SyncStats {
    /// Create zeroed statistics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed item
    pub fn record_item(&self, outcome: &ItemOutcome) {
        if outcome.fetched {
            self.products_fetched.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.upserted {
            self.offers_upserted.fetch_add(1, Ordering::Relaxed);
        }
        self.chunks_indexed
            .fetch_add(u64::from(outcome.chunks_created), Ordering::Relaxed);
        if let Some(error) = &outcome.error {
            self.record_error(error.clone());
        }
    }

    /// Record one completed page
    pub fn record_page(&self, outcome: &PageOutcome) {
        self.pages_processed.fetch_add(1, Ordering::Relaxed);
        if let Some(error) = &outcome.error {
            self.record_error(format!("page {}: {}", outcome.page, error));
        }
    }

    /// Append an error message
    pub fn record_error(&self, message: String) {
        self.errors.lock().expect("error list poisoned").push(message);
    }

    /// Number of pages processed so far
    pub fn pages_processed(&self) -> u64 {
        self.pages_processed.load(Ordering::Relaxed)
    }

    /// Number of errors recorded so far
    pub fn error_count(&self) -> usize {
        self.errors.lock().expect("error list poisoned").len()
    }

    /// Build the final report
    ///
    /// The error list is truncated to `error_sample_size` entries; the total
    /// count is preserved alongside.
    pub fn report(&self, elapsed: Duration, error_sample_size: usize) -> SyncReport {
        let errors = self.errors.lock().expect("error list poisoned");
        let total_errors = errors.len();
        let error_sample: Vec<String> =
            errors.iter().take(error_sample_size).cloned().collect();
        drop(errors);

        let products_fetched = self.products_fetched.load(Ordering::Relaxed);
        let pages_processed = self.pages_processed.load(Ordering::Relaxed);
        let secs = elapsed.as_secs_f64();

        SyncReport {
            pages_processed,
            products_fetched,
            offers_upserted: self.offers_upserted.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            elapsed,
            products_per_sec: rate(products_fetched, secs),
            pages_per_sec: rate(pages_processed, secs),
            total_errors,
            error_sample,
        }
    }
}

fn rate(count: u64, secs: f64) -> f64 {
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

/// Final summary of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    /// Pages processed (including pages whose listing fetch failed)
    pub pages_processed: u64,
    /// Product details fetched successfully
    pub products_fetched: u64,
    /// Products whose offer was upserted
    pub offers_upserted: u64,
    /// Newly created search chunks
    pub chunks_indexed: u64,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Items per second
    pub products_per_sec: f64,
    /// Pages per second
    pub pages_per_sec: f64,
    /// Total number of errors encountered
    pub total_errors: usize,
    /// First errors, truncated to the configured sample size
    pub error_sample: Vec<String>,
}
