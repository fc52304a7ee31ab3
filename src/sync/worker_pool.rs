//! Bounded-concurrency fan-out over a fixed list of work items
//!
//! Launches `min(concurrency, items)` workers sharing an atomically
//! incremented claim cursor. Every item is claimed exactly once; results are
//! returned in input order regardless of completion order.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Progress callback invoked with `(completed, total, &result)` after each item
///
/// Invoked from worker tasks; a slow callback degrades throughput but not
/// correctness.
pub type ProgressFn<R> = Arc<dyn Fn(usize, usize, &R) + Send + Sync>;

/// Fixed-size worker pool
pub struct WorkerPool {
    concurrency: usize,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Create a pool with the given concurrency limit
    pub fn new(concurrency: usize) -> Self {
        Self::with_cancellation(concurrency, CancellationToken::new())
    }

    /// Create a pool honoring an externally owned cancellation token
    ///
    /// A cancelled worker stops before claiming its next item; the item it is
    /// currently processing runs to completion.
    pub fn with_cancellation(concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Process every item, returning results in input order
    ///
    /// The result slot for an item is `None` only when the pool was cancelled
    /// before that item was claimed.
    pub async fn run<T, R, F, Fut>(
        &self,
        items: Vec<T>,
        handler: F,
        progress: Option<ProgressFn<R>>,
    ) -> Vec<Option<R>>
    where
        T: Clone + Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(usize, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let items = Arc::new(items);
        let handler = Arc::new(handler);
        let cursor = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let workers = self.concurrency.min(total);
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let items = Arc::clone(&items);
            let handler = Arc::clone(&handler);
            let cursor = Arc::clone(&cursor);
            let completed = Arc::clone(&completed);
            let progress = progress.clone();
            let cancel = self.cancel.clone();

            handles.push(tokio::spawn(async move {
                let mut collected: Vec<(usize, R)> = Vec::new();

                loop {
                    if cancel.is_cancelled() {
                        debug!(worker = worker_id, "Worker stopping on cancellation");
                        break;
                    }

                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    if index >= items.len() {
                        break;
                    }

                    let result = handler(index, items[index].clone()).await;

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(progress) = &progress {
                        progress(done, items.len(), &result);
                    }
                    collected.push((index, result));
                }

                collected
            }));
        }

        let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(total).collect();
        for handle in handles {
            if let Ok(pairs) = handle.await {
                for (index, result) in pairs {
                    slots[index] = Some(result);
                }
            }
        }
        slots
    }
}
