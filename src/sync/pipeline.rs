//! Batch synchronization pipeline
//!
//! Pulls the paginated remote catalog through the resilient execution stack,
//! upserts products, offers, and categories idempotently, and derives search
//! chunks, fanning out over a bounded pool of page workers with a nested
//! bounded pool of item workers per page.
//!
//! Failure policy: per-item and per-page failures are recorded in the run
//! statistics and never abort the run. Only the bootstrap fetch of the
//! starting page (needed to learn the total page count) is fatal.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::CatalogApi;
use crate::config::{CatalogConfig, SyncConfig};
use crate::database::CatalogStore;
use crate::error::{PipelineError, SyncError};
use crate::models::{ProductDetail, ProductPage, ProductSummary, SyncRunStatus};
use crate::resilience::{CircuitBreaker, FallbackCache, ResilientExecutor, RetryManager};
use crate::sync::chunker::build_chunks;
use crate::sync::stats::{ItemOutcome, PageOutcome, SyncReport, SyncStats};
use crate::sync::worker_pool::{ProgressFn, WorkerPool};

/// Source name under which run status is persisted
pub const SYNC_SOURCE: &str = "catalog";

/// Page-level progress callback `(completed_pages, total_pages, &outcome)`
pub type PageProgressFn = Arc<dyn Fn(usize, usize, &PageOutcome) + Send + Sync>;

struct PipelineShared {
    api: Arc<dyn CatalogApi>,
    store: Arc<dyn CatalogStore>,
    pages: ResilientExecutor<ProductPage, SyncError>,
    details: ResilientExecutor<ProductDetail, SyncError>,
    config: SyncConfig,
    language: String,
}

/// Catalog synchronization pipeline
pub struct SyncPipeline {
    shared: Arc<PipelineShared>,
    cancel: CancellationToken,
    progress: Option<PageProgressFn>,
}

impl SyncPipeline {
    /// Create a pipeline over the given API and store
    ///
    /// Both fetch paths share one circuit breaker, since both hit the same
    /// downstream dependency; each keeps its own typed fallback cache.
    pub fn new(
        api: Arc<dyn CatalogApi>,
        store: Arc<dyn CatalogStore>,
        catalog: &CatalogConfig,
        config: SyncConfig,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(catalog.circuit_breaker.clone()));

        let pages = ResilientExecutor::new(
            RetryManager::new(catalog.retry.clone()),
            Arc::clone(&breaker),
            Arc::new(FallbackCache::from_config(&catalog.fallback)),
        );
        let details = ResilientExecutor::new(
            RetryManager::new(catalog.retry.clone()),
            breaker,
            Arc::new(FallbackCache::from_config(&catalog.fallback)),
        );

        Self {
            shared: Arc::new(PipelineShared {
                api,
                store,
                pages,
                details,
                config,
                language: catalog.language.clone(),
            }),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Honor an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Register a page-level progress callback
    pub fn with_progress(
        mut self,
        progress: impl Fn(usize, usize, &PageOutcome) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Run the full synchronization
    ///
    /// Returns the final report; per-item failures are inside it, not errors.
    pub async fn run(&self) -> Result<SyncReport, PipelineError> {
        let started = Instant::now();
        let shared = Arc::clone(&self.shared);

        if shared.config.reset {
            let deleted = shared.store.clear_catalog().await?;
            info!(deleted, "Cleared previously synchronized catalog data");
        }

        let start_page = shared.config.start_page;

        // Bootstrap fetch: the one failure that aborts the whole run, since
        // without it the total page count is unknown.
        let bootstrap = {
            let api = Arc::clone(&shared.api);
            let lang = shared.language.clone();
            let result = shared
                .pages
                .execute(&page_key(start_page, &lang), move || {
                    let api = Arc::clone(&api);
                    let lang = lang.clone();
                    async move { api.list_page(start_page, &lang).await }
                })
                .await;

            match result {
                Ok(page) => page,
                Err(err) => {
                    warn!(page = start_page, error = %err, "Bootstrap page fetch failed");
                    let status = SyncRunStatus::new(SYNC_SOURCE).failed(err.to_string());
                    if let Err(db_err) = shared.store.update_sync_status(&status).await {
                        warn!(error = %db_err, "Failed to persist sync status");
                    }
                    return Err(PipelineError::Bootstrap(err));
                }
            }
        };

        let last_page = shared
            .config
            .end_page
            .map_or(bootstrap.total_pages, |end| end.min(bootstrap.total_pages));
        let page_numbers: Vec<u32> = (start_page..=last_page).collect();

        info!(
            start_page,
            last_page,
            total_count = bootstrap.total_count,
            language = %shared.language,
            "Starting catalog sync"
        );

        let stats = Arc::new(SyncStats::new());
        let bootstrap = Arc::new(bootstrap);

        let page_progress: ProgressFn<PageOutcome> = {
            let stats = Arc::clone(&stats);
            let user_progress = self.progress.clone();
            Arc::new(move |completed, total, outcome: &PageOutcome| {
                stats.record_page(outcome);
                if let Some(progress) = &user_progress {
                    progress(completed, total, outcome);
                }
            })
        };

        let pool = WorkerPool::with_cancellation(shared.config.page_concurrency, self.cancel.clone());
        let handler = {
            let shared = Arc::clone(&shared);
            let stats = Arc::clone(&stats);
            let cancel = self.cancel.clone();
            move |_index: usize, page: u32| {
                let shared = Arc::clone(&shared);
                let stats = Arc::clone(&stats);
                let cancel = cancel.clone();
                let prefetched = (page == start_page).then(|| (*bootstrap).clone());
                async move { process_page(shared, stats, cancel, page, prefetched).await }
            }
        };
        pool.run(page_numbers, handler, Some(page_progress)).await;

        let report = stats.report(started.elapsed(), shared.config.error_sample_size);
        info!(
            pages = report.pages_processed,
            products = report.products_fetched,
            offers = report.offers_upserted,
            chunks = report.chunks_indexed,
            errors = report.total_errors,
            elapsed_ms = report.elapsed.as_millis(),
            "Catalog sync finished"
        );

        let status = SyncRunStatus::new(SYNC_SOURCE).success(report.offers_upserted);
        shared.store.update_sync_status(&status).await?;

        Ok(report)
    }
}

/// Process one page: fetch its listing, then fan out over its items
async fn process_page(
    shared: Arc<PipelineShared>,
    stats: Arc<SyncStats>,
    cancel: CancellationToken,
    page_no: u32,
    prefetched: Option<ProductPage>,
) -> PageOutcome {
    let listing = match prefetched {
        Some(page) => page,
        None => {
            let api = Arc::clone(&shared.api);
            let lang = shared.language.clone();
            let result = shared
                .pages
                .execute(&page_key(page_no, &lang), move || {
                    let api = Arc::clone(&api);
                    let lang = lang.clone();
                    async move { api.list_page(page_no, &lang).await }
                })
                .await;

            match result {
                Ok(page) => page,
                Err(err) => {
                    warn!(page = page_no, error = %err, "Failed to fetch page listing");
                    return PageOutcome::listing_failed(page_no, err.to_string());
                }
            }
        }
    };

    debug!(page = page_no, items = listing.items.len(), "Processing page");

    let item_progress: ProgressFn<ItemOutcome> = {
        let stats = Arc::clone(&stats);
        Arc::new(move |_done, _total, outcome: &ItemOutcome| {
            stats.record_item(outcome);
        })
    };

    let pool = WorkerPool::with_cancellation(shared.config.item_concurrency, cancel);
    let handler = {
        let shared = Arc::clone(&shared);
        move |_index: usize, item: ProductSummary| {
            let shared = Arc::clone(&shared);
            async move { process_item(shared, item).await }
        }
    };
    let results = pool.run(listing.items, handler, Some(item_progress)).await;

    let mut outcome = PageOutcome {
        page: page_no,
        succeeded: 0,
        failed: 0,
        chunks_created: 0,
        error: None,
    };
    for item in results.into_iter().flatten() {
        if item.error.is_none() {
            outcome.succeeded += 1;
        } else {
            outcome.failed += 1;
        }
        outcome.chunks_created += item.chunks_created;
    }
    outcome
}

/// Process one item: fetch its detail, upsert, and index its chunks
async fn process_item(shared: Arc<PipelineShared>, item: ProductSummary) -> ItemOutcome {
    let id = item.id;

    let detail = {
        let api = Arc::clone(&shared.api);
        let lang = shared.language.clone();
        let fetch_id = id.clone();
        let result = shared
            .details
            .execute(&detail_key(&id, &shared.language), move || {
                let api = Arc::clone(&api);
                let id = fetch_id.clone();
                let lang = lang.clone();
                async move { api.get_product(&id, &lang).await }
            })
            .await;

        match result {
            Ok(detail) => detail,
            Err(err) => {
                warn!(product = %id, error = %err, "Failed to fetch product detail");
                return ItemOutcome {
                    fetched: false,
                    upserted: false,
                    chunks_created: 0,
                    error: Some(format!("product {id}: {err}")),
                };
            }
        }
    };

    match store_detail(&shared, &detail).await {
        Ok(chunks_created) => ItemOutcome {
            fetched: true,
            upserted: true,
            chunks_created,
            error: None,
        },
        Err(err) => {
            warn!(product = %id, error = %err, "Failed to store product");
            ItemOutcome {
                fetched: true,
                upserted: false,
                chunks_created: 0,
                error: Some(format!("product {id}: {err}")),
            }
        }
    }
}

/// Upsert one product with its offer and search chunks
async fn store_detail(
    shared: &PipelineShared,
    detail: &ProductDetail,
) -> Result<u32, crate::error::DbError> {
    let category_id = shared.store.upsert_category(&detail.category).await?;
    shared.store.upsert_product(&detail.to_record(category_id)).await?;
    shared.store.upsert_offer(&detail.to_offer()).await?;

    let mut created = 0u32;
    for chunk in build_chunks(&detail.id, &detail.description) {
        if shared.store.insert_chunk_if_absent(&chunk).await? {
            created += 1;
        }
    }
    Ok(created)
}

fn page_key(page: u32, lang: &str) -> String {
    format!("page:{page}:{lang}")
}

fn detail_key(id: &str, lang: &str) -> String {
    format!("product:{id}:{lang}")
}
