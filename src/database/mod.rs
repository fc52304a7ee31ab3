//! Storage layer for catalog-sync
//!
//! This module defines the storage trait and SQLite implementation. All
//! writes the pipeline performs are idempotent: replaying the same input
//! converges to the same end state.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{OfferRecord, ProductRecord, SearchChunk, SyncRunStatus};

/// Durable storage trait for synchronized catalog data
///
/// It uses `async_trait` for async methods and `mockall::automock` for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Catalog upserts
    // =========================================================================

    /// Resolve or create a category by display name
    ///
    /// Idempotent: the name is normalized to a slug and the same name always
    /// resolves to the same category id.
    async fn upsert_category(&self, name: &str) -> Result<i64, DbError>;

    /// Upsert a catalog record, keyed by its stable external id
    ///
    /// Last write wins on conflict.
    async fn upsert_product(&self, record: &ProductRecord) -> Result<bool, DbError>;

    /// Upsert a product's price/stock sub-record
    async fn upsert_offer(&self, offer: &OfferRecord) -> Result<bool, DbError>;

    /// Insert a search chunk unless it already exists
    ///
    /// Returns true when a row was created, false for a silently ignored
    /// duplicate.
    async fn insert_chunk_if_absent(&self, chunk: &SearchChunk) -> Result<bool, DbError>;

    // =========================================================================
    // Maintenance and reporting
    // =========================================================================

    /// Delete all synchronized catalog data
    ///
    /// Returns the number of deleted product rows.
    async fn clear_catalog(&self) -> Result<u64, DbError>;

    /// Get a product by external id
    async fn get_product(&self, external_id: &str) -> Result<Option<ProductRecord>, DbError>;

    /// Count distinct products
    async fn count_products(&self) -> Result<u64, DbError>;

    /// Count distinct offers
    async fn count_offers(&self) -> Result<u64, DbError>;

    /// Count distinct search chunks
    async fn count_chunks(&self) -> Result<u64, DbError>;

    /// Count distinct categories
    async fn count_categories(&self) -> Result<u64, DbError>;

    // =========================================================================
    // Sync run status
    // =========================================================================

    /// Update the persisted status for a sync source
    async fn update_sync_status(&self, status: &SyncRunStatus) -> Result<(), DbError>;

    /// Get the persisted status for a sync source
    async fn get_sync_status(&self, source: &str) -> Result<Option<SyncRunStatus>, DbError>;
}
