//! Domain models for catalog-sync
//!
//! This module contains the core domain models used throughout the application.

pub mod product;
pub mod sync_run;

// Re-export commonly used types
pub use product::{
    category_slug, OfferRecord, ProductDetail, ProductPage, ProductRecord, ProductSummary,
    SearchChunk,
};
pub use sync_run::{SyncRunStatus, SyncRunStatusValue};
