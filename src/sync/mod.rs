//! Catalog synchronization infrastructure
//!
//! This module provides the bounded-concurrency batch pipeline that pulls
//! the paginated remote catalog and idempotently upserts it into storage,
//! together with the pieces it is built from.
//!
//! # Components
//!
//! - [`worker_pool`]: bounded fan-out executor with an index-claim cursor
//! - [`chunker`]: sentence-boundary chunking and hashed-token embeddings
//! - [`stats`]: per-run counters and the final report
//! - [`pipeline`]: the page/item fan-out orchestration

pub mod chunker;
pub mod pipeline;
pub mod stats;
pub mod worker_pool;

// Re-export main types for convenience
pub use pipeline::{SyncPipeline, SYNC_SOURCE};
pub use stats::{ItemOutcome, PageOutcome, SyncReport, SyncStats};
pub use worker_pool::WorkerPool;
