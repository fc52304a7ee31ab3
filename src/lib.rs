//! catalog-sync - Resilient batch synchronization of a remote product catalog
//!
//! This crate pulls a paginated product catalog from a remote HTTP API and
//! idempotently upserts products, offers, categories, and derived search
//! chunks into a local SQLite database, degrading gracefully when the remote
//! misbehaves.

pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod resilience;
pub mod sync;
