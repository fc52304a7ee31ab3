//! SQLite implementation of the CatalogStore trait
//!
//! Uses rusqlite through tokio-rusqlite so storage calls suspend instead of
//! blocking the worker threads. Embedding vectors are stored as
//! little-endian f32 BLOBs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::CatalogStore;
use crate::error::DbError;
use crate::models::{
    category_slug, OfferRecord, ProductRecord, SearchChunk, SyncRunStatus, SyncRunStatusValue,
};

/// SQLite store implementation
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path
    ///
    /// Use `:memory:` for an in-memory database.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory store (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn upsert_category(&self, name: &str) -> Result<i64, DbError> {
        let slug = category_slug(name);
        let name = name.trim().to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO categories (slug, name)
                    VALUES (?1, ?2)
                    ON CONFLICT(slug) DO UPDATE SET name = excluded.name
                    "#,
                    rusqlite::params![slug, name],
                )?;

                conn.query_row(
                    "SELECT id FROM categories WHERE slug = ?1",
                    [&slug],
                    |row| row.get(0),
                )
            })
            .await
            .map_err(Into::into)
    }

    async fn upsert_product(&self, record: &ProductRecord) -> Result<bool, DbError> {
        let record = record.clone();

        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    INSERT INTO products (external_id, name, category_id, description, sku, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(external_id) DO UPDATE SET
                        name = excluded.name,
                        category_id = excluded.category_id,
                        description = excluded.description,
                        sku = excluded.sku,
                        updated_at = excluded.updated_at
                    "#,
                    rusqlite::params![
                        record.external_id,
                        record.name,
                        record.category_id,
                        record.description,
                        record.sku,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(changed > 0)
            })
            .await
            .map_err(Into::into)
    }

    async fn upsert_offer(&self, offer: &OfferRecord) -> Result<bool, DbError> {
        let offer = offer.clone();

        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    INSERT INTO offers (product_external_id, price_cents, currency, stock_quantity, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(product_external_id) DO UPDATE SET
                        price_cents = excluded.price_cents,
                        currency = excluded.currency,
                        stock_quantity = excluded.stock_quantity,
                        updated_at = excluded.updated_at
                    "#,
                    rusqlite::params![
                        offer.product_external_id,
                        offer.price_cents,
                        offer.currency,
                        offer.stock_quantity,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                Ok(changed > 0)
            })
            .await
            .map_err(Into::into)
    }

    async fn insert_chunk_if_absent(&self, chunk: &SearchChunk) -> Result<bool, DbError> {
        let chunk = chunk.clone();

        self.conn
            .call(move |conn| {
                let created = conn.execute(
                    r#"
                    INSERT OR IGNORE INTO search_chunks (product_external_id, seq, content, embedding)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    rusqlite::params![
                        chunk.product_external_id,
                        chunk.seq,
                        chunk.content,
                        embedding_to_blob(&chunk.embedding),
                    ],
                )?;
                Ok(created > 0)
            })
            .await
            .map_err(Into::into)
    }

    async fn clear_catalog(&self) -> Result<u64, DbError> {
        self.conn
            .call(|conn| {
                let products: i64 =
                    conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
                conn.execute_batch(
                    r#"
                    DELETE FROM search_chunks;
                    DELETE FROM offers;
                    DELETE FROM products;
                    DELETE FROM categories;
                    "#,
                )?;
                Ok(products as u64)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_product(&self, external_id: &str) -> Result<Option<ProductRecord>, DbError> {
        let external_id = external_id.to_string();

        self.conn
            .call(move |conn| {
                conn.query_row(
                    r#"
                    SELECT external_id, name, category_id, description, sku
                    FROM products
                    WHERE external_id = ?1
                    "#,
                    [&external_id],
                    |row| {
                        Ok(ProductRecord {
                            external_id: row.get(0)?,
                            name: row.get(1)?,
                            category_id: row.get(2)?,
                            description: row.get(3)?,
                            sku: row.get(4)?,
                        })
                    },
                )
                .optional()
            })
            .await
            .map_err(Into::into)
    }

    async fn count_products(&self) -> Result<u64, DbError> {
        count_table(&self.conn, "products").await
    }

    async fn count_offers(&self) -> Result<u64, DbError> {
        count_table(&self.conn, "offers").await
    }

    async fn count_chunks(&self) -> Result<u64, DbError> {
        count_table(&self.conn, "search_chunks").await
    }

    async fn count_categories(&self) -> Result<u64, DbError> {
        count_table(&self.conn, "categories").await
    }

    async fn update_sync_status(&self, status: &SyncRunStatus) -> Result<(), DbError> {
        let status = status.clone();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO sync_status
                    (source, last_sync_at, status, error_message, records_count)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    rusqlite::params![
                        status.source,
                        status.last_sync_at.map(|t| t.to_rfc3339()),
                        status.status.to_string(),
                        status.error_message,
                        status.records_count as i64,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(Into::into)
    }

    async fn get_sync_status(&self, source: &str) -> Result<Option<SyncRunStatus>, DbError> {
        let source = source.to_string();

        self.conn
            .call(move |conn| {
                conn.query_row(
                    r#"
                    SELECT source, last_sync_at, status, error_message, records_count
                    FROM sync_status
                    WHERE source = ?1
                    "#,
                    [&source],
                    |row| {
                        Ok(SyncRunStatus {
                            source: row.get(0)?,
                            last_sync_at: parse_datetime(row.get::<_, Option<String>>(1)?),
                            status: row
                                .get::<_, String>(2)?
                                .parse::<SyncRunStatusValue>()
                                .unwrap_or_default(),
                            error_message: row.get(3)?,
                            records_count: row.get::<_, i64>(4)? as u64,
                        })
                    },
                )
                .optional()
            })
            .await
            .map_err(Into::into)
    }
}

async fn count_table(conn: &Connection, table: &'static str) -> Result<u64, DbError> {
    conn.call(move |conn| {
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(count as u64)
    })
    .await
    .map_err(Into::into)
}

/// Serialize an embedding vector into a little-endian f32 BLOB
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Deserialize a little-endian f32 BLOB back into an embedding vector
#[cfg(test)]
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn parse_datetime(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}
