//! Database schema for catalog-sync
//!
//! Executed as a batch on startup; every statement is idempotent so the
//! schema can be applied to both fresh and existing databases.

/// Schema creation statements
pub const CREATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    external_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category_id INTEGER NOT NULL REFERENCES categories(id),
    description TEXT NOT NULL DEFAULT '',
    sku TEXT NOT NULL DEFAULT '',
    updated_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id);

CREATE TABLE IF NOT EXISTS offers (
    product_external_id TEXT PRIMARY KEY REFERENCES products(external_id),
    price_cents INTEGER NOT NULL,
    currency TEXT NOT NULL,
    stock_quantity INTEGER NOT NULL,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS search_chunks (
    product_external_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (product_external_id, seq)
);

CREATE TABLE IF NOT EXISTS sync_status (
    source TEXT PRIMARY KEY,
    last_sync_at TEXT,
    status TEXT NOT NULL,
    error_message TEXT,
    records_count INTEGER NOT NULL DEFAULT 0
);
"#;
