use rusqlite::Connection;

use crate::error::StoreError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS products (
    product_id BLOB PRIMARY KEY CHECK (length(product_id) = 16),
    title TEXT NOT NULL,
    edition_total INTEGER CHECK (edition_total IS NULL OR edition_total > 0)
);

CREATE TABLE IF NOT EXISTS orders (
    order_id BLOB PRIMARY KEY CHECK (length(order_id) = 16),
    canonical_kind TEXT NOT NULL CHECK (canonical_kind IN ('commerce', 'warehouse', 'manual')),
    canonical_source_id TEXT NOT NULL,
    display_number TEXT NOT NULL,
    match_key TEXT,
    financial_state TEXT NOT NULL CHECK (financial_state IN
        ('pending', 'paid', 'partially_paid', 'refunded', 'voided', 'authorized')),
    fulfillment_state TEXT NOT NULL CHECK (fulfillment_state IN
        ('unfulfilled', 'fulfilled', 'restocked', 'canceled')),
    cancelled_at INTEGER,
    purchase_time INTEGER NOT NULL,
    email TEXT,
    name TEXT,
    phone TEXT,
    shipping_address TEXT
);
CREATE INDEX IF NOT EXISTS idx_orders_match_key ON orders (match_key) WHERE match_key IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_orders_email_time ON orders (email, purchase_time) WHERE email IS NOT NULL;

-- One row per raw record merged into an order; a raw record can belong to at
-- most one canonical order. Contact columns snapshot what that origin
-- supplied, feeding the waterfall and the enrichment-regression audit.
CREATE TABLE IF NOT EXISTS order_sources (
    source_kind TEXT NOT NULL CHECK (source_kind IN ('commerce', 'warehouse', 'manual')),
    source_id TEXT NOT NULL,
    order_id BLOB NOT NULL CHECK (length(order_id) = 16) REFERENCES orders (order_id) ON DELETE CASCADE,
    email TEXT,
    name TEXT,
    phone TEXT,
    shipping_address TEXT,
    PRIMARY KEY (source_kind, source_id)
);
CREATE INDEX IF NOT EXISTS idx_order_sources_order ON order_sources (order_id);

CREATE TABLE IF NOT EXISTS line_items (
    item_id BLOB PRIMARY KEY CHECK (length(item_id) = 16),
    order_id BLOB NOT NULL CHECK (length(order_id) = 16) REFERENCES orders (order_id),
    product_id BLOB NOT NULL CHECK (length(product_id) = 16) REFERENCES products (product_id),
    source_kind TEXT NOT NULL CHECK (source_kind IN ('commerce', 'warehouse', 'manual')),
    source_line_id TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    unit_price TEXT NOT NULL,
    refund_state TEXT NOT NULL CHECK (refund_state IN ('none', 'partial', 'full')),
    restocked INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'inactive' CHECK (status IN ('active', 'inactive')),
    edition_number INTEGER CHECK (edition_number IS NULL OR edition_number > 0),
    created_at INTEGER NOT NULL,
    UNIQUE (source_kind, source_line_id)
);
CREATE INDEX IF NOT EXISTS idx_line_items_order ON line_items (order_id);
CREATE INDEX IF NOT EXISTS idx_line_items_product ON line_items (product_id, status);
CREATE UNIQUE INDEX IF NOT EXISTS idx_line_items_edition
    ON line_items (product_id, edition_number)
    WHERE status = 'active' AND edition_number IS NOT NULL;
";
