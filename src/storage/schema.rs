//! Database schema definitions
//!
//! This module contains the SQL schema for the job ledger and product store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Job ledger, one row per harvesting request
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL,
    source TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('pending', 'running', 'completed', 'failed')),
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    failure_reason TEXT,
    record_count INTEGER NOT NULL DEFAULT 0,
    CHECK ((status = 'failed') = (failure_reason IS NOT NULL)),
    CHECK ((status IN ('completed', 'failed')) = (completed_at IS NOT NULL))
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);

-- Harvested products; link is the dedup key
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    price_raw TEXT,
    price_numeric REAL,
    currency TEXT,
    link TEXT UNIQUE,
    image TEXT,
    availability_raw TEXT,
    availability_status TEXT NOT NULL,
    brand TEXT,
    model TEXT,
    condition_raw TEXT,
    condition TEXT NOT NULL DEFAULT 'unknown',
    source TEXT NOT NULL,
    search_term TEXT NOT NULL,
    scrape_time TEXT NOT NULL,
    page_number INTEGER NOT NULL DEFAULT 0,
    position_on_page INTEGER NOT NULL DEFAULT 0,
    job_id INTEGER REFERENCES jobs(id)
);

CREATE INDEX IF NOT EXISTS idx_products_search_term ON products(search_term);
CREATE INDEX IF NOT EXISTS idx_products_source ON products(source);
CREATE INDEX IF NOT EXISTS idx_products_job ON products(job_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
