//! Database schema definitions

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvested source
CREATE TABLE IF NOT EXISTS novels (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    author TEXT,
    genres TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    thumbnail BLOB,
    status TEXT,
    completed INTEGER NOT NULL DEFAULT 0,
    last_toc_url TEXT NOT NULL,
    last_toc_page INTEGER NOT NULL DEFAULT 1,
    current_chapter_url TEXT,
    current_chapter_title TEXT,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL
);

-- Chapters already delivered to output, in reading order
CREATE TABLE IF NOT EXISTS chapters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    novel_url TEXT NOT NULL REFERENCES novels(url) ON DELETE CASCADE,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    UNIQUE(novel_url, url)
);

CREATE INDEX IF NOT EXISTS idx_chapters_novel ON chapters(novel_url, sequence);
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
