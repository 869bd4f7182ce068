//! Database schema for the SQLite result sink

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tool_name TEXT NOT NULL,
    url_root TEXT NOT NULL,
    status_code TEXT NOT NULL,
    affiliate_found TEXT NOT NULL CHECK (affiliate_found IN ('yes', 'no')),
    affiliate_url TEXT NOT NULL,
    emails TEXT NOT NULL,
    pages_checked INTEGER NOT NULL,
    keywords_found TEXT NOT NULL,
    method_used TEXT NOT NULL,
    confidence_score TEXT NOT NULL,
    crawled_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_results_tool ON results(tool_name);
CREATE INDEX IF NOT EXISTS idx_results_affiliate ON results(affiliate_found);
"#;

/// Creates the results table if it does not exist
pub fn initialize_schema(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)
}
