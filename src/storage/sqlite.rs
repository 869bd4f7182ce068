use super::schema::initialize_schema;
use super::{from_row, to_row, ResultSink, SinkRecord, SinkResult};
use crate::model::CrawlResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQLite result sink
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens or creates the results database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn open(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Creates an in-memory sink
    pub fn open_in_memory() -> SinkResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SinkResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Number of rows stored so far
    pub fn count(&self) -> SinkResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

impl ResultSink for SqliteSink {
    fn append(&mut self, result: &CrawlResult, crawled_at: DateTime<Utc>) -> SinkResult<()> {
        let row = to_row(result, crawled_at);
        self.conn.execute(
            "INSERT INTO results (tool_name, url_root, status_code, affiliate_found, affiliate_url,
                                  emails, pages_checked, keywords_found, method_used,
                                  confidence_score, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row[0],
                row[1],
                row[2],
                row[3],
                row[4],
                row[5],
                result.pages_checked,
                row[7],
                row[8],
                row[9],
                row[10]
            ],
        )?;
        Ok(())
    }

    fn load_all(&self) -> SinkResult<Vec<SinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT tool_name, url_root, status_code, affiliate_found, affiliate_url, emails,
                    CAST(pages_checked AS TEXT), keywords_found, method_used,
                    confidence_score, crawled_at
             FROM results ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            (0..11)
                .map(|i| row.get::<_, String>(i))
                .collect::<rusqlite::Result<Vec<String>>>()
        })?;

        let mut records = Vec::new();
        for fields in rows {
            records.push(from_row(&fields?)?);
        }
        Ok(records)
    }
}
