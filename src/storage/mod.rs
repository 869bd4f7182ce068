//! Result sink: append-only record of per-target findings
//!
//! Two backends share one row layout:
//! - CSV (default), header written once
//! - SQLite, table `results`

mod csv_sink;
mod schema;
mod sqlite;

pub use csv_sink::{read_csv, CsvSink};
pub use sqlite::SqliteSink;

use crate::config::{OutputConfig, OutputFormat};
use crate::model::{CrawlResult, FetchMethod, StatusCategory};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeSet;
use thiserror::Error;

/// Column order shared by every backend
pub const RESULT_COLUMNS: [&str; 11] = [
    "tool_name",
    "url_root",
    "status_code",
    "affiliate_found",
    "affiliate_url",
    "emails",
    "pages_checked",
    "keywords_found",
    "method_used",
    "confidence_score",
    "crawled_at",
];

const EMAIL_SEPARATOR: &str = "; ";
const KEYWORD_SEPARATOR: &str = ", ";
const KEYWORD_ESCAPE: char = '\\';

/// Errors that can occur while writing or reading results
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed result row: {0}")]
    Malformed(String),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// A persisted result row
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    pub result: CrawlResult,
    pub crawled_at: DateTime<Utc>,
}

/// Append-only storage for crawl results
///
/// The sink is owned by the orchestrator loop, the only writer.
pub trait ResultSink {
    /// Appends one result; rows are never deduplicated
    fn append(&mut self, result: &CrawlResult, crawled_at: DateTime<Utc>) -> SinkResult<()>;

    /// Reads every row back, oldest first
    fn load_all(&self) -> SinkResult<Vec<SinkRecord>>;
}

/// Opens the sink selected by the output configuration
pub fn open_sink(config: &OutputConfig) -> SinkResult<Box<dyn ResultSink + Send>> {
    Ok(match config.format {
        OutputFormat::Csv => Box::new(CsvSink::open(&config.results_path)?),
        OutputFormat::Sqlite => Box::new(SqliteSink::open(&config.database_path)?),
    })
}

/// Reads every stored row without creating anything
///
/// A sink that does not exist yet yields no rows.
pub fn load_records(config: &OutputConfig) -> SinkResult<Vec<SinkRecord>> {
    match config.format {
        OutputFormat::Csv => read_csv(&config.results_path),
        OutputFormat::Sqlite if !config.database_path.exists() => Ok(Vec::new()),
        OutputFormat::Sqlite => SqliteSink::open(&config.database_path)?.load_all(),
    }
}

/// Deletes the configured sink files, including SQLite side files
pub fn remove_sink(config: &OutputConfig) -> SinkResult<()> {
    let path = config.sink_path();
    let mut paths = vec![path.to_path_buf()];
    if config.format == OutputFormat::Sqlite {
        for suffix in ["-wal", "-shm"] {
            let mut side = path.as_os_str().to_owned();
            side.push(suffix);
            paths.push(side.into());
        }
    }

    for path in paths {
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::info!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Flattens a result into the shared column layout
pub fn to_row(result: &CrawlResult, crawled_at: DateTime<Utc>) -> [String; 11] {
    [
        result.tool_name.clone(),
        result.url_root.clone(),
        result.status_code.to_string(),
        if result.affiliate_found { "yes" } else { "no" }.to_string(),
        result.affiliate_url.clone(),
        join(&result.emails, EMAIL_SEPARATOR),
        result.pages_checked.to_string(),
        join_keywords(&result.keywords_found),
        result.method_used.to_string(),
        format!("{:.2}", result.confidence_score),
        crawled_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    ]
}

/// Rebuilds a result from the shared column layout
pub fn from_row<S: AsRef<str>>(fields: &[S]) -> SinkResult<SinkRecord> {
    if fields.len() != RESULT_COLUMNS.len() {
        return Err(SinkError::Malformed(format!(
            "expected {} fields, got {}",
            RESULT_COLUMNS.len(),
            fields.len()
        )));
    }
    let field = |i: usize| fields[i].as_ref();

    let method_used = FetchMethod::parse(field(8))
        .ok_or_else(|| SinkError::Malformed(format!("unknown method '{}'", field(8))))?;
    let pages_checked = field(6)
        .parse::<u32>()
        .map_err(|e| SinkError::Malformed(format!("pages_checked: {}", e)))?;
    let confidence_score = field(9)
        .parse::<f64>()
        .map_err(|e| SinkError::Malformed(format!("confidence_score: {}", e)))?;
    let crawled_at = DateTime::parse_from_rfc3339(field(10))
        .map_err(|e| SinkError::Malformed(format!("crawled_at: {}", e)))?
        .with_timezone(&Utc);
    let status_code = StatusCategory::parse(field(2));

    Ok(SinkRecord {
        result: CrawlResult {
            tool_name: field(0).to_string(),
            url_root: field(1).to_string(),
            status_code,
            affiliate_found: field(3) == "yes",
            affiliate_url: field(4).to_string(),
            emails: split(field(5), EMAIL_SEPARATOR),
            pages_checked,
            keywords_found: split_keywords(field(7)),
            method_used,
            confidence_score,
            // not a column; an error row with no page checked may never have been fetched
            fetch_attempted: status_code != StatusCategory::Error || pages_checked > 0,
        },
        crawled_at,
    })
}

fn join(set: &BTreeSet<String>, separator: &str) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(separator)
}

fn split(value: &str, separator: &str) -> BTreeSet<String> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Joins keywords with `", "`, escaping commas and backslashes inside a
/// keyword so anchor labels such as "Partners, Affiliates" survive reading back
fn join_keywords(keywords: &BTreeSet<String>) -> String {
    keywords
        .iter()
        .map(|keyword| {
            let mut escaped = String::with_capacity(keyword.len());
            for c in keyword.chars() {
                if c == KEYWORD_ESCAPE || c == ',' {
                    escaped.push(KEYWORD_ESCAPE);
                }
                escaped.push(c);
            }
            escaped
        })
        .collect::<Vec<_>>()
        .join(KEYWORD_SEPARATOR)
}

fn split_keywords(value: &str) -> BTreeSet<String> {
    let mut keywords = BTreeSet::new();
    let mut current = String::new();
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        match c {
            KEYWORD_ESCAPE => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => {
                keywords.insert(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    keywords.insert(current);

    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CrawlResultBuilder;
    use chrono::TimeZone;

    pub(crate) fn sample_result() -> CrawlResult {
        let mut builder =
            CrawlResultBuilder::new("Acme", "https://acme.io", FetchMethod::Lightweight);
        builder.set_status(StatusCategory::Http(200));
        builder.page_checked();
        builder.add_emails(vec!["b@acme.io".to_string(), "a@acme.io".to_string()]);
        builder.add_keywords(vec!["Become an Affiliate".to_string(), "affiliate program".to_string()]);
        builder.mark_affiliate("https://acme.io", 0.456);
        builder.finish()
    }

    #[test]
    fn test_row_layout() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let row = to_row(&sample_result(), at);
        assert_eq!(row[2], "200");
        assert_eq!(row[3], "yes");
        assert_eq!(row[5], "a@acme.io; b@acme.io");
        assert_eq!(row[7], "Become an Affiliate, affiliate program");
        assert_eq!(row[8], "lightweight");
        assert_eq!(row[9], "0.46");
        assert_eq!(row[10], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_from_row_rejects_short_rows() {
        assert!(matches!(
            from_row(&["Acme", "https://acme.io"]),
            Err(SinkError::Malformed(_))
        ));
    }

    #[test]
    fn test_from_row_reads_back() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = from_row(&to_row(&sample_result(), at)).unwrap();
        assert_eq!(record.result.tool_name, "Acme");
        assert!(record.result.affiliate_found);
        assert_eq!(record.result.emails.len(), 2);
        assert_eq!(record.result.confidence_score, 0.46);
        assert_eq!(record.crawled_at, at);
    }

    #[test]
    fn test_keywords_with_commas_read_back_intact() {
        let mut result = sample_result();
        result.keywords_found = BTreeSet::from([
            "Partners, Affiliates & Resellers".to_string(),
            r"a\b".to_string(),
            "referral".to_string(),
        ]);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let row = to_row(&result, at);
        assert_eq!(row[7], r"Partners\, Affiliates & Resellers, a\\b, referral");

        let record = from_row(&row).unwrap();
        assert_eq!(record.result.keywords_found, result.keywords_found);
    }

    #[test]
    fn test_open_load_and_remove_sink() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = OutputConfig {
            format: OutputFormat::Sqlite,
            database_path: dir.path().join("results.db"),
            ..OutputConfig::default()
        };

        assert!(load_records(&config).unwrap().is_empty());
        assert!(!config.database_path.exists());

        let mut sink = open_sink(&config).unwrap();
        sink.append(&sample_result(), Utc::now()).unwrap();
        drop(sink);
        assert_eq!(load_records(&config).unwrap().len(), 1);

        remove_sink(&config).unwrap();
        assert!(!config.database_path.exists());
        remove_sink(&config).unwrap();
    }
}
