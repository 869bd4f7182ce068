use super::{from_row, to_row, ResultSink, SinkError, SinkRecord, SinkResult, RESULT_COLUMNS};
use crate::model::CrawlResult;
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// CSV result sink
///
/// Rows are appended and flushed one at a time. The header is written only
/// when the file is new or empty, so a resumed run keeps extending the same
/// file.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvSink {
    /// Opens (or creates) the results file for appending
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the CSV file
    pub fn open(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let needs_header = match std::fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(RESULT_COLUMNS)?;
            writer.flush()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for CsvSink {
    fn append(&mut self, result: &CrawlResult, crawled_at: DateTime<Utc>) -> SinkResult<()> {
        self.writer.write_record(to_row(result, crawled_at))?;
        self.writer.flush()?;
        Ok(())
    }

    fn load_all(&self) -> SinkResult<Vec<SinkRecord>> {
        read_csv(&self.path)
    }
}

/// Reads every row of a results CSV file
///
/// A missing file yields no rows.
pub fn read_csv(path: &Path) -> SinkResult<Vec<SinkRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.iter().ne(RESULT_COLUMNS.iter().copied()) {
        return Err(SinkError::Malformed(format!(
            "unexpected header in {}",
            path.display()
        )));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let fields: Vec<&str> = row.iter().collect();
        records.push(from_row(&fields)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::sample_result;
    use tempfile::TempDir;

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");

        {
            let mut sink = CsvSink::open(&path).unwrap();
            sink.append(&sample_result(), Utc::now()).unwrap();
        }
        {
            let mut sink = CsvSink::open(&path).unwrap();
            sink.append(&sample_result(), Utc::now()).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("tool_name,url_root").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_load_all_returns_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("results.csv");
        let mut sink = CsvSink::open(&path).unwrap();

        let first = sample_result();
        let mut second = sample_result();
        second.tool_name = "Beta".to_string();
        sink.append(&first, Utc::now()).unwrap();
        sink.append(&second, Utc::now()).unwrap();

        let records = sink.load_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].result.tool_name, "Acme");
        assert_eq!(records[1].result.tool_name, "Beta");
        assert_eq!(records[0].result.keywords_found, first.keywords_found);
    }

    #[test]
    fn test_quoted_fields_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = CsvSink::open(&path).unwrap();

        let mut result = sample_result();
        result.tool_name = "Acme, Inc. \"Pro\"".to_string();
        sink.append(&result, Utc::now()).unwrap();

        let records = read_csv(&path).unwrap();
        assert_eq!(records[0].result.tool_name, "Acme, Inc. \"Pro\"");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(read_csv(&dir.path().join("absent.csv")).unwrap().is_empty());
    }
}
