//! Target list loading
//!
//! The target list is a CSV file with a name column and a URL column. Column
//! names are configurable. Rows with an empty name are skipped; duplicate
//! names keep the first occurrence. A missing or unparseable URL is kept so
//! that the target still yields a validation-error result.

use crate::config::InputConfig;
use crate::model::Target;
use crate::{Result, ScoutError};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Loads targets from the CSV file at `path`
///
/// # Arguments
///
/// * `path` - CSV file to read
/// * `config` - Column names to use
///
/// # Returns
///
/// * `Ok(Vec<Target>)` - Targets in file order, names unique
/// * `Err(ScoutError)` - The file cannot be read or lacks a configured column
pub fn load_targets(path: &Path, config: &InputConfig) -> Result<Vec<Target>> {
    let file = std::fs::File::open(path)?;
    read_targets(file, config)
}

/// Reads targets from any CSV source
pub fn read_targets<R: Read>(source: R, config: &InputConfig) -> Result<Vec<Target>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let name_idx = column_index(&headers, &config.name_column)?;
    let url_idx = column_index(&headers, &config.url_column)?;

    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let name = row.get(name_idx).unwrap_or("").trim();
        if name.is_empty() {
            tracing::warn!("Skipping row {}: empty {}", line + 2, config.name_column);
            continue;
        }
        if !seen.insert(name.to_string()) {
            tracing::warn!("Skipping duplicate target '{}' at row {}", name, line + 2);
            continue;
        }
        let url = row.get(url_idx).unwrap_or("");
        targets.push(Target::new(name, url));
    }

    Ok(targets)
}

fn column_index(headers: &csv::StringRecord, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| ScoutError::Input(format!("missing column '{}'", column)))
}
