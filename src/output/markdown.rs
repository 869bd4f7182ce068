//! Markdown summary generation
//!
//! The summary combines the progress counters with the affiliate programs
//! recorded in the result sink.

use super::stats::RunStatistics;
use super::OutputResult;
use crate::detector::best_email;
use crate::storage::SinkRecord;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Writes a markdown summary to `output_path`
///
/// # Arguments
///
/// * `stats` - Counters from the progress store
/// * `records` - Every row of the result sink
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(
    stats: &RunStatistics,
    records: &[SinkRecord],
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(stats, records, Utc::now());
    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, markdown)?;
    Ok(())
}

/// Keeps the most recent row of each target
///
/// The sink is append-only, so a re-tested target appears more than once.
pub fn latest_per_target(records: &[SinkRecord]) -> Vec<&SinkRecord> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut latest: Vec<&SinkRecord> = Vec::new();

    for record in records {
        match index.get(record.result.tool_name.as_str()) {
            Some(&i) => latest[i] = record,
            None => {
                index.insert(&record.result.tool_name, latest.len());
                latest.push(record);
            }
        }
    }
    latest
}

/// Formats the summary as markdown
pub fn format_markdown_summary(
    stats: &RunStatistics,
    records: &[SinkRecord],
    generated_at: DateTime<Utc>,
) -> String {
    let latest = latest_per_target(records);
    let mut md = String::new();

    md.push_str("# Affiliate Scout Summary\n\n");
    md.push_str(&format!("- **Generated**: {}\n", generated_at.to_rfc3339()));
    if let Some(hash) = &stats.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Targets Processed**: {}\n", stats.processed));
    md.push_str(&format!(
        "- **Reachable**: {} ({:.2}%)\n",
        stats.ok,
        stats.success_rate()
    ));
    md.push_str(&format!("- **Errors**: {}\n", stats.errors));
    md.push_str(&format!(
        "- **Affiliate Programs**: {} ({:.2}%)\n",
        stats.affiliates_found,
        stats.affiliate_rate()
    ));
    md.push_str(&format!(
        "- **Lightweight / Heavy**: {} / {} ({:.2}% heavy)\n",
        stats.lightweight_used,
        stats.heavy_used,
        stats.heavy_rate()
    ));
    md.push_str(&format!(
        "- **Pages Checked**: {} ({:.1} per target)\n\n",
        stats.pages_checked,
        stats.average_pages()
    ));

    let mut statuses: BTreeMap<String, u64> = BTreeMap::new();
    for record in &latest {
        *statuses.entry(record.result.status_code.to_string()).or_insert(0) += 1;
    }
    if !statuses.is_empty() {
        md.push_str("## Status Breakdown\n\n");
        md.push_str("| Status | Count |\n");
        md.push_str("|--------|-------|\n");
        for (status, count) in &statuses {
            md.push_str(&format!("| {} | {} |\n", status, count));
        }
        md.push('\n');
    }

    let mut affiliates: Vec<&SinkRecord> = latest
        .into_iter()
        .filter(|r| r.result.affiliate_found)
        .collect();
    affiliates.sort_by(|a, b| {
        b.result
            .confidence_score
            .total_cmp(&a.result.confidence_score)
            .then_with(|| a.result.tool_name.cmp(&b.result.tool_name))
    });

    md.push_str(&format!("## Affiliate Programs ({})\n\n", affiliates.len()));
    if affiliates.is_empty() {
        md.push_str("No affiliate programs recorded yet.\n");
        return md;
    }

    md.push_str("| Tool | Program URL | Confidence | Best Contact | Method |\n");
    md.push_str("|------|-------------|------------|--------------|--------|\n");
    for record in affiliates {
        let result = &record.result;
        let contact = best_email(result.emails.iter().map(String::as_str))
            .map(|(email, _)| email)
            .unwrap_or("-");
        md.push_str(&format!(
            "| {} | {} | {:.2} | {} | {} |\n",
            escape_cell(&result.tool_name),
            escape_cell(&result.affiliate_url),
            result.confidence_score,
            escape_cell(contact),
            result.method_used
        ));
    }
    md
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}
