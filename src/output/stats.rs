//! Statistics derived from the progress store
//!
//! The counters are the ones the orchestrator maintains per completed target;
//! rates are computed on the fly.

use crate::state::{
    ProgressState, STAT_AFFILIATE_FOUND, STAT_ERROR, STAT_HEAVY_USED, STAT_LIGHTWEIGHT_USED,
    STAT_OK, STAT_PAGES_CHECKED,
};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Aggregate view of a (possibly unfinished) run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    /// Targets recorded as processed
    pub processed: u64,
    pub ok: u64,
    pub errors: u64,
    pub affiliates_found: u64,
    pub lightweight_used: u64,
    pub heavy_used: u64,
    pub pages_checked: u64,
    /// Error targets eligible for `--retest-errors`
    pub retestable: u64,
    pub config_hash: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl RunStatistics {
    pub fn from_progress(state: &ProgressState) -> Self {
        Self {
            processed: state.processed_tools.len() as u64,
            ok: state.stat(STAT_OK),
            errors: state.stat(STAT_ERROR),
            affiliates_found: state.stat(STAT_AFFILIATE_FOUND),
            lightweight_used: state.stat(STAT_LIGHTWEIGHT_USED),
            heavy_used: state.stat(STAT_HEAVY_USED),
            pages_checked: state.stat(STAT_PAGES_CHECKED),
            retestable: state.error_tools.len() as u64,
            config_hash: state.config_hash.clone(),
            last_updated: state.last_updated,
        }
    }

    /// Share of processed targets whose home page loaded, in percent
    pub fn success_rate(&self) -> f64 {
        percent(self.ok, self.processed)
    }

    /// Share of processed targets with an affiliate program, in percent
    pub fn affiliate_rate(&self) -> f64 {
        percent(self.affiliates_found, self.processed)
    }

    /// Share of targets that needed the browser, in percent
    pub fn heavy_rate(&self) -> f64 {
        percent(self.heavy_used, self.lightweight_used + self.heavy_used)
    }

    pub fn average_pages(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        self.pages_checked as f64 / self.processed as f64
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Renders the statistics as plain text
pub fn format_statistics(stats: &RunStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Affiliate Scout Statistics ===\n");

    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Targets processed: {}", stats.processed);
    let _ = writeln!(
        out,
        "  Reachable: {} ({:.1}%)",
        stats.ok,
        stats.success_rate()
    );
    let _ = writeln!(out, "  Errors: {} ({} awaiting re-test)", stats.errors, stats.retestable);
    let _ = writeln!(
        out,
        "  Affiliate programs found: {} ({:.1}%)",
        stats.affiliates_found,
        stats.affiliate_rate()
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Fetch Methods:");
    let _ = writeln!(out, "  Lightweight: {}", stats.lightweight_used);
    let _ = writeln!(
        out,
        "  Heavy: {} ({:.1}% of targets)",
        stats.heavy_used,
        stats.heavy_rate()
    );
    let _ = writeln!(
        out,
        "  Pages checked: {} ({:.1} per target)",
        stats.pages_checked,
        stats.average_pages()
    );

    if stats.config_hash.is_some() || stats.last_updated.is_some() {
        let _ = writeln!(out);
    }
    if let Some(hash) = &stats.config_hash {
        let _ = writeln!(out, "Config hash: {}", hash);
    }
    if let Some(updated) = stats.last_updated {
        let _ = writeln!(out, "Last updated: {}", updated.to_rfc3339());
    }
    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &RunStatistics) {
    print!("{}", format_statistics(stats));
}
