//! Output module for reporting on crawl results
//!
//! This module provides:
//! - Progress statistics (`--stats`)
//! - Markdown summary export (`--export-summary`)

mod markdown;
mod stats;

pub use markdown::{format_markdown_summary, generate_markdown_summary, latest_per_target};
pub use stats::{format_statistics, print_statistics, RunStatistics};

use thiserror::Error;

/// Errors that can occur while producing reports
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result sink error: {0}")]
    Sink(#[from] crate::storage::SinkError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
