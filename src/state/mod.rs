//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: phases of a single target's crawl pass
//! - `ProgressStore`: resumable record of completed targets and counters

mod crawl_phase;
mod progress;

pub use crawl_phase::{CrawlPhase, InvalidTransition, PhaseTracker};
pub use progress::{
    ErrorDetail, ProgressError, ProgressState, ProgressStore, STAT_AFFILIATE_FOUND, STAT_ERROR,
    STAT_HEAVY_USED, STAT_LIGHTWEIGHT_USED, STAT_OK, STAT_PAGES_CHECKED,
};
