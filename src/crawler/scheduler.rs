//! Batch scheduling of pending targets
//!
//! This module handles:
//! - Filtering out targets already recorded in the progress store
//! - Truncating the work list for `--limit` runs
//! - Handing out fixed-size batches in input order

use crate::model::Target;
use crate::state::ProgressState;
use std::collections::VecDeque;

/// Splits pending targets into batches
#[derive(Debug)]
pub struct BatchScheduler {
    pending: VecDeque<Target>,
    batch_size: usize,
    skipped: usize,
    batches_issued: usize,
}

impl BatchScheduler {
    /// Creates a scheduler over the targets not yet processed
    ///
    /// # Arguments
    ///
    /// * `targets` - Full target list in input order
    /// * `progress` - Current progress, used to skip finished targets
    /// * `limit` - Process at most this many pending targets
    /// * `batch_size` - Targets per batch
    pub fn new(
        targets: Vec<Target>,
        progress: &ProgressState,
        limit: Option<usize>,
        batch_size: usize,
    ) -> Self {
        let total = targets.len();
        let mut pending: VecDeque<Target> = targets
            .into_iter()
            .filter(|t| !progress.is_processed(&t.name))
            .collect();
        let skipped = total - pending.len();

        if let Some(limit) = limit {
            pending.truncate(limit);
        }

        Self {
            pending,
            batch_size: batch_size.max(1),
            skipped,
            batches_issued: 0,
        }
    }

    /// Next batch, or `None` when everything has been handed out
    pub fn next_batch(&mut self) -> Option<Vec<Target>> {
        if self.pending.is_empty() {
            return None;
        }
        let take = self.batch_size.min(self.pending.len());
        self.batches_issued += 1;
        Some(self.pending.drain(..take).collect())
    }

    /// Targets not yet handed out
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Targets skipped because they were already processed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn batches_issued(&self) -> usize {
        self.batches_issued
    }

    /// Total number of batches for the current pending list
    pub fn total_batches(&self) -> usize {
        self.batches_issued + self.pending.len().div_ceil(self.batch_size)
    }
}
