//! Crawl orchestrator - fans targets out across controllers
//!
//! This module contains the run loop that:
//! - Skips targets already recorded in the progress store
//! - Runs each batch under a bounded worker pool
//! - Writes every completed result to the sink, then to the progress store
//! - Pauses between batches and backs off under resource pressure
//! - Stops dispatching on cancellation and tears the browser pool down

use super::browser_pool::BrowserPool;
use super::controller::TargetController;
use super::scheduler::BatchScheduler;
use super::throttle::ResourceMonitor;
use crate::config::{CrawlerConfig, ThrottleConfig};
use crate::model::{CrawlResult, FailureKind, Target};
use crate::state::ProgressStore;
use crate::storage::ResultSink;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters for a single run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Targets in the input list
    pub total: usize,
    /// Targets skipped because they were already processed
    pub skipped: usize,
    /// Targets completed and recorded during this run
    pub processed: usize,
    pub affiliates_found: usize,
    pub errors: usize,
    /// Results that could not be written to the sink
    pub persistence_failures: usize,
    pub cancelled: bool,
}

/// Drives a whole run
pub struct Orchestrator {
    controller: TargetController,
    sink: Box<dyn ResultSink + Send>,
    progress: Arc<ProgressStore>,
    crawler: CrawlerConfig,
    throttle: ThrottleConfig,
    browser_pool: Option<Arc<BrowserPool>>,
    cancel: CancellationToken,
    limit: Option<usize>,
}

impl Orchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `controller` - Per-target pipeline, cloned into every task
    /// * `sink` - Where results are appended
    /// * `progress` - Resumable progress store
    /// * `crawler` - Concurrency and batching settings
    /// * `throttle` - Resource limits checked between batches
    /// * `cancel` - Token that stops the run
    pub fn new(
        controller: TargetController,
        sink: Box<dyn ResultSink + Send>,
        progress: Arc<ProgressStore>,
        crawler: CrawlerConfig,
        throttle: ThrottleConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            controller,
            sink,
            progress,
            crawler,
            throttle,
            browser_pool: None,
            cancel,
            limit: None,
        }
    }

    /// Browser pool to close when the run ends
    pub fn with_browser_pool(mut self, pool: Arc<BrowserPool>) -> Self {
        self.browser_pool = Some(pool);
        self
    }

    /// Processes at most `limit` pending targets
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Runs every pending target to completion or until cancelled
    ///
    /// Teardown (browser pool shutdown, final progress flush) happens on every
    /// exit path.
    pub async fn run(&mut self, targets: Vec<Target>) -> RunSummary {
        let snapshot = self.progress.snapshot().await;
        let total = targets.len();
        let mut scheduler =
            BatchScheduler::new(targets, &snapshot, self.limit, self.crawler.batch_size);

        let mut summary = RunSummary {
            total,
            skipped: scheduler.skipped(),
            ..RunSummary::default()
        };

        info!(
            "{} targets, {} already processed, {} to crawl in {} batch(es)",
            total,
            summary.skipped,
            scheduler.remaining(),
            scheduler.total_batches()
        );

        let start = Instant::now();
        let mut monitor = ResourceMonitor::new();

        while let Some(batch) = scheduler.next_batch() {
            if self.cancel.is_cancelled() {
                break;
            }

            info!(
                "Starting batch {}/{} ({} targets)",
                scheduler.batches_issued(),
                scheduler.total_batches(),
                batch.len()
            );
            self.run_batch(batch, &mut summary).await;

            let elapsed = start.elapsed().as_secs_f64();
            info!(
                "Batch {} done: {} processed, {} affiliates, {:.2} targets/sec",
                scheduler.batches_issued(),
                summary.processed,
                summary.affiliates_found,
                if elapsed > 0.0 { summary.processed as f64 / elapsed } else { 0.0 }
            );

            if scheduler.is_empty() || self.cancel.is_cancelled() {
                break;
            }
            self.pause_between_batches(&mut monitor).await;
        }

        summary.cancelled = self.cancel.is_cancelled();
        self.teardown().await;

        info!(
            "Run finished in {:?}: {} processed, {} affiliates, {} errors{}",
            start.elapsed(),
            summary.processed,
            summary.affiliates_found,
            summary.errors,
            if summary.cancelled { " (interrupted)" } else { "" }
        );
        summary
    }

    async fn run_batch(&mut self, batch: Vec<Target>, summary: &mut RunSummary) {
        let permits = Arc::new(Semaphore::new(self.crawler.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for target in batch {
            let controller = self.controller.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                controller.run(&target).await
            });
        }

        let cancel = self.cancel.clone();
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                joined = tasks.join_next() => Some(joined),
            };

            match joined {
                None => {
                    info!("Cancellation requested, aborting {} in-flight target(s)", tasks.len());
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    break;
                }
                Some(None) => break,
                Some(Some(Ok(result))) => self.complete(result, summary).await,
                Some(Some(Err(e))) if e.is_cancelled() => {}
                Some(Some(Err(e))) => error!("Target task panicked: {}", e),
            }
        }
    }

    /// Handles one completed target: sink first, then progress
    async fn complete(&mut self, result: CrawlResult, summary: &mut RunSummary) {
        info!(
            "[{}] status={} affiliate={} method={} pages={} confidence={:.2}",
            result.tool_name,
            result.status_code,
            if result.affiliate_found { "yes" } else { "no" },
            result.method_used,
            result.pages_checked,
            result.confidence_score
        );

        if let Err(e) = self.sink.append(&result, Utc::now()) {
            warn!(
                "{} failure for '{}', left unrecorded for the next run: {}",
                FailureKind::Persistence,
                result.tool_name,
                e
            );
            summary.persistence_failures += 1;
            return;
        }

        match self.progress.record(&result).await {
            Ok(true) => {}
            Ok(false) => debug!("'{}' was already recorded", result.tool_name),
            Err(e) => warn!(
                "{} failure while saving progress for '{}': {}",
                FailureKind::Persistence,
                result.tool_name,
                e
            ),
        }

        summary.processed += 1;
        if result.affiliate_found {
            summary.affiliates_found += 1;
        }
        if !result.is_ok() {
            summary.errors += 1;
        }
    }

    async fn pause_between_batches(&self, monitor: &mut ResourceMonitor) {
        let mut pause = Duration::from_millis(self.crawler.batch_pause_ms);

        let sample = monitor.sample();
        if sample.exceeds(&self.throttle) {
            warn!(
                "Resource pressure (rss {} MB, cpu {:.0}%), backing off {}s",
                sample.rss_mb, sample.cpu_percent, self.throttle.backoff_secs
            );
            pause += Duration::from_secs(self.throttle.backoff_secs);
        }

        if pause.is_zero() {
            return;
        }
        debug!("Pausing {:?} before the next batch", pause);
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(pause) => {}
        }
    }

    async fn teardown(&self) {
        if let Some(pool) = &self.browser_pool {
            pool.shutdown().await;
        }
        if let Err(e) = self.progress.flush().await {
            error!("Failed to flush progress: {}", e);
        }
    }
}
