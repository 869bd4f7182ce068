//! Crawler module for fetching targets and deciding their affiliate status
//!
//! This module contains the core crawling logic, including:
//! - Lightweight (HTTP) and heavy (browser) fetch strategies
//! - HTML parsing and link discovery
//! - The per-target controller with its heavy fallback
//! - Batch scheduling and overall run orchestration

mod browser_pool;
mod controller;
mod coordinator;
mod discover;
mod fetcher;
mod heavy;
mod lightweight;
mod parser;
mod profile;
mod scheduler;
mod throttle;

pub use browser_pool::{BrowserLease, BrowserPool, BrowserSettings};
pub use controller::TargetController;
pub use coordinator::{Orchestrator, RunSummary};
pub use discover::{discover, parse_sitemap};
pub use fetcher::{FetchError, FetchOutcome, FetchStrategy, RetryPolicy, MAX_RETRY_AFTER};
pub use heavy::BrowserFetcher;
pub use lightweight::{looks_like_challenge, HttpFetcher};
pub use parser::{parse_html, resolve_link, Anchor, ParsedPage};
pub use profile::BrowserProfile;
pub use scheduler::BatchScheduler;
pub use throttle::{ResourceMonitor, ResourceSample};

use crate::config::{Config, DetectorConfig};
use crate::detector::{AffiliateDetector, KeywordCatalog};
use crate::model::Target;
use crate::state::ProgressStore;
use crate::storage::ResultSink;
use crate::{ConfigError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builds the detector, loading a custom catalog when one is configured
pub fn build_detector(config: &DetectorConfig) -> std::result::Result<AffiliateDetector, ConfigError> {
    let catalog = match &config.catalog_path {
        Some(path) => {
            tracing::info!("Loading keyword catalog from {}", path.display());
            KeywordCatalog::load(path)?
        }
        None => KeywordCatalog::builtin(),
    };
    Ok(AffiliateDetector::new(catalog, config.min_confidence))
}

/// Assembles the per-target controller from the configuration
///
/// # Returns
///
/// * `Ok((TargetController, Option<Arc<BrowserPool>>))` - The controller and,
///   when the browser is enabled, the pool backing its heavy strategy
/// * `Err(ScoutError)` - The HTTP client or catalog could not be built
pub fn build_controller(config: &Config) -> Result<(TargetController, Option<Arc<BrowserPool>>)> {
    let detector = Arc::new(build_detector(&config.detector)?);
    let lightweight: Arc<dyn FetchStrategy> = Arc::new(HttpFetcher::new(&config.crawler)?);

    let pool = config
        .browser
        .enabled
        .then(|| Arc::new(BrowserPool::new(BrowserSettings::from(&config.browser))));
    let heavy = pool.as_ref().map(|pool| {
        Arc::new(BrowserFetcher::new(pool.clone(), config.browser.simulate_human))
            as Arc<dyn FetchStrategy>
    });

    let controller = TargetController::new(
        lightweight,
        heavy,
        detector,
        config.crawler.max_pages,
        config.crawler.sitemap,
    );
    Ok((controller, pool))
}

/// Runs a complete crawl over `targets`
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the fetch strategies and the detector
/// 2. Skip targets already in the progress store
/// 3. Crawl the rest in batches
/// 4. Close every browser before returning
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `targets` - Target list in input order
/// * `sink` - Result sink to append to
/// * `progress` - Progress store shared with the caller
/// * `limit` - Process at most this many pending targets
/// * `cancel` - Token wired to Ctrl-C
pub async fn crawl(
    config: &Config,
    targets: Vec<Target>,
    sink: Box<dyn ResultSink + Send>,
    progress: Arc<ProgressStore>,
    limit: Option<usize>,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let (controller, pool) = build_controller(config)?;

    let mut orchestrator = Orchestrator::new(
        controller,
        sink,
        progress,
        config.crawler.clone(),
        config.throttle.clone(),
        cancel,
    )
    .with_limit(limit);
    if let Some(pool) = pool {
        orchestrator = orchestrator.with_browser_pool(pool);
    }

    Ok(orchestrator.run(targets).await)
}
