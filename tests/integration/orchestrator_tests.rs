//! Integration tests for run orchestration
//!
//! A scripted in-memory fetch strategy stands in for both the HTTP client and
//! the browser, so these tests exercise fallback, persistence and resume
//! behavior without any network access.

use affiliate_scout::config::{CrawlerConfig, ThrottleConfig};
use affiliate_scout::crawler::{FetchError, FetchOutcome, FetchStrategy, Orchestrator, TargetController};
use affiliate_scout::model::{CrawlResult, FetchMethod, StatusCategory, Target};
use affiliate_scout::state::{ProgressStore, STAT_HEAVY_USED, STAT_LIGHTWEIGHT_USED};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use affiliate_scout::storage::{ResultSink, SinkError, SinkRecord, SinkResult};
use affiliate_scout::AffiliateDetector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Serves canned pages per URL and counts requests
struct ScriptedFetcher {
    method: FetchMethod,
    pages: HashMap<String, Result<String, FetchError>>,
    fallback: Result<String, FetchError>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new(method: FetchMethod, fallback: Result<String, FetchError>) -> Self {
        Self {
            method,
            pages: HashMap::new(),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_page(mut self, url: &str, body: Result<String, FetchError>) -> Self {
        self.pages.insert(url.to_string(), body);
        self
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl FetchStrategy for ScriptedFetcher {
    fn method(&self) -> FetchMethod {
        self.method
    }

    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let body = self.pages.get(url).unwrap_or(&self.fallback).clone()?;
        Ok(FetchOutcome {
            status: 200,
            body,
            final_url: url.to_string(),
        })
    }
}

/// Answers every URL with an affiliate page after a delay, tracking overlap
#[derive(Default)]
struct GaugedFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl FetchStrategy for GaugedFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Lightweight
    }

    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(FetchOutcome {
            status: 200,
            body: affiliate_page(),
            final_url: url.to_string(),
        })
    }
}

/// Never answers for hosts containing "stuck"; everything else is an affiliate page
struct StallingFetcher;

#[async_trait]
impl FetchStrategy for StallingFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Lightweight
    }

    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        if url.contains("stuck") {
            std::future::pending::<()>().await;
        }
        Ok(FetchOutcome {
            status: 200,
            body: affiliate_page(),
            final_url: url.to_string(),
        })
    }
}

/// Sink keeping rows in memory, shared with the test
#[derive(Clone, Default)]
struct MemorySink {
    rows: Arc<Mutex<Vec<SinkRecord>>>,
    fail_for: Option<String>,
}

impl ResultSink for MemorySink {
    fn append(&mut self, result: &CrawlResult, crawled_at: DateTime<Utc>) -> SinkResult<()> {
        if self.fail_for.as_deref() == Some(result.tool_name.as_str()) {
            return Err(SinkError::Io(std::io::Error::other("disk full")));
        }
        self.rows.lock().unwrap().push(SinkRecord {
            result: result.clone(),
            crawled_at,
        });
        Ok(())
    }

    fn load_all(&self) -> SinkResult<Vec<SinkRecord>> {
        Ok(self.rows.lock().unwrap().clone())
    }
}

fn crawler_config(max_pages: u32, batch_size: usize) -> CrawlerConfig {
    CrawlerConfig {
        max_pages,
        concurrency: 3,
        batch_size,
        batch_pause_ms: 0,
        sitemap: false,
        ..CrawlerConfig::default()
    }
}

fn relaxed_throttle() -> ThrottleConfig {
    ThrottleConfig {
        memory_limit_mb: 1_000_000,
        cpu_limit_percent: 10_000.0,
        backoff_secs: 0,
    }
}

fn plain_page(links: usize) -> String {
    let anchors: String = (0..links)
        .map(|i| format!(r#"<a href="/docs/{i}">Docs {i}</a>"#))
        .collect();
    format!("<html><body><p>A tool for teams.</p>{anchors}</body></html>")
}

fn affiliate_page() -> String {
    r#"<html><body><a href="/affiliates">Become an Affiliate</a></body></html>"#.to_string()
}

struct Harness {
    light: Arc<ScriptedFetcher>,
    heavy: Arc<ScriptedFetcher>,
    sink: MemorySink,
    progress: Arc<ProgressStore>,
    _dir: TempDir,
}

impl Harness {
    async fn new(light: ScriptedFetcher, heavy: ScriptedFetcher) -> Self {
        let dir = TempDir::new().unwrap();
        let progress = Arc::new(ProgressStore::open(dir.path().join("progress.json")).await);
        Self {
            light: Arc::new(light),
            heavy: Arc::new(heavy),
            sink: MemorySink::default(),
            progress,
            _dir: dir,
        }
    }

    fn orchestrator(&self, max_pages: u32, batch_size: usize, cancel: CancellationToken) -> Orchestrator {
        let controller = TargetController::new(
            self.light.clone(),
            Some(self.heavy.clone() as Arc<dyn FetchStrategy>),
            Arc::new(AffiliateDetector::default()),
            max_pages,
            false,
        );
        Orchestrator::new(
            controller,
            Box::new(self.sink.clone()),
            self.progress.clone(),
            crawler_config(max_pages, batch_size),
            relaxed_throttle(),
            cancel,
        )
    }

    fn rows(&self) -> Vec<SinkRecord> {
        self.sink.rows.lock().unwrap().clone()
    }
}

fn targets(n: usize) -> Vec<Target> {
    (0..n)
        .map(|i| Target::new(format!("tool-{i}"), format!("tool{i}.io")))
        .collect()
}

#[tokio::test]
async fn test_every_target_yields_one_result() {
    let harness = Harness::new(
        ScriptedFetcher::new(FetchMethod::Lightweight, Ok(plain_page(0))),
        ScriptedFetcher::new(FetchMethod::Heavy, Ok(plain_page(0))),
    )
    .await;

    let mut list = targets(7);
    list.push(Target::new("Broken", "not a url"));
    list.push(Target::new("Empty", ""));

    let summary = harness
        .orchestrator(3, 4, CancellationToken::new())
        .run(list)
        .await;

    assert_eq!(summary.processed, 9);
    let rows = harness.rows();
    assert_eq!(rows.len(), 9);

    let state = harness.progress.snapshot().await;
    assert_eq!(state.processed_tools.len(), 9);
    assert!(state.error_tools.contains("Broken"));
    assert!(state.error_tools.contains("Empty"));
}

#[tokio::test]
async fn test_lightweight_detection_never_invokes_heavy() {
    let harness = Harness::new(
        ScriptedFetcher::new(FetchMethod::Lightweight, Ok(affiliate_page())),
        ScriptedFetcher::new(FetchMethod::Heavy, Ok(plain_page(0))),
    )
    .await;

    let summary = harness
        .orchestrator(5, 100, CancellationToken::new())
        .run(targets(5))
        .await;

    assert_eq!(summary.affiliates_found, 5);
    assert_eq!(harness.heavy.call_count(), 0);
    assert!(harness
        .rows()
        .iter()
        .all(|r| r.result.method_used == FetchMethod::Lightweight && r.result.pages_checked == 1));

    let state = harness.progress.snapshot().await;
    assert_eq!(state.stat(STAT_LIGHTWEIGHT_USED), 5);
    assert_eq!(state.stat(STAT_HEAVY_USED), 0);
}

#[tokio::test]
async fn test_timeouts_fall_back_to_heavy_and_exhaust_budget() {
    let harness = Harness::new(
        ScriptedFetcher::new(FetchMethod::Lightweight, Err(FetchError::Timeout)),
        ScriptedFetcher::new(FetchMethod::Heavy, Ok(plain_page(0)))
            .with_page("https://slow.io", Ok(plain_page(20))),
    )
    .await;

    harness
        .orchestrator(6, 100, CancellationToken::new())
        .run(vec![Target::new("Slow", "slow.io")])
        .await;

    let rows = harness.rows();
    assert_eq!(rows.len(), 1);
    let result = &rows[0].result;
    assert_eq!(result.method_used, FetchMethod::Heavy);
    assert_eq!(result.pages_checked, 6);
    assert!(!result.affiliate_found);
    assert_eq!(result.status_code, StatusCategory::Http(200));
    assert_eq!(harness.heavy.call_count(), 6);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = Harness::new(
        ScriptedFetcher::new(FetchMethod::Lightweight, Ok(affiliate_page())),
        ScriptedFetcher::new(FetchMethod::Heavy, Ok(plain_page(0))),
    )
    .await;

    harness
        .orchestrator(5, 100, CancellationToken::new())
        .run(targets(4))
        .await;
    let fetches = harness.light.call_count();
    let stats = harness.progress.snapshot().await.stats;

    let summary = harness
        .orchestrator(5, 100, CancellationToken::new())
        .run(targets(4))
        .await;

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped, 4);
    assert_eq!(harness.light.call_count(), fetches);
    assert_eq!(harness.rows().len(), 4);
    assert_eq!(harness.progress.snapshot().await.stats, stats);
}

#[tokio::test]
async fn test_failed_append_leaves_target_for_next_run() {
    let mut harness = Harness::new(
        ScriptedFetcher::new(FetchMethod::Lightweight, Ok(affiliate_page())),
        ScriptedFetcher::new(FetchMethod::Heavy, Ok(plain_page(0))),
    )
    .await;
    harness.sink.fail_for = Some("tool-1".to_string());

    let summary = harness
        .orchestrator(5, 100, CancellationToken::new())
        .run(targets(3))
        .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.persistence_failures, 1);
    assert!(!harness.progress.is_processed("tool-1").await);
    assert!(harness.progress.is_processed("tool-0").await);
}

#[tokio::test]
async fn test_retest_errors_reprocesses_failed_targets() {
    let harness = Harness::new(
        ScriptedFetcher::new(FetchMethod::Lightweight, Ok(affiliate_page()))
            .with_page("https://down.io", Err(FetchError::Connection("refused".into()))),
        ScriptedFetcher::new(FetchMethod::Heavy, Err(FetchError::Automation("crashed".into()))),
    )
    .await;

    let list = vec![Target::new("Up", "up.io"), Target::new("Down", "down.io")];
    harness
        .orchestrator(5, 100, CancellationToken::new())
        .run(list.clone())
        .await;
    assert!(harness.progress.snapshot().await.error_tools.contains("Down"));

    let reset = harness.progress.retest_errors().await.unwrap();
    assert_eq!(reset, vec!["Down".to_string()]);

    let summary = harness
        .orchestrator(5, 100, CancellationToken::new())
        .run(list)
        .await;
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.skipped, 1);

    let state = harness.progress.snapshot().await;
    assert_eq!(state.stat("ERROR"), 1);
    assert_eq!(state.stat("OK"), 1);
}

#[tokio::test]
async fn test_cancelled_run_dispatches_nothing() {
    let harness = Harness::new(
        ScriptedFetcher::new(FetchMethod::Lightweight, Ok(plain_page(0))),
        ScriptedFetcher::new(FetchMethod::Heavy, Ok(plain_page(0))),
    )
    .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = harness.orchestrator(5, 100, cancel).run(targets(3)).await;

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 0);
    assert_eq!(harness.light.call_count(), 0);
    assert!(harness.progress.path().exists());
}

#[tokio::test]
async fn test_limit_caps_pending_targets() {
    let harness = Harness::new(
        ScriptedFetcher::new(FetchMethod::Lightweight, Ok(affiliate_page())),
        ScriptedFetcher::new(FetchMethod::Heavy, Ok(plain_page(0))),
    )
    .await;

    let summary = harness
        .orchestrator(5, 100, CancellationToken::new())
        .with_limit(Some(2))
        .run(targets(5))
        .await;

    assert_eq!(summary.processed, 2);
    assert_eq!(harness.rows().len(), 2);
}

fn lightweight_only_orchestrator(
    fetcher: Arc<dyn FetchStrategy>,
    sink: MemorySink,
    progress: Arc<ProgressStore>,
    cancel: CancellationToken,
) -> Orchestrator {
    let controller = TargetController::new(
        fetcher,
        None,
        Arc::new(AffiliateDetector::default()),
        5,
        false,
    );
    Orchestrator::new(
        controller,
        Box::new(sink),
        progress,
        crawler_config(5, 100),
        relaxed_throttle(),
        cancel,
    )
}

#[tokio::test]
async fn test_in_flight_targets_never_exceed_concurrency() {
    let dir = TempDir::new().unwrap();
    let progress = Arc::new(ProgressStore::open(dir.path().join("progress.json")).await);
    let fetcher = Arc::new(GaugedFetcher::default());
    let sink = MemorySink::default();

    let summary = lightweight_only_orchestrator(
        fetcher.clone(),
        sink.clone(),
        progress,
        CancellationToken::new(),
    )
    .run(targets(12))
    .await;

    assert_eq!(summary.processed, 12);
    let peak = fetcher.peak.load(Ordering::SeqCst);
    let concurrency = crawler_config(5, 100).concurrency;
    assert!(peak <= concurrency, "peak {peak} exceeded concurrency {concurrency}");
    assert!(peak > 1, "targets were never crawled in parallel");
    assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancel_mid_batch_keeps_completed_targets_only() {
    let dir = TempDir::new().unwrap();
    let progress_path = dir.path().join("progress.json");
    let progress = Arc::new(ProgressStore::open(&progress_path).await);
    let sink = MemorySink::default();
    let cancel = CancellationToken::new();

    let list = vec![
        Target::new("Fast-A", "fast-a.io"),
        Target::new("Stuck", "stuck.io"),
        Target::new("Fast-B", "fast-b.io"),
    ];

    let watcher = {
        let progress = progress.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while !(progress.is_processed("Fast-A").await && progress.is_processed("Fast-B").await) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            cancel.cancel();
        })
    };

    let mut orchestrator = lightweight_only_orchestrator(
        Arc::new(StallingFetcher),
        sink.clone(),
        progress.clone(),
        cancel,
    );
    let summary = tokio::time::timeout(Duration::from_secs(10), orchestrator.run(list))
        .await
        .expect("run did not stop after cancellation");
    watcher.await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.processed, 2);

    let names: Vec<String> = sink
        .rows
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.result.tool_name.clone())
        .collect();
    assert_eq!(names.len(), 2);
    assert!(!names.contains(&"Stuck".to_string()));

    let on_disk = ProgressStore::load_state(&progress_path).await;
    assert!(on_disk.is_processed("Fast-A"));
    assert!(on_disk.is_processed("Fast-B"));
    assert!(!on_disk.is_processed("Stuck"));
    assert_eq!(on_disk.processed_tools.len(), 2);
}
