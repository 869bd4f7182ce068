//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive the
//! lightweight strategy, the controller and a full run end-to-end.

use affiliate_scout::config::{Config, CrawlerConfig, OutputFormat};
use affiliate_scout::crawler::{crawl, FetchStrategy, HttpFetcher, TargetController};
use affiliate_scout::model::{FetchMethod, StatusCategory, Target};
use affiliate_scout::state::{ProgressStore, STAT_AFFILIATE_FOUND, STAT_ERROR, STAT_OK};
use affiliate_scout::storage::{load_records, open_sink};
use affiliate_scout::AffiliateDetector;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Crawler settings with short delays for testing
fn test_crawler_config() -> CrawlerConfig {
    CrawlerConfig {
        max_pages: 5,
        fetch_timeout_secs: 5,
        max_retries: 3,
        retry_base_delay_ms: 1,
        concurrency: 4,
        batch_size: 100,
        batch_pause_ms: 0,
        sitemap: true,
        sitemap_timeout_secs: 2,
    }
}

/// Creates a lightweight-only configuration writing into `dir`
fn create_test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.crawler = test_crawler_config();
    config.browser.enabled = false;
    config.throttle.cpu_limit_percent = 10_000.0;
    config.output.format = OutputFormat::Csv;
    config.output.results_path = dir.path().join("results.csv");
    config.output.progress_path = dir.path().join("progress.json");
    config.output.summary_path = dir.path().join("summary.md");
    config
}

fn lightweight_controller() -> TargetController {
    let fetcher: Arc<dyn FetchStrategy> =
        Arc::new(HttpFetcher::new(&test_crawler_config()).expect("Failed to build HTTP client"));
    TargetController::new(
        fetcher,
        None,
        Arc::new(AffiliateDetector::default()),
        5,
        true,
    )
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!("<html><head><title>Site</title></head><body>{body}</body></html>"))
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_anchor_on_home_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<nav><a href="/pricing">Pricing</a><a href="/affiliates">Become an Affiliate</a></nav>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = lightweight_controller()
        .run(&Target::new("Acme", mock_server.uri()))
        .await;

    assert!(result.affiliate_found);
    assert_eq!(result.affiliate_url, mock_server.uri());
    assert_eq!(result.pages_checked, 1);
    assert_eq!(result.method_used, FetchMethod::Lightweight);
    assert_eq!(result.status_code, StatusCategory::Http(200));
    assert!(result.keywords_found.contains("become an affiliate"));
}

#[tokio::test]
async fn test_program_found_through_sitemap() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<p>We build developer tools.</p>"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<?xml version="1.0"?><urlset><url><loc>{base_url}/about</loc></url><url><loc>{base_url}/partner-program</loc></url><url><loc>https://elsewhere.org/partners</loc></url></urlset>"#
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/partner-program"))
        .respond_with(html(
            "<h1>Our affiliate program</h1><p>Earn commission on every customer you refer. Contact partners@devtools.io</p>",
        ))
        .mount(&mock_server)
        .await;

    let result = lightweight_controller()
        .run(&Target::new("DevTools", base_url.clone()))
        .await;

    assert!(result.affiliate_found);
    assert_eq!(result.affiliate_url, format!("{}/partner-program", base_url));
    // the priority link is visited before /about
    assert_eq!(result.pages_checked, 2);
    assert!(result.emails.contains("partners@devtools.io"));
}

#[tokio::test]
async fn test_invalid_url_is_never_fetched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = lightweight_controller()
        .run(&Target::new("Broken", "not a url"))
        .await;

    assert_eq!(result.status_code, StatusCategory::Error);
    assert_eq!(result.pages_checked, 0);
    assert!(!result.affiliate_found);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = lightweight_controller()
        .run(&Target::new("Missing", mock_server.uri()))
        .await;

    assert_eq!(result.status_code, StatusCategory::Http(404));
    assert_eq!(result.pages_checked, 0);
}

#[tokio::test]
async fn test_service_unavailable_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let result = lightweight_controller()
        .run(&Target::new("Busy", mock_server.uri()))
        .await;

    assert_eq!(result.status_code, StatusCategory::Http(503));
    assert_eq!(result.pages_checked, 0);
}

#[tokio::test]
async fn test_challenge_wall_is_blocked() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><head><title>Just a moment...</title></head><body></body></html>"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = lightweight_controller()
        .run(&Target::new("Walled", mock_server.uri()))
        .await;

    assert_eq!(result.status_code, StatusCategory::Error);
    assert_eq!(result.pages_checked, 0);
}

#[tokio::test]
async fn test_full_run_then_resume_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<a href="/partners">Partner with us</a>"#))
        .mount(&mock_server)
        .await;

    let targets = vec![
        Target::new("Acme", base_url.clone()),
        Target::new("Broken", "nan"),
        Target::new("Ghost", "http://127.0.0.1:9"),
    ];

    let progress = Arc::new(ProgressStore::open(&config.output.progress_path).await);
    let summary = crawl(
        &config,
        targets.clone(),
        open_sink(&config.output).unwrap(),
        progress.clone(),
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.affiliates_found, 1);
    assert_eq!(summary.errors, 2);

    let records = load_records(&config.output).unwrap();
    assert_eq!(records.len(), 3);
    let ghost = records
        .iter()
        .find(|r| r.result.tool_name == "Ghost")
        .unwrap();
    assert_eq!(ghost.result.status_code, StatusCategory::Unreachable);

    let state = ProgressStore::load_state(&config.output.progress_path).await;
    assert_eq!(state.processed_tools.len(), 3);
    assert_eq!(state.stat(STAT_OK), 1);
    assert_eq!(state.stat(STAT_ERROR), 2);
    assert_eq!(state.stat(STAT_AFFILIATE_FOUND), 1);

    let requests_before = mock_server.received_requests().await.unwrap().len();

    // a second run over the same list fetches nothing and writes nothing
    let progress = Arc::new(ProgressStore::open(&config.output.progress_path).await);
    let summary = crawl(
        &config,
        targets,
        open_sink(&config.output).unwrap(),
        progress,
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.skipped, 3);
    assert_eq!(load_records(&config.output).unwrap().len(), 3);
    assert_eq!(
        mock_server.received_requests().await.unwrap().len(),
        requests_before
    );
}
