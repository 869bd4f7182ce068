//! Lightweight fetch strategy: a plain HTTP GET, no JavaScript
//!
//! - Redirects are followed by reqwest (at most 10 hops)
//! - Every attempt presents a fresh [`BrowserProfile`]
//! - Timeouts and connection failures are retried with exponential backoff
//! - 429 and 503 are retried with a longer backoff honoring `Retry-After`
//! - Challenge walls are reported as [`FetchError::Blocked`]

use super::fetcher::{FetchError, FetchOutcome, FetchStrategy, RetryPolicy};
use super::profile::{BrowserProfile, ACCEPT_HTML};
use crate::config::CrawlerConfig;
use crate::model::FetchMethod;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, RETRY_AFTER, USER_AGENT};
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

const MAX_REDIRECTS: usize = 10;

/// Bodies larger than this are real pages even if they mention a captcha
const CHALLENGE_MAX_BODY: usize = 15_000;

const CHALLENGE_TITLES: &[&str] = &[
    "just a moment...",
    "attention required",
    "access denied",
    "please wait while we verify",
    "ddos-guard",
];

const CHALLENGE_MARKERS: &[&str] = &[
    "/cdn-cgi/challenge-platform/",
    "cf-browser-verification",
    "cf_chl_opt",
    "_incapsula_resource",
];

/// A failed attempt and the server's requested wait, if any
struct AttemptFailure {
    error: FetchError,
    retry_after: Option<Duration>,
}

impl From<FetchError> for AttemptFailure {
    fn from(error: FetchError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// HTTP fetcher built on a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
    sitemap_timeout: Duration,
}

impl HttpFetcher {
    /// Builds a fetcher from the crawler settings
    ///
    /// # Returns
    ///
    /// * `Ok(HttpFetcher)` - Ready to fetch
    /// * `Err(reqwest::Error)` - The HTTP client could not be built
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .redirect(Policy::limited(MAX_REDIRECTS))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
            sitemap_timeout: Duration::from_secs(config.sitemap_timeout_secs),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchOutcome, AttemptFailure> {
        let profile = BrowserProfile::random();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &profile.user_agent)
            .header(ACCEPT, ACCEPT_HTML)
            .header(ACCEPT_LANGUAGE, &profile.accept_language)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let final_url = response.url().to_string();

        if !(status.is_success() || status.is_redirection()) {
            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            let error = if looks_like_challenge(&body) {
                FetchError::Blocked {
                    status: Some(status.as_u16()),
                }
            } else {
                FetchError::Http {
                    code: status.as_u16(),
                }
            };
            return Err(AttemptFailure { error, retry_after });
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        if looks_like_challenge(&body) {
            return Err(FetchError::Blocked { status: None }.into());
        }

        Ok(FetchOutcome {
            status: status.as_u16(),
            body,
            final_url,
        })
    }
}

#[async_trait]
impl FetchStrategy for HttpFetcher {
    fn method(&self) -> FetchMethod {
        FetchMethod::Lightweight
    }

    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let mut attempt = 0;
        loop {
            let failure = match self.fetch_once(url).await {
                Ok(outcome) => return Ok(outcome),
                Err(failure) => failure,
            };

            let retryable = failure.error.is_transient();
            if !retryable || attempt + 1 >= self.retry.max_attempts {
                debug!(
                    "Fetch of {} failed after {} attempt(s): {}",
                    url,
                    attempt + 1,
                    failure.error
                );
                return Err(failure.error);
            }

            let delay = self
                .retry
                .delay_for(&failure.error, attempt, failure.retry_after);
            debug!(
                "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                attempt + 1,
                self.retry.max_attempts,
                url,
                failure.error,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_sitemap(&self, base: &Url) -> Option<String> {
        let sitemap_url = base.join("/sitemap.xml").ok()?;
        let response = self
            .client
            .get(sitemap_url.as_str())
            .timeout(self.sitemap_timeout)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            debug!("No sitemap at {} ({})", sitemap_url, response.status());
            return None;
        }

        response.text().await.ok()
    }
}

/// Maps a reqwest failure onto the fetch error taxonomy
fn classify_reqwest_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_redirect() {
        FetchError::Malformed(format!("redirect limit exceeded: {}", error))
    } else if error.is_body() || error.is_decode() {
        FetchError::Malformed(error.to_string())
    } else {
        FetchError::Connection(error.to_string())
    }
}

/// Reads a numeric `Retry-After` header; HTTP-date values are ignored
fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Detects bot-challenge interstitials
pub fn looks_like_challenge(body: &str) -> bool {
    let lower = body.to_lowercase();

    if CHALLENGE_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }

    if let Some(title) = extract_title(&lower) {
        if CHALLENGE_TITLES.iter().any(|t| title.contains(t)) {
            return true;
        }
    }

    body.len() < CHALLENGE_MAX_BODY && lower.contains("captcha") && !lower.contains("<form")
}

fn extract_title(lower_html: &str) -> Option<&str> {
    let start = lower_html.find("<title")?;
    let open_end = lower_html[start..].find('>')? + start + 1;
    let close = lower_html[open_end..].find("</title>")? + open_end;
    Some(lower_html[open_end..close].trim())
}
