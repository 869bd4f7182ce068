//! Fetch strategy contract shared by the lightweight and heavy fetchers
//!
//! A fetch either yields the page body or a [`FetchError`] describing why it
//! failed. Failures are data: the controller turns them into result fields.

use crate::model::{FailureKind, FetchMethod, StatusCategory};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longest wait honored from a `Retry-After` header
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Backoff multiplier for 429 and 503 responses
const THROTTLED_MULTIPLIER: u32 = 4;

const JITTER: f64 = 0.25;

/// A successfully fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// HTTP status code of the final response
    pub status: u16,
    /// Page body (rendered HTML for the heavy strategy)
    pub body: String,
    /// Final URL after redirects
    pub final_url: String,
}

/// Why a fetch failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP status {code}")]
    Http { code: u16 },

    #[error("blocked by a challenge page")]
    Blocked { status: Option<u16> },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("browser automation failed: {0}")]
    Automation(String),
}

impl FetchError {
    /// Timeouts, connection failures, 429 and 503 are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connection(_) | Self::Http { code: 429 | 503 }
        )
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Automation(_) => FailureKind::Automation,
            _ if self.is_transient() => FailureKind::TransientFetch,
            _ => FailureKind::PermanentFetch,
        }
    }

    /// Status recorded in the result when the home page fetch fails
    pub fn status_category(&self) -> StatusCategory {
        match self {
            Self::Connection(_) => StatusCategory::Unreachable,
            Self::Timeout | Self::Automation(_) | Self::Malformed(_) => StatusCategory::Error,
            Self::Http { code } => StatusCategory::Http(*code),
            Self::Blocked { status: Some(code) } => StatusCategory::Http(*code),
            Self::Blocked { status: None } => StatusCategory::Error,
        }
    }
}

/// A way of retrieving page content for a URL
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Which strategy this is, recorded as `method_used`
    fn method(&self) -> FetchMethod;

    /// Fetches a page
    async fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError>;

    /// Fetches `/sitemap.xml` for a site, if this strategy supports it
    ///
    /// Failures are swallowed; the sitemap is an optional link source.
    async fn fetch_sitemap(&self, _base: &Url) -> Option<String> {
        None
    }
}

/// Exponential backoff with jitter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Unjittered delay after a failed attempt: `base × 2^attempt`
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }

    /// Delay after a failed attempt, jittered by ±25 %
    pub fn delay(&self, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(attempt);
        let factor = 1.0 + rand::thread_rng().gen_range(-JITTER..=JITTER);
        nominal.mul_f64(factor)
    }

    /// Delay after a 429 or 503 response
    ///
    /// Four times the regular delay, and at least the server's numeric
    /// `Retry-After` value capped at one minute.
    pub fn throttled_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.delay(attempt).saturating_mul(THROTTLED_MULTIPLIER);
        match retry_after {
            Some(wait) => backoff.max(wait.min(MAX_RETRY_AFTER)),
            None => backoff,
        }
    }

    /// Delay to apply after `error` on `attempt`
    pub fn delay_for(&self, error: &FetchError, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match error {
            FetchError::Http { code: 429 | 503 } => self.throttled_delay(attempt, retry_after),
            _ => self.delay(attempt),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}
