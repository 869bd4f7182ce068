//! Core data model: targets, crawl results and their categorical fields

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One site to be evaluated for an affiliate program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Unique key of the target (the tool name in the input list)
    pub name: String,

    /// Raw URL as it appears in the input list
    pub url: String,
}

impl Target {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// The fetch strategy that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Plain HTTP request, no JavaScript
    Lightweight,
    /// Headless browser automation
    Heavy,
}

impl FetchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lightweight => "lightweight",
            Self::Heavy => "heavy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lightweight" => Some(Self::Lightweight),
            "heavy" => Some(Self::Heavy),
            _ => None,
        }
    }
}

impl fmt::Display for FetchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categorical status of a target's initial fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// Numeric HTTP status code
    Http(u16),
    /// Validation failure or fetch failure without a usable status code
    Error,
    /// The host could not be reached at all
    Unreachable,
    /// No fetch has completed yet
    NotAvailable,
}

impl StatusCategory {
    /// Returns true for 2xx and 3xx codes
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Http(code) if (200..400).contains(code))
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "ERROR" => Self::Error,
            "UNREACHABLE" => Self::Unreachable,
            "N/A" | "" => Self::NotAvailable,
            other => other.parse::<u16>().map(Self::Http).unwrap_or(Self::Error),
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{}", code),
            Self::Error => f.write_str("ERROR"),
            Self::Unreachable => f.write_str("UNREACHABLE"),
            Self::NotAvailable => f.write_str("N/A"),
        }
    }
}

/// Failure taxonomy used for logging and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The target URL failed normalization
    Validation,
    /// Timeouts, connection failures, 429 and 503
    TransientFetch,
    /// Other HTTP errors, malformed responses and challenge walls
    PermanentFetch,
    /// Browser navigation failure or crash
    Automation,
    /// Result sink or progress store write failure
    Persistence,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validation => "validation",
            Self::TransientFetch => "transient-fetch",
            Self::PermanentFetch => "permanent-fetch",
            Self::Automation => "automation",
            Self::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

/// Terminal artifact produced for every target
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlResult {
    pub tool_name: String,
    pub url_root: String,
    pub status_code: StatusCategory,
    pub affiliate_found: bool,
    pub affiliate_url: String,
    pub emails: BTreeSet<String>,
    pub keywords_found: BTreeSet<String>,
    pub pages_checked: u32,
    pub method_used: FetchMethod,
    pub confidence_score: f64,
    /// False when the target never reached a fetch strategy
    pub fetch_attempted: bool,
}

impl CrawlResult {
    /// Result for a target whose URL failed normalization; no fetch happened
    pub fn validation_error(tool_name: &str, raw_url: &str) -> Self {
        let mut builder =
            CrawlResultBuilder::new(tool_name, raw_url.trim(), FetchMethod::Lightweight);
        builder.set_status(StatusCategory::Error);
        builder.result.fetch_attempted = false;
        builder.finish()
    }

    /// True when the initial fetch succeeded
    pub fn is_ok(&self) -> bool {
        self.status_code.is_success()
    }
}

/// Mutable accumulator for a single target's pipeline
///
/// A builder is owned by exactly one controller and frozen into a
/// [`CrawlResult`] by [`CrawlResultBuilder::finish`].
#[derive(Debug, Clone)]
pub struct CrawlResultBuilder {
    result: CrawlResult,
}

impl CrawlResultBuilder {
    pub fn new(tool_name: &str, url_root: &str, method: FetchMethod) -> Self {
        Self {
            result: CrawlResult {
                tool_name: tool_name.to_string(),
                url_root: url_root.to_string(),
                status_code: StatusCategory::NotAvailable,
                affiliate_found: false,
                affiliate_url: String::new(),
                emails: BTreeSet::new(),
                keywords_found: BTreeSet::new(),
                pages_checked: 0,
                method_used: method,
                confidence_score: 0.0,
                fetch_attempted: true,
            },
        }
    }

    pub fn set_status(&mut self, status: StatusCategory) {
        self.result.status_code = status;
    }

    pub fn status(&self) -> StatusCategory {
        self.result.status_code
    }

    /// Counts one successfully fetched page
    pub fn page_checked(&mut self) {
        self.result.pages_checked += 1;
    }

    pub fn pages_checked(&self) -> u32 {
        self.result.pages_checked
    }

    pub fn add_emails<I: IntoIterator<Item = String>>(&mut self, emails: I) {
        self.result.emails.extend(emails);
    }

    pub fn add_keywords<I: IntoIterator<Item = String>>(&mut self, keywords: I) {
        self.result.keywords_found.extend(keywords);
    }

    /// Keeps the highest confidence seen so far
    pub fn observe_confidence(&mut self, confidence: f64) {
        if confidence > self.result.confidence_score {
            self.result.confidence_score = confidence;
        }
    }

    /// Records the page where affiliate evidence was found
    pub fn mark_affiliate(&mut self, url: &str, confidence: f64) {
        if url.is_empty() {
            return;
        }
        self.result.affiliate_found = true;
        self.result.affiliate_url = url.to_string();
        self.result.confidence_score = confidence;
    }

    pub fn is_affiliate_found(&self) -> bool {
        self.result.affiliate_found
    }

    /// Unions emails and keywords gathered by another pass over the same target
    pub fn merge_evidence(&mut self, other: &CrawlResult) {
        self.result.emails.extend(other.emails.iter().cloned());
        self.result
            .keywords_found
            .extend(other.keywords_found.iter().cloned());
    }

    pub fn finish(mut self) -> CrawlResult {
        if !self.result.affiliate_found {
            self.result.affiliate_url.clear();
        }
        let score = self.result.confidence_score;
        self.result.confidence_score = if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.result.emails.retain(|e| !e.is_empty());
        self.result.keywords_found.retain(|k| !k.is_empty());
        self.result
    }
}
