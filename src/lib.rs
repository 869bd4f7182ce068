//! Affiliate-Scout: a hybrid affiliate program crawler
//!
//! This crate visits a list of target websites and decides, for each one, whether
//! it runs an affiliate or partner program. Every site is tried with a cheap HTTP
//! fetch first and falls back to a headless browser only when the cheap pass finds
//! nothing. Progress is persisted after every target so long runs can be resumed.

pub mod config;
pub mod crawler;
pub mod detector;
pub mod input;
pub mod model;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Affiliate-Scout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Result sink error: {0}")]
    Sink(#[from] storage::SinkError),

    #[error("Progress store error: {0}")]
    Progress(#[from] state::ProgressError),

    #[error("Input error: {0}")]
    Input(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid keyword catalog: {0}")]
    Catalog(String),
}

/// URL-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("URL is empty")]
    Empty,

    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Affiliate-Scout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use detector::{AffiliateDetector, KeywordCatalog};
pub use model::{CrawlResult, FailureKind, FetchMethod, StatusCategory, Target};
pub use state::{CrawlPhase, ProgressState, ProgressStore};
pub use url::{normalize_target_url, registrable_domain};
