use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Affiliate-Scout
///
/// Every section is optional in the TOML file; missing sections and keys fall
/// back to their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub browser: BrowserConfig,
    pub detector: DetectorConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub throttle: ThrottleConfig,
}

/// Per-target crawl behavior and batch scheduling
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum pages fetched per target, home page included
    pub max_pages: u32,

    /// Timeout of a single HTTP attempt (seconds)
    pub fetch_timeout_secs: u64,

    /// Attempts per lightweight fetch before giving up
    pub max_retries: u32,

    /// Base of the exponential retry backoff (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Number of targets processed concurrently
    pub concurrency: usize,

    /// Targets per batch
    pub batch_size: usize,

    /// Pause between batches (milliseconds)
    pub batch_pause_ms: u64,

    /// Whether `/sitemap.xml` is consulted during link discovery
    pub sitemap: bool,

    /// Timeout of the sitemap request (seconds)
    pub sitemap_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: 10,
            fetch_timeout_secs: 15,
            max_retries: 3,
            retry_base_delay_ms: 500,
            concurrency: 10,
            batch_size: 5000,
            batch_pause_ms: 3000,
            sitemap: true,
            sitemap_timeout_secs: 5,
        }
    }
}

/// Headless browser fallback
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// Whether the heavy strategy runs at all
    pub enabled: bool,

    pub headless: bool,

    /// Maximum number of live browsers
    pub pool_size: usize,

    /// DOM-ready bound for a navigation (seconds)
    pub navigation_timeout_secs: u64,

    /// Scroll and move the mouse before extracting content
    pub simulate_human: bool,

    /// Fetches served by one browser before it is recycled
    pub max_uses_per_browser: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            pool_size: 3,
            navigation_timeout_secs: 30,
            simulate_human: true,
            max_uses_per_browser: 50,
        }
    }
}

/// Affiliate detection tuning
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DetectorConfig {
    /// Page confidence required by the multiple-matches rule
    pub min_confidence: f64,

    /// Optional TOML keyword catalog replacing the built-in one
    pub catalog_path: Option<PathBuf>,
}

/// Target list location and columns
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct InputConfig {
    pub path: PathBuf,
    pub name_column: String,
    pub url_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("tools.csv"),
            name_column: "tool_name".to_string(),
            url_column: "tool_link".to_string(),
        }
    }
}

/// Result sink backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    pub format: OutputFormat,

    /// CSV result file
    pub results_path: PathBuf,

    /// SQLite result database, used when `format = "sqlite"`
    pub database_path: PathBuf,

    /// JSON progress file
    pub progress_path: PathBuf,

    /// Markdown summary written by `--export-summary`
    pub summary_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Csv,
            results_path: PathBuf::from("affiliate_results.csv"),
            database_path: PathBuf::from("affiliate_results.db"),
            progress_path: PathBuf::from("affiliate_progress.json"),
            summary_path: PathBuf::from("affiliate_summary.md"),
        }
    }
}

impl OutputConfig {
    /// Path of the active result sink
    pub fn sink_path(&self) -> &PathBuf {
        match self.format {
            OutputFormat::Csv => &self.results_path,
            OutputFormat::Sqlite => &self.database_path,
        }
    }
}

/// Resource self-throttling between batches
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ThrottleConfig {
    pub memory_limit_mb: u64,
    pub cpu_limit_percent: f64,
    pub backoff_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: 1024,
            cpu_limit_percent: 80.0,
            backoff_secs: 10,
        }
    }
}
