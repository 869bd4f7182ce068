//! Configuration module for Affiliate-Scout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use affiliate_scout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scout.toml")).unwrap();
//! println!("Pages per target: {}", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    BrowserConfig, Config, CrawlerConfig, DetectorConfig, InputConfig, OutputConfig,
    OutputFormat, ThrottleConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
