use crate::config::types::{
    BrowserConfig, Config, CrawlerConfig, DetectorConfig, InputConfig, OutputConfig,
    ThrottleConfig,
};
use crate::ConfigError;
use std::path::Path;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_detector_config(&config.detector)?;
    validate_input_config(&config.input)?;
    validate_output_config(&config.output)?;
    validate_throttle_config(&config.throttle)?;
    Ok(())
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::Validation(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, value
        )));
    }
    Ok(())
}

fn check_non_empty_path(name: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    check_range("max-pages", config.max_pages, 1, 200)?;
    check_range("concurrency", config.concurrency, 1, 100)?;
    check_range("max-retries", config.max_retries, 1, 10)?;

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.sitemap_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "sitemap-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.batch_size < 1 {
        return Err(ConfigError::Validation(
            "batch-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    check_range("pool-size", config.pool_size, 1, 16)?;

    if config.navigation_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "navigation-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_uses_per_browser < 1 {
        return Err(ConfigError::Validation(
            "max-uses-per-browser must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_detector_config(config: &DetectorConfig) -> Result<(), ConfigError> {
    if !config.min_confidence.is_finite() {
        return Err(ConfigError::Validation(
            "min-confidence must be a finite number".to_string(),
        ));
    }
    check_range("min-confidence", config.min_confidence, 0.0, 1.0)?;

    if let Some(path) = &config.catalog_path {
        check_non_empty_path("catalog-path", path)?;
    }

    Ok(())
}

fn validate_input_config(config: &InputConfig) -> Result<(), ConfigError> {
    check_non_empty_path("input path", &config.path)?;

    if config.name_column.trim().is_empty() {
        return Err(ConfigError::Validation(
            "name-column cannot be empty".to_string(),
        ));
    }

    if config.url_column.trim().is_empty() {
        return Err(ConfigError::Validation(
            "url-column cannot be empty".to_string(),
        ));
    }

    if config.name_column == config.url_column {
        return Err(ConfigError::Validation(format!(
            "name-column and url-column must differ, both are '{}'",
            config.name_column
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    check_non_empty_path("results-path", &config.results_path)?;
    check_non_empty_path("database-path", &config.database_path)?;
    check_non_empty_path("progress-path", &config.progress_path)?;
    check_non_empty_path("summary-path", &config.summary_path)?;
    Ok(())
}

fn validate_throttle_config(config: &ThrottleConfig) -> Result<(), ConfigError> {
    if config.memory_limit_mb < 64 {
        return Err(ConfigError::Validation(format!(
            "memory-limit-mb must be >= 64, got {}",
            config.memory_limit_mb
        )));
    }

    if config.cpu_limit_percent.is_nan() || config.cpu_limit_percent <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "cpu-limit-percent must be positive, got {}",
            config.cpu_limit_percent
        )));
    }

    Ok(())
}
