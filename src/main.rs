//! Affiliate-Scout main entry point
//!
//! This is the command-line interface for the Affiliate-Scout crawler.

use affiliate_scout::config::{load_config_with_hash, validate, Config};
use affiliate_scout::crawler::crawl;
use affiliate_scout::input::load_targets;
use affiliate_scout::model::Target;
use affiliate_scout::output::{generate_markdown_summary, print_statistics, RunStatistics};
use affiliate_scout::state::ProgressStore;
use affiliate_scout::storage::{load_records, open_sink, remove_sink};
use affiliate_scout::url::normalize_target_url;
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Affiliate-Scout: finds affiliate and partner programs
///
/// Affiliate-Scout visits every site in a target list with a cheap HTTP fetch,
/// falls back to a headless browser when that finds nothing, and records
/// whether each site runs an affiliate program along with contact emails.
/// Interrupted runs resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "affiliate-scout")]
#[command(version = "1.0.0")]
#[command(about = "A hybrid affiliate program crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, deleting previous results and progress
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and count targets without crawling
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "retest_errors"])]
    dry_run: bool,

    /// Show statistics from the progress file and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "retest_errors"])]
    stats: bool,

    /// Generate markdown summary from existing results and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "retest_errors"])]
    export_summary: bool,

    /// Crawl targets that previously ended in an error again
    #[arg(long, conflicts_with = "fresh")]
    retest_errors: bool,

    /// Override the input CSV path
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Override pages visited per target
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Override the number of targets crawled concurrently
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Override the confidence required by the multi-match rule
    #[arg(long, value_name = "F")]
    min_confidence: Option<f64>,

    /// Override targets per batch
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Never fall back to the headless browser
    #[arg(long)]
    lightweight_only: bool,

    /// Process only the first N pending targets
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    apply_overrides(&mut config, &cli);
    if let Err(e) = validate(&config) {
        tracing::error!("Invalid command-line override: {}", e);
        return Err(e.into());
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config).await?;
    } else if cli.stats {
        handle_stats(&config).await?;
    } else if cli.export_summary {
        handle_export_summary(&config).await?;
    } else {
        handle_crawl(config, &config_hash, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("affiliate_scout=info,warn"),
            1 => EnvFilter::new("affiliate_scout=debug,info"),
            2 => EnvFilter::new("affiliate_scout=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Folds command-line overrides into the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(input) = &cli.input {
        config.input.path = input.clone();
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(concurrency) = cli.concurrency {
        config.crawler.concurrency = concurrency;
    }
    if let Some(min_confidence) = cli.min_confidence {
        config.detector.min_confidence = min_confidence;
    }
    if let Some(batch_size) = cli.batch_size {
        config.crawler.batch_size = batch_size;
    }
    if cli.headed {
        config.browser.headless = false;
    }
    if cli.lightweight_only {
        config.browser.enabled = false;
    }
}

fn read_targets(config: &Config) -> anyhow::Result<Vec<Target>> {
    load_targets(&config.input.path, &config.input).with_context(|| {
        format!(
            "failed to load targets from {}",
            config.input.path.display()
        )
    })
}

/// Handles the --dry-run mode: validates config and counts targets
async fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Affiliate-Scout Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages per target: {}", config.crawler.max_pages);
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Batch size: {}", config.crawler.batch_size);
    println!(
        "  Fetch timeout: {}s, {} attempt(s)",
        config.crawler.fetch_timeout_secs, config.crawler.max_retries
    );
    println!("  Sitemap: {}", if config.crawler.sitemap { "yes" } else { "no" });

    println!("\nBrowser:");
    if config.browser.enabled {
        println!("  Pool size: {}", config.browser.pool_size);
        println!("  Headless: {}", config.browser.headless);
    } else {
        println!("  Disabled (lightweight only)");
    }

    println!("\nDetector:");
    println!("  Min confidence: {:.2}", config.detector.min_confidence);
    match &config.detector.catalog_path {
        Some(path) => println!("  Catalog: {}", path.display()),
        None => println!("  Catalog: built-in"),
    }

    println!("\nOutput:");
    println!("  Results: {} ({:?})", config.output.sink_path().display(), config.output.format);
    println!("  Progress: {}", config.output.progress_path.display());
    println!("  Summary: {}", config.output.summary_path.display());

    let targets = read_targets(config)?;
    let progress = ProgressStore::load_state(&config.output.progress_path).await;
    let processed = targets
        .iter()
        .filter(|t| progress.is_processed(&t.name))
        .count();
    let invalid = targets
        .iter()
        .filter(|t| normalize_target_url(&t.url).is_err())
        .count();

    println!("\nTargets ({}):", config.input.path.display());
    println!("  Total: {}", targets.len());
    println!("  Already processed: {}", processed);
    println!("  Invalid URLs: {}", invalid);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} target(s)",
        targets.len().saturating_sub(processed)
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the progress file
async fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Progress file: {}\n", config.output.progress_path.display());

    let state = ProgressStore::load_state(&config.output.progress_path).await;
    print_statistics(&RunStatistics::from_progress(&state));

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
async fn handle_export_summary(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Affiliate Summary ===\n");
    println!("Results: {}", config.output.sink_path().display());
    println!("Output: {}", config.output.summary_path.display());
    println!();

    let state = ProgressStore::load_state(&config.output.progress_path).await;
    let stats = RunStatistics::from_progress(&state);

    tracing::info!("Loading results...");
    let records = load_records(&config.output)?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&stats, &records, &config.output.summary_path)?;

    println!("✓ Summary exported to: {}", config.output.summary_path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    if cli.fresh {
        tracing::info!("Starting fresh crawl (deleting previous results and progress)");
        remove_sink(&config.output)?;
        match std::fs::remove_file(&config.output.progress_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    } else {
        tracing::info!("Starting crawl (targets already processed are skipped)");
    }

    let progress = Arc::new(ProgressStore::open(&config.output.progress_path).await);
    match progress.set_config_hash(config_hash).await {
        Ok(Some(previous)) if previous != config_hash => {
            tracing::warn!(
                "Configuration changed since the last run (was {}), resuming anyway",
                previous
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("Could not store config hash: {}", e),
    }

    if cli.retest_errors {
        let names = progress.retest_errors().await?;
        tracing::info!("Re-testing {} target(s) that ended in an error", names.len());
    }

    let targets = read_targets(&config)?;
    tracing::info!(
        "Loaded {} target(s) from {}",
        targets.len(),
        config.input.path.display()
    );

    let sink = open_sink(&config.output)?;

    let cancel = CancellationToken::new();
    tokio::spawn(watch_for_shutdown(cancel.clone()));

    match crawl(&config, targets, sink, progress, cli.limit, cancel).await {
        Ok(summary) => {
            tracing::info!(
                "Crawl {}: {} processed, {} skipped, {} affiliate programs, {} errors",
                if summary.cancelled { "interrupted" } else { "completed" },
                summary.processed,
                summary.skipped,
                summary.affiliates_found,
                summary.errors
            );
            if summary.persistence_failures > 0 {
                tracing::warn!(
                    "{} result(s) could not be saved and will be retried on the next run",
                    summary.persistence_failures
                );
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Cancels the run on Ctrl-C or SIGTERM
async fn watch_for_shutdown(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("Could not listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::warn!("Shutdown requested, finishing up...");
    cancel.cancel();
}
