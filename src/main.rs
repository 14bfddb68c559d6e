//! Site-Indexer main entry point
//!
//! This is the command-line interface for the Site-Indexer crawler.

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use site_indexer::config::{read_config_with_hash, Config};
use site_indexer::crawler::Coordinator;
use site_indexer::output::{print_records, print_store_stats, print_summary};
use site_indexer::storage;
use site_indexer::url::LinkScope;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Site-Indexer: a polite crawler for a static search index
///
/// Site-Indexer crawls outward from a start URL while respecting robots.txt
/// and per-host crawl delays, and merges every page it finds (name, title,
/// first and last crawl time) into a JSON file a search page can load.
#[derive(Parser, Debug)]
#[command(name = "site-indexer")]
#[command(version)]
#[command(about = "A polite crawler for a static search index", long_about = None)]
struct Cli {
    /// URL the crawl starts from (overrides the config file)
    #[arg(value_name = "START_URL")]
    start_url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of pages to fetch
    #[arg(short = 'n', long, value_name = "N")]
    max_pages: Option<usize>,

    /// Record store to merge results into
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of concurrent fetch workers
    #[arg(short, long, value_name = "N")]
    workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Stop the whole run after this many seconds
    #[arg(long, value_name = "SECS")]
    run_timeout: Option<u64>,

    /// Minimum delay between requests to one host, in milliseconds
    #[arg(long, value_name = "MS")]
    delay: Option<u64>,

    /// Maximum link depth from the start URL
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Which discovered links to follow
    #[arg(long, value_enum)]
    scope: Option<LinkScope>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Show statistics for the record store and exit
    #[arg(long, conflicts_with = "migrate")]
    stats: bool,

    /// List every stored record instead of a sample
    #[arg(long)]
    show_all: bool,

    /// Rewrite a record store in the current format and exit
    #[arg(long, value_name = "INPUT", conflicts_with = "stats")]
    migrate: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    // Handle different modes
    if let Some(input) = &cli.migrate {
        handle_migrate(input, cli.output.as_deref())
    } else if cli.stats {
        handle_stats(&config, cli.show_all)
    } else {
        handle_crawl(config, cli.show_all).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_indexer=info,warn"),
            1 => EnvFilter::new("site_indexer=debug,info"),
            2 => EnvFilter::new("site_indexer=trace,debug"),
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

/// Loads the config file (if any) and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = read_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    let crawler = &mut config.crawler;
    if let Some(url) = &cli.start_url {
        crawler.start_url = url.clone();
    }
    if let Some(n) = cli.max_pages {
        crawler.max_pages = n;
    }
    if let Some(n) = cli.workers {
        crawler.workers = n;
    }
    if let Some(secs) = cli.timeout {
        crawler.request_timeout_secs = secs;
    }
    if let Some(secs) = cli.run_timeout {
        crawler.run_timeout_secs = Some(secs);
    }
    if let Some(ms) = cli.delay {
        crawler.min_delay_ms = ms;
    }
    if let Some(depth) = cli.max_depth {
        crawler.max_depth = Some(depth);
    }
    if let Some(scope) = cli.scope {
        crawler.scope = scope;
    }
    if let Some(path) = &cli.output {
        config.output.data_path = path.display().to_string();
    }

    Ok(config)
}

/// Handles the --migrate mode: rewrites a store in the current format
fn handle_migrate(input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let output = output.unwrap_or(input);
    let report = storage::migrate(input, output)
        .with_context(|| format!("Failed to migrate {}", input.display()))?;

    println!("=== Migration ===");
    println!("  Input:    {} ({} format)", input.display(), report.shape);
    println!("  Output:   {}", output.display());
    println!("  Entries:  {}", report.entries);
    if report.skipped > 0 {
        println!("  Skipped:  {} malformed rows", report.skipped);
    }
    if !report.written {
        println!("  Already in the current format; nothing written");
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics for the record store
fn handle_stats(config: &Config, show_all: bool) -> anyhow::Result<()> {
    let path = Path::new(&config.output.data_path);
    println!("Record store: {}", path.display());

    let store = storage::load_or_default(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    print_store_stats(&store.stats(Utc::now().date_naive()));
    print_records(&store, show_all);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, show_all: bool) -> anyhow::Result<()> {
    if config.crawler.start_url.trim().is_empty() {
        bail!("No start URL given (pass START_URL or set start-url in the config file)");
    }
    let data_path = PathBuf::from(&config.output.data_path);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing in-flight pages");
            let _ = shutdown_tx.send(true);
        }
    });

    let coordinator = Coordinator::new(config, shutdown_rx)?;
    let summary = match coordinator.run().await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };
    print_summary(&summary);

    let store = storage::load(&data_path)
        .with_context(|| format!("Failed to re-read {}", data_path.display()))?;
    print_store_stats(&store.stats(Utc::now().date_naive()));
    print_records(&store, show_all);

    Ok(())
}
