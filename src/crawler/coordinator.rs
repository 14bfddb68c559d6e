//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a run through its phases:
//! - **Seeding**: check the output path, load the existing store, queue the seed
//! - **Running**: the worker pool drains the frontier
//! - **Draining**: triggered by budget, exhaustion, cancellation or run timeout;
//!   no new request starts, workers waiting on a host's delay give up, and
//!   requests already sent finish
//! - **Finalized**: merge the produced records and save the store

use crate::config::Config;
use crate::crawler::worker::{spawn_workers, wait_for_stop, CrawlContext, RetryPolicy};
use crate::crawler::{build_http_client, Extractor, Frontier, Politeness};
use crate::output::CrawlSummary;
use crate::state::{CrawlPhase, CrawlState};
use crate::storage::{self, MergeOutcome, PageRecord, RecordStore};
use crate::url::{normalize_url, NormalizedUrl};
use crate::CrawlError;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Why a run moved to draining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No pending URLs and nothing in flight
    FrontierExhausted,
    /// Every page slot was used
    BudgetReached,
    /// Shutdown was requested
    Cancelled,
    /// The configured run timeout elapsed
    TimedOut,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::FrontierExhausted => "frontier exhausted",
            Self::BudgetReached => "page budget reached",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "run timeout",
        };
        write!(f, "{}", text)
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    seed: NormalizedUrl,
    data_path: PathBuf,
    phase: CrawlPhase,
    shutdown: watch::Receiver<bool>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration (validated here)
    /// * `shutdown` - Receiver that turns `true` when the run should stop
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(CrawlError)` - Invalid configuration or seed URL
    pub fn new(config: Config, shutdown: watch::Receiver<bool>) -> Result<Self, CrawlError> {
        let seed = normalize_url(&config.crawler.start_url)?;
        crate::config::validate_config(&config)?;
        let data_path = PathBuf::from(&config.output.data_path);

        Ok(Self {
            config,
            seed,
            data_path,
            phase: CrawlPhase::Idle,
            shutdown,
        })
    }

    pub fn seed(&self) -> &NormalizedUrl {
        &self.seed
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    fn advance(&mut self, next: CrawlPhase) {
        if !self.phase.can_advance_to(next) {
            tracing::warn!("Unexpected phase change {} -> {}", self.phase, next);
        }
        tracing::debug!("Crawl phase: {} -> {}", self.phase, next);
        self.phase = next;
    }

    /// Runs the crawl to completion
    ///
    /// Fetch failures never fail the run. Errors are returned only when the
    /// output path is unusable, the existing store cannot be read, or the
    /// final save fails.
    pub async fn run(mut self) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();

        // ===== Seeding =====
        self.advance(CrawlPhase::Seeding);
        storage::check_writable(&self.data_path).map_err(|e| {
            CrawlError::UnwritableOutput(format!("{}: {}", self.data_path.display(), e))
        })?;
        let mut store = storage::load_or_default(&self.data_path)?;
        tracing::info!(
            "Loaded {} existing records from {}",
            store.len(),
            self.data_path.display()
        );

        let crawler = self.config.crawler.clone();
        let client = build_http_client(&self.config.user_agent, &crawler)?;
        let frontier = Frontier::new(crawler.max_pages);
        frontier.enqueue(self.seed.clone(), 0);

        // Fires for cancellation and for the run timeout
        let (stop_tx, stop_rx) = watch::channel(false);
        let ctx = Arc::new(CrawlContext {
            state: Arc::new(CrawlState::new(frontier)),
            politeness: Politeness::new(
                client.clone(),
                self.config.user_agent.crawler_name.clone(),
                crawler.min_delay(),
                crawler.max_redirects,
            )
            .with_max_crawl_delay(crawler.max_crawl_delay()),
            extractor: Extractor::new(self.seed.clone(), &crawler),
            client,
            retry: RetryPolicy {
                max_retries: crawler.max_retries,
                backoff: crawler.retry_backoff(),
                max_redirects: crawler.max_redirects,
            },
            shutdown: stop_rx,
        });

        // ===== Running =====
        self.advance(CrawlPhase::Running);
        tracing::info!(
            "Crawling from {} with {} workers (max {} pages)",
            self.seed,
            crawler.workers,
            crawler.max_pages
        );
        let mut workers = spawn_workers(crawler.workers, Arc::clone(&ctx));
        let run_timeout = crawler.run_timeout();

        let mut shutdown = self.shutdown.clone();
        let interrupted = tokio::select! {
            _ = join_all(&mut workers) => None,
            _ = wait_for_stop(&mut shutdown) => Some(StopReason::Cancelled),
            _ = sleep_or_forever(run_timeout) => Some(StopReason::TimedOut),
        };

        // ===== Draining =====
        self.advance(CrawlPhase::Draining);
        let state = &ctx.state;
        let stop_reason = match interrupted {
            Some(reason) => {
                tracing::info!(
                    "Stopping ({}): waiting for {} in-flight fetches",
                    reason,
                    state.frontier.in_flight()
                );
                let _ = stop_tx.send(true);
                state.frontier.close();
                join_all(&mut workers).await;
                reason
            }
            None if state.frontier.budget().is_exhausted() => StopReason::BudgetReached,
            None => StopReason::FrontierExhausted,
        };
        let abandoned = state.frontier.pending_len();
        if abandoned > 0 {
            tracing::info!("{} queued URLs were not fetched", abandoned);
        }

        // ===== Finalized =====
        let records = state.take_records();
        let (new_records, updated_records) = merge_all(&mut store, records);
        storage::save(&self.data_path, &store)?;
        self.advance(CrawlPhase::Finalized);

        let mut summary = CrawlSummary::from_counters(
            self.seed.as_str(),
            self.data_path.display().to_string(),
            stop_reason,
            state.counters.snapshot(),
        );
        summary.new_records = new_records;
        summary.updated_records = updated_records;
        summary.total_records = store.len();
        summary.hosts = ctx.politeness.host_count();
        summary.elapsed = started.elapsed();

        tracing::info!(
            "Crawl finished ({}): {} in {:?}",
            stop_reason,
            summary.status_line(),
            summary.elapsed
        );
        Ok(summary)
    }
}

/// Merges a run's records into the store
///
/// Returns (added, updated). A name produced twice in one run counts once.
fn merge_all(store: &mut RecordStore, records: Vec<PageRecord>) -> (usize, usize) {
    let mut added: HashSet<String> = HashSet::new();
    let mut updated: HashSet<String> = HashSet::new();

    for record in records {
        let name = record.name.clone();
        match store.merge(record) {
            MergeOutcome::Added => {
                added.insert(name);
            }
            MergeOutcome::Updated if !added.contains(&name) => {
                updated.insert(name);
            }
            MergeOutcome::Updated => {}
        }
    }

    (added.len(), updated.len())
}

async fn join_all(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(e) = result {
            tracing::error!("Worker task failed: {}", e);
        }
    }
}

async fn sleep_or_forever(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending::<()>().await,
    }
}

/// Runs a complete crawl with no external shutdown signal
///
/// # Example
///
/// ```no_run
/// use site_indexer::config::load_config;
/// use site_indexer::crawler::crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("crawl.toml"))?;
/// let summary = crawl(config).await?;
/// println!("{}", summary.status_line());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config) -> Result<CrawlSummary, CrawlError> {
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    Coordinator::new(config, shutdown_rx)?.run().await
}
