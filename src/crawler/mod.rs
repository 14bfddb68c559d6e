//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - The frontier of pending URLs and the page budget
//! - Per-host robots.txt checks and request pacing
//! - HTTP fetching with retries and per-hop redirect checks
//! - Title and link extraction
//! - The worker pool and overall crawl coordination

mod coordinator;
mod fetcher;
mod frontier;
mod parser;
mod politeness;
mod worker;

pub use coordinator::{run_crawl, Coordinator, StopReason};
pub use fetcher::{
    build_http_client, fetch_step, get_following_redirects, FetchError, FetchStep, FetchedPage,
};
pub use frontier::{Frontier, FrontierEntry};
pub use parser::{parse_html, ExtractedPage, Extractor, ParsedPage};
pub use politeness::Politeness;
pub use worker::{run_worker, spawn_workers, CrawlContext, RetryPolicy};

use crate::config::Config;
use crate::output::CrawlSummary;
use crate::CrawlError;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Validate the configuration and normalize the seed URL
/// 2. Load the existing record store
/// 3. Build the HTTP client
/// 4. Fetch pages, extract titles and follow links
/// 5. Merge the new records and save the store
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Crawl completed; individual page failures are counted
/// * `Err(CrawlError)` - Crawl could not start or the store could not be saved
pub async fn crawl(config: Config) -> Result<CrawlSummary, CrawlError> {
    run_crawl(config).await
}
