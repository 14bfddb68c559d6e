//! Output module for crawl summaries and store reports
//!
//! This module handles:
//! - The summary returned by a crawl run
//! - Printing run summaries, store statistics and stored records

pub mod stats;

pub use stats::{
    print_records, print_store_stats, print_summary, render_records, render_store_stats,
    render_summary, CrawlSummary,
};
