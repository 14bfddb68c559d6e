//! Run summaries and record store statistics
//!
//! This module provides the summary a crawl run returns and the
//! functions that render it, the store statistics, and the record listing
//! for the terminal.

use crate::crawler::StopReason;
use crate::state::CounterSnapshot;
use crate::storage::{timestamp, RecordStore, StoreStats};
use std::fmt::Write;
use std::time::Duration;

/// Number of records shown when the full listing is not requested
const SAMPLE_SIZE: usize = 5;

/// Counts describing one finished crawl run
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Normalized seed URL
    pub seed: String,

    /// Path of the record store
    pub data_path: String,

    /// Why the run stopped
    pub stop_reason: StopReason,

    /// Pages that returned a successful HTTP response
    pub fetched: usize,

    /// Pages that failed after all retries
    pub failed: usize,

    /// URLs skipped because robots.txt disallows them
    pub skipped_by_robots: usize,

    /// Discovered links that could not become crawl targets
    pub rejected: usize,

    /// Fetched pages that were not HTML
    pub non_html: usize,

    /// Fetched pages whose redirect target had already been visited
    pub duplicate_redirects: usize,

    /// Redirects that pointed outside the followed link scope
    pub redirects_out_of_scope: usize,

    /// Dequeued URLs dropped because the budget ran out or the run stopped
    pub abandoned: usize,

    /// Records added to the store by this run
    pub new_records: usize,

    /// Existing records refreshed by this run
    pub updated_records: usize,

    /// Records in the store after the run
    pub total_records: usize,

    /// Distinct hosts contacted
    pub hosts: usize,

    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl CrawlSummary {
    /// Creates a summary from the run's counters; record counts start at zero
    pub fn from_counters(
        seed: impl Into<String>,
        data_path: impl Into<String>,
        stop_reason: StopReason,
        counters: CounterSnapshot,
    ) -> Self {
        Self {
            seed: seed.into(),
            data_path: data_path.into(),
            stop_reason,
            fetched: counters.fetched,
            failed: counters.failed,
            skipped_by_robots: counters.skipped_by_robots,
            rejected: counters.rejected,
            non_html: counters.non_html,
            duplicate_redirects: counters.duplicate_redirects,
            redirects_out_of_scope: counters.out_of_scope,
            abandoned: counters.abandoned,
            new_records: 0,
            updated_records: 0,
            total_records: 0,
            hosts: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// One-line status, e.g. `"12 pages fetched, 1 errors."`
    pub fn status_line(&self) -> String {
        format!("{} pages fetched, {} errors.", self.fetched, self.failed)
    }

    /// Fetch rate over the whole run
    pub fn pages_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.fetched as f64 / secs
        } else {
            0.0
        }
    }
}

/// Renders the run summary block
pub fn render_summary(summary: &CrawlSummary) -> String {
    let rule = "=".repeat(50);
    let mut out = String::new();

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "CRAWL SUMMARY");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Start URL:          {}", summary.seed);
    let _ = writeln!(out, "Stopped because:    {}", summary.stop_reason);
    let _ = writeln!(out, "Pages fetched:      {}", summary.fetched);
    let _ = writeln!(out, "Errors:             {}", summary.failed);
    let _ = writeln!(out, "Skipped (robots):   {}", summary.skipped_by_robots);
    let _ = writeln!(out, "Non-HTML:           {}", summary.non_html);
    let _ = writeln!(out, "Rejected links:     {}", summary.rejected);
    if summary.redirects_out_of_scope > 0 {
        let _ = writeln!(out, "Off-scope redirects: {}", summary.redirects_out_of_scope);
    }
    if summary.abandoned > 0 {
        let _ = writeln!(out, "Not started:        {}", summary.abandoned);
    }
    let _ = writeln!(out, "Hosts contacted:    {}", summary.hosts);
    let _ = writeln!(out, "New websites:       {}", summary.new_records);
    let _ = writeln!(out, "Updated websites:   {}", summary.updated_records);
    let _ = writeln!(out, "Total stored:       {}", summary.total_records);
    let _ = writeln!(out, "Data file:          {}", summary.data_path);
    let _ = writeln!(
        out,
        "Elapsed:            {:.1}s ({:.2} pages/sec)",
        summary.elapsed.as_secs_f64(),
        summary.pages_per_second()
    );
    let _ = writeln!(out, "{}", rule);
    let _ = write!(out, "{}", summary.status_line());

    out
}

/// Prints the run summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("\n{}", render_summary(summary));
}

/// Renders store statistics
pub fn render_store_stats(stats: &StoreStats) -> String {
    format!(
        "=== Store Statistics ===\n  Total entries:   {}\n  Added today:     {}\n  Updated today:   {}",
        stats.total, stats.added_today, stats.updated_today
    )
}

/// Prints store statistics to stdout
pub fn print_store_stats(stats: &StoreStats) {
    println!("\n{}", render_store_stats(stats));
}

/// Renders stored records
///
/// With `show_all` every record is listed with its timestamps; otherwise a
/// short sample of names and titles.
pub fn render_records(store: &RecordStore, show_all: bool) -> String {
    let mut out = String::new();

    if show_all {
        let _ = writeln!(out, "=== All Stored Websites ===");
        for (i, record) in store.iter().enumerate() {
            let _ = writeln!(out, "\n{}. {}", i + 1, record.name);
            let _ = writeln!(out, "   Title: {}", record.title);
            let _ = writeln!(
                out,
                "   First crawled: {}",
                timestamp::format(&record.first_crawled)
            );
            let _ = writeln!(
                out,
                "   Last crawled:  {}",
                timestamp::format(&record.last_crawled)
            );
        }
    } else {
        let _ = writeln!(out, "=== Stored Websites (Sample) ===");
        for record in store.iter().take(SAMPLE_SIZE) {
            let _ = writeln!(out, "\n{}", record.name);
            let _ = writeln!(out, "  Title: {}", record.title);
        }
        if store.len() > SAMPLE_SIZE {
            let _ = writeln!(out, "\n... and {} more websites", store.len() - SAMPLE_SIZE);
        }
    }

    out
}

/// Prints stored records to stdout
pub fn print_records(store: &RecordStore, show_all: bool) {
    if store.is_empty() {
        println!("\nNo websites stored yet.");
        return;
    }
    println!("\n{}", render_records(store, show_all));
}
