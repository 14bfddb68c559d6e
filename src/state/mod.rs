//! State module for tracking crawl progress
//!
//! This module provides state management for hosts and the crawl run as a whole.
//!
//! # Components
//!
//! - `HostPolicy`: Per-host pacing (crawl delay, last request time)
//! - `CrawlState`: The run's frontier, page budget, counters and produced records
//! - `PageOutcome`: How processing of a single dequeued URL ended

mod crawl_state;
mod host_policy;
mod page_outcome;

// Re-export main types
pub use crawl_state::{CounterSnapshot, CrawlCounters, CrawlPhase, CrawlState, PageBudget};
pub use host_policy::HostPolicy;
pub use page_outcome::PageOutcome;
