//! Fetched robots.txt rules for one host
//!
//! Rules are fetched once per host per run; the fetch time is kept for
//! reporting.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Utc};
use std::time::Duration as StdDuration;

/// Cached robots.txt data for a host
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots stamped with the current time
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if a URL is allowed according to the cached robots.txt
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        self.content.is_allowed(url, user_agent)
    }

    /// Gets the crawl delay from the cached robots.txt
    ///
    /// Values too large to represent are ignored.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<StdDuration> {
        self.content
            .crawl_delay(user_agent)
            .and_then(|secs| StdDuration::try_from_secs_f64(secs).ok())
    }
}
