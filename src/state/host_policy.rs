use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Pacing state for one host
///
/// Created lazily on the first request to a host and kept for the rest of
/// the run. The politeness controller owns every `HostPolicy` and mutates it
/// under a per-host lock.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    /// Host key (host plus explicit port)
    pub host: String,

    /// Minimum spacing between requests to this host
    pub crawl_delay: Duration,

    /// When the last request to this host was released
    pub last_fetch_at: Option<Instant>,

    /// When robots.txt was fetched for this host
    pub robots_fetched_at: Option<DateTime<Utc>>,

    /// Number of requests released to this host in the current run
    pub request_count: u32,
}

impl HostPolicy {
    /// Creates a policy that paces requests at the configured minimum delay
    pub fn new(host: impl Into<String>, min_delay: Duration) -> Self {
        Self {
            host: host.into(),
            crawl_delay: min_delay,
            last_fetch_at: None,
            robots_fetched_at: None,
            request_count: 0,
        }
    }

    /// Applies the delay a host's robots.txt asks for
    ///
    /// The effective delay never drops below the configured minimum and a
    /// requested delay is clamped to `max_delay`.
    pub fn apply_robots_delay(
        &mut self,
        robots_delay: Option<Duration>,
        max_delay: Duration,
        fetched_at: DateTime<Utc>,
    ) {
        if let Some(delay) = robots_delay {
            let delay = if delay > max_delay {
                tracing::warn!(
                    "robots.txt for {} asks for a {:?} crawl delay; capping at {:?}",
                    self.host,
                    delay,
                    max_delay
                );
                max_delay
            } else {
                delay
            };
            self.crawl_delay = self.crawl_delay.max(delay);
        }
        self.robots_fetched_at = Some(fetched_at);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_fetch_at?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.crawl_delay {
            Some(self.crawl_delay - elapsed)
        } else {
            None
        }
    }

    /// Records that a request was released to this host
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_fetch_at = Some(now);
    }
}
