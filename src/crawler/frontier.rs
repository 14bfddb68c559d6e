//! Crawl frontier: the shared queue of URLs waiting to be fetched
//!
//! This module handles:
//! - FIFO ordering (breadth-first by discovery order)
//! - Visited-set dedup; enqueue is the single dedup gate
//! - The global page budget
//! - Drain detection: no pending entries and nothing in flight
//!
//! The internal lock is a plain `std::sync::Mutex` held for the duration of
//! one call and never across an await point.

use crate::state::PageBudget;
use crate::url::NormalizedUrl;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Upper bound on a single dequeue wait before the state is re-checked
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A URL waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// The URL to fetch
    pub url: NormalizedUrl,

    /// Link distance from the seed URL
    pub depth: u32,

    /// When the link was first discovered
    pub discovered_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    pending: VecDeque<FrontierEntry>,
    visited: HashSet<NormalizedUrl>,
    in_flight: usize,
    closed: bool,
}

/// Thread-safe frontier with dedup and a page budget
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<Inner>,
    notify: Notify,
    budget: PageBudget,
    poll_interval: Duration,
}

impl Frontier {
    /// Creates an empty frontier that will dispatch at most `max_pages` fetches
    pub fn new(max_pages: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            budget: PageBudget::new(max_pages),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets the bounded wait used by [`Frontier::dequeue`]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a URL unless it was seen before
    ///
    /// Silently does nothing if the URL is already in the visited set, the
    /// page budget is exhausted, or the frontier has been closed.
    ///
    /// # Returns
    ///
    /// * `true` - The URL was newly queued
    /// * `false` - The URL was dropped
    pub fn enqueue(&self, url: NormalizedUrl, depth: u32) -> bool {
        if self.budget.is_exhausted() {
            return false;
        }

        {
            let mut inner = self.lock();
            if inner.closed || inner.visited.contains(&url) {
                return false;
            }
            inner.visited.insert(url.clone());
            inner.pending.push_back(FrontierEntry {
                url,
                depth,
                discovered_at: Utc::now(),
            });
        }

        self.notify.notify_waiters();
        true
    }

    /// Takes the next entry, waiting while other workers may still add more
    ///
    /// Each returned entry counts as in flight until [`Frontier::complete`]
    /// is called for it.
    ///
    /// # Returns
    ///
    /// * `Some(FrontierEntry)` - The oldest pending entry
    /// * `None` - The frontier is closed or permanently drained
    pub async fn dequeue(&self) -> Option<FrontierEntry> {
        loop {
            // Register before checking so a wakeup between the check and the
            // wait is not lost
            let notified = self.notify.notified();

            {
                let mut inner = self.lock();
                if inner.closed {
                    return None;
                }
                if let Some(entry) = inner.pending.pop_front() {
                    inner.in_flight += 1;
                    return Some(entry);
                }
                if inner.in_flight == 0 {
                    inner.closed = true;
                    drop(inner);
                    tracing::debug!("Frontier drained");
                    self.notify.notify_waiters();
                    return None;
                }
            }

            let _ = tokio::time::timeout(self.poll_interval, notified).await;
        }
    }

    /// Marks one dequeued entry as finished
    pub fn complete(&self) {
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.notify.notify_waiters();
    }

    /// Reserves one slot of the page budget for a fetch
    ///
    /// Reserving the last slot closes the frontier: pending entries will
    /// never be dispatched and further enqueues are dropped.
    pub fn try_reserve(&self) -> bool {
        let reserved = self.budget.try_reserve();
        if reserved && self.budget.is_exhausted() {
            tracing::debug!("Page budget of {} reached", self.budget.max_pages());
            self.close();
        }
        reserved
    }

    /// Adds a URL to the visited set without queueing it
    ///
    /// Used for the final URL of a redirect chain. Returns false if the URL
    /// had already been seen.
    pub fn mark_visited(&self, url: &NormalizedUrl) -> bool {
        let mut inner = self.lock();
        if inner.visited.contains(url) {
            return false;
        }
        inner.visited.insert(url.clone());
        true
    }

    /// Stops dispatching and accepting entries
    ///
    /// In-flight entries are unaffected and may still call `complete`.
    pub fn close(&self) {
        {
            let mut inner = self.lock();
            inner.closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of entries waiting to be dispatched
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of distinct URLs ever admitted
    pub fn visited_len(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn budget(&self) -> &PageBudget {
        &self.budget
    }
}
