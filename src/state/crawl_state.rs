use crate::crawler::Frontier;
use crate::state::PageOutcome;
use crate::storage::PageRecord;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Lifecycle phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CrawlPhase {
    Idle,
    Seeding,
    Running,
    Draining,
    Finalized,
}

impl CrawlPhase {
    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// Phases only move forward, one step at a time.
    pub fn can_advance_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Seeding)
                | (Self::Seeding, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Finalized)
        )
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Seeding => "seeding",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Finalized => "finalized",
        };
        write!(f, "{}", name)
    }
}

/// Global page budget shared by all workers
///
/// A slot is reserved when a URL is dispatched for fetching, so the number
/// of fetched pages can never exceed the maximum no matter how many workers
/// race for the last slot.
#[derive(Debug)]
pub struct PageBudget {
    max_pages: usize,
    reserved: AtomicUsize,
}

impl PageBudget {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages,
            reserved: AtomicUsize::new(0),
        }
    }

    /// Reserves one slot, returning false if the budget is spent
    pub fn try_reserve(&self) -> bool {
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_pages).then_some(n + 1)
            })
            .is_ok()
    }

    /// Returns true once every slot has been reserved
    pub fn is_exhausted(&self) -> bool {
        self.reserved.load(Ordering::Acquire) >= self.max_pages
    }

    pub fn reserved(&self) -> usize {
        self.reserved.load(Ordering::Acquire)
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }
}

/// Atomic per-run counters
#[derive(Debug, Default)]
pub struct CrawlCounters {
    fetched: AtomicUsize,
    failed: AtomicUsize,
    skipped_by_robots: AtomicUsize,
    non_html: AtomicUsize,
    duplicate_redirects: AtomicUsize,
    out_of_scope: AtomicUsize,
    abandoned: AtomicUsize,
    rejected: AtomicUsize,
}

/// A point-in-time copy of [`CrawlCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub fetched: usize,
    pub failed: usize,
    pub skipped_by_robots: usize,
    pub non_html: usize,
    pub duplicate_redirects: usize,
    pub out_of_scope: usize,
    pub abandoned: usize,
    pub rejected: usize,
}

impl CrawlCounters {
    /// Counts the outcome of one dequeued URL
    pub fn record(&self, outcome: PageOutcome) {
        if outcome.is_fetched() {
            self.fetched.fetch_add(1, Ordering::Relaxed);
        }
        let counter = match outcome {
            PageOutcome::Recorded => return,
            PageOutcome::NonHtml => &self.non_html,
            PageOutcome::DuplicateRedirect => &self.duplicate_redirects,
            PageOutcome::DisallowedByRobots => &self.skipped_by_robots,
            PageOutcome::RedirectOutOfScope => &self.out_of_scope,
            PageOutcome::BudgetExhausted | PageOutcome::Cancelled => &self.abandoned,
            PageOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a discovered link that could not become a crawl target
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped_by_robots: self.skipped_by_robots.load(Ordering::Relaxed),
            non_html: self.non_html.load(Ordering::Relaxed),
            duplicate_redirects: self.duplicate_redirects.load(Ordering::Relaxed),
            out_of_scope: self.out_of_scope.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// All mutable state of one crawl run
///
/// Owned by the coordinator and shared with the workers behind an `Arc`.
/// Dropped once its records have been merged into the record store.
#[derive(Debug)]
pub struct CrawlState {
    /// Pending URLs, visited set and page budget
    pub frontier: Frontier,

    /// Outcome counters
    pub counters: CrawlCounters,

    records: Mutex<Vec<PageRecord>>,
    started_at: Instant,
}

impl CrawlState {
    pub fn new(frontier: Frontier) -> Self {
        Self {
            frontier,
            counters: CrawlCounters::default(),
            records: Mutex::new(Vec::new()),
            started_at: Instant::now(),
        }
    }

    /// Stores a record produced by a worker
    pub fn push_record(&self, record: PageRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Takes every record produced so far
    pub fn take_records(&self) -> Vec<PageRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
