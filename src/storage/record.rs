use crate::storage::timestamp;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One crawled page as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Host + path; also the key in the store
    pub name: String,

    /// Display title
    pub title: String,

    /// When the page was first crawled; never changes once set
    #[serde(with = "timestamp")]
    pub first_crawled: DateTime<Utc>,

    /// When the page was most recently crawled
    #[serde(with = "timestamp")]
    pub last_crawled: DateTime<Utc>,
}

impl PageRecord {
    /// Creates a record for a page crawled at `crawled_at`
    pub fn new(name: impl Into<String>, title: impl Into<String>, crawled_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            first_crawled: crawled_at,
            last_crawled: crawled_at,
        }
    }
}

/// Combines a freshly crawled record with the stored one, if any
///
/// The stored `first_crawled` always survives; title and `last_crawled`
/// come from the new crawl.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use site_indexer::storage::{merge_record, PageRecord};
///
/// let first = Utc::now() - Duration::days(3);
/// let stored = PageRecord::new("example.com", "Old", first);
/// let fresh = PageRecord::new("example.com", "New", Utc::now());
///
/// let merged = merge_record(Some(&stored), fresh.clone());
/// assert_eq!(merged.first_crawled, first);
/// assert_eq!(merged.title, "New");
/// assert_eq!(merged.last_crawled, fresh.last_crawled);
/// ```
pub fn merge_record(existing: Option<&PageRecord>, incoming: PageRecord) -> PageRecord {
    match existing {
        None => incoming,
        Some(existing) => PageRecord {
            name: incoming.name,
            title: incoming.title,
            first_crawled: existing.first_crawled,
            last_crawled: incoming.last_crawled,
        },
    }
}

/// Whether a merge added a new record or updated one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Added,
    Updated,
}

/// Summary counts over a record store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of records
    pub total: usize,

    /// Records first crawled on the given day
    pub added_today: usize,

    /// Records last crawled on the given day
    pub updated_today: usize,
}

/// Mapping from page name to record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    records: BTreeMap<String, PageRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PageRecord> {
        self.records.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    /// Iterates records in name order
    pub fn iter(&self) -> impl Iterator<Item = &PageRecord> {
        self.records.values()
    }

    /// Merges one record into the store
    pub fn merge(&mut self, incoming: PageRecord) -> MergeOutcome {
        let existing = self.records.get(&incoming.name);
        let outcome = if existing.is_some() {
            MergeOutcome::Updated
        } else {
            MergeOutcome::Added
        };
        let merged = merge_record(existing, incoming);
        self.records.insert(merged.name.clone(), merged);
        outcome
    }

    /// Counts records first and last crawled on `day` (UTC)
    pub fn stats(&self, day: NaiveDate) -> StoreStats {
        let mut stats = StoreStats {
            total: self.records.len(),
            ..StoreStats::default()
        };
        for record in self.records.values() {
            if record.first_crawled.date_naive() == day {
                stats.added_today += 1;
            }
            if record.last_crawled.date_naive() == day {
                stats.updated_today += 1;
            }
        }
        stats
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<String, PageRecord> {
        &self.records
    }
}

impl FromIterator<PageRecord> for RecordStore {
    /// Builds a store; later records with the same name replace earlier ones
    fn from_iter<I: IntoIterator<Item = PageRecord>>(iter: I) -> Self {
        Self {
            records: iter
                .into_iter()
                .map(|record| (record.name.clone(), record))
                .collect(),
        }
    }
}
