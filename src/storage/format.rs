//! On-disk shapes of the record store
//!
//! Two shapes are readable:
//! - **Legacy**: a JSON array of `[name, title]` rows
//! - **Current**: a JSON object mapping name to `{name, title, first_crawled, last_crawled}`
//!
//! Only the current shape is ever written. [`StoreFile::into_store`] is the
//! one place where either shape becomes a [`RecordStore`].

use crate::storage::timestamp;
use crate::storage::{PageRecord, RecordStore};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Which shape a store file was read in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreShape {
    Legacy,
    Current,
}

impl fmt::Display for StoreShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Current => write!(f, "current"),
        }
    }
}

/// A current-shape entry as read, before missing fields are filled
#[derive(Debug, Clone, Deserialize)]
pub struct StoredEntry {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub first_crawled: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "timestamp::deserialize_option")]
    pub last_crawled: Option<DateTime<Utc>>,
}

/// A store file in either readable shape
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoreFile {
    /// Rows are kept as raw JSON so malformed rows can be skipped one by one
    Legacy(Vec<serde_json::Value>),
    Current(BTreeMap<String, StoredEntry>),
}

/// Result of coercing a store file
#[derive(Debug, Clone)]
pub struct LoadedStore {
    pub store: RecordStore,
    pub shape: StoreShape,
    /// Legacy rows that were not `[name, title, ...]` string arrays
    pub skipped: usize,
}

impl StoreFile {
    pub fn shape(&self) -> StoreShape {
        match self {
            Self::Legacy(_) => StoreShape::Legacy,
            Self::Current(_) => StoreShape::Current,
        }
    }

    /// Converts either shape into a record store
    ///
    /// Missing or null timestamps become `loaded_at`. A missing title
    /// becomes the record name. In the current shape the map key is the
    /// record name.
    pub fn into_store(self, loaded_at: DateTime<Utc>) -> LoadedStore {
        let shape = self.shape();
        let mut skipped = 0;

        let store: RecordStore = match self {
            Self::Legacy(rows) => rows
                .into_iter()
                .filter_map(|row| {
                    let record = legacy_row(&row, loaded_at);
                    if record.is_none() {
                        tracing::warn!("Skipping malformed legacy row: {}", row);
                        skipped += 1;
                    }
                    record
                })
                .collect(),
            Self::Current(entries) => entries
                .into_iter()
                .map(|(key, entry)| PageRecord {
                    title: entry.title.unwrap_or_else(|| key.clone()),
                    first_crawled: entry.first_crawled.unwrap_or(loaded_at),
                    last_crawled: entry.last_crawled.unwrap_or(loaded_at),
                    name: key,
                })
                .collect(),
        };

        LoadedStore {
            store,
            shape,
            skipped,
        }
    }
}

fn legacy_row(row: &serde_json::Value, loaded_at: DateTime<Utc>) -> Option<PageRecord> {
    let items = row.as_array()?;
    let name = items.first()?.as_str()?;
    let title = items.get(1)?.as_str()?;
    Some(PageRecord::new(name, title, loaded_at))
}
