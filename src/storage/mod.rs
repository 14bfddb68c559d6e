//! Storage module for persisting crawl results
//!
//! This module handles the JSON record store, including:
//! - Page records and the first-crawled-preserving merge
//! - Reading both the legacy and the current file shapes
//! - Atomic saves (temporary file, then rename)
//! - Migration of legacy files

mod format;
mod json;
mod record;
pub mod timestamp;

pub use format::{LoadedStore, StoreShape};
pub use json::{
    check_writable, load, load_or_default, migrate, read_store, save, MigrationReport,
};
pub use record::{merge_record, MergeOutcome, PageRecord, RecordStore, StoreStats};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// No store file exists yet; a crawl can start from an empty store
    #[error("No record store at {}", .0.display())]
    EmptyStore(PathBuf),

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid record store {}: {message}", path.display())]
    Serialization { path: PathBuf, message: String },

    #[error("Failed to write record store {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns true if the caller may carry on with an empty store
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyStore(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
