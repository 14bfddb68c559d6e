//! Site-Indexer: a polite, resumable crawler for a static search index
//!
//! This crate discovers pages from a single seed URL, respects per-host
//! robots.txt rules and crawl delays, and merges the pages it finds into a
//! JSON record store that a static search front end reads.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid seed URL: {0}")]
    InvalidSeed(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output path is not writable: {0}")]
    UnwritableOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
///
/// Every variant is a rejection: the URL cannot become a crawl target.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, Coordinator};
pub use output::CrawlSummary;
pub use storage::{PageRecord, RecordStore};
pub use url::{normalize_url, resolve_url, NormalizedUrl};
