//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every key has a default except the seed URL, so a configuration
//! can also be assembled entirely from command-line flags.
//!
//! # Example
//!
//! ```no_run
//! use site_indexer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Crawler will fetch at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};

pub use parser::{compute_config_hash, load_config, read_config, read_config_with_hash};
pub use validation::validate as validate_config;
