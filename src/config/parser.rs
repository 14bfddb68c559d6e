use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads and parses a configuration file without validating it
///
/// Callers that layer command-line overrides on top of the file use this,
/// then call [`validate_config`](crate::config::validate_config) once the
/// final values are known.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Loads, parses and validates a configuration file
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use site_indexer::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Max pages: {}", config.crawler.max_pages);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so runs made with different settings can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Reads a configuration (unvalidated) and returns it with its hash
pub fn read_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = read_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
