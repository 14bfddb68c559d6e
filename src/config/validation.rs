use crate::config::types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::url::normalize_url;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.start_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "start_url is required".to_string(),
        ));
    }

    normalize_url(&config.start_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid start_url '{}': {}", config.start_url, e))
    })?;

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.workers < 1 || config.workers > 100 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 100, got {}",
            config.workers
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.max_redirects > 20 {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= 20, got {}",
            config.max_redirects
        )));
    }

    if config.min_delay_ms > config.max_crawl_delay_secs.saturating_mul(1000) {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) exceeds max_crawl_delay_secs ({})",
            config.min_delay_ms, config.max_crawl_delay_secs
        )));
    }

    if config.run_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "run_timeout_secs must be > 0 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "data_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
