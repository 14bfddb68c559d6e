use crate::url::LinkScope;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// The seed URL the crawl starts from
    pub start_url: String,

    /// Maximum number of pages fetched in one run
    pub max_pages: usize,

    /// Number of concurrent fetch workers
    pub workers: usize,

    /// Maximum link depth from the seed (unbounded if absent)
    pub max_depth: Option<u32>,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for retryable failures
    pub max_retries: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    pub retry_backoff_ms: u64,

    /// Maximum redirect hops followed per fetch
    pub max_redirects: usize,

    /// Minimum time between requests to the same host (milliseconds)
    pub min_delay_ms: u64,

    /// Upper bound for a Crawl-delay requested by robots.txt (seconds)
    pub max_crawl_delay_secs: u64,

    /// Wall-clock limit for the whole run (seconds)
    pub run_timeout_secs: Option<u64>,

    /// Which discovered links are followed
    pub scope: LinkScope,

    /// Path suffixes that are never enqueued (e.g. ".pdf")
    pub skip_extensions: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            max_pages: 50,
            workers: 5,
            max_depth: None,
            request_timeout_secs: 10,
            connect_timeout_secs: 5,
            max_retries: 2,
            retry_backoff_ms: 500,
            max_redirects: 5,
            min_delay_ms: 0,
            max_crawl_delay_secs: 30,
            run_timeout_secs: None,
            scope: LinkScope::default(),
            skip_extensions: Vec::new(),
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_crawl_delay(&self) -> Duration {
        Duration::from_secs(self.max_crawl_delay_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the crawler (the robots.txt product token)
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteIndexer".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Path to the JSON record store
    pub data_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_path: "crawled_data.json".to_string(),
        }
    }
}
