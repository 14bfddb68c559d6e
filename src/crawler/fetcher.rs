//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Single GET requests that hand redirects back to the caller
//! - Redirect following for robots.txt
//! - Content-Type classification
//! - Error classification for the retry policy

use crate::config::{CrawlerConfig, UserAgentConfig};
use reqwest::{header, redirect::Policy, Client, Response, StatusCode};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Errors from a single fetch attempt
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Too many redirects from {url}")]
    RedirectLimit { url: String },

    #[error("Redirect loop detected at {url}")]
    RedirectLoop { url: String },

    #[error("Invalid redirect from {url}: {message}")]
    BadRedirect { url: String, message: String },

    #[error("Request failed for {url}: {message}")]
    Network { url: String, message: String },
}

impl FetchError {
    /// Returns true if another attempt could succeed
    ///
    /// | Condition | Retry |
    /// |-----------|-------|
    /// | Timeout, connection failure, other network error | yes |
    /// | HTTP 5xx, HTTP 429 | yes |
    /// | Other HTTP status | no |
    /// | Redirect limit, loop, bad target | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Self::RedirectLimit { .. } | Self::RedirectLoop { .. } | Self::BadRedirect { .. } => {
                false
            }
        }
    }

    fn from_reqwest(url: &Url, e: reqwest::Error) -> Self {
        let url = url.to_string();
        if e.is_timeout() {
            Self::Timeout { url }
        } else if e.is_connect() {
            Self::Connect {
                url,
                message: e.to_string(),
            }
        } else {
            Self::Network {
                url,
                message: e.to_string(),
            }
        }
    }
}

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL the response was served from
    pub final_url: Url,
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: Option<String>,
    /// Page body; empty for non-HTML responses, which are not downloaded
    pub body: String,
}

impl FetchedPage {
    /// Returns true if the response declared an HTML content type
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(is_html_content_type)
    }
}

/// What a single page request produced
#[derive(Debug, Clone)]
pub enum FetchStep {
    /// A 2xx response
    Page(FetchedPage),
    /// A redirect to the given absolute http(s) URL, not yet requested
    Redirect(Url),
}

fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

/// Builds an HTTP client with proper configuration
///
/// Automatic redirects are disabled. Page requests go through
/// [`fetch_step`], which hands every redirect back to the caller so each
/// hop can be checked against robots.txt and paced like any other request.
///
/// # Example
///
/// ```no_run
/// use site_indexer::config::{CrawlerConfig, UserAgentConfig};
/// use site_indexer::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(crawler.request_timeout())
        .connect_timeout(crawler.connect_timeout())
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns the target of a redirect response, or None for a final answer
///
/// The `Location` header is resolved against `current` and must stay on
/// http(s). A 3xx without `Location` is a final answer.
fn redirect_target(current: &Url, response: &Response) -> Result<Option<Url>, FetchError> {
    if !response.status().is_redirection() {
        return Ok(None);
    }

    let Some(location) = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Ok(None);
    };

    let next = current.join(location).map_err(|e| FetchError::BadRedirect {
        url: current.to_string(),
        message: e.to_string(),
    })?;

    if next.scheme() != "http" && next.scheme() != "https" {
        return Err(FetchError::BadRedirect {
            url: current.to_string(),
            message: format!("unsupported scheme {}", next.scheme()),
        });
    }

    Ok(Some(next))
}

/// Sends a GET request and follows redirects without further checks
///
/// Used for robots.txt, whose redirects stay within the rules of the host
/// being asked about. Returns the first non-redirect response.
pub async fn get_following_redirects(
    client: &Client,
    url: &Url,
    max_redirects: usize,
) -> Result<Response, FetchError> {
    let mut current = url.clone();
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(current.as_str().to_string());

    for _ in 0..=max_redirects {
        let response = client
            .get(current.clone())
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&current, e))?;

        let Some(next) = redirect_target(&current, &response)? else {
            return Ok(response);
        };

        if !seen.insert(next.as_str().to_string()) {
            return Err(FetchError::RedirectLoop {
                url: next.to_string(),
            });
        }

        tracing::trace!("Redirect {} -> {}", current, next);
        current = next;
    }

    Err(FetchError::RedirectLimit {
        url: url.to_string(),
    })
}

/// Performs one request for a page
///
/// # Request Flow
///
/// 1. Send GET to exactly `url`
/// 2. 3xx with `Location` → `FetchStep::Redirect`; the target is not requested
/// 3. Other non-2xx status → `FetchError::Status`
/// 4. Read the body only when the Content-Type is HTML
///
/// Retries and redirect limits are the caller's concern; see
/// [`FetchError::is_retryable`].
pub async fn fetch_step(client: &Client, url: &Url) -> Result<FetchStep, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    if let Some(next) = redirect_target(url, &response)? {
        return Ok(FetchStep::Redirect(next));
    }

    let status = response.status();
    let final_url = response.url().clone();

    if !status.is_success() {
        return Err(FetchError::Status {
            url: final_url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let body = if content_type.as_deref().is_some_and(is_html_content_type) {
        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(&final_url, e))?
    } else {
        String::new()
    };

    Ok(FetchStep::Page(FetchedPage {
        final_url,
        status_code: status.as_u16(),
        content_type,
        body,
    }))
}
