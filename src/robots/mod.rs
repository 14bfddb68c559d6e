//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! A robots.txt that cannot be retrieved never blocks the crawl: every
//! failure maps to an allow-all policy.

mod cache;
mod parser;

pub use cache::CachedRobots;
pub use parser::ParsedRobots;

use crate::crawler::{get_following_redirects, FetchError};
use reqwest::{Client, StatusCode};
use url::Url;

/// Returns the robots.txt URL for the origin of `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    url.host_str()?;
    url.join("/robots.txt").ok()
}

/// Fetches robots.txt for the origin of a page URL
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `page_url` - Any URL on the host whose rules are wanted
/// * `max_redirects` - Redirect hops followed for the robots.txt request
///
/// # Returns
///
/// * `ParsedRobots` - The parsed rules, or an allow-all policy when the file
///   is missing, the server errors, or the request fails
pub async fn fetch_robots(client: &Client, page_url: &Url, max_redirects: usize) -> ParsedRobots {
    let Some(robots_url) = robots_url(page_url) else {
        return ParsedRobots::allow_all();
    };

    match try_fetch_robots(client, &robots_url, max_redirects).await {
        Ok(robots) => robots,
        Err(FetchError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
            tracing::debug!("No robots.txt at {}, allowing all", robots_url);
            ParsedRobots::allow_all()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}; allowing all", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

async fn try_fetch_robots(
    client: &Client,
    robots_url: &Url,
    max_redirects: usize,
) -> Result<ParsedRobots, FetchError> {
    let response = get_following_redirects(client, robots_url, max_redirects).await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: robots_url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| FetchError::Network {
        url: robots_url.to_string(),
        message: e.to_string(),
    })?;

    tracing::debug!("Fetched robots.txt from {} ({} bytes)", robots_url, body.len());
    Ok(ParsedRobots::from_content(&body))
}
