//! HTML parser and link extractor
//!
//! This module handles parsing HTML content to extract:
//! - The page title (first non-empty `<title>`)
//! - Links to follow (from <a> tags and canonical links)
//!
//! and turns a fetched page into a record candidate plus the in-scope links
//! that should go back into the frontier.

use crate::config::CrawlerConfig;
use crate::url::{page_name, resolve_url, LinkScope, NormalizedUrl};
use scraper::{Html, Selector};
use std::collections::HashSet;

/// Raw information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from <title> tag), whitespace collapsed
    pub title: Option<String>,

    /// Candidate hrefs, in document order, not yet resolved
    pub hrefs: Vec<String>,
}

/// Parses HTML content and extracts the title and candidate links
///
/// Parsing never fails: malformed markup is repaired by the HTML parser and
/// whatever is recoverable is returned.
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - Empty and fragment-only hrefs
///
/// Scheme filtering happens later, during resolution.
///
/// # Example
///
/// ```
/// use site_indexer::crawler::parse_html;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let parsed = parse_html(html);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.hrefs, vec!["/page".to_string()]);
/// ```
pub fn parse_html(html: &str) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        hrefs: extract_hrefs(&document),
    }
}

/// Extracts the first non-empty title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .map(|element| {
            element
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .find(|s| !s.is_empty())
}

/// Extracts all candidate hrefs from the HTML document
fn extract_hrefs(document: &Html) -> Vec<String> {
    let mut hrefs = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }
            if let Some(href) = element.value().attr("href").and_then(usable_href) {
                hrefs.push(href);
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href").and_then(usable_href) {
                hrefs.push(href);
            }
        }
    }

    hrefs
}

fn usable_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    Some(href.to_string())
}

/// A fetched page turned into a record candidate and follow-up links
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    /// Record name (host + path)
    pub name: String,

    /// Display title, falling back to the name
    pub title: String,

    /// Normalized in-scope links, deduplicated within the page
    pub links: Vec<NormalizedUrl>,

    /// Links that could not be resolved into an http(s) URL
    pub rejected: usize,

    /// Valid links dropped by scope, depth or extension filters
    pub filtered: usize,
}

/// Decides which discovered links are followed
#[derive(Debug, Clone)]
pub struct Extractor {
    seed: NormalizedUrl,
    scope: LinkScope,
    max_depth: Option<u32>,
    skip_extensions: Vec<String>,
}

impl Extractor {
    /// Creates an extractor for a crawl rooted at `seed`
    pub fn new(seed: NormalizedUrl, config: &CrawlerConfig) -> Self {
        Self {
            seed,
            scope: config.scope,
            max_depth: config.max_depth,
            skip_extensions: config
                .skip_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Parses a page body and filters its links
    ///
    /// # Arguments
    ///
    /// * `body` - The HTML body
    /// * `page_url` - The final URL the body was served from; relative links
    ///   resolve against its request URL, the record name comes from its key
    /// * `depth` - Link depth of the page itself
    pub fn extract(&self, body: &str, page_url: &NormalizedUrl, depth: u32) -> ExtractedPage {
        let parsed = parse_html(body);
        let name = page_name(page_url.as_url());
        let title = parsed.title.unwrap_or_else(|| name.clone());

        let mut links: Vec<NormalizedUrl> = Vec::new();
        let mut seen: HashSet<NormalizedUrl> = HashSet::new();
        let mut rejected = 0;
        let mut filtered = 0;
        let child_depth = depth.saturating_add(1);

        for href in &parsed.hrefs {
            match resolve_url(href, page_url.request_url()) {
                Ok(link) => {
                    if !self.follows(&link, child_depth) {
                        filtered += 1;
                    } else if seen.insert(link.clone()) {
                        links.push(link);
                    }
                }
                Err(e) => {
                    tracing::trace!("Rejected link {} on {}: {}", href, page_url, e);
                    rejected += 1;
                }
            }
        }

        ExtractedPage {
            name,
            title,
            links,
            rejected,
            filtered,
        }
    }

    /// Returns true if a link at `depth` passes scope, depth and extension filters
    pub fn follows(&self, link: &NormalizedUrl, depth: u32) -> bool {
        if let Some(max_depth) = self.max_depth {
            if depth > max_depth {
                return false;
            }
        }

        if !self.scope.admits(&self.seed, link) {
            return false;
        }

        let path = link.path().to_ascii_lowercase();
        !self
            .skip_extensions
            .iter()
            .any(|ext| path.ends_with(ext.as_str()))
    }
}
