use crate::UrlError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// A crawlable URL: the canonical dedup key plus the URL to request
///
/// Two URLs that denote the same page always produce equal `NormalizedUrl`s.
/// Equality, ordering and hashing use the key only. The key is always
/// http(s), always has a host, never carries a fragment, and never ends in a
/// trailing slash except for the root path.
///
/// The request URL is the link as discovered with the host lowercased and
/// the fragment removed. Its path is left alone, so `/docs/` is requested as
/// `/docs/` and relative links on that page resolve below it.
#[derive(Debug, Clone)]
pub struct NormalizedUrl {
    key: Url,
    target: Url,
}

impl NormalizedUrl {
    /// Returns the canonical string form (the dedup key)
    pub fn as_str(&self) -> &str {
        self.key.as_str()
    }

    /// Returns the canonical URL
    pub fn as_url(&self) -> &Url {
        &self.key
    }

    /// Returns the URL a request for this page is sent to
    pub fn request_url(&self) -> &Url {
        &self.target
    }

    /// Returns the lowercase host
    pub fn host(&self) -> &str {
        // Invariant: normalization rejects URLs without a host
        self.key.host_str().unwrap_or_default()
    }

    /// Returns the canonical URL path
    pub fn path(&self) -> &str {
        self.key.path()
    }
}

impl PartialEq for NormalizedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for NormalizedUrl {}

impl Hash for NormalizedUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for NormalizedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NormalizedUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key.as_str())
    }
}

impl AsRef<str> for NormalizedUrl {
    fn as_ref(&self) -> &str {
        self.key.as_str()
    }
}

/// Normalizes an absolute URL string
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not http or https
/// 3. Lowercase the host (default ports are dropped by the parser)
/// 4. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 5. Remove fragment (everything after #)
///
/// The query string is kept verbatim, since it may select distinct content.
///
/// # Examples
///
/// ```
/// use site_indexer::url::normalize_url;
///
/// let url = normalize_url("HTTP://EXAMPLE.COM:80/docs/#intro").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/docs");
/// ```
pub fn normalize_url(url_str: &str) -> Result<NormalizedUrl, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize(url)
}

/// Resolves a possibly relative link against a base URL and normalizes it
///
/// # Examples
///
/// ```
/// use site_indexer::url::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/guide/start").unwrap();
/// let url = resolve_url("../api/", &base).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/api");
/// ```
pub fn resolve_url(href: &str, base: &Url) -> Result<NormalizedUrl, UrlError> {
    let url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize(url)
}

fn normalize(mut url: Url) -> Result<NormalizedUrl, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(UrlError::MissingHost)?
        .to_lowercase();

    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    url.set_fragment(None);
    let target = url.clone();

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    Ok(NormalizedUrl { key: url, target })
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}
