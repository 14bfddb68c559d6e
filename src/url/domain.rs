use url::{Host, Url};

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_indexer::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns the host plus any explicit, non-default port
///
/// This is the key politeness state is tracked under: two servers on the
/// same machine but different ports are different hosts.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_indexer::url::host_with_port;
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_with_port(&url), Some("127.0.0.1:8080".to_string()));
///
/// let url = Url::parse("https://example.com:443/").unwrap();
/// assert_eq!(host_with_port(&url), Some("example.com".to_string()));
/// ```
pub fn host_with_port(url: &Url) -> Option<String> {
    let host = extract_host(url)?;
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Builds the display/dedup name of a page: host and path, no trailing slash
///
/// The root page of `https://example.com/` is named `example.com`. The query
/// string is not part of the name.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_indexer::url::page_name;
///
/// let url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(page_name(&url), "example.com");
///
/// let url = Url::parse("https://example.com/docs/intro/?page=2").unwrap();
/// assert_eq!(page_name(&url), "example.com/docs/intro");
/// ```
pub fn page_name(url: &Url) -> String {
    let host = host_with_port(url).unwrap_or_default();
    let path = url.path().trim_end_matches('/');
    format!("{}{}", host, path)
}

/// Extracts the registrable domain (eTLD+1) using the Public Suffix List
///
/// IP addresses and hosts without a known public suffix (such as
/// `localhost`) are returned whole.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_indexer::url::registrable_domain;
///
/// let url = Url::parse("https://blog.example.co.uk/").unwrap();
/// assert_eq!(registrable_domain(&url), Some("example.co.uk".to_string()));
/// ```
pub fn registrable_domain(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) => {
            let domain = domain.to_lowercase();
            let registrable = psl::domain(domain.as_bytes())
                .map(|d| String::from_utf8_lossy(d.as_bytes()).to_string());
            Some(registrable.unwrap_or(domain))
        }
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}
