//! URL handling module
//!
//! This module provides URL normalization, link resolution, host and
//! page-name extraction, and the link scope policy.

mod domain;
mod normalize;
mod scope;

pub use domain::{extract_host, host_with_port, page_name, registrable_domain};
pub use normalize::{normalize_url, resolve_url, NormalizedUrl};
pub use scope::LinkScope;
