use crate::url::domain::{host_with_port, registrable_domain};
use crate::url::NormalizedUrl;
use serde::Deserialize;

/// Which discovered links are followed, relative to the seed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LinkScope {
    /// Only the seed's exact host (and port)
    SameHost,
    /// Any host under the seed's registrable domain
    #[default]
    SameDomain,
    /// Every http(s) link
    Any,
}

impl LinkScope {
    /// Returns true if `candidate` may be crawled when starting from `seed`
    pub fn admits(&self, seed: &NormalizedUrl, candidate: &NormalizedUrl) -> bool {
        match self {
            Self::Any => true,
            Self::SameHost => {
                host_with_port(seed.as_url()) == host_with_port(candidate.as_url())
            }
            Self::SameDomain => {
                let seed_domain = registrable_domain(seed.as_url());
                seed_domain.is_some() && seed_domain == registrable_domain(candidate.as_url())
            }
        }
    }
}
