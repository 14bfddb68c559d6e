//! Politeness controller: robots.txt rules and per-host pacing
//!
//! Each host gets one slot holding its robots.txt rules (fetched once per
//! run) and its [`HostPolicy`]. The policy sits behind an async mutex that is
//! held across the pacing sleep, which serializes request starts per host
//! no matter how many workers target it. The mutex is released before the
//! request is issued. The robots.txt request takes a turn like any page.

use crate::robots::{fetch_robots, CachedRobots};
use crate::state::HostPolicy;
use crate::url::{host_with_port, NormalizedUrl};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OnceCell};

const DEFAULT_MAX_CRAWL_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct HostSlot {
    robots: OnceCell<CachedRobots>,
    policy: AsyncMutex<HostPolicy>,
}

/// Gatekeeper consulted before every page request
#[derive(Debug)]
pub struct Politeness {
    client: Client,
    user_agent: String,
    min_delay: Duration,
    max_crawl_delay: Duration,
    max_redirects: usize,
    hosts: Mutex<HashMap<String, Arc<HostSlot>>>,
}

impl Politeness {
    /// Creates a controller
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `user_agent` - Product token matched against robots.txt groups
    /// * `min_delay` - Floor for the spacing between requests to one host
    /// * `max_redirects` - Redirect hops followed for robots.txt
    pub fn new(
        client: Client,
        user_agent: impl Into<String>,
        min_delay: Duration,
        max_redirects: usize,
    ) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            min_delay,
            max_crawl_delay: DEFAULT_MAX_CRAWL_DELAY.max(min_delay),
            max_redirects,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// Caps the Crawl-delay a robots.txt may impose
    pub fn with_max_crawl_delay(mut self, max_crawl_delay: Duration) -> Self {
        self.max_crawl_delay = max_crawl_delay;
        self
    }

    fn slot(&self, host: &str) -> Arc<HostSlot> {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(hosts.entry(host.to_string()).or_insert_with(|| {
            Arc::new(HostSlot {
                robots: OnceCell::new(),
                policy: AsyncMutex::new(HostPolicy::new(host, self.min_delay)),
            })
        }))
    }

    /// Checks robots.txt for a URL, fetching the host's rules on first use
    ///
    /// Concurrent first calls for the same host share one robots.txt
    /// request. A robots.txt that cannot be retrieved allows everything.
    pub async fn allows(&self, url: &NormalizedUrl) -> bool {
        let Some(host) = host_with_port(url.as_url()) else {
            return false;
        };
        let slot = self.slot(&host);

        let robots = slot
            .robots
            .get_or_init(|| async {
                wait_turn(&mut *slot.policy.lock().await).await;

                tracing::debug!("Fetching robots.txt for host: {}", host);
                let parsed =
                    fetch_robots(&self.client, url.request_url(), self.max_redirects).await;
                let cached = CachedRobots::new(parsed);

                let mut policy = slot.policy.lock().await;
                policy.apply_robots_delay(
                    cached.crawl_delay(&self.user_agent),
                    self.max_crawl_delay,
                    cached.fetched_at,
                );
                if policy.crawl_delay > Duration::ZERO {
                    tracing::debug!("Crawl delay for {}: {:?}", host, policy.crawl_delay);
                }
                cached
            })
            .await;

        robots.is_allowed(url.request_url().as_str(), &self.user_agent)
    }

    /// Waits until the host may receive another request, then claims the slot
    ///
    /// Returns once `crawl_delay` has elapsed since the previous request
    /// released for this host.
    ///
    /// Dropping the returned future before it completes claims nothing.
    pub async fn acquire(&self, host: &str) {
        let slot = self.slot(host);
        let mut policy = slot.policy.lock().await;
        wait_turn(&mut policy).await;
    }

    /// Returns the effective crawl delay for a host, if it has been seen
    pub async fn crawl_delay(&self, host: &str) -> Option<Duration> {
        let slot = {
            let hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
            hosts.get(host).cloned()
        }?;
        let policy = slot.policy.lock().await;
        Some(policy.crawl_delay)
    }

    /// Number of hosts contacted so far
    pub fn host_count(&self) -> usize {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

async fn wait_turn(policy: &mut HostPolicy) {
    if let Some(wait) = policy.time_until_next_request(Instant::now()) {
        tracing::trace!("Waiting {:?} before next request to {}", wait, policy.host);
        tokio::time::sleep(wait).await;
    }
    policy.record_request(Instant::now());
}
