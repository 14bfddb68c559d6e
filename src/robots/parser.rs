//! Robots.txt parser implementation
//!
//! Allow/disallow matching is delegated to the robotstxt crate. Crawl-delay
//! is not part of that crate's matcher, so it is parsed here.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = parse content)
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt is absent or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Returns true if this policy permits every URL
    pub fn is_allow_all(&self) -> bool {
        self.allow_all || self.content.trim().is_empty()
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The crawler's product token (e.g. "SiteIndexer")
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.is_allow_all() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent, in seconds
    ///
    /// When a group names the agent, only that group's delay applies;
    /// otherwise the `*` group's delay is used.
    /// Consecutive `User-agent` lines share one group; a `User-agent` line
    /// after any other directive starts a new group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.is_allow_all() {
            return None;
        }

        let agent = user_agent.to_lowercase();
        let mut group_agents: Vec<String> = Vec::new();
        let mut group_has_rules = false;
        let mut agent_has_group = false;
        let mut delay_for_wildcard: Option<f64> = None;
        let mut delay_for_agent: Option<f64> = None;

        for line in self.content.lines() {
            // Strip trailing comments
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    if group_has_rules {
                        group_agents.clear();
                        group_has_rules = false;
                    }
                    let value = value.to_lowercase();
                    if value != "*" && !value.is_empty() && agent.contains(value.as_str()) {
                        agent_has_group = true;
                    }
                    group_agents.push(value);
                }
                "crawl-delay" => {
                    group_has_rules = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }
                    if group_agents
                        .iter()
                        .any(|ua| ua != "*" && !ua.is_empty() && agent.contains(ua.as_str()))
                    {
                        delay_for_agent = Some(delay);
                    } else if group_agents.iter().any(|ua| ua == "*") {
                        delay_for_wildcard = Some(delay);
                    }
                }
                _ => group_has_rules = true,
            }
        }

        if agent_has_group {
            delay_for_agent
        } else {
            delay_for_wildcard
        }
    }
}
