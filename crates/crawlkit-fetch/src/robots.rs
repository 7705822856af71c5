//! Per-host robots.txt cache.
//!
//! Each host's `robots.txt` is fetched at most once per TTL; the parsed rules
//! and the HTTP status of the fetch are cached together so policy (treat 4xx
//! as allow-all, 5xx as disallow-all) can be re-applied without re-fetching.

use crawlkit_types::types::ROBOTS_CACHE_TTL;
use dashmap::DashMap;
use reqwest::Client;
use robotstxt::DefaultMatcher;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Parsed,
    AllowAll,
    DisallowAll,
}

#[derive(Debug, Clone)]
struct RobotsEntry {
    body: String,
    outcome: FetchOutcome,
    fetched_at: Instant,
}

impl RobotsEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() > ttl
    }
}

/// Fetches and caches `robots.txt` per host, enforcing the allow/disallow
/// policy described by the HTTP status of the fetch.
pub struct RobotsCache {
    client: Client,
    user_agent: String,
    ttl: Duration,
    cache: DashMap<String, RobotsEntry>,
}

impl RobotsCache {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            ttl: ROBOTS_CACHE_TTL,
            cache: DashMap::new(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns whether `url` may be crawled. A network error fetching
    /// `robots.txt` is logged, cached as allow-all, and propagated to the
    /// caller so policy at the call site can decide whether to proceed.
    pub async fn is_allowed(&self, url: &url::Url) -> Result<bool, reqwest::Error> {
        let host = url.host_str().unwrap_or_default().to_string();
        let scheme = url.scheme();

        let entry = match self.cache.get(&host) {
            Some(e) if !e.is_expired(self.ttl) => e.clone(),
            _ => self.refresh(&host, scheme).await?,
        };

        let path_and_query = match url.query() {
            Some(q) => format!("{}?{}", normalize_path(url.path()), q),
            None => normalize_path(url.path()),
        };

        Ok(self.check(&entry, &path_and_query))
    }

    fn check(&self, entry: &RobotsEntry, path: &str) -> bool {
        match entry.outcome {
            FetchOutcome::AllowAll => true,
            FetchOutcome::DisallowAll => false,
            FetchOutcome::Parsed => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(&entry.body, &self.user_agent, path)
            }
        }
    }

    async fn refresh(&self, host: &str, scheme: &str) -> Result<RobotsEntry, reqwest::Error> {
        let robots_url = format!("{scheme}://{host}/robots.txt");
        debug!(host, robots_url = %robots_url, "fetching robots.txt");

        let fetch_result = self
            .client
            .get(&robots_url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await;

        let (entry, propagate) = match fetch_result {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await.unwrap_or_default();
                (
                    RobotsEntry {
                        body,
                        outcome: FetchOutcome::Parsed,
                        fetched_at: Instant::now(),
                    },
                    None,
                )
            }
            Ok(resp) if resp.status().is_client_error() => (
                RobotsEntry {
                    body: String::new(),
                    outcome: FetchOutcome::AllowAll,
                    fetched_at: Instant::now(),
                },
                None,
            ),
            Ok(resp) => {
                warn!(host, status = %resp.status(), "robots.txt fetch returned server error, disallowing host");
                (
                    RobotsEntry {
                        body: String::new(),
                        outcome: FetchOutcome::DisallowAll,
                        fetched_at: Instant::now(),
                    },
                    None,
                )
            }
            Err(err) => {
                warn!(host, error = %err, "robots.txt fetch failed, caching allow-all");
                (
                    RobotsEntry {
                        body: String::new(),
                        outcome: FetchOutcome::AllowAll,
                        fetched_at: Instant::now(),
                    },
                    Some(err),
                )
            }
        };

        self.cache.insert(host.to_string(), entry.clone());
        match propagate {
            Some(err) => Err(err),
            None => Ok(entry),
        }
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> RobotsCache {
        RobotsCache::new(Client::new(), "crawlkit-test")
    }

    #[test]
    fn normalizes_empty_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/secret"), "/secret");
    }

    #[test]
    fn allow_all_permits_everything() {
        let c = cache();
        let entry = RobotsEntry {
            body: String::new(),
            outcome: FetchOutcome::AllowAll,
            fetched_at: Instant::now(),
        };
        assert!(c.check(&entry, "/anything"));
    }

    #[test]
    fn disallow_all_blocks_everything() {
        let c = cache();
        let entry = RobotsEntry {
            body: String::new(),
            outcome: FetchOutcome::DisallowAll,
            fetched_at: Instant::now(),
        };
        assert!(!c.check(&entry, "/anything"));
    }

    #[test]
    fn parsed_rules_respect_disallow() {
        let c = cache();
        let entry = RobotsEntry {
            body: "User-agent: *\nDisallow: /secret\n".to_string(),
            outcome: FetchOutcome::Parsed,
            fetched_at: Instant::now(),
        };
        assert!(!c.check(&entry, "/secret"));
        assert!(c.check(&entry, "/public"));
    }

    #[test]
    fn expiry_is_ttl_bound() {
        let entry = RobotsEntry {
            body: String::new(),
            outcome: FetchOutcome::AllowAll,
            fetched_at: Instant::now() - Duration::from_secs(10),
        };
        assert!(entry.is_expired(Duration::from_secs(5)));
        assert!(!entry.is_expired(Duration::from_secs(20)));
    }
}
