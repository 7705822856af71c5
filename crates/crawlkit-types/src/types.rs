//! Domain types shared by the crawl-orchestration crates.

use std::time::Duration;

/// A scraped-page record: the only durable fact the core keeps about a URL.
///
/// `url` is the primary key; upserts overwrite `scraped_at` and `content_hash`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScrapedPage {
    pub url: String,
    pub scraped_at: chrono::DateTime<chrono::Utc>,
    pub content_hash: String,
}

/// State of a per-host circuit breaker.
///
/// Transitions are restricted to Closed→Open, Open→HalfOpen, HalfOpen→{Closed,Open}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// A proxy pool entry with rolling success/failure accounting.
#[derive(Debug, Clone)]
pub struct ProxyEntry {
    pub url: String,
    pub healthy: bool,
    pub successes: u64,
    pub failures: u64,
    pub last_check: Option<chrono::DateTime<chrono::Utc>>,
}

impl ProxyEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            healthy: true,
            successes: 0,
            failures: 0,
            last_check: None,
        }
    }

    /// failures / (failures + successes); 0.0 with no observations yet.
    pub fn error_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            self.failures as f64 / total as f64
        }
    }
}

/// How a fetch outcome should be classified for retry and circuit-accounting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Re-attempting cannot change the outcome; abandon immediately.
    Permanent,
    /// The cause may have cleared by the next attempt; eligible for retry.
    Transient,
}

/// Extract the host (authority, lowercased) from an absolute URL.
pub fn host_of(url: &url::Url) -> Option<String> {
    url.host_str().map(|h| h.to_ascii_lowercase())
}

/// Default eviction sweep interval for idle rate-limiter entries.
pub const RATE_LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(600);
/// Default idle TTL after which an unused rate-limiter entry is reclaimed.
pub const RATE_LIMITER_IDLE_TTL: Duration = Duration::from_secs(3600);
/// Default robots.txt cache TTL.
pub const ROBOTS_CACHE_TTL: Duration = Duration::from_secs(24 * 3600);
/// Hard cap on response body size read by the fetcher.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
/// Minimum backoff between empty-queue polls.
pub const MIN_EMPTY_POLL_BACKOFF: Duration = Duration::from_millis(500);
pub const MAX_EMPTY_POLL_BACKOFF: Duration = Duration::from_millis(1000);
