//! Proxy pool: round-robin transport selection over a set of upstream
//! proxies, with per-proxy health tracking and an optional hourly refresh
//! from an external provider.

use crawlkit_types::types::ProxyEntry;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const UNHEALTHY_ERROR_RATIO: f64 = 0.5;
const UNHEALTHY_FAILURE_FLOOR: u64 = 5;
const REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Configuration for an optional external proxy-list provider.
#[derive(Debug, Clone, Default)]
pub struct ProxyRefreshConfig {
    pub api_url: String,
    pub api_key: String,
}

/// A round-robin pool of upstream proxies. `transport_proxy` hands back a
/// `reqwest::Proxy` whose selection function walks the pool, skipping
/// unhealthy entries; when the pool is empty every request goes direct.
pub struct ProxyPool {
    entries: Arc<RwLock<Vec<ProxyEntry>>>,
    cursor: Arc<AtomicUsize>,
}

impl ProxyPool {
    pub fn new(urls: Vec<String>) -> Self {
        let entries = urls.into_iter().map(ProxyEntry::new).collect();
        Self {
            entries: Arc::new(RwLock::new(entries)),
            cursor: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Pick the next healthy proxy in round-robin order, or `None` if the
    /// pool is empty or every entry is unhealthy.
    fn next_healthy(&self) -> Option<String> {
        let entries = self.entries.read().unwrap();
        if entries.is_empty() {
            return None;
        }
        let len = entries.len();
        for step in 0..len {
            let idx = (self.cursor.fetch_add(1, Relaxed) + step) % len;
            if entries[idx].healthy {
                return Some(entries[idx].url.clone());
            }
        }
        None
    }

    /// A `reqwest::Proxy` that re-runs the round-robin selection on every
    /// request. Build one reqwest `Client` per `Fetcher` using this so
    /// rotation happens per outbound call rather than per client.
    pub fn transport_proxy(&self) -> Option<reqwest::Proxy> {
        let entries = Arc::clone(&self.entries);
        let cursor = Arc::clone(&self.cursor);
        if entries.read().unwrap().is_empty() {
            return None;
        }
        reqwest::Proxy::custom(move |_url| {
            let entries = entries.read().unwrap();
            if entries.is_empty() {
                return None;
            }
            let len = entries.len();
            for step in 0..len {
                let idx = (cursor.fetch_add(1, Relaxed) + step) % len;
                if entries[idx].healthy {
                    return Url::parse(&entries[idx].url).ok();
                }
            }
            None
        })
        .into()
    }

    pub fn record_success(&self, proxy_url: &str) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.url == proxy_url) {
            entry.successes += 1;
            entry.last_check = Some(chrono::Utc::now());
            Self::recompute_health(entry);
        }
    }

    pub fn record_failure(&self, proxy_url: &str) {
        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.iter_mut().find(|e| e.url == proxy_url) {
            entry.failures += 1;
            entry.last_check = Some(chrono::Utc::now());
            Self::recompute_health(entry);
        }
    }

    fn recompute_health(entry: &mut ProxyEntry) {
        let was_healthy = entry.healthy;
        entry.healthy = !(entry.error_rate() > UNHEALTHY_ERROR_RATIO
            && entry.failures >= UNHEALTHY_FAILURE_FLOOR);
        if was_healthy && !entry.healthy {
            warn!(proxy = %entry.url, error_rate = entry.error_rate(), "proxy marked unhealthy");
        }
    }

    pub fn snapshot(&self) -> Vec<ProxyEntry> {
        self.entries.read().unwrap().clone()
    }

    /// Atomically replace the pool, e.g. after a refresh from an external provider.
    pub fn replace(&self, urls: Vec<String>) {
        let mut entries = self.entries.write().unwrap();
        *entries = urls.into_iter().map(ProxyEntry::new).collect();
        self.cursor.store(0, Relaxed);
    }

    /// Spawn the hourly refresh ticker described by the pool's refresh config.
    /// The returned handle should be aborted during shutdown.
    pub fn spawn_refresh_task(
        self: &Arc<Self>,
        client: reqwest::Client,
        cfg: ProxyRefreshConfig,
    ) -> tokio::task::JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                match fetch_proxy_list(&client, &cfg).await {
                    Ok(urls) => {
                        info!(count = urls.len(), "refreshed proxy pool");
                        pool.replace(urls);
                    }
                    Err(err) => warn!(error = %err, "proxy pool refresh failed"),
                }
            }
        })
    }
}

async fn fetch_proxy_list(
    client: &reqwest::Client,
    cfg: &ProxyRefreshConfig,
) -> Result<Vec<String>, reqwest::Error> {
    let resp = client
        .get(&cfg.api_url)
        .bearer_auth(&cfg.api_key)
        .send()
        .await?
        .error_for_status()?;
    let body: ProxyListResponse = resp.json().await?;
    Ok(body.proxies)
}

#[derive(serde::Deserialize)]
struct ProxyListResponse {
    proxies: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_selects_nothing() {
        let pool = ProxyPool::empty();
        assert!(pool.next_healthy().is_none());
        assert!(pool.transport_proxy().is_none());
    }

    #[test]
    fn round_robin_cycles_through_entries() {
        let pool = ProxyPool::new(vec![
            "http://p1.test:8080".to_string(),
            "http://p2.test:8080".to_string(),
        ]);
        let first = pool.next_healthy().unwrap();
        let second = pool.next_healthy().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn unhealthy_proxy_is_skipped() {
        let pool = ProxyPool::new(vec![
            "http://bad.test:8080".to_string(),
            "http://good.test:8080".to_string(),
        ]);
        for _ in 0..6 {
            pool.record_failure("http://bad.test:8080");
        }
        for _ in 0..10 {
            assert_eq!(pool.next_healthy().unwrap(), "http://good.test:8080");
        }
    }

    #[test]
    fn health_recovers_is_not_automatic_but_ratio_is_live() {
        let pool = ProxyPool::new(vec!["http://p.test:8080".to_string()]);
        pool.record_failure("http://p.test:8080");
        pool.record_failure("http://p.test:8080");
        assert!(pool.snapshot()[0].healthy);
        for _ in 0..5 {
            pool.record_failure("http://p.test:8080");
        }
        assert!(!pool.snapshot()[0].healthy);
    }

    #[test]
    fn replace_resets_pool_atomically() {
        let pool = ProxyPool::new(vec!["http://old.test:8080".to_string()]);
        pool.replace(vec!["http://new.test:8080".to_string()]);
        assert_eq!(pool.snapshot().len(), 1);
        assert_eq!(pool.snapshot()[0].url, "http://new.test:8080");
    }
}
