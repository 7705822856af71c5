//! Crawler configuration — the options recognized at the process boundary (see
//! the external-interfaces section of the design ledger for their effects).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub urls: Vec<String>,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            urls: Vec::new(),
            api_url: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// HTTP User-Agent header and robots.txt agent token.
    pub user_agent: String,
    /// If false, robots.txt checks are skipped entirely.
    pub respect_robots: bool,
    /// Derives the default per-host rate = 1/delay.
    pub default_delay: Duration,
    /// Number of additional attempts after the first.
    pub max_retries: u32,
    /// Base backoff for retries; actual delay is `retry_delay * 2^(attempt-1)`.
    pub retry_delay: Duration,
    /// Number of parallel workers.
    pub worker_count: usize,
    /// Per-HTTP-call deadline; also bounds rate-limiter waits.
    pub request_timeout: Duration,
    /// Default burst capacity of the per-host limiter.
    pub max_concurrent_hosts: u32,
    /// Circuit trip threshold, expressed as a failure ratio in [0, 1].
    pub circuit_breaker_ratio: f64,
    /// Circuit reset timeout: minimum elapsed time before the first probe is admitted.
    pub circuit_breaker_time: Duration,
    /// Dedup freshness window.
    pub cache_expiration: Duration,
    pub proxies: ProxyConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "crawlkit/0.1".to_string(),
            respect_robots: true,
            default_delay: Duration::from_secs(1),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
            worker_count: 4,
            request_timeout: Duration::from_secs(30),
            max_concurrent_hosts: 10,
            circuit_breaker_ratio: 0.5,
            circuit_breaker_time: Duration::from_secs(30),
            cache_expiration: Duration::from_secs(24 * 3600),
            proxies: ProxyConfig::default(),
        }
    }
}

impl CrawlerConfig {
    /// Tokens/second derived from `default_delay` (rate 0.2 = one fetch per five seconds).
    pub fn default_rate_per_second(&self) -> f64 {
        1.0 / self.default_delay.as_secs_f64()
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.worker_count == 0 {
            return Err(crate::error::CrawlError::Configuration(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.default_delay.is_zero() {
            return Err(crate::error::CrawlError::Configuration(
                "default_delay must be greater than zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.circuit_breaker_ratio) {
            return Err(crate::error::CrawlError::Configuration(
                "circuit_breaker_ratio must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_matches_delay() {
        let mut cfg = CrawlerConfig::default();
        cfg.default_delay = Duration::from_secs(5);
        assert!((cfg.default_rate_per_second() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn rejects_zero_workers() {
        let mut cfg = CrawlerConfig::default();
        cfg.worker_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let mut cfg = CrawlerConfig::default();
        cfg.circuit_breaker_ratio = 1.5;
        assert!(cfg.validate().is_err());
    }
}
