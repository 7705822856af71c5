//! Per-host rate-limiting port: token-bucket admission.

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Tokens per second (fractional allowed; 0.2 = one token per five seconds).
    pub rate: f64,
    /// Maximum token pool size.
    pub burst: u32,
}

/// Per-host token-bucket rate limiter.
///
/// Buckets are created lazily on first reference with the default rate/burst;
/// idle entries are reclaimed by a periodic sweep.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Block until a token is available for `host`, or `deadline` elapses.
    ///
    /// Returns `Err` on deadline expiry (a transient condition, not a limiter fault).
    async fn wait(&self, host: &str, deadline: Duration) -> Result<(), Duration>;

    /// Non-blocking check: would a token be granted right now? Consumes it if so.
    async fn allow(&self, host: &str) -> bool;

    /// Replace the bucket parameters for `host`.
    async fn set_rate(&self, host: &str, rate: f64, burst: u32);

    /// Number of hosts currently tracked (for monitoring/testing).
    async fn tracked_hosts_count(&self) -> usize;
}
