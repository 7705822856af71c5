//! Per-host token-bucket rate limiter, with lazy bucket creation and a
//! periodic idle-eviction sweep.

use async_trait::async_trait;
use crawlkit_types::ports::rate_limit::RateLimiter as RateLimiterPort;
use dashmap::DashMap;
use governor::clock::{Clock as GovernorClock, DefaultClock, QuantaInstant};
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type Bucket = GovernorRateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    DefaultClock,
>;

struct HostBucket {
    bucket: Bucket,
    last_used_ms: AtomicU64,
}

fn quota_for(rate: f64, burst: u32) -> Quota {
    let burst = NonZeroU32::new(burst.max(1)).unwrap();
    if rate >= 1.0 {
        Quota::per_second(NonZeroU32::new(rate.round().max(1.0) as u32).unwrap()).allow_burst(burst)
    } else {
        let period_ms = ((1.0 / rate) * 1000.0).round().max(1.0) as u64;
        Quota::with_period(Duration::from_millis(period_ms))
            .unwrap()
            .allow_burst(burst)
    }
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Concurrent per-host token-bucket limiter.
///
/// Buckets are created lazily with the configured default rate/burst; a
/// background sweep (driven externally via [`PerHostRateLimiter::evict_idle`])
/// reclaims entries whose `last_used` predates the idle TTL. Reference-counted
/// handles (`Arc<HostBucket>`) are cloned out of the map before use, so a
/// concurrent eviction sweep cannot invalidate a bucket a caller is already
/// waiting on.
pub struct PerHostRateLimiter {
    hosts: DashMap<String, Arc<HostBucket>>,
    default_rate: f64,
    default_burst: u32,
    idle_ttl: Duration,
}

impl PerHostRateLimiter {
    pub fn new(default_rate: f64, default_burst: u32, idle_ttl: Duration) -> Self {
        Self {
            hosts: DashMap::new(),
            default_rate,
            default_burst,
            idle_ttl,
        }
    }

    fn entry(&self, host: &str) -> Arc<HostBucket> {
        if let Some(existing) = self.hosts.get(host) {
            existing.last_used_ms.store(now_ms(), Relaxed);
            return existing.clone();
        }
        let created = self.hosts.entry(host.to_string()).or_insert_with(|| {
            debug!(host, "creating rate-limiter bucket");
            Arc::new(HostBucket {
                bucket: GovernorRateLimiter::direct(quota_for(self.default_rate, self.default_burst)),
                last_used_ms: AtomicU64::new(now_ms()),
            })
        });
        created.last_used_ms.store(now_ms(), Relaxed);
        created.clone()
    }

    /// Remove entries idle for longer than `idle_ttl`. Safe to call
    /// concurrently with `wait`/`allow`: a caller already holding a cloned
    /// `Arc<HostBucket>` keeps using it even if the map entry is dropped here.
    pub fn evict_idle(&self) {
        let cutoff = now_ms().saturating_sub(self.idle_ttl.as_millis() as u64);
        self.hosts
            .retain(|_, bucket| bucket.last_used_ms.load(Relaxed) >= cutoff);
    }

    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }
}

#[async_trait]
impl RateLimiterPort for PerHostRateLimiter {
    async fn wait(&self, host: &str, deadline: Duration) -> Result<(), Duration> {
        let entry = self.entry(host);
        let clock = DefaultClock::default();
        let deadline_instant = clock.now() + deadline;
        loop {
            match entry.bucket.check() {
                Ok(_) => return Ok(()),
                Err(not_until) => {
                    let wait_time = not_until.wait_time_from(clock.now());
                    if clock.now() >= deadline_instant {
                        return Err(deadline);
                    }
                    let remaining = deadline_instant.duration_since(clock.now());
                    tokio::time::sleep(wait_time.min(remaining)).await;
                    if clock.now() >= deadline_instant {
                        return Err(deadline);
                    }
                }
            }
        }
    }

    async fn allow(&self, host: &str) -> bool {
        self.entry(host).bucket.check().is_ok()
    }

    async fn set_rate(&self, host: &str, rate: f64, burst: u32) {
        let new_bucket = Arc::new(HostBucket {
            bucket: GovernorRateLimiter::direct(quota_for(rate, burst)),
            last_used_ms: AtomicU64::new(now_ms()),
        });
        self.hosts.insert(host.to_string(), new_bucket);
    }

    async fn tracked_hosts_count(&self) -> usize {
        self.tracked_hosts()
    }
}

trait DurationFromInstant {
    fn duration_since(&self, earlier: QuantaInstant) -> Duration;
}

impl DurationFromInstant for QuantaInstant {
    fn duration_since(&self, earlier: QuantaInstant) -> Duration {
        self.saturating_duration_since(earlier)
    }
}
