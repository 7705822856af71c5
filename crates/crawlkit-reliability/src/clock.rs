//! Clock abstraction so circuit-breaker and rate-limiter timing can be
//! driven deterministically in tests instead of depending on wall time.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Milliseconds since the Unix epoch (or any fixed origin for tests).
    fn now_ms(&self) -> u64;
}

#[derive(Default, Debug)]
pub struct RealClock;

impl Clock for RealClock {
    fn now_ms(&self) -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_else(|e| {
            tracing::error!("system clock is before the Unix epoch: {e}");
            std::time::Duration::from_secs(0)
        });
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Manually-advanced clock for tests.
#[derive(Default, Debug)]
pub struct TestClock {
    now: AtomicU64,
}

impl TestClock {
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Relaxed);
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Relaxed);
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Relaxed)
    }
}
