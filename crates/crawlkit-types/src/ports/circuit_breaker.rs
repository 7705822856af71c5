//! Circuit breaker port: per-host admission control and failure accounting.
//!
//! States: Closed (admit all, count failures), Open (reject, wait for reset
//! timeout), HalfOpen (admit a bounded number of probes to test recovery).

use crate::error::Result as CrawlResult;
use crate::types::CircuitState;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failure ratio in [0, 1] that trips the circuit.
    pub failure_threshold: f64,
    /// Minimum elapsed time after opening before the first probe is admitted.
    pub reset_timeout: Duration,
    /// Consecutive (or concurrent, depending on implementation) successes
    /// required in HalfOpen before transitioning to Closed.
    pub success_required_to_close: u32,
    /// Upper bound on retained success/failure events per host.
    pub rolling_window_size: u32,
    /// Minimum failure count before a circuit can trip, even above threshold ratio.
    pub failure_floor: u32,
    /// Age past which a recorded event is dropped from the rolling window.
    pub event_expiry: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 0.5,
            reset_timeout: Duration::from_secs(30),
            success_required_to_close: 3,
            rolling_window_size: 20,
            failure_floor: 3,
            event_expiry: Duration::from_secs(300),
        }
    }
}

/// Per-host circuit breaker admission and accounting.
///
/// A single implementation instance is expected to hold state for every host
/// it has seen, keyed internally; `host` identifies which entry an operation
/// applies to.
#[async_trait]
pub trait CircuitBreaker: Send + Sync {
    /// Decide admission for `host`. May itself perform the Open→HalfOpen
    /// transition when the reset timeout has elapsed.
    async fn is_allowed(&self, host: &str) -> bool;

    /// Record a successful call against `host`.
    async fn record_success(&self, host: &str);

    /// Record a failed call against `host`.
    async fn record_failure(&self, host: &str);

    /// Current state for `host`. A host that has never been observed is Closed.
    async fn get_state(&self, host: &str) -> CircuitState;

    /// Administrative reset to Closed, clearing failure history.
    async fn reset(&self, host: &str) -> CrawlResult<()>;
}
