//! Host-keyed circuit breaker registry implementing the `CircuitBreaker` port.

use crate::circuit::HostCircuit;
use crate::clock::{Clock, RealClock};
use async_trait::async_trait;
use crawlkit_types::error::Result as CrawlResult;
use crawlkit_types::ports::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crawlkit_types::CircuitState;
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent map of per-host circuit breakers, created lazily on first use.
pub struct CircuitBreakerRegistry {
    hosts: DashMap<String, Arc<HostCircuit>>,
    cfg: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self::with_clock(cfg, Arc::new(RealClock))
    }

    pub fn with_clock(cfg: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            hosts: DashMap::new(),
            cfg,
            clock,
        }
    }

    fn entry(&self, host: &str) -> Arc<HostCircuit> {
        if let Some(existing) = self.hosts.get(host) {
            return existing.clone();
        }
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(HostCircuit::new(self.cfg.clone(), self.clock.clone())))
            .clone()
    }
}

#[async_trait]
impl CircuitBreaker for CircuitBreakerRegistry {
    async fn is_allowed(&self, host: &str) -> bool {
        self.entry(host).is_allowed()
    }

    async fn record_success(&self, host: &str) {
        self.entry(host).record_success();
    }

    async fn record_failure(&self, host: &str) {
        self.entry(host).record_failure();
    }

    async fn get_state(&self, host: &str) -> CircuitState {
        match self.hosts.get(host) {
            Some(entry) => entry.state(),
            None => CircuitState::Closed,
        }
    }

    async fn reset(&self, host: &str) -> CrawlResult<()> {
        self.entry(host).reset();
        Ok(())
    }
}
