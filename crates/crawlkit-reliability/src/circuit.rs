//! Per-host circuit breaker.
//!
//! Each host gets its own [`HostCircuit`]: Closed admits everything while
//! tracking a rolling window of success/failure timestamps; once the
//! failure ratio clears the threshold (and at least `failure_floor` failures
//! have been seen) the circuit trips Open. After `reset_timeout` the next
//! admission check moves it to HalfOpen, which lets a bounded number of
//! concurrent probes through: each admission holds a semaphore permit for
//! the probe's lifetime, released only when its outcome is recorded via
//! `record_success`/`record_failure`, so at most `success_required_to_close`
//! probes can be outstanding at once. A single failure there reopens the
//! circuit, `success_required_to_close` successes close it.

use crate::clock::Clock;
use crawlkit_types::ports::circuit_breaker::CircuitBreakerConfig;
use crawlkit_types::CircuitState;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering::Relaxed};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

fn state_to_u8(s: CircuitState) -> u8 {
    match s {
        CircuitState::Closed => 0,
        CircuitState::Open => 1,
        CircuitState::HalfOpen => 2,
    }
}

fn u8_to_state(v: u8) -> CircuitState {
    match v {
        1 => CircuitState::Open,
        2 => CircuitState::HalfOpen,
        _ => CircuitState::Closed,
    }
}

#[derive(Debug, Default)]
struct RollingWindow {
    failures: VecDeque<u64>,
    successes: VecDeque<u64>,
}

/// Circuit breaker for a single host.
#[derive(Debug)]
pub struct HostCircuit {
    state: AtomicU8,
    opened_at_ms: std::sync::atomic::AtomicU64,
    half_open_successes: std::sync::atomic::AtomicU32,
    half_open_permits: Arc<Semaphore>,
    /// Permits held by probes currently in flight in HalfOpen, one per
    /// admitted-but-not-yet-accounted-for probe. Released (one at a time) by
    /// `record_success`/`record_failure`, or drained in bulk whenever the
    /// state leaves HalfOpen so no permit is leaked.
    half_open_inflight: Mutex<Vec<OwnedSemaphorePermit>>,
    window: Mutex<RollingWindow>,
    cfg: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl HostCircuit {
    pub fn new(cfg: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        let permits = cfg.success_required_to_close.max(1) as usize;
        Self {
            state: AtomicU8::new(state_to_u8(CircuitState::Closed)),
            opened_at_ms: std::sync::atomic::AtomicU64::new(0),
            half_open_successes: std::sync::atomic::AtomicU32::new(0),
            half_open_permits: Arc::new(Semaphore::new(permits)),
            half_open_inflight: Mutex::new(Vec::new()),
            window: Mutex::new(RollingWindow::default()),
            cfg,
            clock,
        }
    }

    pub fn state(&self) -> CircuitState {
        u8_to_state(self.state.load(Relaxed))
    }

    /// Decide admission, performing Open→HalfOpen when the reset timeout has elapsed.
    pub fn is_allowed(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let now = self.clock.now_ms();
                let opened_at = self.opened_at_ms.load(Relaxed);
                if now.saturating_sub(opened_at) >= self.cfg.reset_timeout.as_millis() as u64 {
                    self.half_open_successes.store(0, Relaxed);
                    self.refill_half_open_permits();
                    self.state.store(state_to_u8(CircuitState::HalfOpen), Relaxed);
                    self.is_allowed()
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => match Arc::clone(&self.half_open_permits).try_acquire_owned() {
                // Probe admitted; the permit is held until its outcome is
                // recorded, so at most `success_required_to_close` probes
                // can be outstanding at once.
                Ok(permit) => {
                    self.half_open_inflight.lock().unwrap().push(permit);
                    true
                }
                Err(_) => false,
            },
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.prune_and_push(true);
            }
            CircuitState::HalfOpen => {
                self.release_one_half_open_permit();
                let count = self.half_open_successes.fetch_add(1, Relaxed) + 1;
                if count >= self.cfg.success_required_to_close {
                    self.state.store(state_to_u8(CircuitState::Closed), Relaxed);
                    self.half_open_successes.store(0, Relaxed);
                    self.drain_half_open_inflight();
                    let mut w = self.window.lock().unwrap();
                    w.failures.clear();
                    w.successes.clear();
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                if self.prune_and_push(false) {
                    self.trip_open();
                }
            }
            CircuitState::HalfOpen => {
                self.release_one_half_open_permit();
                self.trip_open();
            }
            CircuitState::Open => {}
        }
    }

    pub fn reset(&self) {
        self.state.store(state_to_u8(CircuitState::Closed), Relaxed);
        self.half_open_successes.store(0, Relaxed);
        self.drain_half_open_inflight();
        self.refill_half_open_permits();
        let mut w = self.window.lock().unwrap();
        w.failures.clear();
        w.successes.clear();
    }

    /// Release one outstanding HalfOpen probe permit (this call's own),
    /// restoring a slot in the semaphore.
    fn release_one_half_open_permit(&self) {
        self.half_open_inflight.lock().unwrap().pop();
    }

    /// Release every outstanding HalfOpen probe permit. Called whenever the
    /// state leaves HalfOpen (close or reopen) so probes still in flight at
    /// that moment don't leak their permit forever.
    fn drain_half_open_inflight(&self) {
        self.half_open_inflight.lock().unwrap().clear();
    }

    /// Push an event into the rolling window, evict anything older than
    /// `event_expiry`, and report whether the circuit should trip now.
    fn prune_and_push(&self, success: bool) -> bool {
        let now = self.clock.now_ms();
        let expiry_ms = self.cfg.event_expiry.as_millis() as u64;
        let mut w = self.window.lock().unwrap();

        if success {
            w.successes.push_back(now);
            while w.successes.len() as u32 > self.cfg.rolling_window_size {
                w.successes.pop_front();
            }
        } else {
            w.failures.push_back(now);
            while w.failures.len() as u32 > self.cfg.rolling_window_size {
                w.failures.pop_front();
            }
        }

        let cutoff = now.saturating_sub(expiry_ms);
        w.failures.retain(|&t| t >= cutoff);
        w.successes.retain(|&t| t >= cutoff);

        let failures = w.failures.len() as u32;
        let successes = w.successes.len() as u32;
        let total = failures + successes;
        if total == 0 || failures < self.cfg.failure_floor {
            return false;
        }
        let ratio = failures as f64 / total as f64;
        ratio >= self.cfg.failure_threshold
    }

    fn trip_open(&self) {
        self.state.store(state_to_u8(CircuitState::Open), Relaxed);
        self.opened_at_ms.store(self.clock.now_ms(), Relaxed);
        self.half_open_successes.store(0, Relaxed);
        self.drain_half_open_inflight();
        let mut w = self.window.lock().unwrap();
        w.failures.clear();
        w.successes.clear();
    }

    fn refill_half_open_permits(&self) {
        let target = self.cfg.success_required_to_close.max(1) as usize;
        let avail = self.half_open_permits.available_permits();
        if avail < target {
            self.half_open_permits.add_permits(target - avail);
        }
    }
}
