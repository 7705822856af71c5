//! Port interfaces for dependency inversion.
//!
//! Backend-agnostic trait definitions; concrete adapters live in their
//! respective crates (`crawlkit-reliability`, `crawlkit-fetch`,
//! `crawlkit-workers`, `crawlkit-persistence`).

pub mod circuit_breaker;
pub mod metrics;
pub mod queue;
pub mod rate_limit;
pub mod store;
pub mod worker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use metrics::{MetricsSink, NoopMetricsSink};
pub use queue::Queue;
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use store::ScrapedPageStore;
pub use worker::WorkerHealth;
