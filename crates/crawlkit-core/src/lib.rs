//! The crawl-orchestration core: the `Crawler` that wires per-host rate
//! limiting, circuit breaking, robots compliance, proxy rotation, the fetch
//! pipeline, and the worker pool into one lifecycle, plus the ambient
//! logging setup used by the binaries that embed this crate.
//!
//! The HTTP API/dashboard, configuration loading from the environment, and
//! Prometheus exposition are deliberately out of scope — they're the
//! responsibility of the process that constructs a [`Crawler`].

pub mod crawler;
pub mod telemetry;

pub use crawler::Crawler;
pub use crawlkit_types::config::{CrawlerConfig, ProxyConfig};
pub use crawlkit_types::error::{CrawlError, Result};
