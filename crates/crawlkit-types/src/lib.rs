//! Shared types, configuration, and port traits for the crawl-orchestration
//! workspace. This crate has no business logic of its own; it exists to
//! break circular dependencies between `crawlkit-core` and the adapter
//! crates (`crawlkit-reliability`, `crawlkit-fetch`, `crawlkit-workers`,
//! `crawlkit-persistence`).

pub mod config;
pub mod error;
pub mod ports;
pub mod types;

pub use config::{CrawlerConfig, ProxyConfig};
pub use error::{CrawlError, Result};
pub use types::{host_of, CircuitState, ErrorClass, ProxyEntry, ScrapedPage};
