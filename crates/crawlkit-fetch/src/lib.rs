//! The HTTP/network layer of the crawler: robots.txt compliance, proxy
//! rotation, and the strict per-URL fetch pipeline. Circuit breaking and
//! rate limiting are consumed through the port traits in `crawlkit-types`
//! rather than reimplemented here.

pub mod fetcher;
pub mod proxy;
pub mod robots;

pub use fetcher::{Fetcher, FetcherConfig};
pub use proxy::{ProxyPool, ProxyRefreshConfig};
pub use robots::RobotsCache;
