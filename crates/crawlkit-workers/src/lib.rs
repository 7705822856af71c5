//! The queue and worker-pool layer: URLs flow from a [`Queue`](crawlkit_types::ports::queue::Queue)
//! implementation through a pool of workers that each run them through a
//! `crawlkit_fetch::Fetcher`, retrying transient failures with backoff.

pub mod queue;
pub mod worker;

pub use queue::{InMemoryQueue, RedisQueue};
pub use worker::{WorkerPool, WorkerPoolConfig};
