//! Queue port: a pluggable FIFO of URL strings with blocking-dequeue semantics.
//!
//! At least two implementations are expected: a shared external queue (for
//! multi-process deployments) and an in-memory FIFO (single-process/testing).
//! `dequeue` never returns an error for "nothing to do" — it returns `None`,
//! and callers back off rather than busy-poll.

use crate::error::Result as CrawlResult;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Queue: Send + Sync {
    /// Append `url` to the tail.
    async fn enqueue(&self, url: &str) -> CrawlResult<()>;

    /// Remove and return the head, waiting up to `deadline` if empty.
    /// Returns `None` on an empty queue, never an error for that case.
    async fn dequeue(&self, deadline: Duration) -> CrawlResult<Option<String>>;

    /// Approximate number of URLs currently queued, for gauges.
    async fn len(&self) -> CrawlResult<usize>;
}
