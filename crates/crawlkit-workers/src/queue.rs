//! Queue implementations: an in-memory FIFO for single-process runs and tests,
//! and a Redis-list-backed queue for multi-process deployments that share one
//! frontier across workers.

use async_trait::async_trait;
use crawlkit_types::error::{CrawlError, Result as CrawlResult};
use crawlkit_types::ports::queue::Queue;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;

/// Single-process FIFO guarded by a mutex, with a `Notify` so `dequeue`
/// doesn't busy-poll while waiting for an enqueue.
#[derive(Default)]
pub struct InMemoryQueue {
    items: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn enqueue(&self, url: &str) -> CrawlResult<()> {
        self.items.lock().await.push_back(url.to_string());
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, deadline: Duration) -> CrawlResult<Option<String>> {
        let expiry = Instant::now() + deadline;
        loop {
            if let Some(url) = self.items.lock().await.pop_front() {
                return Ok(Some(url));
            }
            let now = Instant::now();
            if now >= expiry {
                return Ok(None);
            }
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(expiry - now) => return Ok(None),
            }
        }
    }

    async fn len(&self) -> CrawlResult<usize> {
        Ok(self.items.lock().await.len())
    }
}

/// Redis-list-backed queue shared across processes. `BLPOP` provides the
/// blocking-with-deadline dequeue directly; no polling loop is needed.
pub struct RedisQueue {
    conn: Mutex<MultiplexedConnection>,
    key: String,
}

impl RedisQueue {
    pub async fn new(redis_url: &str, namespace: &str) -> CrawlResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CrawlError::Queue(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CrawlError::Queue(format!("redis connection failed: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: format!("{namespace}:urls"),
        })
    }
}

#[async_trait]
impl Queue for RedisQueue {
    async fn enqueue(&self, url: &str) -> CrawlResult<()> {
        let mut conn = self.conn.lock().await;
        conn.rpush::<_, _, ()>(&self.key, url)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))
    }

    async fn dequeue(&self, deadline: Duration) -> CrawlResult<Option<String>> {
        let mut conn = self.conn.lock().await;
        let timeout_secs = deadline.as_secs_f64().max(0.001);
        let popped: Option<(String, String)> = conn
            .blpop(&self.key, timeout_secs)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))?;
        match popped {
            Some((_, url)) => {
                debug!(url = %url, "dequeued URL from redis");
                Ok(Some(url))
            }
            None => Ok(None),
        }
    }

    async fn len(&self) -> CrawlResult<usize> {
        let mut conn = self.conn.lock().await;
        conn.llen(&self.key)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = InMemoryQueue::new();
        queue.enqueue("https://a.test").await.unwrap();
        queue.enqueue("https://b.test").await.unwrap();
        assert_eq!(
            queue.dequeue(Duration::from_millis(10)).await.unwrap(),
            Some("https://a.test".to_string())
        );
        assert_eq!(
            queue.dequeue(Duration::from_millis(10)).await.unwrap(),
            Some("https://b.test".to_string())
        );
    }

    #[tokio::test]
    async fn dequeue_times_out_on_empty_queue() {
        let queue = InMemoryQueue::new();
        let start = Instant::now();
        let result = queue.dequeue(Duration::from_millis(30)).await.unwrap();
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn dequeue_wakes_immediately_on_enqueue() {
        let queue = std::sync::Arc::new(InMemoryQueue::new());
        let q2 = queue.clone();
        let handle = tokio::spawn(async move { q2.dequeue(Duration::from_secs(5)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.enqueue("https://woken.test").await.unwrap();
        let result = tokio::time::timeout(Duration::from_millis(200), handle)
            .await
            .expect("dequeue should not hit the 5s deadline")
            .unwrap()
            .unwrap();
        assert_eq!(result, Some("https://woken.test".to_string()));
    }

    #[tokio::test]
    async fn len_reflects_queued_count() {
        let queue = InMemoryQueue::new();
        assert_eq!(queue.len().await.unwrap(), 0);
        queue.enqueue("https://a.test").await.unwrap();
        queue.enqueue("https://b.test").await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 2);
    }
}
