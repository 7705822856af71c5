//! Worker pool: `worker_count` workers each loop dequeue-fetch-retry until a
//! stop signal fires, then the pool joins all of them before returning.

use crawlkit_fetch::Fetcher;
use crawlkit_types::error::CrawlError;
use crawlkit_types::ports::metrics::MetricsSink;
use crawlkit_types::ports::queue::Queue;
use crawlkit_types::ports::worker::WorkerHealth;
use crawlkit_types::types::{MAX_EMPTY_POLL_BACKOFF, MIN_EMPTY_POLL_BACKOFF};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEQUEUE_DEADLINE: Duration = Duration::from_secs(1);

/// Worker pool configuration. `worker_count`, `max_retries`, and
/// `retry_delay` come from [`crawlkit_types::config::CrawlerConfig`].
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub worker_count: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// Spawns and supervises `worker_count` workers pulling URLs off a shared
/// [`Queue`] and running them through a [`Fetcher`].
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queue: Arc<dyn Queue>,
    fetcher: Arc<Fetcher>,
    metrics: Arc<dyn MetricsSink>,
    running: Arc<AtomicBool>,
    active_workers: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerPoolConfig,
        queue: Arc<dyn Queue>,
        fetcher: Arc<Fetcher>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            config,
            queue,
            fetcher,
            metrics,
            running: Arc::new(AtomicBool::new(false)),
            active_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Spawns `worker_count` worker tasks and returns immediately; call
    /// [`Self::stop`] to request shutdown and await the returned handles.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.running.store(true, Ordering::SeqCst);
        (0..self.config.worker_count)
            .map(|i| {
                let worker = WorkerLoop {
                    id: format!("worker-{i}"),
                    config: self.config.clone(),
                    queue: self.queue.clone(),
                    fetcher: self.fetcher.clone(),
                    metrics: self.metrics.clone(),
                    running: self.running.clone(),
                    active_workers: self.active_workers.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect()
    }

    /// Signals every worker to stop after its current iteration and waits
    /// for all of them to exit (join-all barrier).
    pub async fn stop(&self, handles: Vec<JoinHandle<()>>) {
        info!("stopping worker pool");
        self.running.store(false, Ordering::SeqCst);
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "worker task panicked");
            }
        }
        info!("worker pool stopped");
    }

    pub fn health(&self) -> WorkerHealth {
        WorkerHealth {
            active_workers: self.active_workers.load(Ordering::SeqCst),
            running: self.running.load(Ordering::SeqCst),
        }
    }
}

struct WorkerLoop {
    id: String,
    config: WorkerPoolConfig,
    queue: Arc<dyn Queue>,
    fetcher: Arc<Fetcher>,
    metrics: Arc<dyn MetricsSink>,
    running: Arc<AtomicBool>,
    active_workers: Arc<AtomicUsize>,
}

impl WorkerLoop {
    async fn run(self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
        debug!(worker_id = %self.id, "worker started");

        while self.running.load(Ordering::SeqCst) {
            match self.queue.dequeue(DEQUEUE_DEADLINE).await {
                Ok(Some(url)) => self.process(&url).await,
                Ok(None) => {
                    let jitter_ms = rand::thread_rng().gen_range(
                        MIN_EMPTY_POLL_BACKOFF.as_millis()..=MAX_EMPTY_POLL_BACKOFF.as_millis(),
                    );
                    tokio::time::sleep(Duration::from_millis(jitter_ms as u64)).await;
                }
                Err(err) => {
                    warn!(worker_id = %self.id, error = %err, "dequeue failed");
                    tokio::time::sleep(MIN_EMPTY_POLL_BACKOFF).await;
                }
            }
        }

        self.active_workers.fetch_sub(1, Ordering::SeqCst);
        debug!(worker_id = %self.id, "worker stopped");
    }

    /// Runs one URL through the fetcher with retry, per the spec's
    /// "additional attempts" semantics: `max_retries` retries on top of the
    /// first attempt, exponential backoff, permanent errors abort early.
    async fn process(&self, url: &str) {
        let started = std::time::Instant::now();
        let mut attempt = 0u32;

        let outcome = loop {
            match self.fetcher.fetch(url).await {
                Ok(()) => break Ok(()),
                Err(err) => {
                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        break Err(err);
                    }
                    attempt += 1;
                    let backoff = self.config.retry_delay * 2u32.pow(attempt - 1);
                    debug!(
                        worker_id = %self.id,
                        url,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "retrying after transient fetch error"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics
            .observe_histogram("fetch_duration_ms", elapsed_ms, &[]);

        match outcome {
            Ok(()) => {
                self.metrics.incr_counter("worker_fetch_ok_total", 1, &[]);
            }
            Err(CrawlError::CircuitOpen(host)) => {
                self.metrics
                    .incr_counter("worker_fetch_failed_total", 1, &[("host", &host)]);
            }
            Err(err) => {
                warn!(worker_id = %self.id, url, error = %err, "fetch failed permanently");
                self.metrics
                    .incr_counter("worker_fetch_failed_total", 1, &[]);
            }
        }
    }
}
