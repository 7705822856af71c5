//! The `Crawler` orchestrator: the collaborator-facing entry point that
//! wires the rate limiter, circuit breaker, fetcher, worker pool, and the
//! two periodic sweep tasks (rate-limiter idle eviction, proxy refresh)
//! into one lifecycle.

use crawlkit_fetch::{Fetcher, FetcherConfig, ProxyPool};
use crawlkit_persistence::InMemoryStore;
use crawlkit_reliability::{CircuitBreakerRegistry, PerHostRateLimiter};
use crawlkit_types::config::CrawlerConfig;
use crawlkit_types::error::{CrawlError, Result};
use crawlkit_types::ports::circuit_breaker::CircuitBreakerConfig;
use crawlkit_types::ports::metrics::{MetricsSink, NoopMetricsSink};
use crawlkit_types::ports::queue::Queue;
use crawlkit_types::ports::store::ScrapedPageStore;
use crawlkit_types::ports::worker::WorkerHealth;
use crawlkit_types::types::{RATE_LIMITER_IDLE_TTL, RATE_LIMITER_SWEEP_INTERVAL};
use crawlkit_workers::{InMemoryQueue, WorkerPool, WorkerPoolConfig};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

/// Wires the crawl-orchestration core together and owns its lifecycle:
/// worker pool, idle-rate-limiter sweep, and (if configured) proxy refresh.
///
/// Constructed once per process via [`Crawler::new`]; `start`/`stop` may be
/// called at most once each over the crawler's lifetime.
pub struct Crawler {
    queue: Arc<dyn Queue>,
    metrics: Arc<dyn MetricsSink>,
    rate_limiter: Arc<PerHostRateLimiter>,
    proxy_pool: Arc<ProxyPool>,
    worker_pool: WorkerPool,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
    refresh_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Crawler {
    /// Validates `cfg`, builds the reliability primitives and the fetch
    /// pipeline, and returns a `Crawler` ready for `start`. Fails fast on an
    /// invalid configuration or an HTTP transport that cannot be built.
    pub fn new(
        cfg: CrawlerConfig,
        queue: Arc<dyn Queue>,
        store: Arc<dyn ScrapedPageStore>,
        metrics: Arc<dyn MetricsSink>,
        proxy_pool: Arc<ProxyPool>,
    ) -> Result<Self> {
        cfg.validate()?;

        let rate_limiter = Arc::new(PerHostRateLimiter::new(
            cfg.default_rate_per_second(),
            cfg.max_concurrent_hosts,
            RATE_LIMITER_IDLE_TTL,
        ));

        let circuit_cfg = CircuitBreakerConfig {
            failure_threshold: cfg.circuit_breaker_ratio,
            reset_timeout: cfg.circuit_breaker_time,
            ..CircuitBreakerConfig::default()
        };
        let circuit = Arc::new(CircuitBreakerRegistry::new(circuit_cfg));

        let fetcher_cfg = FetcherConfig {
            user_agent: cfg.user_agent.clone(),
            respect_robots: cfg.respect_robots,
            request_timeout: cfg.request_timeout,
            cache_expiration: cfg.cache_expiration,
        };
        let fetcher = Arc::new(Fetcher::new(
            fetcher_cfg,
            circuit,
            rate_limiter.clone(),
            store,
            proxy_pool.clone(),
            metrics.clone(),
        )?);

        let worker_pool = WorkerPool::new(
            WorkerPoolConfig {
                worker_count: cfg.worker_count,
                max_retries: cfg.max_retries,
                retry_delay: cfg.retry_delay,
            },
            queue.clone(),
            fetcher,
            metrics.clone(),
        );

        Ok(Self {
            queue,
            metrics,
            rate_limiter,
            proxy_pool,
            worker_pool,
            worker_handles: Mutex::new(Vec::new()),
            sweep_handle: Mutex::new(None),
            refresh_handle: Mutex::new(None),
        })
    }

    /// Convenience constructor for single-process / test use: an in-memory
    /// queue, an in-memory store, a no-op metrics sink, and no proxies.
    pub fn in_memory(cfg: CrawlerConfig) -> Result<Self> {
        Self::new(
            cfg,
            Arc::new(InMemoryQueue::new()),
            Arc::new(InMemoryStore::new()),
            Arc::new(NoopMetricsSink),
            Arc::new(ProxyPool::empty()),
        )
    }

    /// Spawns `worker_count` workers and the rate-limiter idle-eviction
    /// sweep. Idempotent calls are not supported; call once per lifetime.
    pub async fn start(&self) {
        info!(worker_count = ?self.worker_pool.health().active_workers, "starting crawler");
        let handles = self.worker_pool.start();

        let sweep_limiter = self.rate_limiter.clone();
        let sweep = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RATE_LIMITER_SWEEP_INTERVAL);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                sweep_limiter.evict_idle();
            }
        });

        *self.worker_handles.lock().await = handles;
        *self.sweep_handle.lock().await = Some(sweep);
    }

    /// Same as [`Self::start`], but also spawns the hourly proxy-list
    /// refresh if `client`/`refresh_cfg` are supplied.
    pub async fn start_with_proxy_refresh(
        &self,
        client: reqwest::Client,
        refresh_cfg: crawlkit_fetch::ProxyRefreshConfig,
    ) {
        self.start().await;
        let handle = self.proxy_pool.spawn_refresh_task(client, refresh_cfg);
        *self.refresh_handle.lock().await = Some(handle);
    }

    /// Broadcasts stop to every worker, aborts the sweep tasks, and joins
    /// all worker handles before returning.
    pub async fn stop(&self) {
        info!("stopping crawler");
        if let Some(handle) = self.refresh_handle.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.sweep_handle.lock().await.take() {
            handle.abort();
        }
        let handles = std::mem::take(&mut *self.worker_handles.lock().await);
        self.worker_pool.stop(handles).await;
    }

    /// Single-shot enqueue; increments the queued-URLs counter.
    pub async fn enqueue_url(&self, url: &str) -> Result<()> {
        self.queue
            .enqueue(url)
            .await
            .map_err(|e| CrawlError::Queue(e.to_string()))?;
        self.metrics.incr_counter("urls_queued_total", 1, &[]);
        Ok(())
    }

    pub fn health(&self) -> WorkerHealth {
        self.worker_pool.health()
    }
}
