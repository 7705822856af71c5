//! End-to-end scenarios for the fetch pipeline, against a real HTTP
//! transport (`wiremock`) instead of mocked port traits. Each test builds
//! the same components [`crawlkit_core::Crawler`] wires together, but
//! constructs them directly so circuit-breaker and rate-limiter timing can
//! be driven with a [`TestClock`] instead of wall time.

use crawlkit_fetch::{Fetcher, FetcherConfig, ProxyPool};
use crawlkit_persistence::InMemoryStore;
use crawlkit_reliability::{CircuitBreakerRegistry, PerHostRateLimiter, TestClock};
use crawlkit_types::ports::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crawlkit_types::ports::metrics::{MetricsSink, NoopMetricsSink};
use crawlkit_types::ports::store::ScrapedPageStore;
use crawlkit_types::CircuitState;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Records every counter increment by name, for assertions like
/// "`fetch_success_total` was incremented exactly once".
#[derive(Default)]
struct RecordingMetricsSink {
    counters: Mutex<HashMap<String, u64>>,
}

impl RecordingMetricsSink {
    fn count(&self, name: &str) -> u64 {
        *self.counters.lock().unwrap().get(name).unwrap_or(&0)
    }
}

impl MetricsSink for RecordingMetricsSink {
    fn incr_counter(&self, name: &str, value: u64, _tags: &[(&str, &str)]) {
        *self.counters.lock().unwrap().entry(name.to_string()).or_insert(0) += value;
    }
    fn set_gauge(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}
    fn observe_histogram(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}
}

fn fetcher_config(respect_robots: bool) -> FetcherConfig {
    FetcherConfig {
        user_agent: "crawlkit-test/1.0".to_string(),
        respect_robots,
        request_timeout: Duration::from_secs(5),
        cache_expiration: Duration::from_secs(3600),
    }
}

fn permissive_circuit_cfg() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold: 0.5,
        reset_timeout: Duration::from_secs(30),
        success_required_to_close: 2,
        rolling_window_size: 20,
        failure_floor: 3,
        event_expiry: Duration::from_secs(300),
    }
}

struct Harness {
    fetcher: Fetcher,
    store: Arc<InMemoryStore>,
    metrics: Arc<RecordingMetricsSink>,
    circuit: Arc<CircuitBreakerRegistry>,
}

fn build_harness(respect_robots: bool, circuit_cfg: CircuitBreakerConfig, clock: Arc<TestClock>) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(RecordingMetricsSink::default());
    let circuit = Arc::new(CircuitBreakerRegistry::with_clock(circuit_cfg, clock));
    let rate_limiter = Arc::new(PerHostRateLimiter::new(1000.0, 1000, Duration::from_secs(3600)));

    let fetcher = Fetcher::new(
        fetcher_config(respect_robots),
        circuit.clone(),
        rate_limiter,
        store.clone(),
        Arc::new(ProxyPool::empty()),
        metrics.clone(),
    )
    .expect("fetcher builds with a permissive config");

    Harness {
        fetcher,
        store,
        metrics,
        circuit,
    }
}

#[tokio::test]
async fn happy_path_persists_content_hash_and_counts_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&server)
        .await;

    let harness = build_harness(false, permissive_circuit_cfg(), Arc::new(TestClock::default()));
    let url = format!("{}/page", server.uri());

    harness.fetcher.fetch(&url).await.unwrap();

    assert_eq!(harness.metrics.count("fetch_success_total"), 1);
    let last_scrape = harness.store.get_last_scrape_time(&url).await.unwrap();
    assert!(last_scrape.is_some());

    let pages = harness.store.get_scraped_pages(10).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(
        pages[0].content_hash,
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
}

#[tokio::test]
async fn robots_disallow_skips_the_http_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .mount(&server)
        .await;
    // No mock is registered for GET /private: if the fetcher ever calls it,
    // wiremock's unmatched-request panic (on drop) fails the test.

    let harness = build_harness(true, permissive_circuit_cfg(), Arc::new(TestClock::default()));
    let url = format!("{}/private", server.uri());

    let err = harness.fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, crawlkit_types::error::CrawlError::RobotsDisallowed(_)));
    assert_eq!(harness.metrics.count("robots_disallowed_total"), 1);
}

#[tokio::test]
async fn three_consecutive_failures_trip_the_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let harness = build_harness(false, permissive_circuit_cfg(), Arc::new(TestClock::default()));
    let url = format!("{}/flaky", server.uri());
    let host = url::Url::parse(&url).unwrap().host_str().unwrap().to_string();

    for _ in 0..3 {
        assert!(harness.fetcher.fetch(&url).await.is_err());
    }

    assert_eq!(harness.circuit.get_state(&host).await, CircuitState::Open);

    // A fourth attempt is rejected before any HTTP call: wiremock would
    // panic on an unmatched request if the circuit let it through, since no
    // further mock responses are registered.
    let err = harness.fetcher.fetch(&url).await.unwrap_err();
    assert!(matches!(err, crawlkit_types::error::CrawlError::CircuitOpen(_)));
}

#[tokio::test]
async fn half_open_probe_recovers_after_reset_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recovers"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recovers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    // A second, distinct URL on the same host for the second HalfOpen probe:
    // dedup (fetcher step 2) would otherwise short-circuit a second fetch of
    // the *same* URL within cache_expiration before it ever reaches the
    // circuit breaker's record_success, so the close transition could never
    // be observed by refetching "/recovers" itself.
    Mock::given(method("GET"))
        .and(path("/recovers-again"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok too"))
        .mount(&server)
        .await;

    let clock = Arc::new(TestClock::default());
    let cfg = CircuitBreakerConfig {
        success_required_to_close: 2,
        reset_timeout: Duration::from_secs(30),
        ..permissive_circuit_cfg()
    };
    let harness = build_harness(false, cfg, clock.clone());
    let url = format!("{}/recovers", server.uri());
    let url2 = format!("{}/recovers-again", server.uri());
    let host = url::Url::parse(&url).unwrap().host_str().unwrap().to_string();

    for _ in 0..3 {
        assert!(harness.fetcher.fetch(&url).await.is_err());
    }
    assert_eq!(harness.circuit.get_state(&host).await, CircuitState::Open);

    clock.advance(30_000);

    assert!(harness.fetcher.fetch(&url).await.is_ok());
    assert_eq!(harness.circuit.get_state(&host).await, CircuitState::HalfOpen);
    assert!(harness.fetcher.fetch(&url2).await.is_ok());
    assert_eq!(harness.circuit.get_state(&host).await, CircuitState::Closed);
}

#[tokio::test]
async fn dedup_skips_refetch_within_cache_expiration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cached"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // No second mock: a repeat HTTP GET would panic on an unmatched request.

    let harness = build_harness(false, permissive_circuit_cfg(), Arc::new(TestClock::default()));
    let url = format!("{}/cached", server.uri());

    harness.fetcher.fetch(&url).await.unwrap();
    harness.fetcher.fetch(&url).await.unwrap();

    assert_eq!(harness.metrics.count("fetch_success_total"), 1);
    assert_eq!(harness.metrics.count("dedup_hit_total"), 1);
}

#[tokio::test]
async fn retries_transient_failures_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/unstable"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/unstable"))
        .respond_with(ResponseTemplate::new(200).set_body_string("stable now"))
        .mount(&server)
        .await;

    let harness = build_harness(false, permissive_circuit_cfg(), Arc::new(TestClock::default()));
    let url = format!("{}/unstable", server.uri());

    let max_retries = 3u32;
    let retry_delay = Duration::from_millis(10);
    let mut attempt = 0u32;
    let outcome = loop {
        match harness.fetcher.fetch(&url).await {
            Ok(()) => break Ok(()),
            Err(err) if err.is_retryable() && attempt < max_retries => {
                attempt += 1;
                tokio::time::sleep(retry_delay * 2u32.pow(attempt - 1)).await;
            }
            Err(err) => break Err(err),
        }
    };

    assert!(outcome.is_ok());
    assert_eq!(attempt, 2, "two retries on top of the first attempt, per wiremock's two 500s");
    assert_eq!(harness.metrics.count("fetch_success_total"), 1);
}
