//! Metrics sink port: counters, gauges, and histograms emitted at each
//! crawler decision point. Exposition (e.g. Prometheus) lives outside the core.

/// Low-level metrics sink implemented by adapters.
pub trait MetricsSink: Send + Sync {
    /// Monotonically increasing counter (e.g. `scraped_pages_total`).
    fn incr_counter(&self, name: &str, value: u64, tags: &[(&str, &str)]);

    /// Point-in-time value (e.g. `workers_running`, `queue_size`).
    fn set_gauge(&self, name: &str, value: f64, tags: &[(&str, &str)]);

    /// Observed value for a distribution (e.g. `scraping_duration_seconds`).
    fn observe_histogram(&self, name: &str, value: f64, tags: &[(&str, &str)]);
}

/// Convenience no-op sink, useful as a default and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn incr_counter(&self, _name: &str, _value: u64, _tags: &[(&str, &str)]) {}
    fn set_gauge(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}
    fn observe_histogram(&self, _name: &str, _value: f64, _tags: &[(&str, &str)]) {}
}
