//! Error types shared across the crawler workspace.

use crate::types::ErrorClass;
use thiserror::Error;

/// Result type alias using [`CrawlError`]
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Unified error type for crawl-orchestration operations.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Network-level failure (connection refused, DNS, TLS, etc.)
    #[error("network error: {0}")]
    Network(String),

    /// Operation timed out
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// robots.txt forbids fetching this URL
    #[error("disallowed by robots.txt: {0}")]
    RobotsDisallowed(String),

    /// The circuit breaker for a host is open
    #[error("circuit open for host: {0}")]
    CircuitOpen(String),

    /// Rate limiter rejected the request (should not normally surface, callers await the limiter)
    #[error("rate limited for host: {0}")]
    RateLimited(String),

    /// Persistent store operation failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Queue operation failed
    #[error("queue error: {0}")]
    Queue(String),

    /// Upstream responded with a non-2xx status; retryable like any transient failure
    #[error("non-2xx HTTP status {0} for {1}")]
    HttpStatus(u16, String),

    /// Configuration is invalid
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with a message, for adapter-specific failures
    #[error("{0}")]
    Custom(String),

    /// Escape hatch for error interoperability
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CrawlError {
    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(msg: S) -> Self {
        CrawlError::Custom(msg.into())
    }

    /// Classify this error as Permanent (retrying cannot change the outcome)
    /// or Transient (the cause may have cleared by the next attempt).
    pub fn class(&self) -> ErrorClass {
        match self {
            CrawlError::Network(_)
            | CrawlError::Timeout(_)
            | CrawlError::RateLimited(_)
            | CrawlError::HttpStatus(_, _) => ErrorClass::Transient,
            _ => ErrorClass::Permanent,
        }
    }

    /// Whether a fetch attempt that produced this error should be retried.
    ///
    /// Network errors, timeouts, rate-limit deadlines, and non-2xx HTTP
    /// statuses are transient; a decision made by robots.txt, the circuit
    /// breaker, or URL parsing won't change on immediate retry.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(CrawlError::Network("refused".into()).is_retryable());
        assert!(CrawlError::Timeout(5000).is_retryable());
        assert!(!CrawlError::RobotsDisallowed("/private".into()).is_retryable());
        assert!(CrawlError::HttpStatus(404, "https://x".into()).is_retryable());
        assert!(!CrawlError::CircuitOpen("x.test".into()).is_retryable());
    }

    #[test]
    fn class_agrees_with_is_retryable() {
        let errs: Vec<CrawlError> = vec![
            CrawlError::Network("x".into()),
            CrawlError::RobotsDisallowed("/x".into()),
            CrawlError::CircuitOpen("x.test".into()),
        ];
        for err in errs {
            assert_eq!(err.is_retryable(), err.class() == ErrorClass::Transient);
        }
    }

    #[test]
    fn url_parse_error_converts() {
        let err = url::Url::parse("not a url").unwrap_err();
        let crawl_err: CrawlError = err.into();
        assert!(matches!(crawl_err, CrawlError::InvalidUrl(_)));
    }
}
