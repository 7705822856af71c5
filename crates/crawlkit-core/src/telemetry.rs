//! Tracing subscriber setup for processes that embed [`crate::Crawler`].
//!
//! Exposition of metrics (Prometheus or otherwise) is out of scope for this
//! crate; this module only wires up structured logging via `tracing`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a `tracing_subscriber::registry()` with an `EnvFilter` (defaulting
/// to `info` when `RUST_LOG` is unset) and a human-readable `fmt` layer.
///
/// Call once, near the top of `main`, before any `tracing` calls. Calling it
/// more than once per process will panic, matching `tracing`'s own contract.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
