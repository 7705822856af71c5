//! Persistence adapters for the scraped-page store: an in-memory map for
//! single-process runs and tests, and an optional PostgreSQL-backed
//! implementation (feature `postgres`) for durable multi-process deployments.

pub mod adapters;
pub mod memory_store;

pub use memory_store::InMemoryStore;

#[cfg(feature = "postgres")]
pub use adapters::PostgresStore;
