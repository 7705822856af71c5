//! Persistent-store port: dedup lookup, result upsert, paginated read.
//!
//! The core only needs the three operations `save`, `last_scrape_time`, and
//! the paginated reads used by external collaborators (not the fetcher
//! itself). The store is assumed durable and row-transactional.

use crate::error::Result as CrawlResult;
use crate::types::ScrapedPage;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ScrapedPageStore: Send + Sync {
    /// Upsert on `url`; advances `scraped_at`/`content_hash` unconditionally.
    async fn save_scraped_data(
        &self,
        url: &str,
        scraped_at: DateTime<Utc>,
        content_hash: &str,
    ) -> CrawlResult<()>;

    /// The stored `scraped_at` for `url`, or `None` if never scraped.
    async fn get_last_scrape_time(&self, url: &str) -> CrawlResult<Option<DateTime<Utc>>>;

    async fn get_scraped_pages(&self, limit: usize) -> CrawlResult<Vec<ScrapedPage>>;

    async fn get_scraped_pages_count(&self) -> CrawlResult<usize>;

    async fn get_scraped_pages_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> CrawlResult<Vec<ScrapedPage>>;
}
