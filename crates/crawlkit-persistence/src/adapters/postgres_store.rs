//! PostgreSQL-backed `ScrapedPageStore`.
//!
//! # Table Schema
//!
//! ```sql
//! CREATE TABLE scraped_pages (
//!     url TEXT PRIMARY KEY,
//!     scraped_at TIMESTAMPTZ NOT NULL,
//!     content_hash TEXT NOT NULL
//! );
//! CREATE INDEX idx_scraped_pages_scraped_at ON scraped_pages (scraped_at DESC);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crawlkit_types::error::{CrawlError, Result as CrawlResult};
use crawlkit_types::ports::store::ScrapedPageStore;
use crawlkit_types::types::ScrapedPage;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> CrawlResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| CrawlError::Storage(format!("failed to connect to postgres: {e}")))?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `scraped_pages` table if it doesn't already exist.
    pub async fn migrate(&self) -> CrawlResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS scraped_pages (
                url TEXT PRIMARY KEY,
                scraped_at TIMESTAMPTZ NOT NULL,
                content_hash TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| CrawlError::Storage(format!("failed to create scraped_pages table: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ScrapedPageStore for PostgresStore {
    #[instrument(skip(self), fields(url = %url))]
    async fn save_scraped_data(
        &self,
        url: &str,
        scraped_at: DateTime<Utc>,
        content_hash: &str,
    ) -> CrawlResult<()> {
        debug!("upserting scraped page");
        sqlx::query(
            "INSERT INTO scraped_pages (url, scraped_at, content_hash)
             VALUES ($1, $2, $3)
             ON CONFLICT (url)
             DO UPDATE SET scraped_at = EXCLUDED.scraped_at, content_hash = EXCLUDED.content_hash",
        )
        .bind(url)
        .bind(scraped_at)
        .bind(content_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to upsert scraped page");
            CrawlError::Storage(format!("failed to save scraped page: {e}"))
        })?;
        Ok(())
    }

    async fn get_last_scrape_time(&self, url: &str) -> CrawlResult<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> =
            sqlx::query_as("SELECT scraped_at FROM scraped_pages WHERE url = $1")
                .bind(url)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CrawlError::Storage(format!("failed to read scrape time: {e}")))?;
        Ok(row.map(|(t,)| t))
    }

    async fn get_scraped_pages(&self, limit: usize) -> CrawlResult<Vec<ScrapedPage>> {
        self.get_scraped_pages_paginated(limit, 0).await
    }

    async fn get_scraped_pages_count(&self) -> CrawlResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scraped_pages")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CrawlError::Storage(format!("failed to count scraped pages: {e}")))?;
        Ok(count as usize)
    }

    async fn get_scraped_pages_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> CrawlResult<Vec<ScrapedPage>> {
        let rows: Vec<(String, DateTime<Utc>, String)> = sqlx::query_as(
            "SELECT url, scraped_at, content_hash FROM scraped_pages
             ORDER BY scraped_at DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CrawlError::Storage(format!("failed to list scraped pages: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(url, scraped_at, content_hash)| ScrapedPage {
                url,
                scraped_at,
                content_hash,
            })
            .collect())
    }
}
