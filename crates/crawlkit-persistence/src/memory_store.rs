//! In-memory `ScrapedPageStore`: a `DashMap` keyed on URL. Useful for tests
//! and single-process runs where durability across restarts isn't required.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crawlkit_types::error::Result as CrawlResult;
use crawlkit_types::ports::store::ScrapedPageStore;
use crawlkit_types::types::ScrapedPage;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryStore {
    pages: DashMap<String, ScrapedPage>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScrapedPageStore for InMemoryStore {
    async fn save_scraped_data(
        &self,
        url: &str,
        scraped_at: DateTime<Utc>,
        content_hash: &str,
    ) -> CrawlResult<()> {
        self.pages.insert(
            url.to_string(),
            ScrapedPage {
                url: url.to_string(),
                scraped_at,
                content_hash: content_hash.to_string(),
            },
        );
        Ok(())
    }

    async fn get_last_scrape_time(&self, url: &str) -> CrawlResult<Option<DateTime<Utc>>> {
        Ok(self.pages.get(url).map(|p| p.scraped_at))
    }

    async fn get_scraped_pages(&self, limit: usize) -> CrawlResult<Vec<ScrapedPage>> {
        self.get_scraped_pages_paginated(limit, 0).await
    }

    async fn get_scraped_pages_count(&self) -> CrawlResult<usize> {
        Ok(self.pages.len())
    }

    async fn get_scraped_pages_paginated(
        &self,
        limit: usize,
        offset: usize,
    ) -> CrawlResult<Vec<ScrapedPage>> {
        let mut pages: Vec<ScrapedPage> = self.pages.iter().map(|e| e.value().clone()).collect();
        pages.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
        Ok(pages.into_iter().skip(offset).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_advances_scraped_at() {
        let store = InMemoryStore::new();
        let t1 = Utc::now();
        store
            .save_scraped_data("https://a.test", t1, "hash1")
            .await
            .unwrap();
        let t2 = t1 + chrono::Duration::seconds(5);
        store
            .save_scraped_data("https://a.test", t2, "hash2")
            .await
            .unwrap();
        assert_eq!(
            store.get_last_scrape_time("https://a.test").await.unwrap(),
            Some(t2)
        );
        assert_eq!(store.get_scraped_pages_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_url_has_no_scrape_time() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.get_last_scrape_time("https://never.test").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn pagination_returns_newest_first() {
        let store = InMemoryStore::new();
        let base = Utc::now();
        for i in 0..5u32 {
            store
                .save_scraped_data(
                    &format!("https://page{i}.test"),
                    base + chrono::Duration::seconds(i as i64),
                    "h",
                )
                .await
                .unwrap();
        }
        let page = store.get_scraped_pages_paginated(2, 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].url, "https://page4.test");
        assert_eq!(page[1].url, "https://page3.test");

        let next = store.get_scraped_pages_paginated(2, 2).await.unwrap();
        assert_eq!(next[0].url, "https://page2.test");
    }
}
