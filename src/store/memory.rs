// src/store/memory.rs
use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use super::Store;
use crate::models::{NewNewsItem, NewScholarship, NewsItem, Scholarship};

/// Process-local store. Ids are assigned from a single counter starting at 1.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    scholarships: BTreeMap<i64, Scholarship>,
    news: BTreeMap<i64, NewsItem>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scholarship_count(&self) -> usize {
        self.inner.lock().scholarships.len()
    }

    pub fn news_count(&self) -> usize {
        self.inner.lock().news.len()
    }
}

fn page<T: Clone>(rows: &BTreeMap<i64, T>, skip: i64, limit: i64) -> Vec<T> {
    rows.values()
        .skip(skip.max(0) as usize)
        .take(limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn list_scholarships(&self, skip: i64, limit: i64) -> Result<Vec<Scholarship>> {
        Ok(page(&self.inner.lock().scholarships, skip, limit))
    }

    async fn get_scholarship(&self, id: i64) -> Result<Option<Scholarship>> {
        Ok(self.inner.lock().scholarships.get(&id).cloned())
    }

    async fn find_scholarship_by_title(&self, title: &str) -> Result<Option<Scholarship>> {
        let g = self.inner.lock();
        Ok(g
            .scholarships
            .values()
            .find(|s| s.program_title == title)
            .cloned())
    }

    async fn insert_scholarship(&self, new: NewScholarship) -> Result<Option<i64>> {
        let mut g = self.inner.lock();
        if g
            .scholarships
            .values()
            .any(|s| s.program_title == new.program_title)
        {
            return Ok(None);
        }
        let id = g.next_id();
        g.scholarships.insert(id, new.into_row(id));
        Ok(Some(id))
    }

    async fn set_scholarship_image(&self, id: i64, image_url: &str) -> Result<()> {
        let mut g = self.inner.lock();
        let row = g
            .scholarships
            .get_mut(&id)
            .ok_or_else(|| anyhow!("scholarship {id} not found"))?;
        row.image_url = Some(image_url.to_string());
        Ok(())
    }

    async fn set_scholarship_description(&self, id: i64, description: &str) -> Result<()> {
        let mut g = self.inner.lock();
        let row = g
            .scholarships
            .get_mut(&id)
            .ok_or_else(|| anyhow!("scholarship {id} not found"))?;
        row.description = Some(description.to_string());
        Ok(())
    }

    async fn scholarships_missing_image(&self) -> Result<Vec<i64>> {
        let g = self.inner.lock();
        Ok(g
            .scholarships
            .values()
            .filter(|s| s.image_url.is_none())
            .map(|s| s.id)
            .collect())
    }

    async fn scholarships_missing_description(&self) -> Result<Vec<Scholarship>> {
        let g = self.inner.lock();
        Ok(g
            .scholarships
            .values()
            .filter(|s| s.description.is_none())
            .cloned()
            .collect())
    }

    async fn list_news(&self, skip: i64, limit: i64) -> Result<Vec<NewsItem>> {
        Ok(page(&self.inner.lock().news, skip, limit))
    }

    async fn get_news(&self, id: i64) -> Result<Option<NewsItem>> {
        Ok(self.inner.lock().news.get(&id).cloned())
    }

    async fn find_news_by_title(&self, title: &str) -> Result<Option<NewsItem>> {
        let g = self.inner.lock();
        Ok(g.news.values().find(|n| n.title == title).cloned())
    }

    async fn insert_news(&self, new: NewNewsItem) -> Result<Option<i64>> {
        let mut g = self.inner.lock();
        if g.news.values().any(|n| n.title == new.title) {
            return Ok(None);
        }
        let id = g.next_id();
        g.news.insert(id, new.into_row(id));
        Ok(Some(id))
    }

    async fn set_news_image(&self, id: i64, image_url: &str) -> Result<()> {
        let mut g = self.inner.lock();
        let row = g
            .news
            .get_mut(&id)
            .ok_or_else(|| anyhow!("news item {id} not found"))?;
        row.image_url = Some(image_url.to_string());
        Ok(())
    }

    async fn news_missing_image(&self) -> Result<Vec<i64>> {
        let g = self.inner.lock();
        Ok(g
            .news
            .values()
            .filter(|n| n.image_url.is_none())
            .map(|n| n.id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(title: &str) -> NewScholarship {
        NewScholarship {
            program_title: title.into(),
            funded_by: None,
            url: "https://example.org".into(),
            deadline: None,
            requirements: None,
        }
    }

    #[tokio::test]
    async fn pagination_and_missing_image_listing() {
        let store = MemoryStore::new();
        for t in ["A", "B", "C"] {
            store.insert_scholarship(sample(t)).await.unwrap();
        }
        store.set_scholarship_image(2, "/static/images/x.png").await.unwrap();

        let page = store.list_scholarships(1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].program_title, "B");

        assert_eq!(store.scholarships_missing_image().await.unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn insert_skips_existing_title() {
        let store = MemoryStore::new();
        assert_eq!(store.insert_scholarship(sample("A")).await.unwrap(), Some(1));
        assert_eq!(store.insert_scholarship(sample("A")).await.unwrap(), None);
        assert_eq!(store.scholarship_count(), 1);
    }

    #[tokio::test]
    async fn updating_unknown_row_is_an_error() {
        let store = MemoryStore::new();
        assert!(store.set_news_image(9, "x").await.is_err());
    }
}
