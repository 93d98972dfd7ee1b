// src/store/mod.rs
//! Storage port for scholarships and news.
//!
//! Two implementations: [`postgres::PgStore`] for deployments and
//! [`memory::MemoryStore`] for local runs without `DATABASE_URL` and for tests.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use anyhow::Result;

use crate::models::{NewNewsItem, NewScholarship, NewsItem, Scholarship};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait::async_trait]
pub trait Store: Send + Sync {
    async fn list_scholarships(&self, skip: i64, limit: i64) -> Result<Vec<Scholarship>>;
    async fn get_scholarship(&self, id: i64) -> Result<Option<Scholarship>>;
    /// Natural-key lookup used by the ingest dedup gate (exact title match).
    async fn find_scholarship_by_title(&self, title: &str) -> Result<Option<Scholarship>>;
    /// Insert unless the title is already stored; `None` when it is.
    /// The check and the insert are one atomic step.
    async fn insert_scholarship(&self, new: NewScholarship) -> Result<Option<i64>>;
    async fn set_scholarship_image(&self, id: i64, image_url: &str) -> Result<()>;
    async fn set_scholarship_description(&self, id: i64, description: &str) -> Result<()>;
    async fn scholarships_missing_image(&self) -> Result<Vec<i64>>;
    async fn scholarships_missing_description(&self) -> Result<Vec<Scholarship>>;

    async fn list_news(&self, skip: i64, limit: i64) -> Result<Vec<NewsItem>>;
    async fn get_news(&self, id: i64) -> Result<Option<NewsItem>>;
    async fn find_news_by_title(&self, title: &str) -> Result<Option<NewsItem>>;
    async fn insert_news(&self, new: NewNewsItem) -> Result<Option<i64>>;
    async fn set_news_image(&self, id: i64, image_url: &str) -> Result<()>;
    async fn news_missing_image(&self) -> Result<Vec<i64>>;
}

pub type DynStore = Arc<dyn Store>;
