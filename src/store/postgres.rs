// src/store/postgres.rs
use std::time::Duration;

use anyhow::{bail, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::Store;
use crate::models::{NewNewsItem, NewScholarship, NewsItem, Scholarship};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool sized from `DB_MAX_CONNECTIONS` / `DB_ACQUIRE_TIMEOUT_SECS`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5)
            .clamp(1, 32);

        let acquire_timeout_secs = std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10)
            .clamp(1, 60);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn ensure_updated(rows: u64, what: &str, id: i64) -> Result<()> {
    if rows == 0 {
        bail!("{what} {id} not found");
    }
    Ok(())
}

#[async_trait::async_trait]
impl Store for PgStore {
    async fn list_scholarships(&self, skip: i64, limit: i64) -> Result<Vec<Scholarship>> {
        let rows = sqlx::query_as::<_, Scholarship>(
            "SELECT * FROM scholarships ORDER BY id OFFSET $1 LIMIT $2",
        )
        .bind(skip.max(0))
        .bind(limit.max(0))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_scholarship(&self, id: i64) -> Result<Option<Scholarship>> {
        let row = sqlx::query_as::<_, Scholarship>("SELECT * FROM scholarships WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_scholarship_by_title(&self, title: &str) -> Result<Option<Scholarship>> {
        let row = sqlx::query_as::<_, Scholarship>(
            "SELECT * FROM scholarships WHERE program_title = $1 ORDER BY id LIMIT 1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_scholarship(&self, new: NewScholarship) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO scholarships (program_title, funded_by, url, deadline, requirements)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (program_title) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new.program_title)
        .bind(new.funded_by)
        .bind(new.url)
        .bind(new.deadline)
        .bind(new.requirements)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn set_scholarship_image(&self, id: i64, image_url: &str) -> Result<()> {
        let res = sqlx::query("UPDATE scholarships SET image_url = $2 WHERE id = $1")
            .bind(id)
            .bind(image_url)
            .execute(&self.pool)
            .await?;
        ensure_updated(res.rows_affected(), "scholarship", id)
    }

    async fn set_scholarship_description(&self, id: i64, description: &str) -> Result<()> {
        let res = sqlx::query("UPDATE scholarships SET description = $2 WHERE id = $1")
            .bind(id)
            .bind(description)
            .execute(&self.pool)
            .await?;
        ensure_updated(res.rows_affected(), "scholarship", id)
    }

    async fn scholarships_missing_image(&self) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM scholarships WHERE image_url IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn scholarships_missing_description(&self) -> Result<Vec<Scholarship>> {
        let rows = sqlx::query_as::<_, Scholarship>(
            "SELECT * FROM scholarships WHERE description IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_news(&self, skip: i64, limit: i64) -> Result<Vec<NewsItem>> {
        let rows =
            sqlx::query_as::<_, NewsItem>("SELECT * FROM news ORDER BY id OFFSET $1 LIMIT $2")
                .bind(skip.max(0))
                .bind(limit.max(0))
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    async fn get_news(&self, id: i64) -> Result<Option<NewsItem>> {
        let row = sqlx::query_as::<_, NewsItem>("SELECT * FROM news WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_news_by_title(&self, title: &str) -> Result<Option<NewsItem>> {
        let row = sqlx::query_as::<_, NewsItem>(
            "SELECT * FROM news WHERE title = $1 ORDER BY id LIMIT 1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_news(&self, new: NewNewsItem) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO news (title, summary, url, published_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (title) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(new.title)
        .bind(new.summary)
        .bind(new.url)
        .bind(new.published_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn set_news_image(&self, id: i64, image_url: &str) -> Result<()> {
        let res = sqlx::query("UPDATE news SET image_url = $2 WHERE id = $1")
            .bind(id)
            .bind(image_url)
            .execute(&self.pool)
            .await?;
        ensure_updated(res.rows_affected(), "news item", id)
    }

    async fn news_missing_image(&self) -> Result<Vec<i64>> {
        let ids =
            sqlx::query_scalar::<_, i64>("SELECT id FROM news WHERE image_url IS NULL ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    const SCHOLARSHIPS: &str = include_str!("../../migrations/0001_create_scholarships.sql");
    const NEWS: &str = include_str!("../../migrations/0002_create_news.sql");

    #[test]
    fn titles_are_unique_for_on_conflict_inserts() {
        assert!(SCHOLARSHIPS.contains("UNIQUE INDEX IF NOT EXISTS scholarships_program_title_key"));
        assert!(SCHOLARSHIPS.contains("ON scholarships (program_title)"));
        assert!(NEWS.contains("UNIQUE INDEX IF NOT EXISTS news_title_key ON news (title)"));
    }

    #[test]
    fn scraped_text_columns_are_unbounded() {
        // One overlong scraped field must not reject the whole record.
        for sql in [SCHOLARSHIPS, NEWS] {
            assert!(!sql.to_ascii_uppercase().contains("VARCHAR"), "{sql}");
        }
    }
}
