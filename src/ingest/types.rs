// src/ingest/types.rs
//! Scraped candidate records and the per-kind storage hooks the dedup gate uses.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::ingest::parse_date;
use crate::models::{NewNewsItem, NewScholarship};
use crate::store::Store;

/// A validated record ready for the dedup gate.
#[async_trait::async_trait]
pub trait IngestRecord: Send + Sync {
    /// Natural key; two records with the same key are the same record.
    fn natural_key(&self) -> &str;
    async fn exists(&self, store: &dyn Store) -> Result<bool>;
    /// Insert-if-absent; `None` when another writer stored the key first.
    async fn insert(self, store: &dyn Store) -> Result<Option<i64>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Entries after payload normalization.
    pub received: usize,
    /// Entries dropped as not well-formed.
    pub malformed: usize,
    /// Entries skipped because the title already exists.
    pub duplicates: usize,
    pub inserted: usize,
    /// Entries whose lookup or insert failed in storage.
    pub failed: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: &IngestReport) {
        self.received += other.received;
        self.malformed += other.malformed;
        self.duplicates += other.duplicates;
        self.inserted += other.inserted;
        self.failed += other.failed;
    }
}

/// First non-empty string among `keys`; numbers are stringified.
fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn first_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .filter(|v| !v.is_null())
}

fn date_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<chrono::NaiveDate> {
    let raw = text_field(obj, keys)?;
    let parsed = parse_date(&raw);
    if parsed.is_none() {
        tracing::debug!(value = %raw, "unparseable date dropped");
    }
    parsed
}

fn url_field(obj: &Map<String, Value>, keys: &[&str], fallback: &str) -> String {
    text_field(obj, keys)
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .unwrap_or_else(|| fallback.to_string())
}

impl NewScholarship {
    /// Build from one scraped entry. Returns `None` unless the entry is an
    /// object with a non-empty title. A missing or non-absolute URL falls back
    /// to `source_url`.
    pub fn from_scraped(value: &Value, source_url: &str) -> Option<Self> {
        let obj = value.as_object()?;
        let program_title = text_field(
            obj,
            &["program_title", "title", "name", "scholarship_name", "program"],
        )?;
        let requirements = first_value(obj, &["requirements", "eligibility"]).and_then(|v| match v {
            Value::String(s) if s.trim().is_empty() => None,
            Value::Array(a) if a.is_empty() => None,
            other => Some(other.clone()),
        });

        Some(NewScholarship {
            program_title,
            funded_by: text_field(
                obj,
                &["funded_by", "managed_funded_by", "managed_by", "provider", "sponsor"],
            ),
            url: url_field(obj, &["url", "link", "website"], source_url),
            deadline: date_field(obj, &["deadline", "due_date", "application_deadline"]),
            requirements,
        })
    }
}

impl NewNewsItem {
    pub fn from_scraped(value: &Value, source_url: &str) -> Option<Self> {
        let obj = value.as_object()?;
        let title = text_field(obj, &["title", "headline", "name"])?;
        Some(NewNewsItem {
            title,
            summary: text_field(obj, &["summary", "description", "excerpt", "content"]),
            url: url_field(obj, &["url", "link"], source_url),
            published_at: date_field(obj, &["published_at", "date", "published", "pub_date"]),
        })
    }
}

#[async_trait::async_trait]
impl IngestRecord for NewScholarship {
    fn natural_key(&self) -> &str {
        &self.program_title
    }

    async fn exists(&self, store: &dyn Store) -> Result<bool> {
        Ok(store
            .find_scholarship_by_title(&self.program_title)
            .await?
            .is_some())
    }

    async fn insert(self, store: &dyn Store) -> Result<Option<i64>> {
        store.insert_scholarship(self).await
    }
}

#[async_trait::async_trait]
impl IngestRecord for NewNewsItem {
    fn natural_key(&self) -> &str {
        &self.title
    }

    async fn exists(&self, store: &dyn Store) -> Result<bool> {
        Ok(store.find_news_by_title(&self.title).await?.is_some())
    }

    async fn insert(self, store: &dyn Store) -> Result<Option<i64>> {
        store.insert_news(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scholarship_from_scraped_uses_aliases_and_fallbacks() {
        let v = json!({
            "Program Title": "ignored",
            "title": "  Ontario Graduate Scholarship ",
            "managed_by": "Province of Ontario",
            "url": "/relative/link",
            "deadline": "sometime soon",
            "requirements": ["Full-time master's study", "Minimum A- average"]
        });
        let s = NewScholarship::from_scraped(&v, "https://yconic.com").unwrap();
        assert_eq!(s.program_title, "Ontario Graduate Scholarship");
        assert_eq!(s.funded_by.as_deref(), Some("Province of Ontario"));
        assert_eq!(s.url, "https://yconic.com");
        assert!(s.deadline.is_none());
        assert!(s.requirements.unwrap().is_array());
    }

    #[test]
    fn entries_without_title_are_rejected() {
        assert!(NewScholarship::from_scraped(&json!({"url": "https://x.org"}), "s").is_none());
        assert!(NewScholarship::from_scraped(&json!({"program_title": "   "}), "s").is_none());
        assert!(NewScholarship::from_scraped(&json!("just a string"), "s").is_none());
        assert!(NewNewsItem::from_scraped(&json!(42), "s").is_none());
    }

    #[test]
    fn news_from_scraped_parses_date() {
        let v = json!({"headline": "Tuition freeze extended", "date": "2024-12-23"});
        let n = NewNewsItem::from_scraped(&v, "https://news.example").unwrap();
        assert_eq!(n.title, "Tuition freeze extended");
        assert_eq!(n.published_at.unwrap().to_string(), "2024-12-23");
        assert_eq!(n.url, "https://news.example");
    }
}
