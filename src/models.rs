//! Persisted entities: scholarships and news items.
//!
//! Row types double as API response bodies. The `New*` types are what the
//! ingest gate hands to the store once a scraped record has been validated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A scholarship program as stored in `scholarships`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Scholarship {
    pub id: i64,
    pub program_title: String,
    pub funded_by: Option<String>,
    pub url: String,
    pub deadline: Option<NaiveDate>,
    /// Free-form requirements as returned by the extractor (string, list or object).
    pub requirements: Option<serde_json::Value>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewScholarship {
    pub program_title: String,
    pub funded_by: Option<String>,
    pub url: String,
    pub deadline: Option<NaiveDate>,
    pub requirements: Option<serde_json::Value>,
}

impl NewScholarship {
    pub fn into_row(self, id: i64) -> Scholarship {
        Scholarship {
            id,
            program_title: self.program_title,
            funded_by: self.funded_by,
            url: self.url,
            deadline: self.deadline,
            requirements: self.requirements,
            image_url: None,
            description: None,
        }
    }
}

/// A news article as stored in `news`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub url: String,
    pub published_at: Option<NaiveDate>,
    pub image_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNewsItem {
    pub title: String,
    pub summary: Option<String>,
    pub url: String,
    pub published_at: Option<NaiveDate>,
}

impl NewNewsItem {
    pub fn into_row(self, id: i64) -> NewsItem {
        NewsItem {
            id,
            title: self.title,
            summary: self.summary,
            url: self.url,
            published_at: self.published_at,
            image_url: None,
            description: None,
        }
    }
}
