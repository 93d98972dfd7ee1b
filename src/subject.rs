//! Subject kinds that background jobs act on.
//!
//! Each kind knows how to load its entity, describe it as an image prompt and
//! write a generated image reference back to storage.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::{NewsItem, Scholarship};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Scholarship,
    News,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Scholarship => "scholarship",
            SubjectKind::News => "news",
        }
    }

    /// Load the entity with `id`, or `None` if it does not exist.
    pub async fn load(self, store: &dyn Store, id: i64) -> Result<Option<Subject>> {
        Ok(match self {
            SubjectKind::Scholarship => store.get_scholarship(id).await?.map(Subject::Scholarship),
            SubjectKind::News => store.get_news(id).await?.map(Subject::News),
        })
    }

    /// Ids of entities of this kind that have no image yet.
    pub async fn missing_image(self, store: &dyn Store) -> Result<Vec<i64>> {
        match self {
            SubjectKind::Scholarship => store.scholarships_missing_image().await,
            SubjectKind::News => store.news_missing_image().await,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind + id pair identifying one persisted entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: i64,
}

impl SubjectRef {
    pub fn new(kind: SubjectKind, id: i64) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Scholarship(Scholarship),
    News(NewsItem),
}

impl Subject {
    pub fn subject_ref(&self) -> SubjectRef {
        match self {
            Subject::Scholarship(s) => SubjectRef::new(SubjectKind::Scholarship, s.id),
            Subject::News(n) => SubjectRef::new(SubjectKind::News, n.id),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Subject::Scholarship(s) => &s.program_title,
            Subject::News(n) => &n.title,
        }
    }

    pub fn image_prompt(&self) -> String {
        match self {
            Subject::Scholarship(s) => {
                let funder = s
                    .funded_by
                    .as_deref()
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(|f| format!(" funded by {f}"))
                    .unwrap_or_default();
                format!(
                    "A professional, inspiring illustration for the scholarship program \"{}\"{funder}. \
                     Academic setting, students, books and graduation caps, bright optimistic colors, \
                     high quality digital art, no text.",
                    s.program_title.trim()
                )
            }
            Subject::News(n) => format!(
                "An editorial illustration for the education news story \"{}\". \
                 Clean modern style, soft lighting, high quality digital art, no text.",
                n.title.trim()
            ),
        }
    }

    /// Persist `image_url` as this entity's image reference.
    pub async fn attach_image(&self, store: &dyn Store, image_url: &str) -> Result<()> {
        match self {
            Subject::Scholarship(s) => store.set_scholarship_image(s.id, image_url).await,
            Subject::News(n) => store.set_news_image(n.id, image_url).await,
        }
    }
}
