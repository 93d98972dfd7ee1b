// tests/ingest_dedup.rs
use anyhow::Result;
use chrono::NaiveDate;
use serde_json::json;

use scholarship_aggregator::config::SiteTarget;
use scholarship_aggregator::ingest::ingest_payload;
use scholarship_aggregator::ingest::scraper::{run_scraper, ScrapeSettings};
use scholarship_aggregator::llm::ScriptedExtractor;
use scholarship_aggregator::models::{NewNewsItem, NewScholarship, NewsItem, Scholarship};
use scholarship_aggregator::store::{MemoryStore, Store};
use scholarship_aggregator::subject::SubjectKind;

const SITE: &str = "https://www.example.org/scholarships";

#[tokio::test]
async fn same_title_across_runs_is_stored_once() {
    let store = MemoryStore::new();
    let payload = json!([
        {
            "program_title": "Future Leaders Award",
            "funded_by": "Example Foundation",
            "url": "https://example.org/fla",
            "deadline": "2025-03-31",
            "requirements": ["GPA 3.0", "Essay"]
        }
    ]);

    let first = ingest_payload(&store, SubjectKind::Scholarship, SITE, payload.clone()).await;
    assert_eq!(first.inserted, 1);
    assert_eq!(first.duplicates, 0);

    let second = ingest_payload(&store, SubjectKind::Scholarship, SITE, payload).await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 1);

    assert_eq!(store.scholarship_count(), 1);
    let row = store
        .find_scholarship_by_title("Future Leaders Award")
        .await
        .unwrap()
        .expect("stored");
    assert_eq!(row.deadline, NaiveDate::from_ymd_opt(2025, 3, 31));
    assert_eq!(row.requirements, Some(json!(["GPA 3.0", "Essay"])));
}

#[tokio::test]
async fn duplicate_titles_within_one_payload_collapse() {
    let store = MemoryStore::new();
    let payload = json!([
        { "program_title": "Arts Grant", "url": "https://example.org/a" },
        { "program_title": "Arts Grant", "url": "https://example.org/b" }
    ]);

    let report = ingest_payload(&store, SubjectKind::Scholarship, SITE, payload).await;
    assert_eq!(report.received, 2);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.duplicates, 1);

    // First one wins; no update of the existing record.
    let row = store.find_scholarship_by_title("Arts Grant").await.unwrap().unwrap();
    assert_eq!(row.url, "https://example.org/a");
}

#[tokio::test]
async fn unparseable_deadline_is_stored_as_absent() {
    let store = MemoryStore::new();
    let payload = json!({
        "program_title": "Rolling Admission Bursary",
        "url": "https://example.org/rab",
        "deadline": "rolling, apply any time"
    });

    let report = ingest_payload(&store, SubjectKind::Scholarship, SITE, payload).await;
    assert_eq!(report.inserted, 1);

    let row = store
        .find_scholarship_by_title("Rolling Admission Bursary")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.deadline, None);
}

#[tokio::test]
async fn entries_without_title_are_counted_malformed() {
    let store = MemoryStore::new();
    let payload = json!({
        "scholarships": [
            { "program_title": "Engineering Prize" },
            { "funded_by": "Nobody" },
            "just a string"
        ]
    });

    let report = ingest_payload(&store, SubjectKind::Scholarship, SITE, payload).await;
    assert_eq!(report.received, 3);
    assert_eq!(report.malformed, 2);
    assert_eq!(report.inserted, 1);

    // Missing url falls back to the scraped page.
    let row = store
        .find_scholarship_by_title("Engineering Prize")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.url, SITE);
}

#[tokio::test]
async fn news_is_deduplicated_by_title() {
    let store = MemoryStore::new();
    let payload = json!([
        { "title": "Applications open", "summary": "Round one", "published_at": "2025-01-15" },
        { "title": "Applications open", "summary": "Round two" }
    ]);

    let report = ingest_payload(&store, SubjectKind::News, "https://example.org/news", payload).await;
    assert_eq!(report.inserted, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(store.news_count(), 1);

    let row = store.find_news_by_title("Applications open").await.unwrap().unwrap();
    assert_eq!(row.summary.as_deref(), Some("Round one"));
    assert_eq!(row.published_at, NaiveDate::from_ymd_opt(2025, 1, 15));
}

/// In-memory store whose title lookups yield to the scheduler before
/// answering, the way a pooled database round-trip does.
#[derive(Default)]
struct YieldingLookupStore {
    inner: MemoryStore,
}

#[async_trait::async_trait]
impl Store for YieldingLookupStore {
    async fn list_scholarships(&self, skip: i64, limit: i64) -> Result<Vec<Scholarship>> {
        self.inner.list_scholarships(skip, limit).await
    }
    async fn get_scholarship(&self, id: i64) -> Result<Option<Scholarship>> {
        self.inner.get_scholarship(id).await
    }
    async fn find_scholarship_by_title(&self, title: &str) -> Result<Option<Scholarship>> {
        let found = self.inner.find_scholarship_by_title(title).await;
        tokio::task::yield_now().await;
        found
    }
    async fn insert_scholarship(&self, new: NewScholarship) -> Result<Option<i64>> {
        self.inner.insert_scholarship(new).await
    }
    async fn set_scholarship_image(&self, id: i64, image_url: &str) -> Result<()> {
        self.inner.set_scholarship_image(id, image_url).await
    }
    async fn set_scholarship_description(&self, id: i64, description: &str) -> Result<()> {
        self.inner.set_scholarship_description(id, description).await
    }
    async fn scholarships_missing_image(&self) -> Result<Vec<i64>> {
        self.inner.scholarships_missing_image().await
    }
    async fn scholarships_missing_description(&self) -> Result<Vec<Scholarship>> {
        self.inner.scholarships_missing_description().await
    }
    async fn list_news(&self, skip: i64, limit: i64) -> Result<Vec<NewsItem>> {
        self.inner.list_news(skip, limit).await
    }
    async fn get_news(&self, id: i64) -> Result<Option<NewsItem>> {
        self.inner.get_news(id).await
    }
    async fn find_news_by_title(&self, title: &str) -> Result<Option<NewsItem>> {
        let found = self.inner.find_news_by_title(title).await;
        tokio::task::yield_now().await;
        found
    }
    async fn insert_news(&self, new: NewNewsItem) -> Result<Option<i64>> {
        self.inner.insert_news(new).await
    }
    async fn set_news_image(&self, id: i64, image_url: &str) -> Result<()> {
        self.inner.set_news_image(id, image_url).await
    }
    async fn news_missing_image(&self) -> Result<Vec<i64>> {
        self.inner.news_missing_image().await
    }
}

#[tokio::test]
async fn concurrent_sites_store_title_once() {
    let store = YieldingLookupStore::default();
    let payload = json!([{ "program_title": "Shared Listing Award" }]);
    let extractor = ScriptedExtractor::new(vec![Ok(payload.clone()), Ok(payload.clone()), Ok(payload)]);
    let sites = vec![
        SiteTarget::scholarship("https://a.example.org"),
        SiteTarget::scholarship("https://b.example.org"),
        SiteTarget::scholarship("https://c.example.org"),
    ];

    let summary = run_scraper(
        &extractor,
        &store,
        &sites,
        ScrapeSettings {
            workers: 3,
            retries: 1,
        },
    )
    .await;

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.totals.inserted, 1);
    assert_eq!(summary.totals.duplicates, 2);
    assert_eq!(store.inner.scholarship_count(), 1);
}

#[tokio::test]
async fn joined_ingests_of_same_news_title_store_once() {
    let store = YieldingLookupStore::default();
    let payload = json!({ "title": "Portal reopens" });

    let (a, b) = tokio::join!(
        ingest_payload(&store, SubjectKind::News, "https://a.example.org", payload.clone()),
        ingest_payload(&store, SubjectKind::News, "https://b.example.org", payload),
    );

    assert_eq!(a.inserted + b.inserted, 1);
    assert_eq!(a.duplicates + b.duplicates, 1);
    assert_eq!(store.inner.news_count(), 1);
}
