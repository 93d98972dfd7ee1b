// tests/scraper_retry.rs
//
// Retry policy of a scrape run, driven by a scripted extractor.
// Paused clock so the randomized 1–3 s backoff costs nothing.

use serde_json::json;

use scholarship_aggregator::config::SiteTarget;
use scholarship_aggregator::ingest::scraper::{run_scraper, scrape_site, ScrapeSettings};
use scholarship_aggregator::llm::{ScrapeError, ScriptedExtractor};
use scholarship_aggregator::store::MemoryStore;

fn site() -> SiteTarget {
    SiteTarget::scholarship("https://www.example.org/awards")
}

fn server_error() -> ScrapeError {
    ScrapeError::Status {
        status: 503,
        url: "https://www.example.org/awards".into(),
    }
}

#[tokio::test(start_paused = true)]
async fn transient_errors_are_retried_until_success() {
    let store = MemoryStore::new();
    let extractor = ScriptedExtractor::new(vec![
        Err(ScrapeError::Transport("connection reset".into())),
        Err(server_error()),
        Ok(json!([{ "program_title": "Retry Scholarship" }])),
    ]);

    let report = scrape_site(&extractor, &store, &site(), 3)
        .await
        .expect("third attempt succeeds");

    assert_eq!(report.inserted, 1);
    assert_eq!(extractor.calls().len(), 3);
    assert_eq!(store.scholarship_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn non_transient_error_abandons_site_immediately() {
    let store = MemoryStore::new();
    let extractor = ScriptedExtractor::new(vec![
        Err(ScrapeError::Malformed("not JSON".into())),
        Ok(json!([{ "program_title": "Never Reached" }])),
    ]);

    let report = scrape_site(&extractor, &store, &site(), 3).await;

    assert!(report.is_none());
    assert_eq!(extractor.calls().len(), 1);
    assert_eq!(store.scholarship_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded() {
    let store = MemoryStore::new();
    let extractor = ScriptedExtractor::new(vec![
        Err(server_error()),
        Err(server_error()),
        Err(server_error()),
        Ok(json!([{ "program_title": "Too Late" }])),
    ]);

    let report = scrape_site(&extractor, &store, &site(), 3).await;

    assert!(report.is_none());
    assert_eq!(extractor.calls().len(), 3);
    assert_eq!(store.scholarship_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn run_scraper_summarizes_every_site() {
    let store = MemoryStore::new();
    // Workers = 1 keeps the scripted responses in site order.
    let extractor = ScriptedExtractor::new(vec![
        Ok(json!([
            { "program_title": "Alpha Award" },
            { "program_title": "Beta Award" }
        ])),
        Err(ScrapeError::MissingCredentials),
        Ok(json!({ "program_title": "Alpha Award" })),
    ]);
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
            workers: 1,
            retries: 3,
        },
    )
    .await;

    assert_eq!(summary.sites, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.totals.inserted, 2);
    assert_eq!(summary.totals.duplicates, 1);
    assert_eq!(store.scholarship_count(), 2);
}
