// src/ingest/scraper.rs
//! Scrape runs: one extraction per configured site, a few sites at a time,
//! with bounded retries on transient failures.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use rand::Rng;
use serde::Serialize;

use crate::config::sites::SiteTarget;
use crate::ingest::types::IngestReport;
use crate::ingest::{ensure_metrics_described, ingest_payload};
use crate::llm::PageExtractor;
use crate::store::Store;

pub const DEFAULT_WORKERS: usize = 3;
pub const DEFAULT_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeSettings {
    pub workers: usize,
    pub retries: u32,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            retries: DEFAULT_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScrapeSummary {
    pub sites: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub totals: IngestReport,
}

/// Randomized 1–3 s pause between attempts.
fn retry_backoff() -> Duration {
    Duration::from_millis(rand::rng().random_range(1_000..=3_000))
}

/// Scrape one site and store its records. Transient errors are retried up to
/// `retries` attempts in total; any other error abandons the site for this run.
pub async fn scrape_site(
    extractor: &dyn PageExtractor,
    store: &dyn Store,
    target: &SiteTarget,
    retries: u32,
) -> Option<IngestReport> {
    let attempts = retries.max(1);
    let prompt = target.prompt();

    for attempt in 1..=attempts {
        tracing::info!(site = %target.url, attempt, "starting scrape");
        match extractor.extract(&target.url, &prompt).await {
            Ok(payload) => {
                let report = ingest_payload(store, target.kind, &target.url, payload).await;
                tracing::info!(
                    site = %target.url,
                    received = report.received,
                    inserted = report.inserted,
                    duplicates = report.duplicates,
                    malformed = report.malformed,
                    "scraped and saved"
                );
                return Some(report);
            }
            Err(e) if e.is_transient() => {
                counter!("scrape_site_errors_total", "kind" => "transient").increment(1);
                tracing::error!(site = %target.url, attempt, error = %e, "request error while scraping");
                if attempt < attempts {
                    tokio::time::sleep(retry_backoff()).await;
                }
            }
            Err(e) => {
                counter!("scrape_site_errors_total", "kind" => "fatal").increment(1);
                tracing::error!(site = %target.url, attempt, error = %e, "scrape failed; skipping site");
                return None;
            }
        }
    }

    tracing::warn!(site = %target.url, attempts, "giving up on site for this run");
    None
}

/// Scrape every site with at most `settings.workers` in flight.
pub async fn run_scraper(
    extractor: &dyn PageExtractor,
    store: &dyn Store,
    sites: &[SiteTarget],
    settings: ScrapeSettings,
) -> ScrapeSummary {
    ensure_metrics_described();
    counter!("scrape_runs_total").increment(1);

    // Owned targets keep the stream future `Send` when spawned.
    let results: Vec<Option<IngestReport>> = stream::iter(sites.iter().cloned())
        .map(|site| async move { scrape_site(extractor, store, &site, settings.retries).await })
        .buffer_unordered(settings.workers.max(1))
        .collect()
        .await;

    let mut summary = ScrapeSummary {
        sites: sites.len(),
        ..Default::default()
    };
    for r in results {
        match r {
            Some(report) => {
                summary.succeeded += 1;
                summary.totals.merge(&report);
            }
            None => summary.failed += 1,
        }
    }

    gauge!("scrape_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
    tracing::info!(
        sites = summary.sites,
        succeeded = summary.succeeded,
        failed = summary.failed,
        inserted = summary.totals.inserted,
        "scrape run finished"
    );
    summary
}
