// src/ingest/mod.rs
//! Ingestion of scraped payloads: payload normalization, lenient field parsing,
//! and the title-keyed dedup gate in front of the store.

pub mod scraper;
pub mod types;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use metrics::{counter, describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::ingest::types::{IngestRecord, IngestReport};
use crate::models::{NewNewsItem, NewScholarship};
use crate::store::Store;
use crate::subject::SubjectKind;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_runs_total", "Scrape runs started.");
        describe_counter!(
            "scrape_site_errors_total",
            "Site scrape attempts that ended in an error."
        );
        describe_counter!("ingest_inserted_total", "Scraped records inserted.");
        describe_counter!(
            "ingest_duplicates_total",
            "Scraped records skipped because the title already exists."
        );
        describe_counter!(
            "ingest_malformed_total",
            "Scraped entries dropped as not well-formed."
        );
        describe_counter!("image_jobs_total", "Image jobs finished, by outcome.");
        describe_counter!(
            "image_rate_limit_waits_total",
            "Times an image job slept waiting for the rate window."
        );
        describe_gauge!(
            "scrape_last_run_ts",
            "Unix ts when the last scrape run finished."
        );
    });
}

/// Flatten an extractor payload into a list of entries.
///
/// - array → its elements
/// - object → singleton, unless it has no title-like key and wraps exactly one
///   array (`{"scholarships": [...]}`), in which case that array is used
/// - anything else → empty
pub fn normalize_payload(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items,
        Value::Object(obj) => {
            let has_title = ["program_title", "title", "name", "headline"]
                .iter()
                .any(|k| obj.contains_key(*k));
            let arrays: Vec<&Value> = obj.values().filter(|v| v.is_array()).collect();
            if !has_title && arrays.len() == 1 {
                if let Some(Value::Array(items)) = arrays.first().map(|v| (*v).clone()) {
                    return items;
                }
            }
            vec![Value::Object(obj)]
        }
        _ => Vec::new(),
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
    "%m/%d/%Y",
    "%d.%m.%Y",
];

/// Best-effort date parsing for scraped values. Unparseable input yields `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim().trim_end_matches('.');
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    // "March 1st, 2025" → "March 1, 2025"
    let cleaned = strip_ordinal_suffixes(s);
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(&cleaned, f).ok())
}

fn strip_ordinal_suffixes(s: &str) -> String {
    static RE: OnceCell<regex::Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("ordinal regex")
    });
    re.replace_all(s, "$1").to_string()
}

/// Dedup gate: insert each record unless one with the same natural key is
/// already stored. The lookup skips known titles early; the insert itself is
/// insert-if-absent, so concurrent runs still store a title once. Storage
/// errors on a single record are counted and skipped.
pub async fn upsert_batch<R: IngestRecord>(store: &dyn Store, records: Vec<R>) -> IngestReport {
    let mut report = IngestReport::default();
    for rec in records {
        let key = rec.natural_key().to_string();
        match rec.exists(store).await {
            Ok(true) => {
                tracing::debug!(title = %key, "duplicate title skipped");
                report.duplicates += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(title = %key, error = %e, "dedup lookup failed");
                report.failed += 1;
                continue;
            }
        }
        match rec.insert(store).await {
            Ok(Some(id)) => {
                tracing::debug!(title = %key, id, "inserted scraped record");
                report.inserted += 1;
            }
            Ok(None) => {
                tracing::debug!(title = %key, "title stored concurrently; skipped");
                report.duplicates += 1;
            }
            Err(e) => {
                tracing::warn!(title = %key, error = %e, "insert failed");
                report.failed += 1;
            }
        }
    }
    report
}

/// Normalize, validate and store one extractor payload from `source_url`.
pub async fn ingest_payload(
    store: &dyn Store,
    kind: SubjectKind,
    source_url: &str,
    payload: Value,
) -> IngestReport {
    ensure_metrics_described();

    let entries = normalize_payload(payload);
    let received = entries.len();

    let mut report = match kind {
        SubjectKind::Scholarship => {
            let recs: Vec<NewScholarship> = entries
                .iter()
                .filter_map(|v| NewScholarship::from_scraped(v, source_url))
                .collect();
            let malformed = received - recs.len();
            let mut r = upsert_batch(store, recs).await;
            r.malformed = malformed;
            r
        }
        SubjectKind::News => {
            let recs: Vec<NewNewsItem> = entries
                .iter()
                .filter_map(|v| NewNewsItem::from_scraped(v, source_url))
                .collect();
            let malformed = received - recs.len();
            let mut r = upsert_batch(store, recs).await;
            r.malformed = malformed;
            r
        }
    };
    report.received = received;

    counter!("ingest_inserted_total").increment(report.inserted as u64);
    counter!("ingest_duplicates_total").increment(report.duplicates as u64);
    counter!("ingest_malformed_total").increment(report.malformed as u64);

    report
}
