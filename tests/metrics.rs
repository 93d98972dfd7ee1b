// tests/metrics.rs
//
// One test per process: the Prometheus recorder is global and installs once.

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use scholarship_aggregator::imagegen::MockImageGenerator;
use scholarship_aggregator::ingest::ingest_payload;
use scholarship_aggregator::llm::{ScriptedExtractor, TemplateDescriptionWriter};
use scholarship_aggregator::metrics::Metrics;
use scholarship_aggregator::store::MemoryStore;
use scholarship_aggregator::subject::{SubjectKind, SubjectRef};
use scholarship_aggregator::AppState;

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(
        store.clone(),
        Arc::new(MockImageGenerator::succeeding()),
        Arc::new(ScriptedExtractor::default()),
        Arc::new(TemplateDescriptionWriter::default()),
    );
    let metrics = Metrics::init(state.runner.limiter()).expect("install recorder");

    let payload = json!([
        { "program_title": "Counted Award" },
        { "program_title": "Counted Award" }
    ]);
    ingest_payload(store.as_ref(), SubjectKind::Scholarship, "https://example.org", payload).await;

    let subject = SubjectRef::new(SubjectKind::Scholarship, 1);
    let job_id = state.jobs().create(subject);
    state.runner.run(job_id, subject).await;

    let app = scholarship_aggregator::router(state).merge(metrics.router());
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .expect("build GET /metrics");
    let resp = app.oneshot(req).await.expect("oneshot /metrics");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");

    for series in [
        "ingest_inserted_total",
        "ingest_duplicates_total",
        "image_jobs_total",
        "image_rate_limit_max_requests",
    ] {
        assert!(text.contains(series), "missing {series} in:\n{text}");
    }
    assert!(text.contains(r#"outcome="completed""#));
}
