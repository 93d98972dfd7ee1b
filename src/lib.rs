// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod describe;
pub mod imagegen;
pub mod ingest;
pub mod jobs;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod store;
pub mod subject;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::jobs::{ImageJobRunner, JobStatus, JobStore, RateLimiter};
pub use crate::subject::{SubjectKind, SubjectRef};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a compact `fmt` subscriber filtered by `RUST_LOG`
/// (default `scholarship_aggregator=info,warn`). No-op if one is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("scholarship_aggregator=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
