//! Scholarship aggregator binary entrypoint.
//! Boots the Axum HTTP server with shared state, metrics and static images.

use scholarship_aggregator::{bootstrap, config::AppConfig, init_tracing, metrics::Metrics, router};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::from_env()?;
    let state = bootstrap::build_state(&cfg).await?;
    let metrics = Metrics::init(state.runner.limiter())?;

    let app = router(state).merge(metrics.router());

    Ok(app.into())
}
