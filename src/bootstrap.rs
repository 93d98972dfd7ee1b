// src/bootstrap.rs
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::AppState;
use crate::config::{load_sites_default, AppConfig};
use crate::imagegen::build_image_generator;
use crate::jobs::RateLimiter;
use crate::llm::OpenAiClient;
use crate::store::{DynStore, MemoryStore, PgStore};

/// Open the configured store: Postgres (migrated) when `DATABASE_URL` is set,
/// otherwise a process-local in-memory store.
pub async fn open_store(cfg: &AppConfig) -> anyhow::Result<DynStore> {
    match cfg.database_url.as_deref() {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.migrate().await?;
            info!("connected to postgres store");
            Ok(Arc::new(pg))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Build the full application state from configuration.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let store = open_store(cfg).await?;
    let images = build_image_generator(&cfg.images)?;
    let llm = Arc::new(OpenAiClient::new(cfg.llm.clone())?);
    let sites = load_sites_default()?;

    // Safe diagnostics: only presence of keys, never the keys themselves
    info!(
        llm_model = %cfg.llm.model,
        llm_key = cfg.llm.api_key.is_some(),
        image_provider = images.name(),
        image_rate_limit = cfg.image_rate_limit,
        image_rate_window_secs = cfg.image_rate_window.as_secs(),
        sites = sites.len(),
        "configuration loaded"
    );

    Ok(AppState::new(store, images, llm.clone(), llm)
        .with_limiter(RateLimiter::new(cfg.image_rate_limit, cfg.image_rate_window))
        .with_sites(sites)
        .with_scrape(cfg.scrape)
        .with_image_dir(cfg.images.output_dir.clone()))
}
