//! Runs a single scrape pass over the configured sites and prints the summary.
//! Uses the same configuration as the server (`.env`, `DATABASE_URL`, `SCRAPE_*`).

use std::sync::Arc;

use scholarship_aggregator::bootstrap::open_store;
use scholarship_aggregator::config::{load_sites_default, AppConfig};
use scholarship_aggregator::ingest::scraper::run_scraper;
use scholarship_aggregator::init_tracing;
use scholarship_aggregator::llm::OpenAiClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env()?;
    let store = open_store(&cfg).await?;
    let extractor = Arc::new(OpenAiClient::new(cfg.llm.clone())?);
    let sites = load_sites_default()?;

    let summary = run_scraper(extractor.as_ref(), store.as_ref(), &sites, cfg.scrape).await;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
