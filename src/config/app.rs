// src/config/app.rs
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::imagegen::{ImageSettings, DEFAULT_IMAGE_MODEL, DEFAULT_PUBLIC_PREFIX};
use crate::ingest::scraper::{ScrapeSettings, DEFAULT_RETRIES, DEFAULT_WORKERS};
use crate::jobs::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
use crate::llm::{LlmSettings, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};

/// Runtime configuration read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub llm: LlmSettings,
    pub images: ImageSettings,
    pub image_rate_limit: usize,
    pub image_rate_window: Duration,
    pub scrape: ScrapeSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            llm: LlmSettings::default(),
            images: ImageSettings::default(),
            image_rate_limit: DEFAULT_MAX_REQUESTS,
            image_rate_window: DEFAULT_WINDOW,
            scrape: ScrapeSettings::default(),
        }
    }
}

impl AppConfig {
    /// Expects `.env` to be loaded already (see `main`).
    pub fn from_env() -> Result<Self> {
        let database_url = env_opt("DATABASE_URL");

        let llm = LlmSettings {
            api_key: env_opt("OPENAI_API_KEY"),
            model: env_opt("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            base_url: env_opt("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        };

        let images = ImageSettings {
            api_token: env_opt("HF_API_TOKEN"),
            model: env_opt("IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            output_dir: env_opt("IMAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static/images")),
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
        };

        let image_rate_limit = env_parse("IMAGE_RATE_LIMIT")
            .unwrap_or(DEFAULT_MAX_REQUESTS)
            .max(1);
        let image_rate_window = env_parse::<u64>("IMAGE_RATE_WINDOW_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_WINDOW);

        let scrape = ScrapeSettings {
            workers: env_parse("SCRAPE_WORKERS")
                .unwrap_or(DEFAULT_WORKERS)
                .clamp(1, 16),
            retries: env_parse("SCRAPE_RETRIES").unwrap_or(DEFAULT_RETRIES).clamp(1, 10),
        };

        Ok(Self {
            database_url,
            llm,
            images,
            image_rate_limit,
            image_rate_window,
            scrape,
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|s| s.parse().ok())
}
