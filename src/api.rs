use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir};
use uuid::Uuid;

use crate::config::sites::{default_sites, SiteTarget};
use crate::describe::fill_missing_descriptions;
use crate::imagegen::DynImageGenerator;
use crate::ingest::scraper::{run_scraper, ScrapeSettings};
use crate::jobs::{ImageJobRunner, Job, JobCounts, JobStore, RateLimiter};
use crate::llm::{DynDescriptionWriter, DynExtractor};
use crate::models::{NewsItem, Scholarship};
use crate::store::DynStore;
use crate::subject::SubjectKind;

const DEFAULT_PAGE_LIMIT: i64 = 10;
const MAX_PAGE_LIMIT: i64 = 100;

/// Shared application context handed to every handler and background task.
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub runner: ImageJobRunner,
    pub extractor: DynExtractor,
    pub writer: DynDescriptionWriter,
    pub sites: Arc<Vec<SiteTarget>>,
    pub scrape: ScrapeSettings,
    pub image_dir: PathBuf,
}

impl AppState {
    /// State with a default 3-per-minute limiter, the built-in site list and
    /// default scrape settings.
    pub fn new(
        store: DynStore,
        images: DynImageGenerator,
        extractor: DynExtractor,
        writer: DynDescriptionWriter,
    ) -> Self {
        let runner = ImageJobRunner::new(
            store.clone(),
            Arc::new(JobStore::new()),
            Arc::new(RateLimiter::default()),
            images,
        );
        Self {
            store,
            runner,
            extractor,
            writer,
            sites: Arc::new(default_sites()),
            scrape: ScrapeSettings::default(),
            image_dir: PathBuf::from("static/images"),
        }
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.runner = ImageJobRunner::new(
            self.store.clone(),
            self.runner.jobs().clone(),
            Arc::new(limiter),
            self.runner.images().clone(),
        );
        self
    }

    pub fn with_sites(mut self, sites: Vec<SiteTarget>) -> Self {
        self.sites = Arc::new(sites);
        self
    }

    pub fn with_scrape(mut self, scrape: ScrapeSettings) -> Self {
        self.scrape = scrape;
        self
    }

    pub fn with_image_dir(mut self, dir: PathBuf) -> Self {
        self.image_dir = dir;
        self
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        self.runner.jobs()
    }
}

pub fn router(state: AppState) -> Router {
    let images = ServeDir::new(state.image_dir.clone());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/scholarships", get(list_scholarships))
        .route("/scholarships/{id}", get(get_scholarship))
        .route("/scholarships/generate-images", post(generate_scholarship_images))
        .route(
            "/scholarships/generate-descriptions",
            post(generate_descriptions),
        )
        .route("/news", get(list_news))
        .route("/news/{id}", get(get_news))
        .route("/news/generate-images", post(generate_news_images))
        .route("/start-scraping", get(start_scraping))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .nest_service("/static/images", images)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---- errors ----

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": what }))).into_response()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

// ---- handlers ----

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the Scholarships API!" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "message": "API is healthy!", "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

impl Pagination {
    fn bounds(&self) -> (i64, i64) {
        (self.skip.max(0), self.limit.clamp(0, MAX_PAGE_LIMIT))
    }
}

async fn list_scholarships(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Scholarship>>, ApiError> {
    let (skip, limit) = page.bounds();
    Ok(Json(state.store.list_scholarships(skip, limit).await?))
}

async fn get_scholarship(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Scholarship>, ApiError> {
    state
        .store
        .get_scholarship(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Scholarship not found"))
}

async fn list_news(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<NewsItem>>, ApiError> {
    let (skip, limit) = page.bounds();
    Ok(Json(state.store.list_news(skip, limit).await?))
}

async fn get_news(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NewsItem>, ApiError> {
    state
        .store
        .get_news(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("News item not found"))
}

#[derive(Debug, Serialize)]
struct MessageOut {
    message: String,
}

async fn start_scraping(State(state): State<AppState>) -> Json<MessageOut> {
    let st = state.clone();
    tokio::spawn(async move {
        run_scraper(st.extractor.as_ref(), st.store.as_ref(), &st.sites, st.scrape).await;
    });
    Json(MessageOut {
        message: "Scraping started in the background.".to_string(),
    })
}

async fn generate_descriptions(State(state): State<AppState>) -> Json<MessageOut> {
    let st = state.clone();
    tokio::spawn(async move {
        if let Err(e) = fill_missing_descriptions(st.store.as_ref(), st.writer.as_ref()).await {
            tracing::error!(error = %e, "description backfill aborted");
        }
    });
    Json(MessageOut {
        message: "Description generation started in the background.".to_string(),
    })
}

#[derive(Debug, Serialize)]
struct GenerateOut {
    message: String,
    queued: usize,
    job_ids: Vec<Uuid>,
}

async fn generate_images(state: &AppState, kind: SubjectKind) -> Result<Json<GenerateOut>, ApiError> {
    let job_ids = state.runner.schedule_missing(kind).await?;
    Ok(Json(GenerateOut {
        message: format!("Queued {} {} image job(s).", job_ids.len(), kind),
        queued: job_ids.len(),
        job_ids,
    }))
}

async fn generate_scholarship_images(
    State(state): State<AppState>,
) -> Result<Json<GenerateOut>, ApiError> {
    generate_images(&state, SubjectKind::Scholarship).await
}

async fn generate_news_images(
    State(state): State<AppState>,
) -> Result<Json<GenerateOut>, ApiError> {
    generate_images(&state, SubjectKind::News).await
}

#[derive(Debug, Serialize)]
struct JobsOut {
    counts: JobCounts,
    jobs: Vec<Job>,
}

async fn list_jobs(State(state): State<AppState>) -> Json<JobsOut> {
    let jobs = state.jobs();
    Json(JobsOut {
        counts: jobs.counts(),
        jobs: jobs.list(),
    })
}

/// Malformed ids answer the same 404 as unknown ones.
async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Uuid::parse_str(&id)
        .ok()
        .and_then(|id| state.jobs().get(id))
        .map(Json)
        .ok_or(ApiError::NotFound("Job not found"))
}
