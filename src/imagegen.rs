//! Image generation: provider abstraction + Hugging Face inference client.
//!
//! The generator turns a text prompt into a stored image and returns the public
//! path it can be served from. Quota handling lives in the job orchestrator;
//! this layer only reports what the remote side said.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::subject::SubjectRef;

pub const DEFAULT_IMAGE_MODEL: &str = "stabilityai/stable-diffusion-2-1";
pub const DEFAULT_PUBLIC_PREFIX: &str = "/static/images";
const HF_INFERENCE_BASE: &str = "https://api-inference.huggingface.co/models";

#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("image API rate limit exceeded")]
    RateLimited,
    #[error("image API credentials missing or rejected")]
    MissingCredentials,
    #[error("image API error: {0}")]
    Api(String),
    #[error("failed to store generated image: {0}")]
    Io(String),
}

impl From<std::io::Error> for ImageError {
    fn from(e: std::io::Error) -> Self {
        ImageError::Io(e.to_string())
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for `subject` from `prompt`; returns its public reference.
    async fn generate(&self, prompt: &str, subject: SubjectRef) -> Result<String, ImageError>;
    fn name(&self) -> &'static str;
}

pub type DynImageGenerator = Arc<dyn ImageGenerator>;

/// Settings for [`HuggingFaceImageClient`].
#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub api_token: Option<String>,
    pub model: String,
    pub output_dir: PathBuf,
    pub public_prefix: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            api_token: None,
            model: DEFAULT_IMAGE_MODEL.to_string(),
            output_dir: PathBuf::from("static/images"),
            public_prefix: DEFAULT_PUBLIC_PREFIX.to_string(),
        }
    }
}

/// Build a generator: the real client when a token is configured, otherwise
/// one that fails every job with [`ImageError::MissingCredentials`].
pub fn build_image_generator(settings: &ImageSettings) -> anyhow::Result<DynImageGenerator> {
    match settings.api_token.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => Ok(Arc::new(HuggingFaceImageClient::new(settings.clone())?)),
        _ => {
            tracing::warn!("HF_API_TOKEN not set; image jobs will fail");
            Ok(Arc::new(DisabledImageGenerator))
        }
    }
}

/// Text-to-image through the Hugging Face Inference API.
pub struct HuggingFaceImageClient {
    http: reqwest::Client,
    settings: ImageSettings,
}

impl HuggingFaceImageClient {
    pub fn new(settings: ImageSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("scholarship-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { http, settings })
    }

    fn file_name(subject: SubjectRef) -> String {
        format!("{}_{}.png", subject.kind, subject.id)
    }
}

#[async_trait]
impl ImageGenerator for HuggingFaceImageClient {
    async fn generate(&self, prompt: &str, subject: SubjectRef) -> Result<String, ImageError> {
        let token = self
            .settings
            .api_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ImageError::MissingCredentials)?;

        let url = format!("{HF_INFERENCE_BASE}/{}", self.settings.model);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "inputs": prompt }))
            .send()
            .await
            .map_err(|e| ImageError::Api(format!("request failed: {e}")))?;

        let status = resp.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => return Err(ImageError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ImageError::MissingCredentials)
            }
            s if !s.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                let snippet: String = body.chars().take(200).collect();
                return Err(ImageError::Api(format!("HTTP {s}: {snippet}")));
            }
            _ => {}
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ImageError::Api(format!("reading image body: {e}")))?;
        if bytes.is_empty() {
            return Err(ImageError::Api("empty image body".into()));
        }

        tokio::fs::create_dir_all(&self.settings.output_dir).await?;
        let name = Self::file_name(subject);
        let path = self.settings.output_dir.join(&name);
        let tmp = path.with_extension("png.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::info!(%subject, path = %path.display(), bytes = bytes.len(), "stored generated image");
        Ok(format!(
            "{}/{}",
            self.settings.public_prefix.trim_end_matches('/'),
            name
        ))
    }

    fn name(&self) -> &'static str {
        "huggingface"
    }
}

/// Fails every request; used when no API token is configured.
pub struct DisabledImageGenerator;

#[async_trait]
impl ImageGenerator for DisabledImageGenerator {
    async fn generate(&self, _prompt: &str, _subject: SubjectRef) -> Result<String, ImageError> {
        Err(ImageError::MissingCredentials)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic generator for tests and local runs: records every call and
/// answers with a fixed outcome.
pub struct MockImageGenerator {
    outcome: Result<(), ImageError>,
    calls: Mutex<Vec<(String, SubjectRef)>>,
}

impl MockImageGenerator {
    pub fn succeeding() -> Self {
        Self {
            outcome: Ok(()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: ImageError) -> Self {
        Self {
            outcome: Err(err),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, SubjectRef)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, prompt: &str, subject: SubjectRef) -> Result<String, ImageError> {
        self.calls.lock().push((prompt.to_string(), subject));
        self.outcome.clone()?;
        Ok(format!(
            "{DEFAULT_PUBLIC_PREFIX}/{}",
            HuggingFaceImageClient::file_name(subject)
        ))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
