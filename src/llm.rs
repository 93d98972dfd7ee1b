//! LLM-backed capabilities: structured page extraction and description writing.
//!
//! [`OpenAiClient`] talks to any OpenAI-compatible Chat Completions endpoint.
//! Page extraction fetches the page itself, reduces the HTML to text and asks
//! the model to answer the extraction prompt with JSON only.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Scholarship;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Page text sent to the model is capped at this many chars.
const MAX_PAGE_CHARS: usize = 12_000;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ScrapeError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("LLM credentials missing (set OPENAI_API_KEY)")]
    MissingCredentials,
    #[error("malformed extraction response: {0}")]
    Malformed(String),
}

impl ScrapeError {
    /// Network-level failures and 429/5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::Transport(_) => true,
            ScrapeError::Status { status, .. } => *status == 429 || *status >= 500,
            ScrapeError::MissingCredentials | ScrapeError::Malformed(_) => false,
        }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(e: reqwest::Error) -> Self {
        ScrapeError::Transport(e.to_string())
    }
}

#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Answer `prompt` about the page at `url` as parsed JSON.
    async fn extract(&self, url: &str, prompt: &str) -> Result<Value, ScrapeError>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait DescriptionWriter: Send + Sync {
    async fn describe(&self, scholarship: &Scholarship) -> anyhow::Result<String>;
}

pub type DynExtractor = Arc<dyn PageExtractor>;
pub type DynDescriptionWriter = Arc<dyn DescriptionWriter>;

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl OpenAiClient {
    pub fn new(settings: LlmSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("scholarship-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { http, settings })
    }

    fn api_key(&self) -> Result<&str, ScrapeError> {
        self.settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(ScrapeError::MissingCredentials)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp.text().await?)
    }

    /// One chat completion; returns the assistant message content.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String, ScrapeError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let key = self.api_key()?;
        let endpoint = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let req = Req {
            model: &self.settings.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let resp = self
            .http
            .post(&endpoint)
            .bearer_auth(key)
            .json(&req)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ScrapeError::MissingCredentials);
        }
        if !status.is_success() {
            return Err(ScrapeError::Status {
                status: status.as_u16(),
                url: endpoint,
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| ScrapeError::Malformed(format!("chat response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ScrapeError::Malformed("empty completion".into()))
    }
}

#[async_trait]
impl PageExtractor for OpenAiClient {
    async fn extract(&self, url: &str, prompt: &str) -> Result<Value, ScrapeError> {
        // Fail fast before fetching anything.
        self.api_key()?;

        let html = self.fetch_page(url).await?;
        let text = page_text(&html);
        if text.is_empty() {
            return Err(ScrapeError::Malformed(format!("no text content at {url}")));
        }

        let system = "You extract structured data from web page text. \
                      Reply with JSON only: an array of objects, no prose, no code fences. \
                      Use snake_case keys. Use null for unknown values.";
        let user = format!("Source URL: {url}\n\nTask: {prompt}\n\nPage text:\n{text}");
        let content = self.chat(system, &user).await?;
        parse_llm_json(&content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[async_trait]
impl DescriptionWriter for OpenAiClient {
    async fn describe(&self, s: &Scholarship) -> anyhow::Result<String> {
        let system = "You write short, factual scholarship descriptions for students. \
                      Two to four sentences, plain text, no markdown, no invented facts.";
        let mut user = format!("Program: {}\n", s.program_title);
        if let Some(f) = s.funded_by.as_deref() {
            user.push_str(&format!("Funded by: {f}\n"));
        }
        if let Some(d) = s.deadline {
            user.push_str(&format!("Deadline: {d}\n"));
        }
        if let Some(r) = s.requirements.as_ref() {
            user.push_str(&format!("Requirements: {r}\n"));
        }
        user.push_str(&format!("More info: {}", s.url));

        let text = self.chat(system, &user).await?;
        Ok(text.trim().to_string())
    }
}

/// Reduce an HTML page to readable text: drop scripts/styles, keep link targets
/// inline, strip tags, decode entities, collapse whitespace, cap length.
pub fn page_text(html: &str) -> String {
    static RE_BLOCKS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?is)<(script|style|noscript|svg|head)\b.*?</(script|style|noscript|svg|head)>")
            .expect("blocks regex")
    });
    static RE_LINKS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"(?is)<a\b[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#)
            .expect("links regex")
    });
    static RE_TAGS: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tags regex"));
    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));

    let out = RE_BLOCKS.replace_all(html, " ");
    let out = RE_LINKS.replace_all(&out, "$2 ($1)");
    let out = RE_TAGS.replace_all(&out, " ");
    let out = html_escape::decode_html_entities(&out).to_string();
    let out = RE_WS.replace_all(&out, " ");
    out.trim().chars().take(MAX_PAGE_CHARS).collect()
}

/// Parse model output as JSON, tolerating code fences and leading prose.
pub fn parse_llm_json(content: &str) -> Result<Value, ScrapeError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(v) = serde_json::from_str::<Value>(unfenced) {
        return Ok(v);
    }

    // Fall back to the outermost JSON array/object inside the text.
    let start = unfenced.find(['[', '{']);
    let end = unfenced.rfind([']', '}']);
    if let (Some(s), Some(e)) = (start, end) {
        if s < e {
            if let Ok(v) = serde_json::from_str::<Value>(&unfenced[s..=e]) {
                return Ok(v);
            }
        }
    }

    let snippet: String = unfenced.chars().take(120).collect();
    Err(ScrapeError::Malformed(format!("not JSON: {snippet}")))
}

/// Extractor that replays queued responses in order; once the queue is empty
/// it keeps answering with an empty list. Records every requested URL.
#[derive(Default)]
pub struct ScriptedExtractor {
    responses: Mutex<VecDeque<Result<Value, ScrapeError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new(responses: Vec<Result<Value, ScrapeError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl PageExtractor for ScriptedExtractor {
    async fn extract(&self, url: &str, _prompt: &str) -> Result<Value, ScrapeError> {
        self.calls.lock().push(url.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Value::Array(Vec::new())))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Writer that derives a description from the title; fails for titles listed
/// in `fail_for`.
#[derive(Default)]
pub struct TemplateDescriptionWriter {
    pub fail_for: Vec<String>,
}

#[async_trait]
impl DescriptionWriter for TemplateDescriptionWriter {
    async fn describe(&self, s: &Scholarship) -> anyhow::Result<String> {
        if self.fail_for.iter().any(|t| t == &s.program_title) {
            anyhow::bail!("writer refused {}", s.program_title);
        }
        Ok(format!("{} supports students pursuing graduate study.", s.program_title))
    }
}
