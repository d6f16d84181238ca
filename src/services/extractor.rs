//! Optional keyword and date extraction through a language-model service.
//!
//! The service output is untrusted. Every failure mode (missing key,
//! transport error, timeout, malformed JSON) collapses to `None` so callers
//! fall back to the rule-based resolver and raw terms.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{DateRange, ExtractorConfig, ExtractorProvider, TimeRange};
use crate::services::temporal::Resolution;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";
const OLLAMA_API_URL: &str = "http://localhost:11434";
const GEMINI_KEY_FALLBACK_ENV: &str = "GOOGLE_API_KEY";

const PROMPT: &str = r#"Current date and time: {now} ({weekday}).

You help search a university event calendar. For the query below:

1. Keywords: list the core topics in lowercase, then add concrete instances,
   synonyms and related activities for each (for example "food" adds "pizza",
   "tacos", "bbq"; "music" adds "concert", "jazz", "choir"). Single words or
   short phrases only.
2. Dates: resolve relative references against the current date
   ("tomorrow", "this weekend" = nearest Saturday and Sunday,
   "next week" = next Monday through Sunday). Use null when no date is given.
3. Times: resolve time-of-day references as 24-hour HH:MM bounds
   ("evening" = 17:00 to 21:00, "after 7pm" = 19:00 to null). Use null when
   no time is given.

Reply with a single JSON object and nothing else.

Query: "{query}"
JSON: {"keywords": ["..."], "date_from": "YYYY-MM-DD or null", "date_to": "YYYY-MM-DD or null", "time_from": "HH:MM or null", "time_to": "HH:MM or null"}"#;

/// Keywords and windows suggested by the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub keywords: Vec<String>,
    pub date_range: Option<DateRange>,
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Default, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    keywords: Option<Vec<Value>>,
    #[serde(default)]
    date_from: Option<Value>,
    #[serde(default)]
    date_to: Option<Value>,
    #[serde(default)]
    time_from: Option<Value>,
    #[serde(default)]
    time_to: Option<Value>,
}

/// A string field that may be JSON null, absent, or the text "null".
fn present(value: &Option<Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null")).then_some(s)
        }
        _ => None,
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Strip a surrounding markdown code fence.
fn strip_code_fence(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

impl Extraction {
    /// Parse a service reply. Unusable fields are dropped individually; only
    /// a reply that is not a JSON object is an error.
    pub fn from_response(text: &str) -> Result<Self> {
        let raw: RawExtraction = serde_json::from_str(strip_code_fence(text))
            .map_err(|e| AppError::collaborator(format!("malformed extraction: {e}")))?;

        let keywords = raw
            .keywords
            .unwrap_or_default()
            .into_iter()
            .filter_map(|k| match k {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let date_from = present(&raw.date_from)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        let date_range = date_from.and_then(|from| {
            let to = match present(&raw.date_to) {
                Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()?,
                None => from,
            };
            DateRange::new(from, to)
        });

        let time_range = TimeRange::new(
            present(&raw.time_from).and_then(parse_time),
            present(&raw.time_to).and_then(parse_time),
        );

        Ok(Self {
            keywords,
            date_range,
            time_range,
        })
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            date_range: self.date_range,
            time_range: self.time_range,
        }
    }
}

/// Render the extraction prompt for a query.
pub fn build_prompt(query: &str, now: NaiveDateTime) -> String {
    PROMPT
        .replace("{now}", &now.format("%Y-%m-%d %H:%M").to_string())
        .replace("{weekday}", &now.format("%A").to_string())
        .replace("{query}", &query.replace('"', "'"))
}

/// A language-model service that turns a query into keywords and windows.
#[async_trait]
pub trait KeywordExtractor: Send + Sync {
    /// Provider name for logs and responses.
    fn name(&self) -> &str;

    /// Model used when the caller does not pick one.
    fn default_model(&self) -> &str;

    /// Upper bound on one round trip.
    fn timeout(&self) -> Duration;

    /// Send a prompt and return the raw text reply.
    async fn complete(&self, prompt: &str, model: &str) -> Result<String>;

    /// Ask the service about `query`. Never fails; any problem is `None`.
    async fn extract(
        &self,
        query: &str,
        now: NaiveDateTime,
        model: Option<&str>,
    ) -> Option<Extraction> {
        let model = model.unwrap_or(self.default_model());
        let prompt = build_prompt(query, now);

        let reply = match tokio::time::timeout(self.timeout(), self.complete(&prompt, model)).await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                log::warn!("{} extraction failed: {}", self.name(), e);
                return None;
            }
            Err(_) => {
                log::warn!(
                    "{} extraction timed out after {:?}",
                    self.name(),
                    self.timeout()
                );
                return None;
            }
        };

        match Extraction::from_response(&reply) {
            Ok(extraction) => {
                log::debug!(
                    "{} ({}) keywords={:?} dates={:?} times={:?}",
                    self.name(),
                    model,
                    extraction.keywords,
                    extraction.date_range,
                    extraction.time_range
                );
                Some(extraction)
            }
            Err(e) => {
                log::warn!("{}: {}", self.name(), e);
                None
            }
        }
    }
}

// Gemini generateContent wire types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiReplyContent>,
}

#[derive(Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Deserialize)]
struct GeminiReplyPart {
    text: Option<String>,
}

/// Google Gemini REST client.
pub struct GeminiExtractor {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiExtractor {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, config: &ExtractorConfig) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GEMINI_API_URL.to_string()),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl KeywordExtractor for GeminiExtractor {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn complete(&self, prompt: &str, model: &str) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        );
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::collaborator(format!("gemini request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::collaborator(format!(
                "gemini API error ({status}): {body}"
            )));
        }

        let reply: GeminiResponse = response
            .json()
            .await
            .map_err(|e| AppError::collaborator(format!("gemini reply unreadable: {e}")))?;

        reply
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| AppError::collaborator("gemini returned no text"))
    }
}

// Ollama /api/generate wire types

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: Option<String>,
}

/// Local Ollama client.
pub struct OllamaExtractor {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaExtractor {
    pub fn new(http: reqwest::Client, config: &ExtractorConfig) -> Self {
        Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OLLAMA_API_URL.to_string()),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl KeywordExtractor for OllamaExtractor {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn complete(&self, prompt: &str, model: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let request = OllamaRequest {
            model,
            prompt,
            stream: false,
            format: "json",
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::collaborator(format!("ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::collaborator(format!("ollama API error ({status})")));
        }

        let reply: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AppError::collaborator(format!("ollama reply unreadable: {e}")))?;
        reply
            .response
            .ok_or_else(|| AppError::collaborator("ollama returned no text"))
    }
}

/// Build the configured extractor, if any.
///
/// A Gemini provider without an API key in the environment is disabled with
/// a warning rather than failing startup.
pub fn build_extractor(
    config: &ExtractorConfig,
    http: reqwest::Client,
) -> Option<Arc<dyn KeywordExtractor>> {
    build_extractor_with(config, http, |key| std::env::var(key).ok())
}

fn build_extractor_with(
    config: &ExtractorConfig,
    http: reqwest::Client,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<Arc<dyn KeywordExtractor>> {
    match config.provider {
        ExtractorProvider::None => None,
        ExtractorProvider::Gemini => {
            let key = lookup(&config.api_key_env)
                .or_else(|| lookup(GEMINI_KEY_FALLBACK_ENV))
                .filter(|k| !k.trim().is_empty());
            match key {
                Some(key) => Some(Arc::new(GeminiExtractor::new(http, key, config))),
                None => {
                    log::warn!(
                        "Gemini extractor configured but {} is not set; keyword expansion disabled",
                        config.api_key_env
                    );
                    None
                }
            }
        }
        ExtractorProvider::Ollama => Some(Arc::new(OllamaExtractor::new(http, config))),
    }
}
