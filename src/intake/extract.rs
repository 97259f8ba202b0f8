//! Language-model extraction of job records from page text and images.
//!
//! The model is treated as an opaque classifier. Its output is recovered
//! leniently by [`recover_jobs`]: code fences are stripped, the outermost
//! JSON array (or object) is located, and anything unusable degrades to an
//! empty list with a warning.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::OpenAiConfig;
use crate::models::RawJob;
use crate::{AppError, Result};

/// Page text beyond this many characters is not sent to the model.
pub const MAX_PROMPT_CHARS: usize = 6000;

const SYSTEM_PROMPT: &str = "You extract structured summaries from video game industry job postings. \
Always return a JSON array of job objects. Each job object can contain: \
job_title, company_name, job_url, source_url, location, work_model (Remote, Hybrid, Onsite), \
seniority (Junior, Mid, Senior, Lead, Director), contract_type, remote_friendly (boolean), compensation, \
description_summary, skills (array of short phrases), team (art, game_design, dev, others), known_titles (array). \
Omit keys when information is unavailable. Keep values concise and human friendly.";

/// Turns fetched content into raw job records.
pub trait JobExtractor: Send + Sync {
    /// Extract jobs from visible page text. Returns an empty list on any
    /// failure.
    fn parse_from_text(&self, content: &str, url: &str) -> Pin<Box<dyn Future<Output = Vec<RawJob>> + Send + '_>>;

    /// Extract jobs from an image given as a URL (typically a `data:` URL).
    /// Returns an empty list on any failure.
    fn parse_from_image(&self, image_url: &str, url: &str) -> Pin<Box<dyn Future<Output = Vec<RawJob>> + Send + '_>>;
}

/// [`JobExtractor`] backed by the OpenAI Responses API.
#[derive(Clone)]
pub struct OpenAiExtractor {
    client: reqwest::Client,
    endpoint: String,
    text_model: String,
    image_model: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl OpenAiExtractor {
    /// Build an extractor from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the API key is missing or not a
    /// valid header value, or `AppError::Extraction` when the HTTP client
    /// cannot be built.
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::Config("missing OpenAI API key".into()));
        }
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| AppError::Config("invalid OpenAI API key".into()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.response_timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|err| AppError::Extraction(format!("failed to build OpenAI client: {err}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/responses", config.base_url.trim_end_matches('/')),
            text_model: config.model.clone(),
            image_model: config.image_model().to_owned(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    async fn text_jobs(&self, content: String, url: String) -> Vec<RawJob> {
        if content.is_empty() {
            return Vec::new();
        }
        let content: String = content.chars().take(MAX_PROMPT_CHARS).collect();
        let prompt = format!(
            "Parse every distinct job posting present in the following page copy. \
             Return one JSON array with a dictionary per job.\nSource URL: {url}\n{}\n{content}\n",
            "-".repeat(40)
        );
        let input = json!([
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": prompt},
        ]);
        let raw = self.call(&self.text_model, input).await;
        recover_jobs(&raw)
    }

    async fn image_jobs(&self, image_url: String, url: String) -> Vec<RawJob> {
        if image_url.is_empty() {
            return Vec::new();
        }
        let prompt = format!(
            "Parse every distinct job posting present in this image capture. \
             If multiple jobs exist, include them all in the JSON array.\nSource Reference: {url}"
        );
        let input = json!([
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": [
                {"type": "input_text", "text": prompt},
                {"type": "input_image", "image_url": image_url},
            ]},
        ]);
        let raw = self.call(&self.image_model, input).await;
        recover_jobs(&raw)
    }

    /// Send one request; failures are logged and yield an empty string.
    async fn call(&self, model: &str, input: Value) -> String {
        match self.request(model, input).await {
            Ok(text) => {
                info!(model, chars = text.len(), "model responded");
                text
            }
            Err(err) => {
                error!(model, %err, "model request failed");
                String::new()
            }
        }
    }

    async fn request(&self, model: &str, input: Value) -> Result<String> {
        let body = json!({
            "model": model,
            "temperature": self.temperature,
            "max_output_tokens": self.max_output_tokens,
            "input": input,
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| AppError::Extraction(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Extraction(format!("request failed ({status}): {detail}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| AppError::Extraction(format!("unreadable response: {err}")))?;
        Ok(output_text(&payload))
    }
}

impl JobExtractor for OpenAiExtractor {
    fn parse_from_text(&self, content: &str, url: &str) -> Pin<Box<dyn Future<Output = Vec<RawJob>> + Send + '_>> {
        Box::pin(self.text_jobs(content.to_owned(), url.to_owned()))
    }

    fn parse_from_image(&self, image_url: &str, url: &str) -> Pin<Box<dyn Future<Output = Vec<RawJob>> + Send + '_>> {
        Box::pin(self.image_jobs(image_url.to_owned(), url.to_owned()))
    }
}

/// Concatenate every `output_text` fragment of a Responses API payload.
fn output_text(payload: &Value) -> String {
    if let Some(text) = payload.get("output_text").and_then(Value::as_str) {
        return text.to_owned();
    }
    payload
        .get("output")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

/// Encode image bytes as a `data:` URL, sniffing the MIME type from the
/// leading magic bytes.
#[must_use]
pub fn image_data_url(bytes: &[u8]) -> String {
    let mime = if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else if bytes.starts_with(b"\xff\xd8\xff") {
        "image/jpeg"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "application/octet-stream"
    };
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Recover job records from free-form model output.
///
/// A single JSON object becomes a one-element list; non-object array
/// elements are dropped.
#[must_use]
pub fn recover_jobs(text: &str) -> Vec<RawJob> {
    let mut text = text.trim().to_owned();
    if text.is_empty() {
        return Vec::new();
    }
    if text.starts_with("```") {
        text = text
            .lines()
            .filter(|line| !line.trim().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_owned();
    }

    let Some(json_str) = outer_span(&text, '[', ']').or_else(|| outer_span(&text, '{', '}')) else {
        let preview: String = text.chars().take(200).collect::<String>().replace('\n', " ");
        warn!(%preview, "no JSON payload detected in model response");
        return Vec::new();
    };

    let data: Value = match serde_json::from_str(json_str) {
        Ok(data) => data,
        Err(err) => {
            let snippet: String = json_str.chars().take(200).collect::<String>().replace('\n', " ");
            warn!(%err, %snippet, "failed to parse model JSON");
            return Vec::new();
        }
    };

    match data {
        Value::Object(map) => vec![map],
        Value::Array(items) => {
            let jobs: Vec<RawJob> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            if jobs.is_empty() {
                warn!("JSON array contained no job objects");
            }
            jobs
        }
        other => {
            warn!(kind = ?other, "unexpected JSON type in model response");
            Vec::new()
        }
    }
}

/// Slice from the first `open` to the last `close`, inclusive.
fn outer_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (start <= end).then(|| &text[start..=end])
}
