use std::time::Duration;

use anyhow::{Context, Result};
use infograph_contracts::{ComposedPrompt, InputType};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const IMAGE_SIZE_TIER: &str = "1K";
pub const PORTRAIT_ASPECT_RATIO: &str = "9:16";
pub const LANDSCAPE_ASPECT_RATIO: &str = "4:3";
pub const RESULT_MIME_TYPE: &str = "image/png";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// One `generateContent` round-trip. Implementations return the decoded JSON
/// body or an error whose text carries the downstream status and message.
pub trait GenerationTransport: Send + Sync {
    fn generate_content(&self, model: &str, api_key: &str, payload: &Value) -> Result<Value>;
}

/// A non-2xx answer from the model endpoint. The display text carries the
/// status code and the (truncated) body so auth markers can be matched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{provider} request failed ({status}): {body}")]
pub struct DownstreamStatusError {
    pub provider: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    api_base: String,
    http: HttpClient,
    request_timeout: Option<Duration>,
}

impl HttpTransport {
    /// No client-side timeout unless [`HttpTransport::with_timeout`] sets one.
    pub fn new(api_base: impl Into<String>) -> Result<Self> {
        let api_base = api_base.into();
        let trimmed = api_base.trim().trim_end_matches('/');
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .context("failed building HTTP client")?;
        Ok(Self {
            api_base: if trimmed.is_empty() {
                DEFAULT_API_BASE.to_string()
            } else {
                trimmed.to_string()
            },
            http,
            request_timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

impl GenerationTransport for HttpTransport {
    fn generate_content(&self, model: &str, api_key: &str, payload: &Value) -> Result<Value> {
        let endpoint = self.endpoint_for_model(model);
        tracing::debug!(%endpoint, "sending generateContent request");
        let mut request = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(payload);
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }
        // Keep the URL out of the error text; it is matched for auth markers.
        let response = request.send().map_err(|err| {
            tracing::warn!(%endpoint, error = %err, "generateContent transport failure");
            anyhow::Error::new(err.without_url()).context("Gemini request failed")
        })?;
        response_json_or_error("Gemini", response)
    }
}

pub fn aspect_ratio_for(input_type: InputType) -> &'static str {
    match input_type {
        InputType::Whitepaper => PORTRAIT_ASPECT_RATIO,
        InputType::Text | InputType::Csv | InputType::Image => LANDSCAPE_ASPECT_RATIO,
    }
}

/// Prompt text first, then attachments in composer order.
pub fn build_parts(prompt: &ComposedPrompt) -> Vec<Value> {
    let mut parts = Vec::with_capacity(prompt.attachments.len() + 1);
    parts.push(json!({ "text": prompt.text }));
    for attachment in &prompt.attachments {
        parts.push(json!({
            "inlineData": {
                "mimeType": attachment.mime_type,
                "data": attachment.data,
            }
        }));
    }
    parts
}

pub fn build_payload(prompt: &ComposedPrompt, input_type: InputType) -> Value {
    let mut image_config = Map::new();
    image_config.insert(
        "aspectRatio".to_string(),
        Value::String(aspect_ratio_for(input_type).to_string()),
    );
    image_config.insert(
        "imageSize".to_string(),
        Value::String(IMAGE_SIZE_TIER.to_string()),
    );

    json!({
        "contents": [{
            "role": "user",
            "parts": build_parts(prompt),
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": Value::Object(image_config),
        },
        "tools": [{ "googleSearch": {} }],
    })
}

/// Base64 payload of the first inline image in the first candidate.
pub fn first_inline_image(response_payload: &Value) -> Option<&str> {
    response_payload
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|part| part.get("inlineData").or_else(|| part.get("inline_data")))
        .filter_map(|inline| inline.get("data").and_then(Value::as_str))
        .find(|data| !data.is_empty())
}

pub fn to_data_uri(base64_payload: &str) -> String {
    format!("data:{RESULT_MIME_TYPE};base64,{base64_payload}")
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        return Err(DownstreamStatusError {
            provider: provider.to_string(),
            status: code,
            body: truncate_text(&body, 512),
        }
        .into());
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().map(String::as_str) == Some(trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
