use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{error, info};

use crate::{
    config::AppConfig,
    error::{Result, StudioError},
    extract::{self, ImageReference},
    models::ChatRequest,
};

const PREVIEW_CHARS: usize = 50;
const LOG_LIMIT: usize = 4000;

/// First `max` characters of `s`, with the total character count appended when cut.
pub fn preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...[{} chars total]", &s[..cut], s.chars().count()),
        None => s.to_string(),
    }
}

// Shortens embedded image payloads so completions stay readable in the log
fn truncate_payloads_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => map.values_mut().for_each(truncate_payloads_in_json),
        Value::Array(items) => items.iter_mut().for_each(truncate_payloads_in_json),
        Value::String(s) if s.len() > 100 && (s.starts_with("data:") || looks_like_base64(s)) => {
            *s = preview(s, PREVIEW_CHARS);
        }
        _ => {}
    }
}

fn looks_like_base64(s: &str) -> bool {
    s.bytes()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, b'+' | b'/' | b'='))
}

pub fn log_json(value: &Value) -> String {
    let mut value = value.clone();
    truncate_payloads_in_json(&mut value);
    let text = serde_json::to_string_pretty(&value).unwrap_or_default();
    preview(&text, LOG_LIMIT)
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    base_url: String,
    fetch_timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .user_agent(concat!("poster_studio/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StudioError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            fetch_timeout: config.image_fetch_timeout,
        })
    }

    /// Sends `{ model, messages }` verbatim and parses the completion.
    pub async fn complete(&self, model: &str, messages: &[Value]) -> Result<ChatCompletion> {
        let url = format!("{}/chat/completions", self.base_url);
        let logged = log_json(&Value::Array(messages.to_vec()));
        info!("📤 Messages: {}", logged);
        info!("🔗 Making request to: {} (model {})", url, model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model, messages })
            .send()
            .await
            .map_err(|e| StudioError::Upstream(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response
            .text()
            .await
            .map_err(|e| StudioError::Upstream(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", preview(&response_text, LOG_LIMIT));
            return Err(StudioError::Upstream(format!(
                "status={} body={}",
                status,
                preview(&response_text, 500)
            )));
        }

        let raw: Value = serde_json::from_str(&response_text).map_err(|e| {
            StudioError::Upstream(format!("parse error: {}: {}", e, preview(&response_text, 500)))
        })?;
        info!("📥 Completion: {}", log_json(&raw));

        serde_json::from_value(raw)
            .map_err(|e| StudioError::Upstream(format!("unexpected completion shape: {e}")))
    }

    /// Runs a completion and returns the generated image as base64, or as the
    /// provider's own data URI when it was embedded inline.
    pub async fn generate_image(&self, model: &str, messages: &[Value]) -> Result<String> {
        let completion = self.complete(model, messages).await?;

        match extract::first_image_reference(&completion) {
            Some(ImageReference::Inline(uri)) => Ok(uri),
            Some(ImageReference::Remote(url)) => {
                let bytes = self.fetch_image(&url).await?;
                let encoded = extract::encode_payload(&bytes);
                info!("✅ Fetched generated image: {}", preview(&encoded, PREVIEW_CHARS));
                Ok(encoded)
            }
            None => Err(StudioError::GenerationFailed),
        }
    }

    pub async fn fetch_image(&self, url: &str) -> Result<Bytes> {
        info!("⬇️ Downloading generated image from {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|e| StudioError::Upstream(format!("image download failed ({url}): {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StudioError::Upstream(format!(
                "image download failed ({url}): status={status}"
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| StudioError::Upstream(format!("image download failed ({url}): {e}")))
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<AssistantMessage>,
}

impl Choice {
    /// Image entries of this choice, if it carries a non-empty collection.
    pub fn images(&self) -> Option<&[ImageEntry]> {
        self.message
            .as_ref()?
            .images
            .as_deref()
            .filter(|entries| !entries.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "lenient_entries")]
    pub images: Option<Vec<ImageEntry>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageEntry {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub image_url: Option<ImageUrlRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageUrlRef {
    #[serde(default)]
    pub url: Option<String>,
}

// `images` is provider-defined: anything that is not a list counts as absent
// and list items of unexpected shape become empty entries.
fn lenient_entries<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<ImageEntry>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
    ))
}
