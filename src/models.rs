use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StudioError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
}

/// One typed part of a chat message, in the chat-completions wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentPart>,
}

/// Outbound `{ model, messages }` body. The proxy forwards raw JSON messages,
/// the client side sends typed ones.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a, M: Serialize> {
    pub model: &'a str,
    pub messages: &'a [M],
}

/// A validated submission to `POST /api/ai`. Messages stay as raw JSON so they
/// are forwarded to the provider verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<Value>,
}

impl GenerationRequest {
    pub fn from_json(body: Value) -> Result<Self> {
        let model = match body.get("model") {
            Some(Value::String(model)) if !model.trim().is_empty() => model.clone(),
            _ => return Err(StudioError::InvalidRequest("Model is required".into())),
        };

        let messages = match body.get("messages") {
            Some(Value::Array(messages)) => messages.clone(),
            _ => {
                return Err(StudioError::InvalidRequest(
                    "Messages must be an array".into(),
                ))
            }
        };
        if messages.is_empty() {
            return Err(StudioError::InvalidRequest(
                "Messages must not be empty".into(),
            ));
        }

        Ok(Self { model, messages })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedPayload {
    /// Raw base64, or a data URI when the provider returned one inline.
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationEnvelope {
    pub response: GeneratedPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRequest {
    pub image: String,
}
