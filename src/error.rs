//! Error taxonomy shared by the proxy and the client-side pipeline.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorBody;

/// Message returned to callers whenever the provider call itself fails.
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Error calling OpenAI API";

#[derive(Debug, Error)]
pub enum StudioError {
    /// Malformed client payload.
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Method {0} Not Allowed")]
    MethodNotAllowed(String),

    /// Network or provider failure. The detail is logged, never returned.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The provider answered but no image could be located.
    #[error("No image found in the response")]
    GenerationFailed,

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("failed to load asset {name}: {reason}")]
    AssetLoad { name: String, reason: String },

    /// Non-success answer from the proxy endpoint, seen from the client side.
    #[error("proxy responded with status {status}")]
    Rejected { status: u16, message: Option<String> },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StudioError>;

impl StudioError {
    pub fn asset(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetLoad {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Rejected { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Upstream(_)
            | Self::GenerationFailed
            | Self::AssetLoad { .. }
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text that is safe to hand back to a caller.
    pub fn public_message(&self) -> String {
        match self {
            Self::Upstream(_) => UPSTREAM_FAILURE_MESSAGE.to_string(),
            Self::Config(_) | Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Upstream(detail) => tracing::error!("❌ Upstream failure: {}", detail),
            Self::Config(_) | Self::Internal(_) | Self::AssetLoad { .. } => {
                tracing::error!("❌ {}", self)
            }
            _ => tracing::warn!("⚠️ Rejecting request ({}): {}", status, self),
        }

        let body = Json(ErrorBody {
            error: self.public_message(),
        });
        let mut response = (status, body).into_response();
        if let Self::MethodNotAllowed(_) = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }
        response
    }
}
