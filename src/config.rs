use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::error::{Result, StudioError};

pub const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";

/// Process-wide, read-only settings sourced from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub api_base: String,
    pub port: u16,
    pub upstream_timeout: Duration,
    pub image_fetch_timeout: Duration,
    pub asset_timeout: Duration,
    pub frame_overlay: PathBuf,
    pub max_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENROUTER_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| StudioError::Config("OPENROUTER_API_KEY is not set".into()))?;

        Ok(Self {
            api_key,
            api_base: lookup("OPENROUTER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            port: parsed(&lookup, "PORT", 8080),
            upstream_timeout: Duration::from_secs(parsed(&lookup, "UPSTREAM_TIMEOUT_SECS", 120)),
            image_fetch_timeout: Duration::from_secs(parsed(&lookup, "IMAGE_FETCH_TIMEOUT_SECS", 60)),
            asset_timeout: Duration::from_secs(parsed(&lookup, "ASSET_TIMEOUT_SECS", 10)),
            frame_overlay: lookup("FRAME_OVERLAY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("assets/frame-01.png")),
            max_body_bytes: parsed(&lookup, "MAX_BODY_BYTES", 20 * 1024 * 1024),
        })
    }

    /// Short prefix of the credential, safe for logs.
    pub fn masked_key(&self) -> String {
        let shown: String = self.api_key.chars().take(6).collect();
        format!("{shown}***")
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            default
        }),
        None => default,
    }
}
