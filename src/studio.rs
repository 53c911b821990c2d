//! Client-side driver for one application page: holds the selected images and
//! instruction, submits them through the proxy and prepares the result for
//! display and download.

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use reqwest::Client;
use tracing::{error, info, warn};

use crate::{
    compose::{compose_messages, Application, ImageSlot, InstructionDraft},
    datauri,
    error::{Result, StudioError},
    extract::display_uri,
    models::{ChatMessage, ChatRequest, ErrorBody, GenerationEnvelope},
    normalize::{NormalizedImage, Normalizer, SourceImage},
    overlay::{frame_image, load_overlay},
};

pub const DOWNLOAD_FILENAME: &str = "generated_poster.png";
const GENERIC_FAILURE: &str = "Failed to generate image.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    TopRight,
    TopLeft,
    BottomRight,
    BottomLeft,
}

/// Arguments for the notification widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub duration: Duration,
    pub position: Position,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            severity,
            duration: Duration::from_millis(5000),
            position: Position::TopRight,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message, Severity::Error)
    }

    /// Uses the server-provided text when there is one.
    pub fn from_error(err: &StudioError) -> Self {
        match err {
            StudioError::Rejected {
                message: Some(message),
                ..
            } if !message.is_empty() => Self::error(message.clone()),
            StudioError::UnsupportedMediaType(_)
            | StudioError::AssetLoad { .. }
            | StudioError::InvalidRequest(_) => Self::error(err.to_string()),
            _ => Self::error(GENERIC_FAILURE),
        }
    }
}

/// HTTP client for the `POST /api/ai` proxy endpoint.
#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
    endpoint: String,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: format!("{}/api/ai", base_url.trim_end_matches('/')),
        }
    }

    pub async fn generate(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { model, messages })
            .send()
            .await
            .map_err(|e| StudioError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .map(|body| body.error);
            return Err(StudioError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: GenerationEnvelope = response
            .json()
            .await
            .map_err(|e| StudioError::Upstream(format!("malformed proxy response: {e}")))?;
        Ok(envelope.response.image)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub data_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub filename: &'static str,
    pub bytes: Vec<u8>,
}

impl GeneratedImage {
    pub fn download(&self) -> Result<Download> {
        let (_, bytes) = datauri::decode(&self.data_uri)?;
        Ok(Download {
            filename: DOWNLOAD_FILENAME,
            bytes,
        })
    }
}

/// Shared view of whether a submission is in flight. Clones observe the same
/// flag, so a UI can poll it while `Studio::submit` holds the studio mutably.
#[derive(Debug, Clone, Default)]
pub struct GenerationStatus(Arc<AtomicBool>);

impl GenerationStatus {
    pub fn is_generating(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn begin(&self) -> InFlight<'_> {
        self.0.store(true, Ordering::Release);
        InFlight(self)
    }
}

// Clears the flag however the submission ends, including cancellation
struct InFlight<'a>(&'a GenerationStatus);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0 .0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
struct FrameAsset {
    path: PathBuf,
    timeout: Duration,
}

/// State behind one application page. Only whole results ever reach `output`.
#[derive(Debug)]
pub struct Studio {
    app: Application,
    normalizer: Normalizer,
    slots: Vec<Option<NormalizedImage>>,
    draft: InstructionDraft,
    frame: Option<FrameAsset>,
    status: GenerationStatus,
    output: Option<GeneratedImage>,
}

impl Studio {
    pub fn new(app: Application) -> Self {
        Self {
            app,
            normalizer: Normalizer::default(),
            slots: vec![None; app.slots().len()],
            draft: app.initial_draft(),
            frame: None,
            status: GenerationStatus::default(),
            output: None,
        }
    }

    /// Overlay composited onto raw results of applications that frame output.
    pub fn with_frame(mut self, path: impl Into<PathBuf>, timeout: Duration) -> Self {
        self.frame = Some(FrameAsset {
            path: path.into(),
            timeout,
        });
        self
    }

    pub fn application(&self) -> Application {
        self.app
    }

    pub fn image(&self, slot: ImageSlot) -> Option<&NormalizedImage> {
        let index = self.slot_index(slot)?;
        self.slots[index].as_ref()
    }

    pub fn instruction(&self) -> &InstructionDraft {
        &self.draft
    }

    pub fn is_generating(&self) -> bool {
        self.status.is_generating()
    }

    pub fn status(&self) -> GenerationStatus {
        self.status.clone()
    }

    pub fn output(&self) -> Option<&GeneratedImage> {
        self.output.as_ref()
    }

    fn slot_index(&self, slot: ImageSlot) -> Option<usize> {
        self.app.slots().iter().position(|s| *s == slot)
    }

    /// Normalizes the selected file into `slot`. On failure the slot keeps its
    /// previous image.
    pub async fn select_image(
        &mut self,
        slot: ImageSlot,
        source: SourceImage,
    ) -> std::result::Result<&NormalizedImage, Notice> {
        let index = self
            .slot_index(slot)
            .ok_or_else(|| Notice::error(format!("{:?} has no {:?} image", self.app, slot)))?;

        match self.normalizer.normalize(source).await {
            Ok(image) => Ok(&*self.slots[index].insert(image)),
            Err(e) => {
                warn!("⚠️ Image selection rejected: {}", e);
                Err(Notice::from_error(&e))
            }
        }
    }

    pub fn select_preset(&mut self, name: &str) -> std::result::Result<(), Notice> {
        self.draft
            .select_preset(name)
            .map_err(|e| Notice::from_error(&e))
    }

    pub fn edit_instruction(&mut self, text: impl Into<String>) {
        self.draft.edit(text);
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        let images: Vec<Option<&NormalizedImage>> = self.slots.iter().map(Option::as_ref).collect();
        compose_messages(self.app.system_instruction(), self.draft.text(), &images)
    }

    pub fn can_submit(&self) -> bool {
        !self.status.is_generating()
            && !self.draft.text().trim().is_empty()
            && self.slots.iter().all(Option::is_some)
    }

    pub async fn submit(&mut self, proxy: &ProxyClient) -> std::result::Result<&GeneratedImage, Notice> {
        if !self.can_submit() {
            return Err(Notice::error("Select the required images and enter a prompt first."));
        }

        let messages = self.messages();
        let status = self.status.clone();
        let _in_flight = status.begin();

        let payload = proxy.generate(self.app.model(), &messages).await.map_err(|e| {
            error!("❌ Error generating image: {}", e);
            Notice::from_error(&e)
        })?;

        let image = self.finish(&payload).await.map_err(|e| {
            error!("❌ Post-processing failed: {}", e);
            Notice::from_error(&e)
        })?;
        info!("✅ Generated image ready ({} chars)", image.data_uri.len());
        Ok(&*self.output.insert(image))
    }

    // A result that already arrives as a data URI is shown as-is
    async fn finish(&self, payload: &str) -> Result<GeneratedImage> {
        if datauri::is_image(payload) {
            return Ok(GeneratedImage {
                data_uri: payload.to_string(),
            });
        }

        let uri = display_uri(payload);
        let data_uri = match (&self.frame, self.app.frames_output()) {
            (Some(frame), true) => {
                let overlay = load_overlay(&frame.path, frame.timeout).await?;
                frame_image(&uri, &overlay)?
            }
            _ => uri,
        };
        Ok(GeneratedImage { data_uri })
    }
}
