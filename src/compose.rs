//! Prompt composition: presets, application profiles and the message list
//! sent to the chat-completions endpoint.

use serde::Serialize;

use crate::{
    error::{Result, StudioError},
    models::{ChatMessage, ContentPart, Role},
    normalize::NormalizedImage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "Ghibli",
        description: "Studio Ghibli-style illustration. Draw the person as a character from a Studio Ghibli film with soft colors and whimsical features.",
    },
    Preset {
        name: "Simpsons",
        description: "Simpsons character style. Draw the person as a character from The Simpsons with yellow skin and exaggerated features.",
    },
    Preset {
        name: "Disney",
        description: "Disney animated character style. Draw the person as a classic Disney character with exaggerated features. Use bright colors and smooth shading. Make it look magical and whimsical.",
    },
    Preset {
        name: "Moomin",
        description: "Moomin character sketch style. Draw Moomintroll or other characters from the Moominvalley but make them look like the person in the photo.",
    },
    Preset {
        name: "LEGO",
        description: "LEGO minifigure style. Draw the person as a minifigure with blocky features and bright colors. Use plastic-like texture and photorealistic lighting.",
    },
];

pub fn find_preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.name == name)
}

pub fn style_instruction(preset: &Preset) -> String {
    format!(
        "Make an image of the cartoon character. Use {}\n\n\
         Cartoon character should look like the person provided in photo. Use facial features, hair and clothing same as on the image with person. Incorporate elements from the photo into the character design.\n\n\
         Return only the new image as a response.",
        preset.description
    )
}

const POSTER_INSTRUCTION: &str = "Make a new one soviet poster keeping artistic style from the second image and using person from the first photo. Person from the first photo must be placed into the poster from the second image.\n\n\
The person must be instantly recognizable as the same individual, preserving facial features, hairstyle, skin tone, and clothing.\n\n\
Draw person using poster styles for character to fit it into the style.";

/// Image slots an application requires, in the order they are embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Subject,
    StyleReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Application {
    /// Places the subject into a reference poster.
    FacePoster,
    /// Redraws the subject in a preset cartoon style, then frames the result.
    StyleTransfer,
}

impl Application {
    pub fn model(self) -> &'static str {
        match self {
            Self::FacePoster => "google/gemini-2.5-flash-image-preview",
            Self::StyleTransfer => "openai/gpt-5-image-mini",
        }
    }

    pub fn system_instruction(self) -> &'static str {
        match self {
            Self::FacePoster => "You are a professional graphic designer and photo editor skilled in advanced image manipulation techniques.",
            Self::StyleTransfer => "You are a professional graphic designer and artist.",
        }
    }

    pub fn slots(self) -> &'static [ImageSlot] {
        match self {
            Self::FacePoster => &[ImageSlot::Subject, ImageSlot::StyleReference],
            Self::StyleTransfer => &[ImageSlot::Subject],
        }
    }

    pub fn frames_output(self) -> bool {
        matches!(self, Self::StyleTransfer)
    }

    pub fn initial_draft(self) -> InstructionDraft {
        match self {
            Self::FacePoster => InstructionDraft::fixed(POSTER_INSTRUCTION),
            Self::StyleTransfer => InstructionDraft::for_preset(&PRESETS[0]),
        }
    }
}

/// The editable instruction text. Selecting a preset rewrites it from the
/// preset template; edits after that are kept until the next selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionDraft {
    preset: Option<&'static Preset>,
    text: String,
}

impl InstructionDraft {
    pub fn fixed(text: impl Into<String>) -> Self {
        Self {
            preset: None,
            text: text.into(),
        }
    }

    pub fn for_preset(preset: &'static Preset) -> Self {
        Self {
            preset: Some(preset),
            text: style_instruction(preset),
        }
    }

    pub fn select_preset(&mut self, name: &str) -> Result<()> {
        let preset = find_preset(name)
            .ok_or_else(|| StudioError::InvalidRequest(format!("Unknown style preset: {name}")))?;
        *self = Self::for_preset(preset);
        Ok(())
    }

    pub fn edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn preset(&self) -> Option<&'static Preset> {
        self.preset
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Builds `[system, user]`, or an empty list while any required image is
/// missing. Images are referenced as-is, in slot order, after the text.
pub fn compose_messages(
    system: &str,
    instruction: &str,
    images: &[Option<&NormalizedImage>],
) -> Vec<ChatMessage> {
    let Some(images) = images.iter().copied().collect::<Option<Vec<_>>>() else {
        return Vec::new();
    };

    let mut content = Vec::with_capacity(images.len() + 1);
    content.push(ContentPart::text(instruction));
    content.extend(images.iter().map(|image| ContentPart::image(image.data_uri.clone())));

    let messages = vec![
        ChatMessage {
            role: Role::System,
            content: vec![ContentPart::text(system)],
        },
        ChatMessage {
            role: Role::User,
            content,
        },
    ];
    tracing::debug!("Composed {} messages with {} images", messages.len(), images.len());
    messages
}
