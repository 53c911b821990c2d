//! # Poster Studio
//!
//! Turns one or two photos plus an instruction into a generated image via an
//! OpenAI-compatible multimodal chat-completions provider.
//!
//! Client side: [`normalize`] bounds and re-encodes photos, [`compose`] builds
//! the message list, [`studio`] drives a page session. Server side:
//! [`routes`] exposes the proxy, [`openrouter`] talks to the provider,
//! [`extract`] finds the generated image and [`overlay`] frames it.

pub mod compose;
pub mod config;
pub mod datauri;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod openrouter;
pub mod overlay;
pub mod routes;
pub mod studio;

pub use error::{Result, StudioError};
