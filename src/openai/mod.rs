//! Clients for the external transcription and text-generation services.
//!
//! The pipeline only sees the [`Transcriber`] and [`TextGenerator`] traits;
//! [`OpenAiClient`] implements both against an OpenAI-compatible HTTP API.

mod client;
mod types;

pub use client::OpenAiClient;
pub use types::*;

use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::validation::AudioUpload;

/// Converts recorded audio into transcript text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one upload. Failures are [`crate::error::ServiceError::Transcription`].
    async fn transcribe(&self, upload: &AudioUpload) -> ServiceResult<String>;
}

/// Produces a narrative from an assembled prompt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate one narrative. Failures are [`crate::error::ServiceError::Generation`].
    async fn generate(&self, prompt: &str) -> ServiceResult<String>;
}
