//! The transcription service boundary.
//!
//! A [`TranscriptionService`] performs exactly one request and reports
//! exactly one outcome. It never retries and never sleeps: the retry and
//! backoff policy belongs to [`crate::pipeline::transcribe::TranscriptionClient`],
//! which is the only caller.

pub mod anthropic;

use crate::error::ServiceError;
use async_trait::async_trait;

pub use anthropic::AnthropicService;

/// Everything one service call needs.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptionRequest<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    /// Fixed transcription-fidelity instruction.
    pub system_prompt: &'a str,
    /// Base64 page image.
    pub image_data: &'a str,
    pub media_type: &'a str,
    /// Per-page instruction (page number, total, title).
    pub page_prompt: &'a str,
}

/// An external image-understanding service that turns a page into text.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Send one request and return the transcribed text.
    async fn transcribe(&self, request: &TranscriptionRequest<'_>) -> Result<String, ServiceError>;
}
