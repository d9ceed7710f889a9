//! Resilient per-page calls to the transcription service.
//!
//! Each attempt is classified by [`RetryPolicy::decide`] into one of three
//! outcomes:
//!
//! | Service result              | Not the last attempt          | Last attempt                    |
//! |-----------------------------|-------------------------------|---------------------------------|
//! | text                        | `Success`                     | `Success`                       |
//! | rate limited (HTTP 429)     | `Retry(base × attempt)`       | wait, then `Exhausted` (FAILED) |
//! | any other error             | `Retry(base)`                 | `Exhausted` (ERROR)             |
//!
//! The client never returns an error: a page whose attempts run out comes
//! back as marker text so the rest of the document still gets transcribed.

use crate::config::TranscriptionConfig;
use crate::error::ServiceError;
use crate::pipeline::encode::PreparedImage;
use crate::prompts::{page_prompt, DEFAULT_SYSTEM_PROMPT};
use crate::provider::{TranscriptionRequest, TranscriptionService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry with linear backoff for rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

/// Classification of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The service returned text.
    Success(String),
    /// Wait, then try again.
    Retry { delay: Duration, cause: ServiceError },
    /// Give up; the page gets `marker` as its transcription once `delay`
    /// (if any) has elapsed.
    Exhausted {
        marker: String,
        delay: Option<Duration>,
        kind: PageOutcome,
        cause: ServiceError,
    },
}

/// How a page's transcription was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Transcribed,
    /// The final attempt failed with a non-rate-limit error.
    ServiceFailed,
    /// Every attempt was rate limited.
    AttemptsExhausted,
}

impl PageOutcome {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, PageOutcome::Transcribed)
    }
}

/// Result of transcribing one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTranscription {
    pub text: String,
    pub attempts: u32,
    pub outcome: PageOutcome,
}

impl RetryPolicy {
    /// Classify the result of `attempt` (1-based) for `page_number`.
    pub fn decide(
        &self,
        attempt: u32,
        result: Result<String, ServiceError>,
        page_number: usize,
    ) -> AttemptOutcome {
        let cause = match result {
            Ok(text) => return AttemptOutcome::Success(text),
            Err(e) => e,
        };
        let last = attempt >= self.max_attempts;
        match (cause.is_rate_limited(), last) {
            (true, false) => AttemptOutcome::Retry {
                delay: self.backoff(attempt),
                cause,
            },
            (true, true) => AttemptOutcome::Exhausted {
                marker: exhausted_marker(page_number, self.max_attempts),
                delay: Some(self.backoff(attempt)),
                kind: PageOutcome::AttemptsExhausted,
                cause,
            },
            (false, false) => AttemptOutcome::Retry {
                delay: self.base_delay,
                cause,
            },
            (false, true) => AttemptOutcome::Exhausted {
                marker: error_marker(page_number, &cause),
                delay: None,
                kind: PageOutcome::ServiceFailed,
                cause,
            },
        }
    }

    /// Rate-limit wait after `attempt`: `base × attempt`, saturating.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Marker embedded when the last attempt failed with a service error.
pub fn error_marker(page_number: usize, error: &ServiceError) -> String {
    format!("[TRANSCRIPTION ERROR — page {page_number}: {error}]")
}

/// Marker embedded when every attempt was used up without a result.
pub fn exhausted_marker(page_number: usize, max_attempts: u32) -> String {
    format!("[TRANSCRIPTION FAILED — page {page_number}: all {max_attempts} attempts exhausted]")
}

/// Sends prepared pages to a [`TranscriptionService`] with retries.
#[derive(Clone)]
pub struct TranscriptionClient {
    service: Arc<dyn TranscriptionService>,
    policy: RetryPolicy,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl TranscriptionClient {
    pub fn new(service: Arc<dyn TranscriptionService>, config: &TranscriptionConfig) -> Self {
        Self {
            service,
            policy: RetryPolicy {
                max_attempts: config.max_attempts.max(1),
                base_delay: config.retry_delay,
            },
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }

    /// Transcribe one page and return its text (possibly a marker).
    pub async fn transcribe(
        &self,
        image: &PreparedImage,
        page_number: usize,
        total_pages: usize,
        document_title: &str,
    ) -> String {
        self.transcribe_page(image, page_number, total_pages, document_title)
            .await
            .text
    }

    /// Transcribe one page, reporting how many attempts it took.
    pub async fn transcribe_page(
        &self,
        image: &PreparedImage,
        page_number: usize,
        total_pages: usize,
        document_title: &str,
    ) -> PageTranscription {
        let prompt = page_prompt(page_number, total_pages, document_title);
        let request = TranscriptionRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system_prompt: &self.system_prompt,
            image_data: &image.data,
            media_type: image.media_type,
            page_prompt: &prompt,
        };

        for attempt in 1..=self.policy.max_attempts {
            let result = self.service.transcribe(&request).await;

            match self.policy.decide(attempt, result, page_number) {
                AttemptOutcome::Success(text) => {
                    debug!(
                        "Page {}: {} chars on attempt {}",
                        page_number,
                        text.chars().count(),
                        attempt
                    );
                    return PageTranscription {
                        text,
                        attempts: attempt,
                        outcome: PageOutcome::Transcribed,
                    };
                }
                AttemptOutcome::Retry { delay, cause } => {
                    if let ServiceError::RateLimited {
                        retry_after: Some(hint),
                    } = &cause
                    {
                        debug!("Page {}: service suggested retry after {:?}", page_number, hint);
                    }
                    warn!(
                        "Page {}: attempt {}/{} via {} failed ({}), retrying in {:.1}s",
                        page_number,
                        attempt,
                        self.policy.max_attempts,
                        self.service.name(),
                        cause,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::Exhausted {
                    marker,
                    delay,
                    kind,
                    cause,
                } => {
                    warn!(
                        "Page {}: giving up after {} attempt(s): {}",
                        page_number, attempt, cause
                    );
                    if let Some(delay) = delay {
                        debug!(
                            "Page {}: cooling down {:.1}s before moving on",
                            page_number,
                            delay.as_secs_f64()
                        );
                        tokio::time::sleep(delay).await;
                    }
                    return PageTranscription {
                        text: marker,
                        attempts: attempt,
                        outcome: kind,
                    };
                }
            }
        }

        // Only reachable if max_attempts is 0.
        PageTranscription {
            text: exhausted_marker(page_number, self.policy.max_attempts),
            attempts: self.policy.max_attempts,
            outcome: PageOutcome::AttemptsExhausted,
        }
    }
}
