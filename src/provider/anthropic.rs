//! Anthropic Messages API client.
//!
//! One page = one `POST /v1/messages` carrying the system prompt, the page
//! image as a base64 block, and the per-page instruction. Response handling
//! maps HTTP status onto [`ServiceError`]: 429 is the rate-limit signal,
//! every other non-success status (including 529 "overloaded") is a plain
//! API error.

use crate::config::TranscriptionConfig;
use crate::error::{ServiceError, TranscribeError};
use crate::provider::{TranscriptionRequest, TranscriptionService};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// API version header value this client speaks.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable holding the credential.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Transcription through Claude's vision input.
#[derive(Debug, Clone)]
pub struct AnthropicService {
    http: reqwest::Client,
    endpoint: String,
    timeout_secs: u64,
}

impl AnthropicService {
    /// Build a client from the run configuration.
    ///
    /// Fails with [`TranscribeError::MissingCredential`] when no API key is set.
    pub fn from_config(config: &TranscriptionConfig) -> Result<Self, TranscribeError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or(TranscribeError::MissingCredential { key: API_KEY_ENV })?;

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| TranscribeError::InvalidConfig(format!("{API_KEY_ENV} contains invalid characters")))?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()
            .map_err(|e| TranscribeError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/v1/messages", config.api_base_url),
            timeout_secs: config.api_timeout_secs,
        })
    }
}

#[async_trait]
impl TranscriptionService for AnthropicService {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn transcribe(&self, request: &TranscriptionRequest<'_>) -> Result<String, ServiceError> {
        let body = MessagesRequest::from_request(request);

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout { secs: self.timeout_secs }
                } else {
                    ServiceError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, retry_after, &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        debug!(
            "Messages API: {} input tokens, {} output tokens, stop_reason={:?}",
            parsed.usage.input_tokens, parsed.usage.output_tokens, parsed.stop_reason
        );

        parsed.into_text()
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: [ContentBlock<'a>; 2],
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock<'a> {
    Image { source: ImageSource<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageSource<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'a str,
    data: &'a str,
}

impl<'a> MessagesRequest<'a> {
    fn from_request(req: &TranscriptionRequest<'a>) -> Self {
        Self {
            model: req.model,
            max_tokens: req.max_tokens,
            system: req.system_prompt,
            messages: [Message {
                role: "user",
                content: [
                    ContentBlock::Image {
                        source: ImageSource {
                            kind: "base64",
                            media_type: req.media_type,
                            data: req.image_data,
                        },
                    },
                    ContentBlock::Text { text: req.page_prompt },
                ],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl MessagesResponse {
    /// Text of the first text block.
    fn into_text(self) -> Result<String, ServiceError> {
        self.content
            .into_iter()
            .find(|b| b.kind == "text")
            .and_then(|b| b.text)
            .ok_or_else(|| ServiceError::InvalidResponse("response contained no text block".into()))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a non-success response onto a [`ServiceError`].
fn classify_failure(status: StatusCode, retry_after: Option<Duration>, body: &str) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ServiceError::RateLimited { retry_after };
    }

    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                trimmed.chars().take(300).collect()
            }
        });

    ServiceError::Api {
        status: status.as_u16(),
        message,
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TranscriptionRequest<'static> {
        TranscriptionRequest {
            model: "claude-sonnet-4-5",
            max_tokens: 4096,
            system_prompt: "be faithful",
            image_data: "aGVsbG8=",
            media_type: "image/png",
            page_prompt: "[Page 1 of 2]",
        }
    }

    #[test]
    fn request_body_matches_messages_api_shape() {
        let req = request();
        let body = serde_json::to_value(MessagesRequest::from_request(&req)).unwrap();

        assert_eq!(body["model"], "claude-sonnet-4-5");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["system"], "be faithful");
        let msg = &body["messages"][0];
        assert_eq!(msg["role"], "user");
        assert_eq!(msg["content"][0]["type"], "image");
        assert_eq!(msg["content"][0]["source"]["type"], "base64");
        assert_eq!(msg["content"][0]["source"]["media_type"], "image/png");
        assert_eq!(msg["content"][0]["source"]["data"], "aGVsbG8=");
        assert_eq!(msg["content"][1]["type"], "text");
        assert_eq!(msg["content"][1]["text"], "[Page 1 of 2]");
    }

    #[test]
    fn response_text_is_extracted() {
        let raw = r#"{
            "id": "msg_01",
            "type": "message",
            "content": [{"type": "text", "text": "Señor Alcalde [illegible]"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 1500, "output_tokens": 320}
        }"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.into_text().unwrap(), "Señor Alcalde [illegible]");
    }

    #[test]
    fn empty_content_is_invalid_response() {
        let parsed: MessagesResponse = serde_json::from_str(r#"{"content": []}"#).unwrap();
        assert!(matches!(parsed.into_text(), Err(ServiceError::InvalidResponse(_))));
    }

    #[test]
    fn status_429_is_rate_limited() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(7)), "");
        assert_eq!(
            err,
            ServiceError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
    }

    #[test]
    fn error_envelope_message_is_used() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = classify_failure(StatusCode::from_u16(529).unwrap(), None, body);
        assert_eq!(
            err,
            ServiceError::Api {
                status: 529,
                message: "Overloaded".into()
            }
        );
    }

    #[test]
    fn empty_error_body_falls_back_to_reason() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, None, "  ");
        assert_eq!(
            err,
            ServiceError::Api {
                status: 502,
                message: "Bad Gateway".into()
            }
        );
    }

    #[test]
    fn retry_after_header_parsed() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn missing_api_key_is_reported() {
        let config = TranscriptionConfig::default();
        let err = AnthropicService::from_config(&config).unwrap_err();
        assert!(matches!(err, TranscribeError::MissingCredential { key: "ANTHROPIC_API_KEY" }));
    }

    #[test]
    fn endpoint_follows_base_url() {
        let config = TranscriptionConfig::builder()
            .api_key("sk-ant-test")
            .api_base_url("http://127.0.0.1:9999/")
            .build()
            .unwrap();
        let svc = AnthropicService::from_config(&config).unwrap();
        assert_eq!(svc.endpoint, "http://127.0.0.1:9999/v1/messages");
        assert_eq!(svc.name(), "anthropic");
    }
}
