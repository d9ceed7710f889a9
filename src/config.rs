//! Configuration for a transcription run.
//!
//! Every knob lives in [`TranscriptionConfig`], built once at process start
//! via [`TranscriptionConfigBuilder`] and passed by reference into the
//! pipeline, the image preparer and the transcription client. Nothing reads
//! ambient global state, so each component can be exercised in tests with
//! an injected configuration.

use crate::error::TranscribeError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default Anthropic model used for transcription.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Default Anthropic API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// Configuration for transcribing one or more documents.
///
/// # Example
/// ```rust
/// use archive_scribe::TranscriptionConfig;
/// use std::time::Duration;
///
/// let config = TranscriptionConfig::builder()
///     .api_key("sk-ant-test")
///     .dpi(300)
///     .retry_delay(Duration::from_secs(2))
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct TranscriptionConfig {
    /// Credential for the transcription service. Required by the Anthropic
    /// provider; unused when a custom service is injected.
    pub api_key: Option<String>,

    /// Model identifier sent with every request. Default: `claude-sonnet-4-5`.
    pub model: String,

    /// Base URL of the Messages API. Default: `https://api.anthropic.com`.
    pub api_base_url: String,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: u32,

    /// Per-request timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Rasterisation resolution. Range: 72–600. Default: 200.
    pub dpi: u32,

    /// Safety cap on either rendered dimension, in pixels. Default: 10 000.
    pub max_rendered_pixels: u32,

    /// Pages wider than this are downscaled before upload. Default: 1600.
    pub max_image_width: u32,

    /// Contrast enhancement factor; 1.0 leaves the page unchanged. Default: 1.3.
    pub contrast_factor: f32,

    /// Sharpness enhancement factor; 1.0 leaves the page unchanged. Default: 1.2.
    pub sharpness_factor: f32,

    /// Transport encoding for prepared pages. Default: PNG.
    pub image_encoding: ImageEncoding,

    /// Attempts per page, including the first. Default: 3.
    pub max_attempts: u32,

    /// Base retry delay. Rate-limited attempts wait `retry_delay × attempt`;
    /// other failures wait exactly `retry_delay`. Default: 5 s.
    pub retry_delay: Duration,

    /// Pause between consecutive pages. Default: 1 s.
    pub inter_page_delay: Duration,

    /// Directory receiving `<stem>_transcription.{txt,json}`. Default: `outputs`.
    pub output_dir: PathBuf,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Explicit pdfium library (file or containing directory). If None the
    /// rasteriser looks in the working directory, then the system paths.
    pub pdfium_library_path: Option<PathBuf>,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_tokens: 4096,
            api_timeout_secs: 120,
            dpi: 200,
            max_rendered_pixels: 10_000,
            max_image_width: 1600,
            contrast_factor: 1.3,
            sharpness_factor: 1.2,
            image_encoding: ImageEncoding::default(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            inter_page_delay: Duration::from_secs(1),
            output_dir: PathBuf::from("outputs"),
            system_prompt: None,
            pdfium_library_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("dpi", &self.dpi)
            .field("max_image_width", &self.max_image_width)
            .field("contrast_factor", &self.contrast_factor)
            .field("sharpness_factor", &self.sharpness_factor)
            .field("image_encoding", &self.image_encoding)
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .field("inter_page_delay", &self.inter_page_delay)
            .field("output_dir", &self.output_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn TranscriptionProgressCallback>"),
            )
            .finish()
    }
}

impl TranscriptionConfig {
    /// Create a new builder for `TranscriptionConfig`.
    pub fn builder() -> TranscriptionConfigBuilder {
        TranscriptionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The image-preparation subset of this configuration.
    pub fn image_settings(&self) -> ImageSettings {
        ImageSettings {
            max_width: self.max_image_width,
            contrast_factor: self.contrast_factor,
            sharpness_factor: self.sharpness_factor,
            encoding: self.image_encoding,
        }
    }
}

/// Builder for [`TranscriptionConfig`].
#[derive(Debug)]
pub struct TranscriptionConfigBuilder {
    config: TranscriptionConfig,
}

impl TranscriptionConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.config.api_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_image_width(mut self, px: u32) -> Self {
        self.config.max_image_width = px;
        self
    }

    pub fn contrast_factor(mut self, factor: f32) -> Self {
        self.config.contrast_factor = factor;
        self
    }

    pub fn sharpness_factor(mut self, factor: f32) -> Self {
        self.config.sharpness_factor = factor;
        self
    }

    pub fn image_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.config.image_encoding = encoding;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn inter_page_delay(mut self, delay: Duration) -> Self {
        self.config.inter_page_delay = delay;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TranscriptionConfig, TranscribeError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(TranscribeError::InvalidConfig("Model identifier must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(TranscribeError::InvalidConfig("Max output tokens must be ≥ 1".into()));
        }
        if c.max_attempts == 0 {
            return Err(TranscribeError::InvalidConfig("Retry attempts must be ≥ 1".into()));
        }
        if c.max_image_width == 0 {
            return Err(TranscribeError::InvalidConfig("Max image width must be ≥ 1".into()));
        }
        for (name, factor) in [("Contrast", c.contrast_factor), ("Sharpness", c.sharpness_factor)] {
            if !factor.is_finite() || factor < 0.0 {
                return Err(TranscribeError::InvalidConfig(format!(
                    "{name} factor must be a finite number ≥ 0, got {factor}"
                )));
            }
        }
        if let ImageEncoding::Jpeg { quality } = c.image_encoding {
            if !(1..=100).contains(&quality) {
                return Err(TranscribeError::InvalidConfig(format!(
                    "JPEG quality must be 1–100, got {quality}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Image settings ───────────────────────────────────────────────────────

/// How a prepared page is serialised before base64 wrapping.
///
/// PNG is the default: lossless compression keeps fine pen strokes intact.
/// JPEG trades that fidelity for smaller requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageEncoding {
    #[default]
    Png,
    Jpeg { quality: u8 },
}

impl ImageEncoding {
    /// MIME type announced to the service.
    pub fn media_type(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg { .. } => "image/jpeg",
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageEncoding::Png => write!(f, "PNG"),
            ImageEncoding::Jpeg { quality } => write!(f, "JPEG q{quality}"),
        }
    }
}

/// Parameters consumed by [`crate::pipeline::prepare::prepare_image`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSettings {
    pub max_width: u32,
    pub contrast_factor: f32,
    pub sharpness_factor: f32,
    pub encoding: ImageEncoding,
}

impl Default for ImageSettings {
    fn default() -> Self {
        TranscriptionConfig::default().image_settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = TranscriptionConfig::default();
        assert_eq!(c.model, "claude-sonnet-4-5");
        assert_eq!(c.max_tokens, 4096);
        assert_eq!(c.dpi, 200);
        assert_eq!(c.max_image_width, 1600);
        assert_eq!(c.max_attempts, 3);
        assert_eq!(c.retry_delay, Duration::from_secs(5));
        assert_eq!(c.inter_page_delay, Duration::from_secs(1));
        assert_eq!(c.image_encoding, ImageEncoding::Png);
        assert_eq!(c.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = TranscriptionConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
        let c = TranscriptionConfig::builder().dpi(5000).build().unwrap();
        assert_eq!(c.dpi, 600);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = TranscriptionConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(matches!(err, TranscribeError::InvalidConfig(_)));
    }

    #[test]
    fn negative_factor_rejected() {
        let err = TranscriptionConfig::builder()
            .contrast_factor(-1.0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Contrast"));
    }

    #[test]
    fn blank_api_key_is_treated_as_unset() {
        let c = TranscriptionConfig::builder().api_key("   ").build().unwrap();
        assert!(c.api_key.is_none());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = TranscriptionConfig::builder().api_key("sk-ant-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-ant-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn jpeg_quality_validated() {
        let err = TranscriptionConfig::builder()
            .image_encoding(ImageEncoding::Jpeg { quality: 0 })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("JPEG quality"));
        assert_eq!(ImageEncoding::Jpeg { quality: 90 }.media_type(), "image/jpeg");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = TranscriptionConfig::builder()
            .api_base_url("http://localhost:8080/")
            .build()
            .unwrap();
        assert_eq!(c.api_base_url, "http://localhost:8080");
    }
}
