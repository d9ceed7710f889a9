//! # archive-scribe
//!
//! Transcribe scanned handwritten archive documents (PDF) into text with a
//! vision language model, one page at a time.
//!
//! Aged municipal and notarial records defeat classic OCR: faded ink,
//! period letterforms, marginalia, stamps. This crate rasterises each page,
//! enhances it, and asks the model for a faithful transcription that marks
//! what it cannot read as `[illegible]` rather than guessing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       validate the path and `%PDF` header
//!  ├─ 2. Render      rasterise selected pages via pdfium (spawn_blocking)
//!  ├─ 3. Prepare     downscale, contrast and sharpness boost, PNG → base64
//!  ├─ 4. Transcribe  one request per page, linear backoff on rate limits
//!  └─ 5. Store       rewrite <stem>_transcription.txt after every page,
//!                    optional <stem>_transcription.json at the end
//! ```
//!
//! A page whose attempts run out is stored with an inline error marker and
//! the run carries on with the next page.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archive_scribe::{TranscriptionConfig, TranscriptionPipeline};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TranscriptionConfig::builder()
//!         .api_key(std::env::var("ANTHROPIC_API_KEY")?)
//!         .build()?;
//!     let pipeline = TranscriptionPipeline::new(config)?;
//!     let result = pipeline
//!         .run(Path::new("acta_1953.pdf"), "Acta 1953", Some("1-5"), true)
//!         .await?;
//!     eprintln!("{} pages transcribed", result.processed_pages.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `transcribe` binary (clap + anyhow + dotenvy + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! archive-scribe = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod store;
pub mod transcribe;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ImageEncoding, ImageSettings, TranscriptionConfig, TranscriptionConfigBuilder};
pub use error::{ServiceError, TranscribeError};
pub use output::{PageResult, PipelineResult};
pub use pipeline::input::document_title_from_path;
pub use pipeline::render::{PageRasterizer, PdfiumRasterizer};
pub use pipeline::select::{select_indices, PageSelection, PageSpan};
pub use pipeline::transcribe::{PageOutcome, PageTranscription, RetryPolicy, TranscriptionClient};
pub use progress::{NoopProgressCallback, ProgressCallback, TranscriptionProgressCallback};
pub use provider::{AnthropicService, TranscriptionRequest, TranscriptionService};
pub use store::ResultStore;
pub use transcribe::TranscriptionPipeline;
