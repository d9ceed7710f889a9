//! Error types for the archive-scribe library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TranscribeError`] — **Fatal**: the run cannot proceed (missing
//!   credential, missing or empty document, malformed page range, a write
//!   that would break the incremental-save guarantee). Returned as
//!   `Err(TranscribeError)` from [`crate::TranscriptionPipeline::run`].
//!
//! * [`ServiceError`] — **Transient**: one call to the transcription service
//!   failed (rate limited, 5xx, network blip). Consumed by
//!   [`crate::pipeline::transcribe::TranscriptionClient`], which retries and,
//!   when attempts run out, degrades the page to an inline error marker.
//!   A `ServiceError` never reaches the caller of `run`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the archive-scribe library.
#[derive(Debug, Error)]
pub enum TranscribeError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No API credential was supplied for the transcription service.
    #[error("{key} is not set.\nExport it before running: export {key}=sk-ant-...")]
    MissingCredential { key: &'static str },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Source document was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    DocumentNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The document decoded to zero pages.
    #[error("No pages found in PDF: '{path}'")]
    EmptyDocument { path: PathBuf },

    /// A page-range token could not be parsed.
    #[error("Malformed page range token '{token}': {reason}\nExpected e.g. '1-5', '1,3,7' or '2-4,8'.")]
    MalformedRange { token: String, reason: String },

    /// A selected page number lies outside the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium for your platform and either:\n\
  • place it next to the executable or in the working directory, or\n\
  • set PDFIUM_LIB_PATH=/path/to/libpdfium (file or containing directory).\n"
    )]
    PdfiumBindingFailed(String),

    /// A prepared page could not be encoded for transport.
    #[error("Image encoding failed for page {page}: {detail}")]
    ImageEncoding { page: usize, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A previously saved result file could not be read back.
    #[error("Failed to read saved result '{path}': {source}")]
    ResultReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The structured result could not be (de)serialised.
    #[error("Failed to serialise transcription result: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failed call to the transcription service.
///
/// The retry state machine only distinguishes [`ServiceError::RateLimited`]
/// from everything else; the other variants exist so log lines and error
/// markers carry a useful description.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// HTTP 429: the service asked us to slow down.
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    /// The service answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never got a response (DNS, TLS, connection reset…).
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded the configured per-request timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A 2xx response whose body carried no usable text.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Whether this error is the service's throttling signal.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ServiceError::RateLimited { .. })
    }
}
