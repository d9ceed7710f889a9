//! Per-page stages of a transcription run.
//!
//! ```text
//! input ──▶ render ──▶ select ──▶ prepare ──▶ encode ──▶ transcribe
//! (path)    (pdfium)   (ranges)   (enhance)   (base64)   (service + retry)
//! ```
//!
//! 1. [`input`]      — check the source exists and is a PDF
//! 2. [`render`]     — count and rasterise pages; pdfium runs in `spawn_blocking`
//! 3. [`select`]     — turn a page-range expression into 0-based indices
//! 4. [`prepare`]    — downscale, boost contrast and sharpness
//! 5. [`encode`]     — PNG/JPEG-encode and base64-wrap for the request body
//! 6. [`transcribe`] — one service call per attempt under the retry policy;
//!    the only stage with network I/O

pub mod encode;
pub mod input;
pub mod prepare;
pub mod render;
pub mod select;
pub mod transcribe;
