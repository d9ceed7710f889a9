//! PDF rasterisation: count pages and render selected pages via pdfium.
//!
//! The pipeline only talks to the [`PageRasterizer`] trait, so tests (and
//! callers with their own renderer) can feed it in-memory pages.
//! [`PdfiumRasterizer`] is the production implementation.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state that must not run on a
//! Tokio worker. Every pdfium call goes through `spawn_blocking` and is
//! awaited before the pipeline continues, so at most one page is ever being
//! rendered.

use crate::error::TranscribeError;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Points per inch in PDF user space.
const POINTS_PER_INCH: f32 = 72.0;

/// Source of page images for a document.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document.
    async fn page_count(&self, path: &Path) -> Result<usize, TranscribeError>;

    /// Render the given 0-based pages, in the order requested.
    async fn render_pages(
        &self,
        path: &Path,
        indices: &[usize],
    ) -> Result<Vec<(usize, DynamicImage)>, TranscribeError>;
}

/// Renders pages with pdfium at a fixed resolution.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(dpi: u32, max_pixels: u32, library_path: Option<PathBuf>) -> Self {
        Self {
            dpi,
            max_pixels,
            library_path,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn page_count(&self, path: &Path) -> Result<usize, TranscribeError> {
        let path = path.to_path_buf();
        let library = self.library_path.clone();

        tokio::task::spawn_blocking(move || -> Result<usize, TranscribeError> {
            let pdfium = bind_pdfium(library.as_deref())?;
            let document = open_document(&pdfium, &path)?;
            Ok(document.pages().len() as usize)
        })
        .await
        .map_err(|e| TranscribeError::Internal(format!("Page-count task panicked: {}", e)))?
    }

    async fn render_pages(
        &self,
        path: &Path,
        indices: &[usize],
    ) -> Result<Vec<(usize, DynamicImage)>, TranscribeError> {
        let path = path.to_path_buf();
        let library = self.library_path.clone();
        let indices = indices.to_vec();
        let (dpi, max_pixels) = (self.dpi, self.max_pixels);

        tokio::task::spawn_blocking(move || {
            render_pages_blocking(&path, library.as_deref(), dpi, max_pixels, &indices)
        })
        .await
        .map_err(|e| TranscribeError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    library: Option<&Path>,
    dpi: u32,
    max_pixels: u32,
    page_indices: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, TranscribeError> {
    let pdfium = bind_pdfium(library)?;
    let document = open_document(&pdfium, pdf_path)?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages, rendering {} at {} DPI", total_pages, page_indices.len(), dpi);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            return Err(TranscribeError::PageOutOfRange {
                page: idx + 1,
                total: total_pages,
            });
        }

        let page = pages
            .get(idx as PdfPageIndex)
            .map_err(|e| TranscribeError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            TranscribeError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push((idx, image));
    }

    Ok(results)
}

fn open_document<'a>(pdfium: &'a Pdfium, pdf_path: &Path) -> Result<PdfDocument<'a>, TranscribeError> {
    pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| TranscribeError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

/// Bind to pdfium: an explicit library path first, then the working
/// directory, then the system library search path.
fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, TranscribeError> {
    let bindings = match library {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(path))
        }
        Some(path) => Pdfium::bind_to_library(path),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| TranscribeError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}
