//! The per-document run: load → select → render → (prepare → transcribe → save)*.
//!
//! [`TranscriptionPipeline`] is the only component holding cross-page state.
//! Pages are handled strictly one after another with a pause between them,
//! so the service sees one request at a time and the retry backoff in
//! [`TranscriptionClient`] is never defeated by parallel calls.
//!
//! Everything that can fail fatally on the input (missing file, empty PDF,
//! bad page range, rasterisation) happens before the first output file is
//! written. After that, the text file is rewritten after every page and is
//! the recovery point if the process dies.

use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::output::{PageResult, PipelineResult};
use crate::pipeline::prepare::prepare_image;
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::pipeline::select::select_indices;
use crate::pipeline::transcribe::TranscriptionClient;
use crate::pipeline::input;
use crate::provider::{AnthropicService, TranscriptionService};
use crate::store::ResultStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Transcribes documents with one configuration.
pub struct TranscriptionPipeline {
    config: TranscriptionConfig,
    rasterizer: Arc<dyn PageRasterizer>,
    client: TranscriptionClient,
    store: ResultStore,
}

impl TranscriptionPipeline {
    /// Production pipeline: pdfium rasterisation and the Anthropic service.
    ///
    /// # Errors
    /// [`TranscribeError::MissingCredential`] when `config.api_key` is unset.
    pub fn new(config: TranscriptionConfig) -> Result<Self, TranscribeError> {
        let service = AnthropicService::from_config(&config)?;
        let rasterizer = PdfiumRasterizer::new(
            config.dpi,
            config.max_rendered_pixels,
            config.pdfium_library_path.clone(),
        );
        Ok(Self::with_components(config, Arc::new(rasterizer), Arc::new(service)))
    }

    /// Pipeline over caller-supplied rasteriser and service.
    pub fn with_components(
        config: TranscriptionConfig,
        rasterizer: Arc<dyn PageRasterizer>,
        service: Arc<dyn TranscriptionService>,
    ) -> Self {
        let client = TranscriptionClient::new(service, &config);
        let store = ResultStore::from_config(&config);
        Self {
            config,
            rasterizer,
            client,
            store,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Transcribe `source`, optionally restricted to a page-range expression.
    ///
    /// # Arguments
    /// * `source` — path of the PDF
    /// * `document_title` — display title used in prompts and output headers
    /// * `pages` — e.g. `"1,3,5-7"`; `None`, blank or `"all"` selects every page
    /// * `save_json` — also write `<stem>_transcription.json` at the end
    ///
    /// # Returns
    /// The aggregate result. Pages whose attempts ran out are included with an
    /// error marker as their text; they do not fail the run.
    ///
    /// # Errors
    /// Input, selection and rasterisation errors (before any output is
    /// written) and output write failures.
    pub async fn run(
        &self,
        source: &Path,
        document_title: &str,
        pages: Option<&str>,
        save_json: bool,
    ) -> Result<PipelineResult, TranscribeError> {
        let run_start = Instant::now();
        info!("Starting transcription: {}", source.display());

        // ── Step 1: Load ─────────────────────────────────────────────────────
        let pdf_path = input::resolve_local(source)?;
        let total_pages = self.rasterizer.page_count(&pdf_path).await?;
        if total_pages == 0 {
            return Err(TranscribeError::EmptyDocument { path: pdf_path });
        }
        info!("PDF has {} pages", total_pages);

        // ── Step 2: Select ───────────────────────────────────────────────────
        let indices = select_indices(pages, total_pages)?;
        debug!("Selected {} of {} pages", indices.len(), total_pages);

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(total_pages, indices.len());
        }

        let mut result = PipelineResult::new(
            source.display().to_string(),
            document_title,
            &self.config.model,
            total_pages,
        );

        if indices.is_empty() {
            info!("No pages selected; nothing to transcribe");
        }

        // ── Step 3: Rasterise ────────────────────────────────────────────────
        let render_start = Instant::now();
        let rendered = if indices.is_empty() {
            Vec::new()
        } else {
            self.rasterizer.render_pages(&pdf_path, &indices).await?
        };
        debug!(
            "Rendered {} pages in {}ms",
            rendered.len(),
            render_start.elapsed().as_millis()
        );

        // ── Step 4: Per-page loop ────────────────────────────────────────────
        let settings = self.config.image_settings();
        let last = rendered.len().saturating_sub(1);
        let mut degraded = 0usize;

        for (position, (idx, image)) in rendered.into_iter().enumerate() {
            let page_number = idx + 1;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_page_start(page_number, total_pages);
            }

            let prepared = tokio::task::spawn_blocking(move || prepare_image(image, &settings))
                .await
                .map_err(|e| TranscribeError::Internal(format!("Prepare task panicked: {}", e)))?
                .map_err(|e| TranscribeError::ImageEncoding {
                    page: page_number,
                    detail: e.to_string(),
                })?;
            debug!(
                "Page {}: prepared {}x{} {}",
                page_number, prepared.width, prepared.height, prepared.media_type
            );

            let page_start = Instant::now();
            let transcription = self
                .client
                .transcribe_page(&prepared, page_number, total_pages, document_title)
                .await;
            let elapsed = page_start.elapsed();

            if transcription.outcome.is_degraded() {
                degraded += 1;
                warn!(
                    "Page {}/{} degraded after {} attempt(s) ({:.1}s)",
                    page_number,
                    total_pages,
                    transcription.attempts,
                    elapsed.as_secs_f64()
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_page_degraded(page_number, total_pages, elapsed, &transcription.text);
                }
            } else {
                info!(
                    "Page {}/{} transcribed in {:.1}s",
                    page_number,
                    total_pages,
                    elapsed.as_secs_f64()
                );
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_page_complete(
                        page_number,
                        total_pages,
                        elapsed,
                        transcription.text.chars().count(),
                    );
                }
            }

            result.push_page(PageResult::new(
                page_number,
                transcription.text,
                elapsed.as_secs_f64(),
            ))?;
            self.store.save_progress(&result, &pdf_path).await?;

            if position < last && !self.config.inter_page_delay.is_zero() {
                tokio::time::sleep(self.config.inter_page_delay).await;
            }
        }

        // ── Step 5: Finalise ─────────────────────────────────────────────────
        if save_json {
            self.store.save_json(&result, &pdf_path).await?;
        }

        info!(
            "Transcription complete: {} pages ({} degraded), {} chars, {:.1}s total",
            result.processed_pages.len(),
            degraded,
            result.total_chars(),
            run_start.elapsed().as_secs_f64()
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(result.processed_pages.len(), degraded);
        }

        Ok(result)
    }
}
