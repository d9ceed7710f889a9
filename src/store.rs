//! Persistence of run results.
//!
//! Two files per source document, both under the configured output directory:
//!
//! * `<stem>_transcription.txt`: human-readable, rewritten after every page;
//! * `<stem>_transcription.json`: the full [`PipelineResult`], on request.
//!
//! Every save is a full overwrite through a temp file and a rename, so a
//! crash mid-write leaves the previous complete version in place.

use crate::config::{ImageSettings, TranscriptionConfig};
use crate::error::TranscribeError;
use crate::output::PipelineResult;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Rule printed under the header and around each page banner.
pub const SEPARATOR_WIDTH: usize = 70;

/// Writes transcription results to the local filesystem.
#[derive(Debug, Clone)]
pub struct ResultStore {
    output_dir: PathBuf,
    dpi: u32,
    image: ImageSettings,
}

impl ResultStore {
    pub fn new(output_dir: impl Into<PathBuf>, dpi: u32, image: ImageSettings) -> Self {
        Self {
            output_dir: output_dir.into(),
            dpi,
            image,
        }
    }

    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self::new(&config.output_dir, config.dpi, config.image_settings())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn txt_path(&self, source: &Path) -> PathBuf {
        self.output_dir.join(format!("{}_transcription.txt", stem(source)))
    }

    pub fn json_path(&self, source: &Path) -> PathBuf {
        self.output_dir.join(format!("{}_transcription.json", stem(source)))
    }

    /// Rewrite the text file with every page processed so far.
    pub async fn save_progress(&self, result: &PipelineResult, source: &Path) -> Result<PathBuf, TranscribeError> {
        let path = self.txt_path(source);
        let text = self.render_text(result);
        write_atomic(&path, text.as_bytes()).await?;
        debug!(
            "Progress saved: {} page(s) → {}",
            result.processed_pages.len(),
            path.display()
        );
        Ok(path)
    }

    /// Write the structured result as pretty-printed JSON.
    pub async fn save_json(&self, result: &PipelineResult, source: &Path) -> Result<PathBuf, TranscribeError> {
        let path = self.json_path(source);
        let json = serde_json::to_string_pretty(result)?;
        write_atomic(&path, json.as_bytes()).await?;
        info!("JSON saved: {}", path.display());
        Ok(path)
    }

    /// Read back a result previously written by [`ResultStore::save_json`].
    pub async fn load_json(&self, source: &Path) -> Result<PipelineResult, TranscribeError> {
        let path = self.json_path(source);
        let raw = tokio::fs::read(&path)
            .await
            .map_err(|source| TranscribeError::ResultReadFailed {
                path: path.clone(),
                source,
            })?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// The complete text-file body for `result`.
    pub fn render_text(&self, result: &PipelineResult) -> String {
        let separator = "─".repeat(SEPARATOR_WIDTH);
        let header = format!(
            "TRANSCRIPTION — {title}\n\
             Source: {source}\n\
             Model: {model} | DPI: {dpi}\n\
             Image: max width {width}px | contrast {contrast} | sharpness {sharpness} | {encoding}\n\
             {separator}\n",
            title = result.document_title,
            source = result.source_file,
            model = result.model,
            dpi = self.dpi,
            width = self.image.max_width,
            contrast = self.image.contrast_factor,
            sharpness = self.image.sharpness_factor,
            encoding = self.image.encoding,
        );

        let mut lines = vec![header];
        for page in &result.processed_pages {
            lines.push(format!("\n{separator}"));
            lines.push(format!("PAGE {}", page.page_number));
            lines.push(format!("{separator}\n"));
            lines.push(page.transcription.clone());
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

fn stem(source: &Path) -> String {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

/// Write to `<path>.tmp` in the same directory, flush it to disk, then
/// rename over `path`.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), TranscribeError> {
    let fail = |source| TranscribeError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path).await.map_err(fail)?;
    file.write_all(bytes).await.map_err(fail)?;
    file.sync_all().await.map_err(fail)?;
    drop(file);
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::PageResult;

    fn store(dir: &Path) -> ResultStore {
        ResultStore::new(dir.join("outputs"), 200, ImageSettings::default())
    }

    fn result_with_pages(pages: &[(usize, &str)]) -> PipelineResult {
        let mut r = PipelineResult::new("docs/acta_1953.pdf", "Acta 1953", "claude-sonnet-4-5", 5);
        for (n, text) in pages {
            r.push_page(PageResult::new(*n, *text, 1.0)).unwrap();
        }
        r
    }

    #[test]
    fn paths_derive_from_source_stem() {
        let s = ResultStore::new("out", 200, ImageSettings::default());
        let src = Path::new("/archive/acta_1953.pdf");
        assert_eq!(s.txt_path(src), PathBuf::from("out/acta_1953_transcription.txt"));
        assert_eq!(s.json_path(src), PathBuf::from("out/acta_1953_transcription.json"));
    }

    #[test]
    fn text_has_header_and_ordered_banners() {
        let s = ResultStore::new("out", 300, ImageSettings::default());
        let text = s.render_text(&result_with_pages(&[(2, "segunda"), (4, "cuarta")]));

        assert!(text.starts_with("TRANSCRIPTION — Acta 1953\n"));
        assert!(text.contains("Source: docs/acta_1953.pdf"));
        assert!(text.contains("Model: claude-sonnet-4-5 | DPI: 300"));
        assert!(text.contains("contrast 1.3 | sharpness 1.2 | PNG"));

        let p2 = text.find("PAGE 2").unwrap();
        let p4 = text.find("PAGE 4").unwrap();
        assert!(p2 < p4);
        assert!(text[p2..p4].contains("segunda"));
        assert!(text[p4..].contains("cuarta"));
    }

    #[test]
    fn banner_is_framed_by_separators() {
        let s = ResultStore::new("out", 200, ImageSettings::default());
        let sep = "─".repeat(SEPARATOR_WIDTH);
        let text = s.render_text(&result_with_pages(&[(1, "uno")]));
        assert!(text.contains(&format!("\n\n{sep}\nPAGE 1\n{sep}\n\nuno\n")));
    }

    #[test]
    fn empty_result_is_header_only() {
        let s = ResultStore::new("out", 200, ImageSettings::default());
        let text = s.render_text(&result_with_pages(&[]));
        assert!(!text.contains("PAGE"));
        assert!(text.ends_with(&format!("{}\n", "─".repeat(SEPARATOR_WIDTH))));
    }

    #[tokio::test]
    async fn save_progress_is_an_idempotent_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let src = Path::new("acta_1953.pdf");

        let r = result_with_pages(&[(1, "uno")]);
        let path = s.save_progress(&r, src).await.unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        s.save_progress(&r, src).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);

        let r = result_with_pages(&[(1, "uno"), (2, "dos")]);
        s.save_progress(&r, src).await.unwrap();
        let grown = std::fs::read_to_string(&path).unwrap();
        assert!(grown.contains("PAGE 2"));
        assert_eq!(grown.matches("PAGE 1").count(), 1);
    }

    #[tokio::test]
    async fn no_temp_file_is_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        s.save_progress(&result_with_pages(&[(1, "x")]), Path::new("a.pdf"))
            .await
            .unwrap();

        let names: Vec<_> = std::fs::read_dir(s.output_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_transcription.txt".to_string()]);
    }

    #[tokio::test]
    async fn json_round_trips_and_keeps_non_ascii() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let src = Path::new("acta_1953.pdf");
        let r = result_with_pages(&[(1, "Señor Alcalde, año de 1953 [illegible]")]);

        let path = s.save_json(&r, src).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Señor Alcalde, año"));
        assert!(raw.contains("\"pageNumber\": 1"));
        assert!(raw.contains("\"processedPages\""));

        assert_eq!(s.load_json(src).await.unwrap(), r);
    }

    #[tokio::test]
    async fn load_json_missing_file_names_the_result_path() {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let err = s.load_json(Path::new("none.pdf")).await.unwrap_err();

        match &err {
            TranscribeError::ResultReadFailed { path, source } => {
                assert_eq!(path, &s.json_path(Path::new("none.pdf")));
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected ResultReadFailed, got {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("none_transcription.json"), "{message}");
        assert!(!message.contains("PDF"), "{message}");
    }

    #[tokio::test]
    async fn unwritable_output_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("outputs");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = store(dir.path())
            .save_progress(&result_with_pages(&[(1, "x")]), Path::new("a.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, TranscribeError::OutputWriteFailed { .. }));
    }
}
