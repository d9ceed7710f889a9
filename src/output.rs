//! Result types produced by a transcription run.

use crate::error::TranscribeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One transcribed page.
///
/// Created exactly once per attempted page. A page whose attempts ran out
/// still gets a `PageResult`; its `transcription` holds the error marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// 1-based page number within the source document.
    pub page_number: usize,
    /// Transcribed text, possibly containing inline markers.
    pub transcription: String,
    /// Wall-clock time of the service call including retries.
    pub processing_time_seconds: f64,
}

impl PageResult {
    pub fn new(page_number: usize, transcription: impl Into<String>, processing_time_seconds: f64) -> Self {
        Self {
            page_number,
            transcription: transcription.into(),
            processing_time_seconds: (processing_time_seconds.max(0.0) * 100.0).round() / 100.0,
        }
    }
}

/// The aggregate of one document run.
///
/// Owned by the pipeline while it runs and only ever appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub source_file: String,
    pub document_title: String,
    pub model: String,
    pub total_pages: usize,
    pub processed_pages: Vec<PageResult>,
    pub started_at: DateTime<Utc>,
}

impl PipelineResult {
    /// Start an empty result; `started_at` is captured now.
    pub fn new(
        source_file: impl Into<String>,
        document_title: impl Into<String>,
        model: impl Into<String>,
        total_pages: usize,
    ) -> Self {
        Self {
            source_file: source_file.into(),
            document_title: document_title.into(),
            model: model.into(),
            total_pages,
            processed_pages: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Append a page, keeping page numbers unique and within the document.
    pub fn push_page(&mut self, page: PageResult) -> Result<(), TranscribeError> {
        if page.page_number == 0 || page.page_number > self.total_pages {
            return Err(TranscribeError::PageOutOfRange {
                page: page.page_number,
                total: self.total_pages,
            });
        }
        if self.processed_pages.iter().any(|p| p.page_number == page.page_number) {
            return Err(TranscribeError::Internal(format!(
                "page {} was already transcribed in this run",
                page.page_number
            )));
        }
        self.processed_pages.push(page);
        Ok(())
    }

    /// Total characters transcribed so far.
    pub fn total_chars(&self) -> usize {
        self.processed_pages
            .iter()
            .map(|p| p.transcription.chars().count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PipelineResult {
        PipelineResult::new("docs/acta.pdf", "Acta", "claude-sonnet-4-5", 3)
    }

    #[test]
    fn processing_time_is_rounded_and_non_negative() {
        assert_eq!(PageResult::new(1, "x", 1.23456).processing_time_seconds, 1.23);
        assert_eq!(PageResult::new(1, "x", -0.5).processing_time_seconds, 0.0);
    }

    #[test]
    fn push_page_rejects_duplicates() {
        let mut r = sample();
        r.push_page(PageResult::new(2, "a", 0.1)).unwrap();
        let err = r.push_page(PageResult::new(2, "b", 0.1)).unwrap_err();
        assert!(matches!(err, TranscribeError::Internal(_)));
        assert_eq!(r.processed_pages.len(), 1);
    }

    #[test]
    fn push_page_rejects_pages_outside_document() {
        let mut r = sample();
        assert!(r.push_page(PageResult::new(0, "a", 0.1)).is_err());
        assert!(r.push_page(PageResult::new(4, "a", 0.1)).is_err());
        assert!(r.processed_pages.is_empty());
    }

    #[test]
    fn serialises_with_camel_case_fields() {
        let mut r = sample();
        r.push_page(PageResult::new(1, "Señor Alcalde", 2.5)).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["sourceFile"], "docs/acta.pdf");
        assert_eq!(json["documentTitle"], "Acta");
        assert_eq!(json["model"], "claude-sonnet-4-5");
        assert_eq!(json["totalPages"], 3);
        assert!(json["startedAt"].is_string());
        let page = &json["processedPages"][0];
        assert_eq!(page["pageNumber"], 1);
        assert_eq!(page["transcription"], "Señor Alcalde");
        assert_eq!(page["processingTimeSeconds"], 2.5);
    }

    #[test]
    fn total_chars_counts_unicode_scalars() {
        let mut r = sample();
        r.push_page(PageResult::new(1, "año", 0.0)).unwrap();
        r.push_page(PageResult::new(2, "ab", 0.0)).unwrap();
        assert_eq!(r.total_chars(), 5);
    }
}
