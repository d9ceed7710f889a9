//! Page selection: turn a human page-range expression into page indices.
//!
//! Expressions use 1-based page numbers, comma-separated, where each token
//! is a single page (`7`) or an inclusive span (`3-15`): `"1,3,5-7"`.
//! Spans whose end runs past the document are clamped; a page or span start
//! outside the document is rejected rather than passed downstream.

use crate::error::TranscribeError;
use serde::{Deserialize, Serialize};

/// One comma-separated token of a page-range expression (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSpan {
    Single(usize),
    /// Inclusive on both ends; the end may exceed the page count.
    Range(usize, usize),
}

/// Which pages of the document to transcribe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    Spans(Vec<PageSpan>),
}

impl PageSelection {
    /// Parse a page-range expression.
    ///
    /// A blank expression or the keyword `all` selects every page.
    pub fn parse(expression: &str) -> Result<Self, TranscribeError> {
        let expression = expression.trim();
        if expression.is_empty() || expression.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }

        expression
            .split(',')
            .map(parse_token)
            .collect::<Result<Vec<_>, _>>()
            .map(PageSelection::Spans)
    }

    /// Expand into sorted, deduplicated 0-based page indices.
    pub fn to_indices(&self, total_pages: usize) -> Result<Vec<usize>, TranscribeError> {
        let spans = match self {
            PageSelection::All => return Ok((0..total_pages).collect()),
            PageSelection::Spans(spans) => spans,
        };

        let mut indices = Vec::new();
        for span in spans {
            let (start, end) = match *span {
                PageSpan::Single(page) => (page, page),
                PageSpan::Range(start, end) => (start, end.min(total_pages)),
            };
            if start == 0 || start > total_pages {
                return Err(TranscribeError::PageOutOfRange {
                    page: start,
                    total: total_pages,
                });
            }
            indices.extend(start - 1..end);
        }

        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }
}

/// Resolve an optional page-range expression against a document length.
///
/// `None` selects every page, in order.
pub fn select_indices(expression: Option<&str>, total_pages: usize) -> Result<Vec<usize>, TranscribeError> {
    match expression {
        None => PageSelection::All.to_indices(total_pages),
        Some(expr) => PageSelection::parse(expr)?.to_indices(total_pages),
    }
}

fn parse_token(raw: &str) -> Result<PageSpan, TranscribeError> {
    let token = raw.trim();
    let malformed = |reason: &str| TranscribeError::MalformedRange {
        token: token.to_string(),
        reason: reason.to_string(),
    };

    let parts: Vec<&str> = token.split('-').map(str::trim).collect();
    match parts.as_slice() {
        [single] => parse_page(single)
            .map(PageSpan::Single)
            .ok_or_else(|| malformed("not an integer page number")),
        [start, end] => {
            let start = parse_page(start).ok_or_else(|| malformed("span start is not an integer"))?;
            let end = parse_page(end).ok_or_else(|| malformed("span end is not an integer"))?;
            if start > end {
                return Err(malformed("span start exceeds span end"));
            }
            Ok(PageSpan::Range(start, end))
        }
        _ => Err(malformed("more than one '-' in a span")),
    }
}

fn parse_page(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
