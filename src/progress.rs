//! Progress-callback trait for per-page transcription events.
//!
//! Inject an [`Arc<dyn TranscriptionProgressCallback>`] via
//! [`crate::config::TranscriptionConfigBuilder::progress_callback`] to be told
//! as the pipeline moves through a document. The CLI uses this to drive its
//! progress bar; a service could forward events to a channel or a database.
//!
//! Pages are processed strictly one at a time, so events for one run never
//! interleave. The trait is still `Send + Sync` because the pipeline itself
//! may be shared across tasks that run different documents.
//!
//! # Example
//!
//! ```rust
//! use archive_scribe::{TranscriptionConfig, TranscriptionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//! use std::time::Duration;
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl TranscriptionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page: usize, total: usize, elapsed: Duration, chars: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {page}/{total}: {chars} chars in {:.1}s", elapsed.as_secs_f64());
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//! let config = TranscriptionConfig::builder()
//!     .progress_callback(cb as Arc<dyn TranscriptionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Called by the pipeline as it transcribes each page.
///
/// All methods default to no-ops so callers only override what they need.
pub trait TranscriptionProgressCallback: Send + Sync {
    /// Called once after the document is loaded and the pages are selected.
    ///
    /// # Arguments
    /// * `total_pages` — page count of the whole document
    /// * `selected`    — number of pages that will be transcribed
    fn on_run_start(&self, total_pages: usize, selected: usize) {
        let _ = (total_pages, selected);
    }

    /// Called just before a page is sent to the service.
    fn on_page_start(&self, page_number: usize, total_pages: usize) {
        let _ = (page_number, total_pages);
    }

    /// Called when a page came back with real transcription text.
    fn on_page_complete(&self, page_number: usize, total_pages: usize, elapsed: Duration, chars: usize) {
        let _ = (page_number, total_pages, elapsed, chars);
    }

    /// Called when a page ran out of attempts and was stored as an error marker.
    fn on_page_degraded(&self, page_number: usize, total_pages: usize, elapsed: Duration, marker: &str) {
        let _ = (page_number, total_pages, elapsed, marker);
    }

    /// Called once after the last selected page has been saved.
    ///
    /// # Arguments
    /// * `processed` — pages appended to the result
    /// * `degraded`  — of those, pages holding an error marker
    fn on_run_complete(&self, processed: usize, degraded: usize) {
        let _ = (processed, degraded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranscriptionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranscriptionConfig`].
pub type ProgressCallback = Arc<dyn TranscriptionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        selected: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        degraded: AtomicUsize,
    }

    impl TranscriptionProgressCallback for TrackingCallback {
        fn on_run_start(&self, _total_pages: usize, selected: usize) {
            self.selected.store(selected, Ordering::SeqCst);
        }

        fn on_page_start(&self, _page_number: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page: usize, _total: usize, _elapsed: Duration, _chars: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_degraded(&self, _page: usize, _total: usize, _elapsed: Duration, _marker: &str) {
            self.degraded.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5, 5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, Duration::from_millis(1200), 42);
        cb.on_page_degraded(2, 5, Duration::from_secs(15), "[TRANSCRIPTION ERROR — page 2: boom]");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_run_start(10, 3);
        tracker.on_page_start(1, 10);
        tracker.on_page_complete(1, 10, Duration::from_secs(2), 100);
        tracker.on_page_start(2, 10);
        tracker.on_page_degraded(2, 10, Duration::from_secs(9), "[TRANSCRIPTION FAILED — page 2]");

        assert_eq!(tracker.selected.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.degraded.load(Ordering::SeqCst), 1);
    }
}
