//! Progress-callback trait for plan and per-slide generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::PresentationConfigBuilder::progress_callback`] to receive
//! events as the pipeline plans the deck and generates each slide.
//!
//! # Example
//!
//! ```rust
//! use paper2slides::{GenerationProgressCallback, PresentationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_slide_complete(&self, slide_num: usize, total_slides: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Slide {}/{} done", slide_num, total_slides);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = PresentationConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it plans and generates.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Slide events arrive from concurrently polled futures and may interleave
/// across slides. Implementations must protect shared mutable state with
/// `Mutex`, `AtomicUsize` or similar.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once the outline is parsed, before any slide is generated.
    ///
    /// # Arguments
    /// * `total_slides` — outline entries that will be generated
    /// * `title`        — presentation title chosen by the planner
    fn on_plan_ready(&self, total_slides: usize, title: &str) {
        let _ = (total_slides, title);
    }

    /// Called just before the first attempt for a slide.
    fn on_slide_start(&self, slide_num: usize, total_slides: usize) {
        let _ = (slide_num, total_slides);
    }

    /// Called when an attempt failed and another one will follow.
    ///
    /// # Arguments
    /// * `slide_num` — 1-based outline position
    /// * `attempt`   — 1-based number of the attempt that is about to run
    /// * `error`     — why the previous attempt failed
    fn on_slide_retry(&self, slide_num: usize, attempt: u32, error: &str) {
        let _ = (slide_num, attempt, error);
    }

    /// Called when a slide passed validation.
    fn on_slide_complete(&self, slide_num: usize, total_slides: usize) {
        let _ = (slide_num, total_slides);
    }

    /// Called when a slide exhausted its attempts and was dropped.
    fn on_slide_dropped(&self, slide_num: usize, total_slides: usize, error: &str) {
        let _ = (slide_num, total_slides, error);
    }

    /// Called once after every slide has been attempted.
    ///
    /// # Arguments
    /// * `total_slides`  — outline entries
    /// * `success_count` — slides that made it into the deck
    fn on_run_complete(&self, total_slides: usize, success_count: usize) {
        let _ = (total_slides, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PresentationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
