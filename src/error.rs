//! Error types for the paper2slides library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`Paper2SlidesError`] — **Fatal**: the run cannot produce a presentation
//!   (no usable plan, every slide failed, bad input, provider not configured).
//!   Returned as `Err(Paper2SlidesError)` from the top-level entry points.
//!
//! * [`SlideError`] — **Per slide**: one outline entry exhausted its retries.
//!   Stored inside [`crate::output::SlideResult`]; the slide is dropped and
//!   the rest of the deck is kept.
//!
//! * [`ResolveWarning`] — **Per field**: a figure reference could not be
//!   resolved. The field is blanked and the slide survives.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the paper2slides library.
#[derive(Debug, Error)]
pub enum Paper2SlidesError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Paper JSON not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The input was read but is not a paper document.
    #[error("Invalid paper document: {detail}")]
    InvalidDocument { detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Phase 1 produced no usable outline. Nothing was generated.
    #[error("Presentation planning failed: {reason}")]
    PlanningFailed { reason: String },

    /// A plan existed but not a single slide passed validation.
    #[error("All {planned} planned slides failed generation; first error: {first_error}")]
    EmptyResult { planned: usize, first_error: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Target language code outside the supported set.
    #[error("Unsupported language '{code}' (expected one of: ko, en, ja, zh, es, fr, de)")]
    UnsupportedLanguage { code: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single outline entry.
///
/// Every variant consumes one attempt of the entry's retry budget. The
/// variant recorded in [`crate::output::SlideResult`] is the one produced
/// by the final attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SlideError {
    /// Content parsed but did not satisfy the slide type's schema.
    #[error("Slide {slide}: validation failed: {detail}")]
    ValidationFailed { slide: usize, detail: String },

    /// The model's reply was not a JSON object.
    #[error("Slide {slide}: response is not valid JSON: {detail}")]
    MalformedResponse { slide: usize, detail: String },

    /// The model call did not finish in time.
    #[error("Slide {slide}: LLM call timed out after {secs}s")]
    GenerationTimeout { slide: usize, secs: u64 },

    /// The provider returned an error (network, HTTP status, quota).
    #[error("Slide {slide}: LLM call failed: {detail}")]
    GenerationTransportError { slide: usize, detail: String },
}

impl SlideError {
    /// Text fed back to the model on the next attempt.
    pub fn feedback(&self) -> String {
        match self {
            SlideError::ValidationFailed { detail, .. } => detail.clone(),
            SlideError::MalformedResponse { detail, .. } => {
                format!("The response was not a valid JSON object ({detail}).")
            }
            SlideError::GenerationTimeout { .. } | SlideError::GenerationTransportError { .. } => {
                String::new()
            }
        }
    }

    /// True for failures caused by the transport rather than the content.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SlideError::GenerationTimeout { .. } | SlideError::GenerationTransportError { .. }
        )
    }
}

/// A recoverable problem found while resolving figure references.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ResolveWarning {
    /// A figure field named an identifier that is not in the figure index.
    #[error("Slide {slide}: figure '{figure_id}' in field '{field}' not found in paper")]
    FigureUnresolved {
        slide: usize,
        field: String,
        figure_id: String,
    },
}

/// Join the non-blank lines of a multi-line message with `; `.
pub(crate) fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_joins_validation_details() {
        let msg = "Slide 2: validation failed: 2 validation error(s) for quote\n- quote: field required\n- author: field required\n";
        assert_eq!(
            single_line(msg),
            "Slide 2: validation failed: 2 validation error(s) for quote; - quote: field required; - author: field required"
        );
    }

    #[test]
    fn empty_result_display() {
        let e = Paper2SlidesError::EmptyResult {
            planned: 5,
            first_error: "Slide 1: validation failed: title: field required".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("All 5 planned slides"), "got: {msg}");
        assert!(msg.contains("field required"));
        assert!(!msg.contains('\n'), "got: {msg}");
    }

    #[test]
    fn planning_failed_is_single_line_reason() {
        let e = Paper2SlidesError::PlanningFailed {
            reason: "outline is empty".into(),
        };
        assert_eq!(e.to_string(), "Presentation planning failed: outline is empty");
    }

    #[test]
    fn unsupported_language_lists_codes() {
        let e = Paper2SlidesError::UnsupportedLanguage { code: "pt".into() };
        let msg = e.to_string();
        assert!(msg.contains("'pt'"));
        assert!(msg.contains("ko, en, ja"));
    }

    #[test]
    fn slide_error_feedback() {
        let v = SlideError::ValidationFailed {
            slide: 2,
            detail: "items: expected exactly 3 entries, got 2".into(),
        };
        assert_eq!(v.feedback(), "items: expected exactly 3 entries, got 2");
        assert!(!v.is_transient());

        let t = SlideError::GenerationTimeout { slide: 2, secs: 60 };
        assert!(t.is_transient());
        assert!(t.to_string().contains("60s"));
    }

    #[test]
    fn figure_unresolved_display() {
        let w = ResolveWarning::FigureUnresolved {
            slide: 4,
            field: "image_url".into(),
            figure_id: "S9.F9".into(),
        };
        let msg = w.to_string();
        assert!(msg.contains("S9.F9"));
        assert!(msg.contains("image_url"));
    }
}
