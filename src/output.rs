//! Result types returned by the conversion entry points.
//!
//! Everything here is `Serialize` so the CLI's `--json` mode can dump a run
//! verbatim.

use crate::error::{ResolveWarning, SlideError};
use crate::pipeline::llm::TokenUsage;
use crate::pipeline::planner::PresentationPlan;
use crate::slide::{Slide, SlideType};
use serde::Serialize;

/// Outcome of one outline entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum GenerationResult {
    Succeeded(Slide),
    Failed(SlideError),
}

/// Outcome of one outline entry plus what it cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideResult {
    /// 1-based outline position.
    pub slide_number: usize,
    pub slide_type: SlideType,
    pub result: GenerationResult,
    /// Attempts made, between 1 and `max_retries + 1`.
    pub attempts: u32,
    pub usage: TokenUsage,
    pub duration_ms: u64,
}

impl SlideResult {
    pub fn is_success(&self) -> bool {
        matches!(self.result, GenerationResult::Succeeded(_))
    }

    pub fn slide(&self) -> Option<&Slide> {
        match &self.result {
            GenerationResult::Succeeded(s) => Some(s),
            GenerationResult::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&SlideError> {
        match &self.result {
            GenerationResult::Succeeded(_) => None,
            GenerationResult::Failed(e) => Some(e),
        }
    }
}

/// Counters and timings of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PresentationStats {
    pub planned_slides: usize,
    pub generated_slides: usize,
    pub dropped_slides: usize,
    /// Generation attempts across all entries (planning not included).
    pub total_attempts: u32,
    pub unresolved_figures: usize,
    pub truncated_sections: usize,
    pub skipped_figures: usize,
    pub indexed_figures: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub planning_duration_ms: u64,
    pub generation_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// A finished slide list, before rendering.
#[derive(Debug, Clone, Serialize)]
pub struct Presentation {
    pub title: String,
    pub plan: PresentationPlan,
    /// Resolved slides in outline order. Failed entries are absent.
    pub slides: Vec<Slide>,
    /// One entry per outline entry, in outline order.
    pub results: Vec<SlideResult>,
    pub warnings: Vec<ResolveWarning>,
    pub stats: PresentationStats,
}

impl Presentation {
    /// `(slide_number, error)` of every dropped entry.
    pub fn dropped(&self) -> impl Iterator<Item = (usize, &SlideError)> + '_ {
        self.results
            .iter()
            .filter_map(|r| r.error().map(|e| (r.slide_number, e)))
    }
}

/// A rendered presentation.
#[derive(Debug, Clone, Serialize)]
pub struct PresentationOutput {
    pub markdown: String,
    pub presentation: Presentation,
}

/// What `inspect` reports about a paper without calling a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub title: Option<String>,
    /// `"nested"` or `"flat"`.
    pub shape: String,
    pub sections: Vec<SectionSummary>,
    pub figures: Vec<FigureSummary>,
    pub skipped_figures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    pub name: String,
    pub blocks: usize,
    pub paragraphs: usize,
    /// Characters before any cap is applied.
    pub chars: usize,
    pub figures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FigureSummary {
    pub figure_id: String,
    pub url: String,
    pub caption: String,
}
