//! Prompts for the planning and slide-generation calls.
//!
//! Every model-facing string is built here so that tests can inspect prompts
//! directly without a model. Two rules hold for everything this module emits:
//!
//! 1. No figure URL ever appears; figures are offered as identifier + caption.
//! 2. Absolute URLs inside paper text are replaced with `[link]`.

use crate::config::Language;
use crate::pipeline::index::{IndexedDocument, IndexedFigure};
use crate::pipeline::planner::SlideOutline;
use crate::schema::json_schema;
use crate::slide::SlideType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fmt::Write as _;

/// System message of the planning call.
pub const PLANNER_SYSTEM_PROMPT: &str =
    "You are a presentation planning expert. Output valid JSON only.";

/// Placeholder that replaces absolute URLs in prompted text.
pub const LINK_PLACEHOLDER: &str = "[link]";

static RE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:https?|ftp)://[^\s<>"'()\[\]]+"#).unwrap()
});

/// Replace every absolute URL in `text` with [`LINK_PLACEHOLDER`].
pub fn scrub_urls(text: &str) -> Cow<'_, str> {
    RE_URL.replace_all(text, LINK_PLACEHOLDER)
}

/// Paper title + scrubbed section texts, shared by both prompts.
fn paper_context(doc: &IndexedDocument) -> String {
    let title = doc.title.as_deref().unwrap_or("Research Paper");
    let s = &doc.sections;
    format!(
        "- Title: {}\n- Abstract: {}\n- Method: {}\n- Performance: {}\n- Conclusion: {}",
        scrub_urls(title),
        scrub_urls(&s.abstract_text),
        scrub_urls(&s.method),
        scrub_urls(&s.performance),
        scrub_urls(&s.conclusion),
    )
}

fn figure_listing(figures: &[&IndexedFigure]) -> String {
    if figures.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\n**Available Figures** (select by Figure ID):\n");
    for (i, fig) in figures.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. Figure ID: {}\n   Caption: {}\n",
            i + 1,
            fig.figure_id,
            scrub_urls(&fig.caption)
        );
    }
    out.push_str(
        "**IMPORTANT**: For image fields, use the Figure ID (e.g. 'S3.F1'), NOT a URL. \
         The system converts it to the real image automatically.",
    );
    out
}

/// User message of the planning call.
pub fn planning_prompt(
    doc: &IndexedDocument,
    max_slides: usize,
    language: Language,
    max_figures: usize,
) -> String {
    let figures: Vec<&IndexedFigure> = doc.figures.iter().take(max_figures).collect();
    let lang = language.native_name();

    let mut types = String::new();
    for (i, t) in SlideType::ALL.iter().enumerate() {
        let _ = writeln!(types, "{}. {}: {} ({})", i + 1, t, t.description(), t.use_case());
    }

    format!(
        r#"Analyze this paper and create a presentation plan.

**Paper Information**:
{context}{figures}

**Your Task**:
Create a presentation plan with at most {max_slides} slides in {lang}.

**Available Slide Types ({count} types)**:
{types}
**Planning Guidelines**:
- Start with title_slide (paper title and authors)
- Use section_title for major sections (Abstract, Method, Results, Conclusion)
- Use highlight for key contributions
- Use metrics_grid or three_column_metrics for performance results
- End with quote for a takeaway message
- Image slide types (single_content_with_image, image_with_description_2/3) need
  figures: list the Figure IDs to use in "figure_ids", only from the Available
  Figures list. Never invent Figure IDs. Without suitable figures, pick a
  text-only slide type instead.

**Output Format** (JSON):
{{
  "title": "Presentation title in {lang}",
  "slides": [
    {{
      "slide_number": 1,
      "type": "title_slide",
      "purpose": "Introduce paper and authors",
      "key_points": ["Paper title", "Authors"],
      "figure_ids": []
    }}
  ]
}}

Every slide MUST have slide_number, type, purpose and key_points.
Generate the plan as JSON now."#,
        context = paper_context(doc),
        figures = figure_listing(&figures),
        count = SlideType::ALL.len(),
    )
}

/// System message of a slide-generation call.
pub fn generation_system_prompt(slide_type: SlideType, language: Language) -> String {
    format!(
        "Generate a {} slide in {}. Output a single valid JSON object only. \
         Respect ALL character limits. For images, use Figure IDs from the \
         Available Figures list; do NOT create IDs or URLs.",
        slide_type,
        language.native_name()
    )
}

/// User message of the first generation attempt for `outline`.
pub fn slide_prompt(
    outline: &SlideOutline,
    doc: &IndexedDocument,
    candidates: &[&IndexedFigure],
    language: Language,
) -> String {
    let slide_type = outline.slide_type;
    let schema = json_schema(slide_type);
    let key_points = if outline.key_points.is_empty() {
        "-".to_string()
    } else {
        outline
            .key_points
            .iter()
            .map(|p| format!("\n  * {}", scrub_urls(p)))
            .collect()
    };

    format!(
        r#"Generate slide content following the plan.

**Slide Plan**:
- Number: {number}
- Type: {slide_type}
- Purpose: {purpose}
- Key Points: {key_points}

**Paper Context**:
{context}{figures}

**Instructions**:
- Write all text in {lang}
- Follow the exact schema for {slide_type}; every field is required
- Keep within ALL character limits (maxLength) and item counts (minItems/maxItems)
- All values are strings, including metric values
- Figure fields take a Figure ID from the Available Figures list, never a URL;
  leave a figure field empty ("") when no listed figure fits

**Schema**: {schema}

Generate the slide as JSON now."#,
        number = outline.slide_number,
        purpose = scrub_urls(&outline.purpose),
        context = paper_context(doc),
        figures = figure_listing(candidates),
        lang = language.native_name(),
    )
}

/// Append the previous attempt's error to `prompt` as corrective feedback.
pub fn with_feedback(prompt: &str, feedback: &str) -> String {
    format!(
        r#"{prompt}

**VALIDATION FEEDBACK FROM PREVIOUS ATTEMPT**:
The previous generation failed validation with the following error:
{feedback}

**CRITICAL**: Fix the above errors. Pay special attention to:
- Character limits (must be STRICTLY followed)
- List length constraints (min/max items)
- Required fields (all must be present)
- Field types (all values are strings)

Regenerate the slide with ALL errors fixed."#
    )
}
