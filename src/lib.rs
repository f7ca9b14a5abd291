//! # paper2slides
//!
//! Turn structured research-paper JSON into a Marp slide deck with a
//! two-phase LLM pipeline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paper JSON
//!  │
//!  ├─ 1. Input      read a local file or download from URL
//!  ├─ 2. Index      figure index + capped section texts (no LLM)
//!  ├─ 3. Plan       one LLM call → ordered slide outline
//!  ├─ 4. Generate   one LLM call per entry, schema-validated, retried
//!  │                with the validation errors as feedback (bounded fan-out)
//!  ├─ 5. Resolve    figure identifiers → real image URLs
//!  └─ 6. Render     Marp Markdown + per-slide stats
//! ```
//!
//! Image URLs never enter a prompt: the model only ever sees figure
//! identifiers such as `S3.F1`, and the resolver swaps them for the indexed
//! URL after generation. Identifiers it cannot resolve are removed rather
//! than passed through.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use paper2slides::{convert, Language, PresentationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = PresentationConfig::builder()
//!         .language(Language::English)
//!         .max_slides(8)
//!         .build()?;
//!     let output = convert("paper.json", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} slides dropped", output.presentation.stats.dropped_slides);
//!     Ok(())
//! }
//! ```
//!
//! ## Bringing your own model
//!
//! Every stage that talks to a model goes through [`LanguageModel`].
//! [`convert_with_model`] and [`build_presentation`] accept any
//! implementation, which is how the test-suite drives the pipeline with
//! scripted replies.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `paper2slides` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! paper2slides = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod render;
pub mod schema;
pub mod slide;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Language, PresentationConfig, PresentationConfigBuilder, SectionLimits};
pub use convert::{
    build_presentation, convert, convert_document, convert_sync, convert_to_file,
    convert_with_model, inspect, plan, plan_with_model, resolve_model, summarize,
};
pub use document::{Document, DocumentShape};
pub use error::{Paper2SlidesError, ResolveWarning, SlideError};
pub use output::{
    DocumentSummary, GenerationResult, Presentation, PresentationOutput, PresentationStats,
    SlideResult,
};
pub use pipeline::llm::{LanguageModel, ModelError, ModelRequest, ModelResponse, ModelTask, TokenUsage};
pub use pipeline::planner::{PresentationPlan, SlideOutline};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use render::{render_slides_json, render_slides_json_with, MarpRenderer, Renderer};
pub use slide::{Slide, SlideType};
