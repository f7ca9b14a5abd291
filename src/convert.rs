//! Conversion entry points and the orchestrator.
//!
//! [`build_presentation`] is the pipeline proper: Index → Planner →
//! Generator (barrier) → Resolver, strictly in that order, against any
//! [`LanguageModel`]. The `convert*` functions wrap it with input loading,
//! provider resolution, rendering and file output.

use crate::config::PresentationConfig;
use crate::document::Document;
use crate::error::{single_line, Paper2SlidesError};
use crate::output::{
    DocumentSummary, FigureSummary, Presentation, PresentationOutput, PresentationStats,
    SectionSummary,
};
use crate::pipeline::generator::{generate_all, GenerationContext};
use crate::pipeline::index::build_index;
use crate::pipeline::llm::{LanguageModel, ProviderModel};
use crate::pipeline::planner::{plan_presentation, PresentationPlan};
use crate::pipeline::resolver::FigureResolver;
use crate::pipeline::input;
use crate::render::{MarpRenderer, Renderer};
use crate::slide::Slide;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Model used when a provider is named without a model.
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Run the two-phase pipeline on a parsed document.
///
/// # Errors
/// Returns `Err` only for fatal outcomes:
/// - [`Paper2SlidesError::PlanningFailed`] — no usable outline
/// - [`Paper2SlidesError::EmptyResult`] — every outline entry failed
///
/// Dropped slides, unresolved figures and truncated sections are reported in
/// the returned [`Presentation`] instead.
pub async fn build_presentation(
    doc: &Document,
    model: &dyn LanguageModel,
    config: &PresentationConfig,
) -> Result<Presentation, Paper2SlidesError> {
    let total_start = Instant::now();

    // ── Step 1: Index figures and sections ───────────────────────────────
    let indexed = build_index(doc, &config.section_limits);
    info!(
        "Indexed {} figures from {} sections",
        indexed.figures.len(),
        doc.sections.len()
    );

    // ── Step 2: Plan ─────────────────────────────────────────────────────
    let plan = plan_presentation(model, &indexed, config).await?;
    let planned = plan.slides.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_plan_ready(planned, &plan.title);
    }

    // ── Step 3: Generate every entry (barrier) ───────────────────────────
    let gen_start = Instant::now();
    let ctx = GenerationContext {
        doc: &indexed,
        config,
        total_slides: planned,
    };
    let results = generate_all(model, &plan, &ctx).await;
    let generation_duration_ms = gen_start.elapsed().as_millis() as u64;

    let succeeded: Vec<(usize, Slide)> = results
        .iter()
        .filter_map(|r| r.slide().map(|s| (r.slide_number, s.clone())))
        .collect();

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(planned, succeeded.len());
    }

    if succeeded.is_empty() {
        let first_error = results
            .iter()
            .find_map(|r| r.error())
            .map(|e| single_line(&e.to_string()))
            .unwrap_or_else(|| "Unknown error".to_string());
        error!("All {} planned slides failed", planned);
        return Err(Paper2SlidesError::EmptyResult {
            planned,
            first_error,
        });
    }

    // ── Step 4: Resolve figure identifiers ───────────────────────────────
    let resolver = FigureResolver::new(&indexed.figures);
    let (slides, warnings) = resolver.resolve_all(&succeeded);

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let mut usage = plan.usage;
    for r in &results {
        usage += r.usage;
    }
    let stats = PresentationStats {
        planned_slides: planned,
        generated_slides: slides.len(),
        dropped_slides: planned - slides.len(),
        total_attempts: results.iter().map(|r| r.attempts).sum(),
        unresolved_figures: warnings.len(),
        truncated_sections: indexed.truncated_sections,
        skipped_figures: indexed.skipped_figures,
        indexed_figures: indexed.figures.len(),
        total_input_tokens: usage.input_tokens,
        total_output_tokens: usage.output_tokens,
        planning_duration_ms: plan.duration_ms,
        generation_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    if stats.dropped_slides > 0 {
        warn!(
            "{} of {} slides dropped after exhausting retries",
            stats.dropped_slides, planned
        );
    }
    info!(
        "Presentation complete: {}/{} slides, {} attempts, {}ms total",
        stats.generated_slides, planned, stats.total_attempts, stats.total_duration_ms
    );

    let title = if plan.title.is_empty() {
        doc.title.clone().unwrap_or_default()
    } else {
        plan.title.clone()
    };

    Ok(Presentation {
        title,
        plan,
        slides,
        results,
        warnings,
        stats,
    })
}

/// Convert a paper JSON file or URL to a Marp presentation.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — Local file path or HTTP/HTTPS URL to paper JSON
/// * `config` — Run configuration
///
/// # Returns
/// `Ok(PresentationOutput)` on success, even if some slides were dropped
/// (check `output.presentation.stats.dropped_slides`).
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &PresentationConfig,
) -> Result<PresentationOutput, Paper2SlidesError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let doc = input::load_document(input_str, config.download_timeout_secs).await?;
    convert_document(&doc, config).await
}

/// Convert an already-parsed document, resolving the provider from `config`.
pub async fn convert_document(
    doc: &Document,
    config: &PresentationConfig,
) -> Result<PresentationOutput, Paper2SlidesError> {
    let model = resolve_model(config).await?;
    convert_with_model(doc, model.as_ref(), config).await
}

/// Convert an already-parsed document with a caller-supplied model.
pub async fn convert_with_model(
    doc: &Document,
    model: &dyn LanguageModel,
    config: &PresentationConfig,
) -> Result<PresentationOutput, Paper2SlidesError> {
    let presentation = build_presentation(doc, model, config).await?;
    let markdown = MarpRenderer::new(&config.theme).render(&presentation.title, &presentation.slides);
    Ok(PresentationOutput {
        markdown,
        presentation,
    })
}

/// Convert a paper and write the Markdown directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files. Nothing
/// is written when the run fails.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &PresentationConfig,
) -> Result<PresentationOutput, Paper2SlidesError> {
    let output = convert(input_str, config).await?;
    write_atomic(output_path.as_ref(), &output.markdown).await?;
    Ok(output)
}

/// Run only the planning phase.
///
/// Useful to preview an outline before paying for generation.
pub async fn plan(
    input_str: impl AsRef<str>,
    config: &PresentationConfig,
) -> Result<PresentationPlan, Paper2SlidesError> {
    let doc = input::load_document(input_str.as_ref(), config.download_timeout_secs).await?;
    let model = resolve_model(config).await?;
    plan_with_model(&doc, model.as_ref(), config).await
}

/// Run only the planning phase with a caller-supplied model.
pub async fn plan_with_model(
    doc: &Document,
    model: &dyn LanguageModel,
    config: &PresentationConfig,
) -> Result<PresentationPlan, Paper2SlidesError> {
    let indexed = build_index(doc, &config.section_limits);
    plan_presentation(model, &indexed, config).await
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &PresentationConfig,
) -> Result<PresentationOutput, Paper2SlidesError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Paper2SlidesError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Describe a paper's sections and figures without converting it.
///
/// Does not require an LLM provider or API key. `download_timeout_secs`
/// bounds the fetch when `input_str` is a URL.
pub async fn inspect(
    input_str: impl AsRef<str>,
    download_timeout_secs: u64,
) -> Result<DocumentSummary, Paper2SlidesError> {
    let doc = input::load_document(input_str.as_ref(), download_timeout_secs).await?;
    Ok(summarize(&doc))
}

/// Summary of a parsed document, as reported by [`inspect`].
pub fn summarize(doc: &Document) -> DocumentSummary {
    let indexed = build_index(doc, &Default::default());
    let sections = doc
        .sections
        .iter()
        .map(|(name, blocks)| SectionSummary {
            name: name.clone(),
            blocks: blocks.len(),
            paragraphs: blocks.iter().map(|b| b.paragraphs.len()).sum(),
            chars: blocks
                .iter()
                .flat_map(|b| &b.paragraphs)
                .map(|p| p.chars().count())
                .sum(),
            figures: blocks.iter().map(|b| b.figures.len()).sum(),
        })
        .collect();
    let figures = indexed
        .figures
        .iter()
        .map(|f| FigureSummary {
            figure_id: f.figure_id.clone(),
            url: f.url.clone(),
            caption: f.caption.clone(),
        })
        .collect();

    DocumentSummary {
        title: doc.title.clone(),
        shape: format!("{:?}", doc.shape).to_lowercase(),
        sections,
        figures,
        skipped_figures: indexed.skipped_figures,
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Write `contents` to `path` through a sibling temp file and a rename.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> Result<(), Paper2SlidesError> {
    let write_err = |e: std::io::Error| Paper2SlidesError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Paper2SlidesError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Paper2SlidesError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific, and wrap
/// it as a [`LanguageModel`].
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`)
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **OpenAI key** (`OPENAI_API_KEY`) with the configured or default model
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
pub async fn resolve_model(
    config: &PresentationConfig,
) -> Result<Box<dyn LanguageModel>, Paper2SlidesError> {
    let model_name = config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string());

    // 1) User-provided provider takes priority
    if let Some(ref provider) = config.provider {
        return Ok(Box::new(ProviderModel::new(Arc::clone(provider), model_name)));
    }

    // 2) Provider name + model
    if let Some(ref name) = config.provider_name {
        let provider = create_provider(name, &model_name)?;
        return Ok(Box::new(ProviderModel::new(provider, model_name)));
    }

    // 3) Honour EDGEQUAKE_LLM_PROVIDER + EDGEQUAKE_MODEL when both set
    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_provider(&prov, &model)?;
            return Ok(Box::new(ProviderModel::new(provider, model)));
        }
    }

    // 4) Prefer OpenAI when its key is present, even if other keys are too.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let provider = create_provider("openai", &model_name)?;
            return Ok(Box::new(ProviderModel::new(provider, model_name)));
        }
    }

    // 5) Whatever the environment offers
    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Paper2SlidesError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Box::new(ProviderModel::new(llm_provider, "auto")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summarize_reports_sections_and_figures() {
        let doc = Document::from_value(&json!({
            "title": "T",
            "sections": {
                "method": [{
                    "paragraphs": ["abc", "de"],
                    "figures": [
                        {"figure_id": "S3.F1", "absolute_url": "https://x/1.png", "caption": "c"},
                        {"caption": "no id"}
                    ]
                }]
            }
        }))
        .unwrap();
        let s = summarize(&doc);
        assert_eq!(s.shape, "nested");
        assert_eq!(s.sections[0].name, "method");
        assert_eq!(s.sections[0].chars, 5);
        assert_eq!(s.sections[0].figures, 2);
        assert_eq!(s.figures.len(), 1);
        assert_eq!(s.skipped_figures, 1);
    }

    #[tokio::test]
    async fn inspect_reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.json");
        std::fs::write(&path, r#"{"title": "T", "sections": {"abstract": "Hello."}}"#).unwrap();
        let s = inspect(path.to_string_lossy(), 5).await.unwrap();
        assert_eq!(s.title.as_deref(), Some("T"));
        assert_eq!(s.sections.len(), 1);
    }

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/deck.md");
        write_atomic(&path, "---\nmarp: true\n---\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "---\nmarp: true\n---\n");
        assert!(!path.with_extension("md.tmp").exists());
    }
}
