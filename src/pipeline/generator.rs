//! Phase 2: one model conversation per outline entry, validated and retried.
//!
//! ## Attempt state machine
//!
//! ```text
//! Attempt(1) ──valid──▶ Succeeded
//!     │ invalid / malformed / timeout / transport
//!     ▼
//! Attempt(2) … Attempt(max_retries + 1) ──still failing──▶ Failed(last error)
//! ```
//!
//! * Attempts after the first carry the previous attempt's validation or
//!   parse error as feedback.
//! * Timeouts and transport errors back off `retry_backoff_ms * 2^(k-1)`
//!   (k = consecutive transport failures) before the next attempt.
//!   Validation failures retry immediately.
//!
//! ## Concurrency
//!
//! [`generate_all`] turns every entry into a future and polls at most
//! `concurrency` of them at a time with `buffer_unordered`. Entries are
//! admitted in plan order; results are re-sorted by plan position, so
//! completion order never shows in the output. Nothing is spawned: dropping
//! the returned future cancels every in-flight call.

use crate::config::PresentationConfig;
use crate::error::SlideError;
use crate::output::{GenerationResult, SlideResult};
use crate::pipeline::index::{IndexedDocument, IndexedFigure};
use crate::pipeline::llm::{parse_json_object, LanguageModel, ModelRequest, ModelTask, TokenUsage};
use crate::pipeline::planner::{PresentationPlan, SlideOutline};
use crate::pipeline::resolver::figure_ids_in;
use crate::prompts::{generation_system_prompt, slide_prompt, with_feedback};
use crate::schema::{foreign_figure_refs, validate};
use crate::slide::{Slide, SlideType};
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Read-only inputs shared by every generation future of a run.
#[derive(Clone, Copy)]
pub struct GenerationContext<'a> {
    pub doc: &'a IndexedDocument,
    pub config: &'a PresentationConfig,
    /// Outline length, reported to progress callbacks.
    pub total_slides: usize,
}

/// Generate one slide, retrying up to `max_retries` times.
///
/// Never returns an error: failures end up in [`SlideResult::result`].
pub async fn generate_slide(
    model: &dyn LanguageModel,
    outline: &SlideOutline,
    ctx: &GenerationContext<'_>,
) -> SlideResult {
    let start = Instant::now();
    let config = ctx.config;
    let slide_number = outline.slide_number;
    let slide_type = outline.slide_type;
    let max_attempts = config.max_retries + 1;
    let callback = config.progress_callback.as_ref();

    if let Some(cb) = callback {
        cb.on_slide_start(slide_number, ctx.total_slides);
    }

    let candidates = candidate_figures(outline, ctx.doc, config.max_prompt_figures);
    let candidate_ids: Vec<String> = candidates.iter().map(|f| f.figure_id.clone()).collect();
    let system = generation_system_prompt(slide_type, config.language);
    let base_prompt = slide_prompt(outline, ctx.doc, &candidates, config.language);

    let mut usage = TokenUsage::default();
    let mut feedback = String::new();
    let mut transport_streak: u32 = 0;
    let mut last_error: Option<SlideError> = None;

    for attempt in 1..=max_attempts {
        if let Some(prev) = &last_error {
            if let Some(cb) = callback {
                cb.on_slide_retry(slide_number, attempt, &prev.to_string());
            }
            if prev.is_transient() {
                let backoff = backoff_ms(config.retry_backoff_ms, transport_streak);
                debug!("Slide {}: backing off {}ms", slide_number, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }
        }

        let user = if feedback.is_empty() {
            base_prompt.clone()
        } else {
            with_feedback(&base_prompt, &feedback)
        };
        let request = ModelRequest {
            system: system.clone(),
            user,
            temperature: config.generation_temperature,
            max_tokens: config.max_tokens,
            task: ModelTask::Slide {
                slide_number,
                slide_type,
                attempt,
            },
        };

        let outcome = match timeout(
            Duration::from_secs(config.api_timeout_secs),
            model.complete(&request),
        )
        .await
        {
            Err(_) => Err(SlideError::GenerationTimeout {
                slide: slide_number,
                secs: config.api_timeout_secs,
            }),
            Ok(Err(e)) => Err(SlideError::GenerationTransportError {
                slide: slide_number,
                detail: e.to_string(),
            }),
            Ok(Ok(response)) => {
                usage += response.usage;
                interpret_reply(&response.content, slide_type, slide_number)
            }
        };

        match outcome {
            Ok(slide) => {
                let foreign = foreign_figure_refs(&slide, &candidate_ids);
                if !foreign.is_empty() {
                    warn!(
                        "Slide {}: references figures not offered to it: {}",
                        slide_number,
                        foreign.join(", ")
                    );
                }
                if attempt > 1 {
                    info!("Slide {} [{}] generated (attempt {})", slide_number, slide_type, attempt);
                } else {
                    info!("Slide {} [{}] generated", slide_number, slide_type);
                }
                if let Some(cb) = callback {
                    cb.on_slide_complete(slide_number, ctx.total_slides);
                }
                return SlideResult {
                    slide_number,
                    slide_type,
                    result: GenerationResult::Succeeded(slide),
                    attempts: attempt,
                    usage,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
            Err(e) => {
                if e.is_transient() {
                    transport_streak += 1;
                } else {
                    transport_streak = 0;
                    feedback = e.feedback();
                }
                if attempt < max_attempts {
                    warn!(
                        "Slide {} attempt {}/{} failed: {}",
                        slide_number, attempt, max_attempts, e
                    );
                }
                last_error = Some(e);
            }
        }
    }

    let error = last_error.unwrap_or_else(|| SlideError::GenerationTransportError {
        slide: slide_number,
        detail: "no attempt was made".to_string(),
    });
    warn!(
        "Slide {} [{}] dropped after {} attempts: {}",
        slide_number, slide_type, max_attempts, error
    );
    if let Some(cb) = callback {
        cb.on_slide_dropped(slide_number, ctx.total_slides, &error.to_string());
    }
    SlideResult {
        slide_number,
        slide_type,
        result: GenerationResult::Failed(error),
        attempts: max_attempts,
        usage,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Generate every outline entry with bounded concurrency.
///
/// The returned vector has one entry per outline entry, in plan order.
pub async fn generate_all(
    model: &dyn LanguageModel,
    plan: &PresentationPlan,
    ctx: &GenerationContext<'_>,
) -> Vec<SlideResult> {
    let total = plan.slides.len();
    let limit = ctx.config.concurrency.unwrap_or(total).max(1);
    info!("Generating {} slides ({} at a time)", total, limit);

    let mut results: Vec<(usize, SlideResult)> =
        stream::iter(plan.slides.iter().enumerate().map(|(idx, outline)| async move {
            (idx, generate_slide(model, outline, ctx).await)
        }))
        .buffer_unordered(limit)
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);
    results.into_iter().map(|(_, r)| r).collect()
}

/// Parse, unwrap and validate one reply.
fn interpret_reply(
    reply: &str,
    slide_type: SlideType,
    slide_number: usize,
) -> Result<Slide, SlideError> {
    let value = parse_json_object(reply).map_err(|detail| SlideError::MalformedResponse {
        slide: slide_number,
        detail,
    })?;
    let content = unwrap_envelope(value);
    validate(slide_type, &content).map_err(|e| SlideError::ValidationFailed {
        slide: slide_number,
        detail: e.to_string(),
    })
}

/// Accept `{"type": ..., "content": {...}}` as well as a bare content object.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut obj)
            if obj.get("content").is_some_and(Value::is_object)
                && obj.get("type").is_some_and(Value::is_string) =>
        {
            obj.remove("content").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Figures offered to one entry.
///
/// Indexed identifiers named in `figure_ids`, or mentioned in the purpose or
/// key points, in that order. Image layouts with no such identifier fall
/// back to the first `max` figures of the paper.
fn candidate_figures<'d>(
    outline: &SlideOutline,
    doc: &'d IndexedDocument,
    max: usize,
) -> Vec<&'d IndexedFigure> {
    let mentioned = outline
        .figure_ids
        .iter()
        .map(|s| s.trim())
        .chain(figure_ids_in(&outline.purpose))
        .chain(outline.key_points.iter().flat_map(|k| figure_ids_in(k)));

    let mut out: Vec<&IndexedFigure> = Vec::new();
    for id in mentioned {
        if let Some(fig) = doc.figures.get(id) {
            if !out.iter().any(|f| f.figure_id == fig.figure_id) {
                out.push(fig);
            }
        } else {
            debug!("Slide {}: planned figure '{}' is not in the paper", outline.slide_number, id);
        }
    }

    if out.is_empty() && outline.slide_type.has_figures() {
        out.extend(doc.figures.iter().take(max));
    }
    out
}

fn backoff_ms(base: u64, transport_streak: u32) -> u64 {
    let exp = transport_streak.saturating_sub(1).min(16);
    base.saturating_mul(1u64 << exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionLimits;
    use crate::document::Document;
    use crate::pipeline::index::build_index;
    use serde_json::json;

    fn doc() -> IndexedDocument {
        let d = Document::from_value(&json!({
            "method": [{"figures": [
                {"figure_id": "S3.F1", "absolute_url": "https://x/1.png", "caption": "a"},
                {"figure_id": "S3.F2", "absolute_url": "https://x/2.png", "caption": "b"},
                {"figure_id": "S3.F3", "absolute_url": "https://x/3.png", "caption": "c"}
            ]}]
        }))
        .unwrap();
        build_index(&d, &SectionLimits::default())
    }

    fn outline(t: SlideType, figure_ids: &[&str], key_points: &[&str]) -> SlideOutline {
        SlideOutline {
            slide_number: 1,
            slide_type: t,
            purpose: "p".into(),
            key_points: key_points.iter().map(|s| s.to_string()).collect(),
            figure_ids: figure_ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn ids(figs: &[&IndexedFigure]) -> Vec<String> {
        figs.iter().map(|f| f.figure_id.clone()).collect()
    }

    #[test]
    fn candidates_from_plan_and_key_points() {
        let d = doc();
        let o = outline(
            SlideType::ImageWithDescription2,
            &["S3.F2", "S9.F9"],
            &["Use Figure S3.F3 here", "and S3.F2 again"],
        );
        assert_eq!(ids(&candidate_figures(&o, &d, 5)), vec!["S3.F2", "S3.F3"]);
    }

    #[test]
    fn image_layout_falls_back_to_first_figures() {
        let d = doc();
        let o = outline(SlideType::SingleContentWithImage, &[], &[]);
        assert_eq!(ids(&candidate_figures(&o, &d, 2)), vec!["S3.F1", "S3.F2"]);
    }

    #[test]
    fn text_layout_gets_no_fallback() {
        let d = doc();
        let o = outline(SlideType::Highlight, &[], &["no figures"]);
        assert!(candidate_figures(&o, &d, 5).is_empty());
    }

    #[test]
    fn backoff_doubles() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 3), 2000);
        assert_eq!(backoff_ms(0, 3), 0);
    }

    #[test]
    fn envelope_is_unwrapped() {
        let v = unwrap_envelope(json!({"type": "quote", "content": {"quote": "q", "author": "a"}}));
        assert_eq!(v, json!({"quote": "q", "author": "a"}));
        let bare = json!({"quote": "q", "author": "a"});
        assert_eq!(unwrap_envelope(bare.clone()), bare);
    }

    #[test]
    fn interpret_reply_classifies_errors() {
        assert!(matches!(
            interpret_reply("not json", SlideType::Quote, 3),
            Err(SlideError::MalformedResponse { slide: 3, .. })
        ));
        match interpret_reply(r#"{"quote": "q"}"#, SlideType::Quote, 3) {
            Err(SlideError::ValidationFailed { slide: 3, detail }) => {
                assert!(detail.contains("author: field required"), "got: {detail}")
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(interpret_reply(
            "```json\n{\"quote\": \"q\", \"author\": \"a\"}\n```",
            SlideType::Quote,
            3
        )
        .is_ok());
    }
}
