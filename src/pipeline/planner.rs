//! Phase 1: one model call that turns the paper into an outline.
//!
//! The planner sees section texts and figure identifier + caption pairs, never
//! figure URLs. It makes exactly one request; every failure mode (timeout,
//! transport, malformed JSON, unknown slide type, empty outline) collapses
//! into [`Paper2SlidesError::PlanningFailed`].

use crate::config::PresentationConfig;
use crate::error::Paper2SlidesError;
use crate::pipeline::index::IndexedDocument;
use crate::pipeline::llm::{parse_json_object, LanguageModel, ModelRequest, ModelTask, TokenUsage};
use crate::prompts::{planning_prompt, PLANNER_SYSTEM_PROMPT};
use crate::slide::SlideType;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// One planned slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideOutline {
    /// 1-based position in the plan. Reassigned after parsing, so whatever
    /// the model wrote here is ignored.
    #[serde(default, skip_deserializing)]
    pub slide_number: usize,

    #[serde(rename = "type", alias = "slide_type")]
    pub slide_type: SlideType,

    pub purpose: String,

    #[serde(deserialize_with = "lines_or_list")]
    pub key_points: Vec<String>,

    /// Candidate figure identifiers. May name figures that do not exist.
    #[serde(default, deserialize_with = "ids_or_list")]
    pub figure_ids: Vec<String>,
}

/// The outline produced by phase 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationPlan {
    #[serde(default)]
    pub title: String,
    pub slides: Vec<SlideOutline>,
    /// Tokens spent on the planning call.
    #[serde(skip)]
    pub usage: TokenUsage,
    #[serde(skip)]
    pub duration_ms: u64,
}

/// Run the planning call and return a validated outline.
pub async fn plan_presentation(
    model: &dyn LanguageModel,
    doc: &IndexedDocument,
    config: &PresentationConfig,
) -> Result<PresentationPlan, Paper2SlidesError> {
    let start = Instant::now();
    info!(
        "Planning up to {} slides in {} with {}",
        config.max_slides,
        config.language.native_name(),
        model.model_name()
    );

    let request = ModelRequest {
        system: PLANNER_SYSTEM_PROMPT.to_string(),
        user: planning_prompt(
            doc,
            config.max_slides,
            config.language,
            config.max_prompt_figures,
        ),
        temperature: config.planning_temperature,
        max_tokens: config.max_tokens,
        task: ModelTask::Planning,
    };

    let fail = |reason: String| {
        error!("Planning failed: {}", reason);
        Paper2SlidesError::PlanningFailed { reason }
    };

    let response = match timeout(
        Duration::from_secs(config.api_timeout_secs),
        model.complete(&request),
    )
    .await
    {
        Err(_) => {
            return Err(fail(format!(
                "LLM call timed out after {}s",
                config.api_timeout_secs
            )))
        }
        Ok(Err(e)) => return Err(fail(format!("LLM call failed: {e}"))),
        Ok(Ok(r)) => r,
    };

    let value = parse_json_object(&response.content)
        .map_err(|e| fail(format!("response is not valid JSON: {e}")))?;
    let mut plan = parse_plan(value, config.max_slides).map_err(fail)?;

    if plan.title.trim().is_empty() {
        plan.title = doc.title.clone().unwrap_or_default();
    }
    plan.usage = response.usage;
    plan.duration_ms = start.elapsed().as_millis() as u64;

    info!("Planned '{}' with {} slides", plan.title, plan.slides.len());
    for s in &plan.slides {
        debug!("  {}. [{}] {}", s.slide_number, s.slide_type, s.purpose);
    }
    Ok(plan)
}

/// Deserialize, truncate to `max_slides` and renumber.
fn parse_plan(value: Value, max_slides: usize) -> Result<PresentationPlan, String> {
    let mut plan: PresentationPlan =
        serde_json::from_value(value).map_err(|e| format!("outline does not match schema: {e}"))?;

    if plan.slides.is_empty() {
        return Err("outline is empty".to_string());
    }
    if plan.slides.len() > max_slides {
        warn!(
            "Planner returned {} slides; keeping the first {}",
            plan.slides.len(),
            max_slides
        );
        plan.slides.truncate(max_slides);
    }
    for (i, s) in plan.slides.iter_mut().enumerate() {
        s.slide_number = i + 1;
    }
    Ok(plan)
}

/// Accept `"a\nb"` or `["a", "b"]`; blank entries are dropped.
fn lines_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    string_or_list(d, |s| s.lines().map(|l| l.trim().to_string()).collect())
}

/// Accept `"S3.F1, S3.F2"` or `["S3.F1", "S3.F2"]`.
fn ids_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    string_or_list(d, |s| {
        s.split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect()
    })
}

fn string_or_list<'de, D, F>(d: D, split: F) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
    F: Fn(&str) -> Vec<String>,
{
    let raw = match Value::deserialize(d)? {
        Value::Null => Vec::new(),
        Value::String(s) => split(&s),
        Value::Array(items) => items
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(<D::Error as de::Error>::custom(format!(
                    "expected a list of strings, found {other}"
                ))),
            })
            .collect::<Result<Vec<String>, D::Error>>()?,
        other => {
            return Err(<D::Error as de::Error>::custom(format!(
                "expected a string or a list of strings, found {other}"
            )))
        }
    };
    Ok(raw.into_iter().filter(|s| !s.is_empty()).collect())
}
