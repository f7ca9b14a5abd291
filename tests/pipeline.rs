//! Integration tests for the full pipeline against a scripted model.
//!
//! No network: every model reply comes from a closure keyed on the request's
//! [`ModelTask`], so retries, failures and ordering are deterministic.

use paper2slides::{
    build_presentation, convert_to_file, convert_with_model, plan_with_model, Document,
    GenerationProgressCallback, Language, LanguageModel, ModelError, ModelRequest, ModelResponse,
    ModelTask, Paper2SlidesError, PresentationConfig, ResolveWarning, Slide, SlideError,
    SlideType, TokenUsage,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Scripted model ───────────────────────────────────────────────────────────

type Responder = dyn Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync;
type Delay = dyn Fn(&ModelTask) -> u64 + Send + Sync;

struct ScriptedModel {
    respond: Box<Responder>,
    delay_ms: Box<Delay>,
    requests: Mutex<Vec<ModelRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    fn new(respond: impl Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            delay_ms: Box::new(|_| 0),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: impl Fn(&ModelTask) -> u64 + Send + Sync + 'static) -> Self {
        self.delay_ms = Box::new(delay);
        self
    }

    fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Slide-generation requests for one outline entry, in call order.
    fn slide_requests(&self, n: usize) -> Vec<ModelRequest> {
        self.requests()
            .into_iter()
            .filter(|r| matches!(r.task, ModelTask::Slide { slide_number, .. } if slide_number == n))
            .collect()
    }

    fn planning_request(&self) -> ModelRequest {
        self.requests()
            .into_iter()
            .find(|r| r.task == ModelTask::Planning)
            .expect("no planning request was made")
    }
}

#[async_trait::async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelError> {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = (self.delay_ms)(&request.task);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let reply = (self.respond)(request);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply.map(|content| ModelResponse {
            content,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 20,
            },
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

const ARCH_URL: &str = "https://arxiv.org/html/1706.03762v7/x1.png";
const ATTN_URL: &str = "https://arxiv.org/html/1706.03762v7/x2.png";

fn sections() -> Value {
    json!({
        "abstract": [{
            "paragraphs": ["The dominant sequence transduction models are based on complex recurrent networks. We propose the Transformer, based solely on attention."]
        }],
        "method": [{
            "header_id": "3 Model Architecture",
            "paragraphs": ["The Transformer follows an encoder-decoder structure using stacked self-attention (see Figure S3.F1)."],
            "figures": [
                {"figure_id": "S3.F1", "absolute_url": ARCH_URL, "caption": "The Transformer - model architecture."},
                {"figure_id": "S3.F2", "absolute_url": ATTN_URL, "caption": "Scaled Dot-Product Attention."}
            ]
        }],
        "performance": [{
            "paragraphs": ["28.4 BLEU on WMT 2014 English-to-German, 41.8 BLEU on English-to-French, trained in 3.5 days on eight GPUs."]
        }],
        "conclusion": [{
            "paragraphs": ["We presented the Transformer, the first sequence transduction model based entirely on attention."]
        }]
    })
}

fn nested_paper() -> Document {
    Document::from_value(&json!({
        "title": "Attention Is All You Need",
        "sections": sections()
    }))
    .unwrap()
}

fn flat_paper() -> Document {
    let mut root = sections();
    root["title"] = json!("Attention Is All You Need");
    Document::from_value(&root).unwrap()
}

fn plan_reply() -> String {
    json!({
        "title": "Attention Is All You Need",
        "slides": [
            {"slide_number": 1, "type": "title_slide", "purpose": "Introduce the paper",
             "key_points": ["Title", "Authors"], "figure_ids": []},
            {"slide_number": 2, "type": "single_content_with_image", "purpose": "Show the architecture",
             "key_points": ["Encoder-decoder", "Self-attention"], "figure_ids": ["S3.F1"]},
            {"slide_number": 3, "type": "metrics_grid", "purpose": "Report results",
             "key_points": ["28.4 BLEU", "41.8 BLEU"], "figure_ids": []},
            {"slide_number": 4, "type": "quote", "purpose": "Takeaway",
             "key_points": ["Attention is all you need"], "figure_ids": []}
        ]
    })
    .to_string()
}

fn metrics(n: usize) -> Value {
    Value::Array(
        (0..n)
            .map(|i| json!({"value": format!("{}", 28 + i), "label": format!("metric {i}")}))
            .collect(),
    )
}

/// A valid reply for each layout used by [`plan_reply`].
fn valid_slide(slide_type: SlideType) -> String {
    let content = match slide_type {
        SlideType::TitleSlide => json!({"title": "Attention Is All You Need", "subtitle": "Vaswani et al., 2017"}),
        SlideType::SingleContentWithImage => json!({
            "title": "Architecture",
            "description": "Stacked encoder and decoder built from attention.",
            "image_url": "S3.F1",
            "image_alt": "Transformer architecture"
        }),
        SlideType::MetricsGrid => json!({
            "title": "Results",
            "description": "Translation quality and cost",
            "metrics": metrics(4)
        }),
        SlideType::Quote => json!({"quote": "Attention is all you need", "author": "Vaswani et al."}),
        other => panic!("no fixture for {other}"),
    };
    content.to_string()
}

fn slide_type_of(task: &ModelTask) -> Option<(usize, SlideType, u32)> {
    match *task {
        ModelTask::Slide {
            slide_number,
            slide_type,
            attempt,
        } => Some((slide_number, slide_type, attempt)),
        ModelTask::Planning => None,
    }
}

fn config() -> PresentationConfig {
    PresentationConfig::builder()
        .language(Language::English)
        .max_slides(10)
        .max_retries(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap()
}

/// Every call answered well.
fn happy_model() -> ScriptedModel {
    ScriptedModel::new(|req| match slide_type_of(&req.task) {
        None => Ok(plan_reply()),
        Some((_, t, _)) => Ok(valid_slide(t)),
    })
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn happy_path_resolves_figures_and_renders_in_plan_order() {
    let model = happy_model();
    let out = convert_with_model(&nested_paper(), &model, &config())
        .await
        .unwrap();
    let p = &out.presentation;

    assert_eq!(p.stats.planned_slides, 4);
    assert_eq!(p.stats.generated_slides, 4);
    assert_eq!(p.stats.dropped_slides, 0);
    assert_eq!(p.stats.total_attempts, 4);
    assert_eq!(p.stats.indexed_figures, 2);
    // 1 planning call + 4 slide calls
    assert_eq!(p.stats.total_input_tokens, 500);
    assert_eq!(p.stats.total_output_tokens, 100);
    assert!(p.warnings.is_empty());

    let types: Vec<SlideType> = p.slides.iter().map(Slide::slide_type).collect();
    assert_eq!(
        types,
        vec![
            SlideType::TitleSlide,
            SlideType::SingleContentWithImage,
            SlideType::MetricsGrid,
            SlideType::Quote
        ]
    );

    match &p.slides[1] {
        Slide::SingleContentWithImage(c) => assert_eq!(c.image_url, ARCH_URL),
        other => panic!("unexpected slide {other:?}"),
    }

    assert!(out.markdown.starts_with("---\nmarp: true\n"));
    assert!(out.markdown.contains(&format!("]({ARCH_URL})")));
    assert!(!out.markdown.contains("S3.F1"));
}

// ── Validation-driven retry ──────────────────────────────────────────────────

#[tokio::test]
async fn invalid_reply_is_retried_with_validation_feedback() {
    // metrics_grid answers 3 metrics first, then the required 4
    let model = ScriptedModel::new(|req| match slide_type_of(&req.task) {
        None => Ok(plan_reply()),
        Some((_, SlideType::MetricsGrid, 1)) => Ok(json!({
            "title": "Results",
            "description": "Translation quality and cost",
            "metrics": metrics(3)
        })
        .to_string()),
        Some((_, t, _)) => Ok(valid_slide(t)),
    });

    let out = convert_with_model(&nested_paper(), &model, &config())
        .await
        .unwrap();
    let p = &out.presentation;

    assert_eq!(p.stats.generated_slides, 4);
    assert_eq!(p.stats.total_attempts, 5);
    assert_eq!(p.results[2].attempts, 2);

    let attempts = model.slide_requests(3);
    assert_eq!(attempts.len(), 2);
    assert!(!attempts[0].user.contains("VALIDATION FEEDBACK"));
    assert!(attempts[1].user.contains("VALIDATION FEEDBACK FROM PREVIOUS ATTEMPT"));
    assert!(attempts[1].user.contains("expected exactly 4 items, got 3"));
}

#[tokio::test]
async fn attempts_never_exceed_max_retries_plus_one() {
    let model = ScriptedModel::new(|req| match slide_type_of(&req.task) {
        None => Ok(plan_reply()),
        Some((_, SlideType::Quote, _)) => Ok("I'm sorry, I can't produce JSON today.".to_string()),
        Some((_, t, _)) => Ok(valid_slide(t)),
    });
    let cfg = PresentationConfig::builder()
        .max_retries(3)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let out = convert_with_model(&nested_paper(), &model, &cfg).await.unwrap();
    let p = &out.presentation;

    assert_eq!(model.slide_requests(4).len(), 4);
    assert_eq!(p.results[3].attempts, 4);
    assert!(!p.results[3].is_success());
    assert_eq!(p.stats.dropped_slides, 1);

    let dropped: Vec<usize> = p.dropped().map(|(n, _)| n).collect();
    assert_eq!(dropped, vec![4]);
    // the remaining slides keep their relative order
    assert_eq!(p.slides.len(), 3);
    assert_eq!(p.slides[2].slide_type(), SlideType::MetricsGrid);
}

#[tokio::test]
async fn transport_errors_are_retried() {
    let model = ScriptedModel::new(|req| match slide_type_of(&req.task) {
        None => Ok(plan_reply()),
        Some((1, _, 1)) => Err(ModelError::Transport("HTTP 503".to_string())),
        Some((_, t, _)) => Ok(valid_slide(t)),
    });

    let out = convert_with_model(&nested_paper(), &model, &config())
        .await
        .unwrap();
    assert_eq!(out.presentation.results[0].attempts, 2);
    assert_eq!(out.presentation.stats.dropped_slides, 0);
    // transport failures carry no feedback
    let attempts = model.slide_requests(1);
    assert!(!attempts[1].user.contains("VALIDATION FEEDBACK"));
}

#[tokio::test]
async fn slow_slide_calls_time_out_and_consume_attempts() {
    // slide 1 never answers in time; the others answer at once
    let model = happy_model().with_delay(|task| match slide_type_of(task) {
        Some((1, _, _)) => 2_000,
        _ => 0,
    });
    let cfg = PresentationConfig::builder()
        .language(Language::English)
        .api_timeout_secs(1)
        .max_retries(1)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let out = convert_with_model(&nested_paper(), &model, &cfg).await.unwrap();
    let p = &out.presentation;

    assert_eq!(model.slide_requests(1).len(), 2);
    assert_eq!(p.results[0].attempts, 2);
    assert!(matches!(
        p.results[0].error(),
        Some(SlideError::GenerationTimeout { slide: 1, secs: 1 })
    ));
    // timeouts carry no validation feedback into the retry
    assert!(!model.slide_requests(1)[1].user.contains("VALIDATION FEEDBACK"));
    assert_eq!(p.stats.dropped_slides, 1);
    assert_eq!(p.slides.len(), 3);
}

#[tokio::test]
async fn every_entry_failing_is_an_empty_result() {
    let model = ScriptedModel::new(|req| match slide_type_of(&req.task) {
        None => Ok(plan_reply()),
        Some(_) => Ok(json!({"headline": "no layout has this field"}).to_string()),
    });

    let err = build_presentation(&nested_paper(), &model, &config())
        .await
        .unwrap_err();
    match err {
        Paper2SlidesError::EmptyResult { planned, first_error } => {
            assert_eq!(planned, 4);
            assert!(first_error.contains("Slide 1"), "{first_error}");
        }
        other => panic!("expected EmptyResult, got {other:?}"),
    }
    for n in 1..=4 {
        assert_eq!(model.slide_requests(n).len(), 3, "slide {n}");
    }
}

// ── Concurrency ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn output_order_ignores_completion_order() {
    // later entries answer first
    let model = happy_model().with_delay(|task| match slide_type_of(task) {
        Some((n, _, _)) => 100 - 20 * n as u64,
        None => 0,
    });
    let cfg = PresentationConfig::builder()
        .concurrency(Some(4))
        .build()
        .unwrap();

    let out = convert_with_model(&nested_paper(), &model, &cfg).await.unwrap();
    let numbers: Vec<usize> = out
        .presentation
        .results
        .iter()
        .map(|r| r.slide_number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(out.presentation.slides[0].slide_type(), SlideType::TitleSlide);
    assert_eq!(out.presentation.slides[3].slide_type(), SlideType::Quote);
}

#[tokio::test]
async fn concurrency_limit_is_respected() {
    let model = happy_model().with_delay(|task| if slide_type_of(task).is_some() { 30 } else { 0 });
    let cfg = PresentationConfig::builder()
        .concurrency(Some(2))
        .build()
        .unwrap();

    convert_with_model(&nested_paper(), &model, &cfg).await.unwrap();
    let peak = model.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak in-flight was {peak}");
    assert!(peak >= 1);
}

#[tokio::test]
async fn unbounded_concurrency_runs_every_entry_at_once() {
    let model = happy_model().with_delay(|task| if slide_type_of(task).is_some() { 50 } else { 0 });
    let cfg = PresentationConfig::builder().concurrency(None).build().unwrap();

    convert_with_model(&nested_paper(), &model, &cfg).await.unwrap();
    assert_eq!(model.max_in_flight.load(Ordering::SeqCst), 4);
}

// ── Figure handling ──────────────────────────────────────────────────────────

#[tokio::test]
async fn prompts_never_contain_image_urls() {
    let model = happy_model();
    convert_with_model(&nested_paper(), &model, &config())
        .await
        .unwrap();

    let planning = model.planning_request();
    assert!(planning.user.contains("S3.F1"));
    assert!(planning.user.contains("The Transformer - model architecture."));

    for req in model.requests() {
        assert!(!req.user.contains("https://"), "URL leaked into {}", req.task);
        assert!(!req.system.contains("https://"), "URL leaked into {}", req.task);
    }
}

#[tokio::test]
async fn unknown_figure_id_is_cleared_and_reported() {
    let model = ScriptedModel::new(|req| match slide_type_of(&req.task) {
        None => Ok(plan_reply()),
        Some((_, SlideType::SingleContentWithImage, _)) => Ok(json!({
            "title": "Architecture",
            "description": "As shown in Figure S9.F9, attention replaces recurrence.",
            "image_url": "S9.F9",
            "image_alt": "Transformer architecture"
        })
        .to_string()),
        Some((_, t, _)) => Ok(valid_slide(t)),
    });

    let out = convert_with_model(&nested_paper(), &model, &config())
        .await
        .unwrap();
    let p = &out.presentation;

    assert_eq!(
        p.warnings,
        vec![ResolveWarning::FigureUnresolved {
            slide: 2,
            field: "image_url".to_string(),
            figure_id: "S9.F9".to_string(),
        }]
    );
    assert_eq!(p.stats.unresolved_figures, 1);
    match &p.slides[1] {
        Slide::SingleContentWithImage(c) => {
            assert!(c.image_url.is_empty());
            assert!(c.description.contains("(see figure)"));
        }
        other => panic!("unexpected slide {other:?}"),
    }
    assert!(!out.markdown.contains("S9.F9"));
}

// ── Input shapes ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn flat_and_nested_papers_are_equivalent() {
    let nested_model = happy_model();
    let flat_model = happy_model();

    let nested = convert_with_model(&nested_paper(), &nested_model, &config())
        .await
        .unwrap();
    let flat = convert_with_model(&flat_paper(), &flat_model, &config())
        .await
        .unwrap();

    assert_eq!(nested.markdown, flat.markdown);
    assert_eq!(
        nested_model.planning_request().user,
        flat_model.planning_request().user
    );
}

// ── Planning failures ────────────────────────────────────────────────────────

async fn planning_error(reply: Result<String, ModelError>) -> Paper2SlidesError {
    let reply = Arc::new(reply);
    let model = ScriptedModel::new(move |req| match slide_type_of(&req.task) {
        None => (*reply).clone(),
        Some((_, t, _)) => Ok(valid_slide(t)),
    });
    let err = plan_with_model(&nested_paper(), &model, &config())
        .await
        .unwrap_err();
    assert!(model.slide_requests(1).is_empty());
    err
}

#[tokio::test]
async fn planning_failures_are_fatal() {
    let cases = vec![
        Ok("here is your plan!".to_string()),
        Ok(json!({"title": "T", "slides": []}).to_string()),
        Ok(json!({"title": "T", "slides": [{"type": "carousel", "purpose": "p", "key_points": []}]}).to_string()),
        Err(ModelError::Transport("connection reset".to_string())),
        Err(ModelError::EmptyResponse),
    ];
    for reply in cases {
        let err = planning_error(reply.clone()).await;
        assert!(
            matches!(err, Paper2SlidesError::PlanningFailed { .. }),
            "{reply:?} gave {err:?}"
        );
    }
}

#[tokio::test]
async fn oversized_plan_is_truncated_to_max_slides() {
    let model = happy_model();
    let cfg = PresentationConfig::builder().max_slides(2).build().unwrap();
    let plan = plan_with_model(&nested_paper(), &model, &cfg).await.unwrap();
    assert_eq!(plan.slides.len(), 2);
    assert_eq!(plan.slides[1].slide_number, 2);
    assert_eq!(plan.slides[1].figure_ids, vec!["S3.F1".to_string()]);
    assert!(model.planning_request().user.contains("at most 2 slides"));
}

#[tokio::test]
async fn planning_timeout_is_fatal() {
    let model = happy_model().with_delay(|task| if *task == ModelTask::Planning { 2_000 } else { 0 });
    let cfg = PresentationConfig::builder()
        .api_timeout_secs(1)
        .build()
        .unwrap();
    let err = build_presentation(&nested_paper(), &model, &cfg)
        .await
        .unwrap_err();
    match err {
        Paper2SlidesError::PlanningFailed { reason } => assert!(reason.contains("timed out"), "{reason}"),
        other => panic!("expected PlanningFailed, got {other:?}"),
    }
}

// ── Progress reporting ───────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    per_slide: Mutex<HashMap<usize, Vec<&'static str>>>,
}

impl Recorder {
    fn mark(&self, slide: usize, what: &'static str) {
        self.per_slide.lock().unwrap().entry(slide).or_default().push(what);
    }
}

impl GenerationProgressCallback for Recorder {
    fn on_plan_ready(&self, total_slides: usize, title: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("plan {total_slides} {title}"));
    }
    fn on_slide_start(&self, slide_num: usize, _total: usize) {
        self.mark(slide_num, "start");
    }
    fn on_slide_retry(&self, slide_num: usize, _attempt: u32, _error: &str) {
        self.mark(slide_num, "retry");
    }
    fn on_slide_complete(&self, slide_num: usize, _total: usize) {
        self.mark(slide_num, "complete");
    }
    fn on_slide_dropped(&self, slide_num: usize, _total: usize, _error: &str) {
        self.mark(slide_num, "dropped");
    }
    fn on_run_complete(&self, total_slides: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total_slides}"));
    }
}

#[tokio::test]
async fn progress_callbacks_follow_each_entry() {
    let model = ScriptedModel::new(|req| match slide_type_of(&req.task) {
        None => Ok(plan_reply()),
        Some((_, SlideType::Quote, _)) => Ok("{}".to_string()),
        Some((_, SlideType::MetricsGrid, 1)) => Ok("{not json".to_string()),
        Some((_, t, _)) => Ok(valid_slide(t)),
    });
    let recorder = Arc::new(Recorder::default());
    let cfg = PresentationConfig::builder()
        .max_retries(1)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    convert_with_model(&nested_paper(), &model, &cfg).await.unwrap();

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec!["plan 4 Attention Is All You Need".to_string(), "done 3/4".to_string()]
    );
    let per_slide = recorder.per_slide.lock().unwrap();
    assert_eq!(per_slide[&1], vec!["start", "complete"]);
    assert_eq!(per_slide[&3], vec!["start", "retry", "complete"]);
    assert_eq!(per_slide[&4], vec!["start", "retry", "dropped"]);
}

// ── File output ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_conversion_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out_path = dir.path().join("slides.md");

    let err = convert_to_file("/definitely/not/here.json", &out_path, &config())
        .await
        .unwrap_err();
    assert!(matches!(err, Paper2SlidesError::FileNotFound { .. }));
    assert!(!out_path.exists());
}

#[test]
fn callback_types_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Recorder>();
    assert_send_sync::<ScriptedModel>();
}
