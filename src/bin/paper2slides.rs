//! CLI binary for paper2slides.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PresentationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use paper2slides::{
    convert, convert_to_file, inspect, plan, render_slides_json_with, GenerationProgressCallback,
    Language, MarpRenderer, PresentationConfig, PresentationOutput, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Cut a message to `max` characters, adding an ellipsis.
fn clip(msg: &str, max: usize) -> String {
    let first_line = msg.lines().next().unwrap_or_default();
    if first_line.chars().count() > max {
        let cut: String = first_line.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        first_line.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while planning, then a bar over the
/// outline entries. Slides finish out of order when generation is concurrent.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-slide wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    retries: AtomicUsize,
}

impl CliProgressCallback {
    /// Starts as a spinner; `on_plan_ready` turns it into a bar.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Planning");
        bar.set_message("Asking the model for an outline…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            retries: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, slide_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&slide_num)
            .map(|t| t.elapsed().as_millis() as f64 / 1000.0)
            .unwrap_or(0.0)
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_plan_ready(&self, total_slides: usize, title: &str) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_slides as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Planned {total_slides} slides for \"{title}\""))
        ));
    }

    fn on_slide_start(&self, slide_num: usize, _total_slides: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(slide_num, Instant::now());
        self.bar.set_message(format!("slide {slide_num}"));
    }

    fn on_slide_retry(&self, slide_num: usize, attempt: u32, error: &str) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Slide {:>3}  retry {}  {}",
            yellow("↻"),
            slide_num,
            attempt,
            dim(&clip(error, 70)),
        ));
    }

    fn on_slide_complete(&self, slide_num: usize, total_slides: usize) {
        let secs = self.elapsed_secs(slide_num);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}",
            green("✓"),
            slide_num,
            total_slides,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_slide_dropped(&self, slide_num: usize, total_slides: usize, error: &str) {
        let secs = self.elapsed_secs(slide_num);
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {}  {}",
            red("✗"),
            slide_num,
            total_slides,
            red(&clip(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_slides: usize, success_count: usize) {
        let failed = total_slides.saturating_sub(success_count);
        self.bar.finish_and_clear();

        let retries = self.retries.load(Ordering::SeqCst);
        let retry_note = if retries > 0 {
            dim(&format!("  ({retries} retries)"))
        } else {
            String::new()
        };

        if failed == 0 {
            eprintln!(
                "{} {} slides generated{}",
                green("✔"),
                bold(&success_count.to_string()),
                retry_note
            );
        } else {
            eprintln!(
                "{} {}/{} slides generated  ({} dropped){}",
                if failed == total_slides {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_slides,
                red(&failed.to_string()),
                retry_note
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Korean deck to stdout
  paper2slides paper.json

  # English deck, at most 8 slides, written to a file
  paper2slides paper.json -l en -s 8 -o slides.md

  # Paper JSON from a URL
  paper2slides https://example.com/papers/attention.json -o attention.md

  # Preview the outline only (one LLM call)
  paper2slides --plan-only paper.json

  # Show sections and indexed figures (no API key needed)
  paper2slides --inspect-only paper.json

  # Full structured result (plan, per-slide results, warnings, stats)
  paper2slides --json paper.json > result.json

  # Re-render a saved result or a [{"type", "content"}] list (no API key needed)
  paper2slides --render-only result.json -o slides.md

LANGUAGES:
  ko (default), en, ja, zh, es, fr, de

SLIDE TYPES:
  title_slide, section_title, single_content_with_image, highlight,
  two_column_list, vertical_list, horizontal_3_column_list,
  two_columns_with_grid, horizontal_4_column_list, image_with_description_2,
  image_with_description_3, three_column_metrics, metrics_grid, quote

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Turn research-paper JSON into Marp slides using an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "paper2slides",
    version,
    about = "Turn research-paper JSON into Marp slides using an LLM",
    long_about = "Turn structured research-paper JSON (local file or URL) into a Marp slide deck. \
A planning call chooses up to N slides and their layouts; one call per slide then fills a \
validated schema, retrying with the validation errors as feedback. Supports OpenAI, Anthropic, \
Google Gemini, Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local paper JSON path or HTTP/HTTPS URL (a slides JSON file with --render-only).
    input: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "PAPER2SLIDES_OUTPUT")]
    output: Option<PathBuf>,

    /// Output language: ko, en, ja, zh, es, fr, de.
    #[arg(short, long, env = "PAPER2SLIDES_LANGUAGE", default_value = "ko",
          value_parser = parse_language)]
    language: Language,

    /// Maximum number of slides to plan (1–50).
    #[arg(short = 's', long = "slides", env = "PAPER2SLIDES_MAX_SLIDES", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..=50))]
    max_slides: u32,

    /// Retries per slide after the first attempt.
    #[arg(long, env = "PAPER2SLIDES_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Concurrent slide generations (0 = all at once).
    #[arg(short, long, env = "PAPER2SLIDES_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Temperature of the planning call.
    #[arg(long, env = "PAPER2SLIDES_PLANNING_TEMPERATURE", default_value_t = 0.5)]
    planning_temperature: f32,

    /// Temperature of each slide-generation call.
    #[arg(long, env = "PAPER2SLIDES_TEMPERATURE", default_value_t = 0.05)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "PAPER2SLIDES_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PAPER2SLIDES_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PAPER2SLIDES_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Marp theme name written to the front matter.
    #[arg(long, env = "PAPER2SLIDES_THEME", default_value = "custom-style")]
    theme: String,

    /// Output structured JSON instead of Markdown.
    #[arg(long, env = "PAPER2SLIDES_JSON")]
    json: bool,

    /// Print the slide outline only, no slide generation.
    #[arg(long, conflicts_with = "inspect_only")]
    plan_only: bool,

    /// Print sections and indexed figures only, no LLM calls.
    #[arg(long)]
    inspect_only: bool,

    /// Validate and render an existing slides JSON file, no LLM calls.
    #[arg(long, conflicts_with_all = ["plan_only", "inspect_only", "json"])]
    render_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAPER2SLIDES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPER2SLIDES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER2SLIDES_QUIET")]
    quiet: bool,
}

fn parse_language(s: &str) -> std::result::Result<Language, String> {
    s.parse::<Language>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("{} {}", red("error:"), one_line(&format!("{err:#}")));
        std::process::exit(1);
    }
}

/// Collapse a multi-line error chain (hints included) onto one line.
fn one_line(msg: &str) -> String {
    msg.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

async fn run(cli: Cli) -> Result<()> {
    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v brings them back.
    let show_progress =
        !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only && !cli.render_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summary = inspect(&cli.input, cli.download_timeout)
            .await
            .context("Failed to inspect paper")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
            );
        } else {
            println!("File:         {}", cli.input);
            if let Some(ref t) = summary.title {
                println!("Title:        {}", t);
            }
            println!("Shape:        {}", summary.shape);
            for s in &summary.sections {
                println!(
                    "Section:      {:<12} {} blocks, {} paragraphs, {} chars, {} figures",
                    s.name, s.blocks, s.paragraphs, s.chars, s.figures
                );
            }
            println!("Figures:      {} indexed, {} skipped", summary.figures.len(), summary.skipped_figures);
            for f in &summary.figures {
                println!("  {:<10} {}", f.figure_id, dim(&clip(&f.caption, 70)));
            }
        }
        return Ok(());
    }

    // ── Render-only mode ─────────────────────────────────────────────────
    if cli.render_only {
        let json = tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("Failed to read '{}'", cli.input))?;
        let markdown = render_slides_json_with(&json, &MarpRenderer::new(&cli.theme))
            .context("Render failed")?;
        write_markdown(&markdown, cli.output.as_ref()).await?;
        if !cli.quiet {
            if let Some(ref path) = cli.output {
                eprintln!("{} Rendered  →  {}", green("✔"), bold(&path.display().to_string()));
            }
        }
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.plan_only {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Plan-only mode ───────────────────────────────────────────────────
    if cli.plan_only {
        let outline = plan(&cli.input, &config).await.context("Planning failed")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&outline).context("Failed to serialize plan")?
            );
        } else {
            println!("{}", bold(&outline.title));
            for entry in &outline.slides {
                println!(
                    "{:>3}. {:<26} {}",
                    entry.slide_number,
                    entry.slide_type.as_str(),
                    entry.purpose
                );
                if !entry.figure_ids.is_empty() {
                    println!("     {}", dim(&format!("figures: {}", entry.figure_ids.join(", "))));
                }
            }
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = if let Some(ref output_path) = cli.output {
        convert_to_file(&cli.input, output_path, &config)
            .await
            .context("Conversion failed")?
    } else {
        let output = convert(&cli.input, &config)
            .await
            .context("Conversion failed")?;

        if cli.json {
            let json = serde_json::to_string_pretty(&output.presentation)
                .context("Failed to serialise output")?;
            println!("{json}");
        } else {
            write_markdown(&output.markdown, None).await?;
        }
        output
    };

    if !cli.quiet {
        print_summary(&output, cli.output.as_ref(), show_progress);
    }

    Ok(())
}

/// Write Markdown to `path`, or to stdout with a trailing newline.
async fn write_markdown(markdown: &str, path: Option<&PathBuf>) -> Result<()> {
    if let Some(path) = path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create '{}'", parent.display()))?;
        }
        return tokio::fs::write(path, markdown)
            .await
            .with_context(|| format!("Failed to write '{}'", path.display()));
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(markdown.as_bytes())
        .context("Failed to write to stdout")?;
    if !markdown.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

/// Dropped slides and unresolved figures, then a one-line total.
fn print_summary(output: &PresentationOutput, path: Option<&PathBuf>, show_progress: bool) {
    let p = &output.presentation;
    let stats = &p.stats;

    for (slide_num, err) in p.dropped() {
        eprintln!("  {} slide {} dropped: {}", red("✗"), slide_num, clip(&err.to_string(), 100));
    }
    for w in &p.warnings {
        eprintln!("  {} {}", yellow("!"), w);
    }

    if !show_progress {
        eprintln!(
            "Generated {}/{} slides in {}ms",
            stats.generated_slides, stats.planned_slides, stats.total_duration_ms
        );
    }
    let target = path
        .map(|p| format!("  →  {}", bold(&p.display().to_string())))
        .unwrap_or_default();
    eprintln!(
        "   {} tokens in  /  {} tokens out  —  {}ms total{}",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        stats.total_duration_ms,
        target,
    );
}

/// Map CLI args to `PresentationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PresentationConfig> {
    let concurrency = (cli.concurrency > 0).then_some(cli.concurrency);

    let mut builder = PresentationConfig::builder()
        .language(cli.language)
        .max_slides(cli.max_slides as usize)
        .max_retries(cli.max_retries)
        .concurrency(concurrency)
        .planning_temperature(cli.planning_temperature)
        .generation_temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .theme(cli.theme.clone());

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
