//! Configuration types for paper-to-slides conversion.
//!
//! All run behaviour is controlled through [`PresentationConfig`], built via
//! its [`PresentationConfigBuilder`]. One struct holds every knob so a config
//! can be shared across the concurrent generation futures and logged as a
//! whole.

use crate::error::Paper2SlidesError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one paper-to-slides run.
///
/// Built via [`PresentationConfig::builder()`] or using
/// [`PresentationConfig::default()`].
///
/// # Example
/// ```rust
/// use paper2slides::{Language, PresentationConfig};
///
/// let config = PresentationConfig::builder()
///     .language(Language::English)
///     .max_slides(8)
///     .concurrency(Some(3))
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_slides, 8);
/// ```
#[derive(Clone)]
pub struct PresentationConfig {
    /// Language every generated slide is written in. Default: Korean.
    pub language: Language,

    /// Upper bound on outline length. Longer outlines are truncated; shorter
    /// ones are accepted as is. Default: 10.
    pub max_slides: usize,

    /// Extra generation attempts per outline entry after the first.
    /// Default: 2, so each entry gets at most 3 attempts.
    pub max_retries: u32,

    /// Ceiling on generation calls in flight. `None` dispatches every entry
    /// at once. Default: `Some(5)`.
    pub concurrency: Option<usize>,

    /// LLM model identifier, e.g. "gpt-4.1-nano".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature of the planning call. Default: 0.5.
    pub planning_temperature: f32,

    /// Sampling temperature of slide generation calls. Default: 0.05.
    ///
    /// Generation fills a fixed schema; near-zero temperature keeps the
    /// model inside the length limits.
    pub generation_temperature: f32,

    /// Maximum tokens the LLM may produce per call. Default: 4096.
    pub max_tokens: usize,

    /// Per-call timeout in seconds. A timeout consumes one attempt. Default: 60.
    pub api_timeout_secs: u64,

    /// Initial backoff after a transport failure (exponential). Default: 500.
    ///
    /// Doubles after each consecutive transport failure: 500 ms → 1 s → 2 s.
    /// Validation failures retry immediately.
    pub retry_backoff_ms: u64,

    /// Character caps applied to the prompted section texts.
    pub section_limits: SectionLimits,

    /// Figures listed in the planning prompt. Default: 5.
    pub max_prompt_figures: usize,

    /// Marp theme name written to the front-matter. Default: "custom-style".
    pub theme: String,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives plan and per-slide events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            max_slides: 10,
            max_retries: 2,
            concurrency: Some(5),
            model: None,
            provider_name: None,
            provider: None,
            planning_temperature: 0.5,
            generation_temperature: 0.05,
            max_tokens: 4096,
            api_timeout_secs: 60,
            retry_backoff_ms: 500,
            section_limits: SectionLimits::default(),
            max_prompt_figures: 5,
            theme: "custom-style".to_string(),
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PresentationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationConfig")
            .field("language", &self.language)
            .field("max_slides", &self.max_slides)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("planning_temperature", &self.planning_temperature)
            .field("generation_temperature", &self.generation_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("section_limits", &self.section_limits)
            .field("max_prompt_figures", &self.max_prompt_figures)
            .field("theme", &self.theme)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl PresentationConfig {
    /// Create a new builder for `PresentationConfig`.
    pub fn builder() -> PresentationConfigBuilder {
        PresentationConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PresentationConfig`].
#[derive(Debug)]
pub struct PresentationConfigBuilder {
    config: PresentationConfig,
}

impl PresentationConfigBuilder {
    pub fn language(mut self, language: Language) -> Self {
        self.config.language = language;
        self
    }

    pub fn max_slides(mut self, n: usize) -> Self {
        self.config.max_slides = n.clamp(1, 50);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    /// `Some(0)` is kept as given so that `build()` can reject it.
    pub fn concurrency(mut self, n: Option<usize>) -> Self {
        self.config.concurrency = n;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn planning_temperature(mut self, t: f32) -> Self {
        self.config.planning_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn generation_temperature(mut self, t: f32) -> Self {
        self.config.generation_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn section_limits(mut self, limits: SectionLimits) -> Self {
        self.config.section_limits = limits;
        self
    }

    pub fn max_prompt_figures(mut self, n: usize) -> Self {
        self.config.max_prompt_figures = n;
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.config.theme = theme.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PresentationConfig, Paper2SlidesError> {
        let c = &self.config;
        if c.max_slides == 0 {
            return Err(Paper2SlidesError::InvalidConfig(
                "max_slides must be ≥ 1".into(),
            ));
        }
        if c.concurrency == Some(0) {
            return Err(Paper2SlidesError::InvalidConfig(
                "Concurrency must be ≥ 1 (use None for unbounded)".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Paper2SlidesError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.theme.trim().is_empty() {
            return Err(Paper2SlidesError::InvalidConfig(
                "Theme name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target language of the generated slides.
///
/// The set is closed: an unknown code is an error, never a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "ko")]
    Korean,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "zh")]
    Chinese,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::Korean,
        Language::English,
        Language::Japanese,
        Language::Chinese,
        Language::Spanish,
        Language::French,
        Language::German,
    ];

    /// ISO 639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            Language::Korean => "ko",
            Language::English => "en",
            Language::Japanese => "ja",
            Language::Chinese => "zh",
            Language::Spanish => "es",
            Language::French => "fr",
            Language::German => "de",
        }
    }

    /// The language's own name for itself, as used in prompts.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::Korean => "한국어",
            Language::English => "English",
            Language::Japanese => "日本語",
            Language::Chinese => "中文",
            Language::Spanish => "Español",
            Language::French => "Français",
            Language::German => "Deutsch",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Paper2SlidesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.code() == code)
            .ok_or_else(|| Paper2SlidesError::UnsupportedLanguage { code: s.to_string() })
    }
}

/// Character caps for each prompted section.
///
/// Text beyond a cap is cut from the end before prompting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLimits {
    pub abstract_chars: usize,
    pub method_chars: usize,
    pub performance_chars: usize,
    pub conclusion_chars: usize,
}

impl Default for SectionLimits {
    fn default() -> Self {
        Self {
            abstract_chars: 800,
            method_chars: 500,
            performance_chars: 500,
            conclusion_chars: 400,
        }
    }
}

impl SectionLimits {
    /// Cap for a target section name; `None` for sections that are not prompted.
    pub fn for_section(&self, name: &str) -> Option<usize> {
        match name {
            "abstract" => Some(self.abstract_chars),
            "method" => Some(self.method_chars),
            "performance" => Some(self.performance_chars),
            "conclusion" => Some(self.conclusion_chars),
            _ => None,
        }
    }
}
