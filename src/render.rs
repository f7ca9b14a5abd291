//! Renderer collaborator: turns the final slide list into Marp Markdown.
//!
//! The pipeline only depends on the [`Renderer`] trait. [`MarpRenderer`] is a
//! plain implementation so that the CLI has something to write; each slide
//! carries a `_class` directive named after its layout, which a Marp theme
//! can style.
//!
//! [`render_slides_json`] renders slides that already exist as JSON (a
//! `[{"type", "content"}]` array, or the `--json` output of a full run)
//! without any LLM call. Every entry is validated first.

use crate::error::{single_line, Paper2SlidesError};
use crate::schema;
use crate::slide::{ImageItem, ListItem, Slide, SlideType};
use serde_json::Value;
use std::fmt::Write as _;

/// Slide separator between rendered slides.
pub const SLIDE_SEPARATOR: &str = "\n---\n\n";

/// Anything that can turn an ordered slide list into a document.
pub trait Renderer: Send + Sync {
    fn render(&self, title: &str, slides: &[Slide]) -> String;
}

/// Marp Markdown with a front-matter block and one section per slide.
#[derive(Debug, Clone)]
pub struct MarpRenderer {
    theme: String,
}

impl MarpRenderer {
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
        }
    }

    fn front_matter(&self, title: &str) -> String {
        let mut fm = format!("---\nmarp: true\ntheme: {}\n", self.theme);
        if !title.trim().is_empty() {
            // A JSON string literal is a valid YAML scalar.
            let quoted = serde_json::Value::String(title.to_string()).to_string();
            let _ = writeln!(fm, "title: {quoted}");
        }
        fm.push_str("---\n\n");
        fm
    }
}

impl Default for MarpRenderer {
    fn default() -> Self {
        Self::new("custom-style")
    }
}

impl Renderer for MarpRenderer {
    fn render(&self, title: &str, slides: &[Slide]) -> String {
        let body = slides
            .iter()
            .map(render_slide)
            .collect::<Vec<_>>()
            .join(SLIDE_SEPARATOR);
        self.front_matter(title) + &body
    }
}

/// Render one slide, ending with a newline.
pub fn render_slide(slide: &Slide) -> String {
    let mut out = format!("<!-- _class: {} -->\n\n", slide.slide_type());
    match slide {
        Slide::TitleSlide(c) => {
            let _ = writeln!(out, "# {}\n\n{}", c.title, c.subtitle);
        }
        Slide::SectionTitle(c) => {
            let _ = writeln!(out, "# {}", c.title);
        }
        Slide::SingleContentWithImage(c) => {
            let _ = writeln!(out, "## {}\n\n{}\n", c.title, c.description);
            let _ = writeln!(out, "{}", image(&c.image_url, &c.image_alt));
        }
        Slide::Highlight(c) => {
            let _ = writeln!(out, "## {}\n\n> {}", c.title, c.content);
        }
        Slide::TwoColumnList(c)
        | Slide::VerticalList(c)
        | Slide::Horizontal3ColumnList(c)
        | Slide::TwoColumnsWithGrid(c)
        | Slide::Horizontal4ColumnList(c) => {
            let _ = writeln!(out, "## {}\n", c.title);
            list(&mut out, &c.items);
        }
        Slide::ImageWithDescription2(c) | Slide::ImageWithDescription3(c) => {
            let _ = writeln!(out, "## {}\n", c.title);
            for img in &c.images {
                let ImageItem { url, alt } = img;
                let _ = writeln!(out, "{}", image(url, alt));
            }
            out.push('\n');
            list(&mut out, &c.items);
        }
        Slide::ThreeColumnMetrics(c) => {
            let _ = writeln!(out, "## {}\n", c.title);
            for m in &c.metrics {
                let _ = writeln!(out, "- **{}** {}", m.value, m.description);
            }
        }
        Slide::MetricsGrid(c) => {
            let _ = writeln!(out, "## {}\n\n{}\n", c.title, c.description);
            for m in &c.metrics {
                let _ = writeln!(out, "- **{}** {}", m.value, m.label);
            }
        }
        Slide::Quote(c) => {
            let _ = writeln!(out, "> {}\n>\n> — {}", c.quote, c.author);
        }
    }
    out
}

// ── Rendering stored slides ──────────────────────────────────────────────

/// Validate and render a JSON slide list with the default [`MarpRenderer`].
///
/// Accepts either a bare array of `{"type": …, "content": {…}}` entries or an
/// object with a `slides` array and an optional `title`.
///
/// # Errors
/// [`Paper2SlidesError::InvalidDocument`] when the input is not a slide list
/// or an entry does not validate. The first bad entry aborts the render.
pub fn render_slides_json(json: &str) -> Result<String, Paper2SlidesError> {
    render_slides_json_with(json, &MarpRenderer::default())
}

/// [`render_slides_json`] with an explicit renderer.
pub fn render_slides_json_with(
    json: &str,
    renderer: &dyn Renderer,
) -> Result<String, Paper2SlidesError> {
    let invalid = |detail: String| Paper2SlidesError::InvalidDocument { detail };

    let root: Value =
        serde_json::from_str(json).map_err(|e| invalid(format!("not valid JSON: {e}")))?;
    let (title, entries) = match &root {
        Value::Array(entries) => ("", entries),
        Value::Object(obj) => match obj.get("slides") {
            Some(Value::Array(entries)) => {
                (obj.get("title").and_then(Value::as_str).unwrap_or(""), entries)
            }
            _ => return Err(invalid("expected a 'slides' array".to_string())),
        },
        _ => return Err(invalid("expected an array of slides".to_string())),
    };

    let mut slides = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let n = i + 1;
        let type_name = entry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(format!("slide {n}: missing 'type'")))?;
        let slide_type: SlideType = type_name
            .parse()
            .map_err(|e| invalid(format!("slide {n}: {e}")))?;
        let content = entry.get("content").cloned().unwrap_or(Value::Null);
        let slide = schema::validate(slide_type, &content)
            .map_err(|e| invalid(format!("slide {n}: {}", single_line(&e.to_string()))))?;
        slides.push(slide);
    }

    Ok(renderer.render(title, &slides))
}

fn list(out: &mut String, items: &[ListItem]) {
    for item in items {
        let _ = writeln!(out, "- **{}**: {}", item.title, item.description);
    }
}

/// A Markdown image, or just the alt text when there is no URL.
fn image(url: &str, alt: &str) -> String {
    if url.is_empty() {
        format!("*{alt}*")
    } else {
        format!("![{alt}]({url})")
    }
}
