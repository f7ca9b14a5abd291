//! Figure index and section-text extraction.
//!
//! Runs once per document, before any model call. Produces the only two views
//! of the paper the later stages see:
//!
//! * [`FigureIndex`] — identifier → figure, the sole source of real URLs.
//!   Shared read-only by the generator (candidates) and the resolver.
//! * [`SectionTexts`] — plain text of the prompted sections, capped.

use crate::config::SectionLimits;
use crate::document::{Document, FigureEntry, TARGET_SECTIONS};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A figure with both identifier and URL present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedFigure {
    pub figure_id: String,
    pub url: String,
    pub caption: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Identifier → figure lookup that also remembers first-seen order.
///
/// A duplicate identifier replaces the stored figure but keeps the position
/// of the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct FigureIndex {
    order: Vec<String>,
    by_id: HashMap<String, IndexedFigure>,
}

impl FigureIndex {
    pub fn get(&self, figure_id: &str) -> Option<&IndexedFigure> {
        self.by_id.get(figure_id)
    }

    pub fn contains(&self, figure_id: &str) -> bool {
        self.by_id.contains_key(figure_id)
    }

    /// True when `url` is the URL of some indexed figure.
    pub fn is_indexed_url(&self, url: &str) -> bool {
        self.by_id.values().any(|f| f.url == url)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Figures in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedFigure> + '_ {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Identifiers in first-seen order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    fn insert(&mut self, figure: IndexedFigure) {
        if let Some(prev) = self.by_id.get(&figure.figure_id) {
            if prev.url != figure.url {
                debug!(
                    "Figure '{}' seen again; '{}' replaces '{}'",
                    figure.figure_id, figure.url, prev.url
                );
            }
        } else {
            self.order.push(figure.figure_id.clone());
        }
        self.by_id.insert(figure.figure_id.clone(), figure);
    }
}

impl FromIterator<IndexedFigure> for FigureIndex {
    fn from_iter<I: IntoIterator<Item = IndexedFigure>>(iter: I) -> Self {
        let mut index = FigureIndex::default();
        for figure in iter {
            index.insert(figure);
        }
        index
    }
}

/// Plain text of the prompted sections. Absent sections are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionTexts {
    pub abstract_text: String,
    pub method: String,
    pub performance: String,
    pub conclusion: String,
}

impl SectionTexts {
    pub fn get(&self, name: &str) -> &str {
        match name {
            "abstract" => &self.abstract_text,
            "method" => &self.method,
            "performance" => &self.performance,
            "conclusion" => &self.conclusion,
            _ => "",
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "abstract" => Some(&mut self.abstract_text),
            "method" => Some(&mut self.method),
            "performance" => Some(&mut self.performance),
            "conclusion" => Some(&mut self.conclusion),
            _ => None,
        }
    }
}

/// Everything the model-facing stages need from a document.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub title: Option<String>,
    pub figures: FigureIndex,
    pub sections: SectionTexts,
    /// Number of sections cut to their character cap.
    pub truncated_sections: usize,
    /// Figure entries skipped for a missing identifier or URL.
    pub skipped_figures: usize,
}

/// Build the figure index and capped section texts of `doc`.
pub fn build_index(doc: &Document, limits: &SectionLimits) -> IndexedDocument {
    let mut skipped_figures = 0;
    let mut figures = Vec::new();

    // BTreeMap iteration gives lexicographic section order.
    for (section, blocks) in &doc.sections {
        for block in blocks {
            for entry in &block.figures {
                match index_entry(entry) {
                    Some(fig) => figures.push(fig),
                    None => {
                        skipped_figures += 1;
                        warn!(
                            "Skipping figure in section '{}' without identifier or URL: {:?}",
                            section, entry.figure_id
                        );
                    }
                }
            }
        }
    }
    let figures: FigureIndex = figures.into_iter().collect();

    let mut sections = SectionTexts::default();
    let mut truncated_sections = 0;
    for name in TARGET_SECTIONS {
        let text = section_text(doc, name);
        let cap = limits.for_section(name).unwrap_or(usize::MAX);
        let (text, cut) = truncate_chars(text, cap);
        if cut {
            truncated_sections += 1;
            warn!("Section '{}' truncated to {} characters", name, cap);
        }
        if let Some(slot) = sections.slot(name) {
            *slot = text;
        }
    }

    debug!(
        "Indexed {} figures ({} skipped), {} sections truncated",
        figures.len(),
        skipped_figures,
        truncated_sections
    );

    IndexedDocument {
        title: doc.title.clone(),
        figures,
        sections,
        truncated_sections,
        skipped_figures,
    }
}

fn index_entry(entry: &FigureEntry) -> Option<IndexedFigure> {
    let figure_id = entry.figure_id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let url = entry.absolute_url.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    Some(IndexedFigure {
        figure_id: figure_id.to_string(),
        url: url.to_string(),
        caption: entry.caption.clone().unwrap_or_default(),
        width: entry.width,
        height: entry.height,
    })
}

/// Paragraphs joined by newline within a block, blocks joined by newline.
fn section_text(doc: &Document, name: &str) -> String {
    doc.section(name)
        .iter()
        .map(|b| b.paragraphs.join("\n"))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Keep at most `max` characters. Returns whether anything was cut.
pub(crate) fn truncate_chars(text: String, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text, false),
    }
}
