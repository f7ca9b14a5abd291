//! Paper document model.
//!
//! A paper arrives as JSON in one of two shapes:
//!
//! ```text
//! nested: { "title": "...", "sections": { "abstract": [block, …], "method": [...] } }
//! flat:   { "title": "...", "abstract": [block, …], "method": [...] }
//! ```
//!
//! ## Shape detection
//!
//! There is exactly one rule: if the root object has a `sections` key the
//! document is nested and its sections are read from that key (which must be
//! an object); otherwise the root object itself holds the sections. Callers
//! never declare the shape.
//!
//! Parsing is lenient below the section level. Blocks that are not objects,
//! paragraphs that are not strings, and unknown keys are skipped; figures are
//! kept raw here and validated when the figure index is built.

use crate::error::Paper2SlidesError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Sections whose text is extracted for prompting, in prompt order.
pub const TARGET_SECTIONS: [&str; 4] = ["abstract", "method", "performance", "conclusion"];

/// Root key that is metadata in both shapes, never a section.
const TITLE_KEY: &str = "title";
const SECTIONS_KEY: &str = "sections";

/// Which of the two accepted JSON shapes the document was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentShape {
    /// Sections live under a `sections` key.
    Nested,
    /// Sections are top-level keys.
    Flat,
}

/// A figure as it appears in the paper JSON. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FigureEntry {
    pub figure_id: Option<String>,
    pub absolute_url: Option<String>,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// One header-delimited block of a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionBlock {
    pub header: Option<String>,
    pub level: Option<u32>,
    pub paragraphs: Vec<String>,
    pub figures: Vec<FigureEntry>,
}

/// A parsed paper. Read-only input to a conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: Option<String>,
    pub shape: DocumentShape,
    /// Section name → blocks. Keys iterate in lexicographic order, which is
    /// the order figures are indexed in.
    pub sections: BTreeMap<String, Vec<SectionBlock>>,
}

impl Document {
    /// Parse a paper from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, Paper2SlidesError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| Paper2SlidesError::InvalidDocument {
                detail: format!("not valid JSON: {e}"),
            })?;
        Self::from_value(&value)
    }

    /// Build a document from an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, Paper2SlidesError> {
        let root = value
            .as_object()
            .ok_or_else(|| Paper2SlidesError::InvalidDocument {
                detail: format!("root must be a JSON object, got {}", json_kind(value)),
            })?;

        let title = root
            .get(TITLE_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let (shape, section_map) = match root.get(SECTIONS_KEY) {
            Some(Value::Object(map)) => (DocumentShape::Nested, map),
            Some(other) => {
                return Err(Paper2SlidesError::InvalidDocument {
                    detail: format!("'sections' must be an object, got {}", json_kind(other)),
                })
            }
            None => (DocumentShape::Flat, root),
        };

        let sections = parse_sections(section_map);
        debug!(
            "Parsed {:?} document with {} sections",
            shape,
            sections.len()
        );

        Ok(Self {
            title,
            shape,
            sections,
        })
    }

    /// Blocks of a section, or an empty slice when the section is absent.
    pub fn section(&self, name: &str) -> &[SectionBlock] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn parse_sections(map: &Map<String, Value>) -> BTreeMap<String, Vec<SectionBlock>> {
    let mut sections = BTreeMap::new();
    for (name, value) in map {
        if name == TITLE_KEY || name == SECTIONS_KEY {
            continue;
        }
        let blocks = match value {
            Value::Array(items) => items.iter().filter_map(parse_block).collect(),
            Value::String(text) => vec![SectionBlock {
                paragraphs: vec![text.clone()],
                ..SectionBlock::default()
            }],
            _ => {
                debug!("Skipping non-section key '{}'", name);
                continue;
            }
        };
        sections.insert(name.clone(), blocks);
    }
    sections
}

fn parse_block(value: &Value) -> Option<SectionBlock> {
    let obj = value.as_object()?;

    let header = ["header", "header_id", "title"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::to_string);

    let level = obj
        .get("level")
        .and_then(Value::as_u64)
        .and_then(|l| u32::try_from(l).ok());

    let paragraphs = match obj.get("paragraphs") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(p)) => vec![p.clone()],
        _ => Vec::new(),
    };

    let figures = match obj.get("figures") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(parse_figure)
            .collect(),
        _ => Vec::new(),
    };

    Some(SectionBlock {
        header,
        level,
        paragraphs,
        figures,
    })
}

fn parse_figure(obj: &Map<String, Value>) -> FigureEntry {
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
    let dim = |key: &str| {
        obj.get(key)
            .and_then(Value::as_f64)
            .filter(|d| *d >= 0.0 && *d <= u32::MAX as f64)
            .map(|d| d.round() as u32)
    };
    FigureEntry {
        figure_id: text("figure_id").or_else(|| text("id")),
        absolute_url: text("absolute_url").or_else(|| text("url")),
        caption: text("caption"),
        width: dim("width"),
        height: dim("height"),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
