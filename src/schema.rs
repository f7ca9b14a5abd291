//! Schema registry: per-layout field rules, validation, and schema text.
//!
//! Each [`SlideType`] maps to one static [`SlideSchema`] through an
//! exhaustive `match` in [`schema`]. The same table drives three things so
//! they can never drift apart:
//!
//! 1. [`validate`] — checks a model reply and builds a typed [`Slide`]
//! 2. [`json_schema`] — the schema text embedded in generation prompts
//! 3. the character/count limits quoted back to the model on retry
//!
//! Validation collects every violation rather than stopping at the first so
//! the retry prompt can fix them all in one go. Lengths are counted in
//! characters, not bytes; unknown keys are ignored.

use crate::slide::{
    HighlightContent, ImageDescriptionContent, ListContent, MetricsGridContent, QuoteContent,
    SectionTitleContent, SingleContentWithImageContent, Slide, SlideType,
    ThreeColumnMetricsContent, TitleSlideContent,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use thiserror::Error;

/// The shape of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Required string with a character limit. May be empty.
    Text { max: usize },
    /// Required string holding a figure identifier. May be empty.
    FigureRef { max: usize },
    /// Required array of objects with a cardinality range.
    List {
        item: &'static [FieldSpec],
        min: usize,
        max: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Alternative key accepted on input.
    pub alias: Option<&'static str>,
    pub kind: FieldKind,
    pub description: &'static str,
}

/// Field rules of one slide layout.
#[derive(Debug, PartialEq, Eq)]
pub struct SlideSchema {
    pub slide_type: SlideType,
    pub fields: &'static [FieldSpec],
}

const fn text(name: &'static str, max: usize, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        alias: None,
        kind: FieldKind::Text { max },
        description,
    }
}

const fn figure(name: &'static str, description: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        alias: None,
        kind: FieldKind::FigureRef { max: 500 },
        description,
    }
}

const fn list(
    name: &'static str,
    item: &'static [FieldSpec],
    min: usize,
    max: usize,
    description: &'static str,
) -> FieldSpec {
    FieldSpec {
        name,
        alias: None,
        kind: FieldKind::List { item, min, max },
        description,
    }
}

// ── Component tables ─────────────────────────────────────────────────────

const LIST_ITEM: &[FieldSpec] = &[
    text("title", 100, "Item title"),
    text("description", 300, "Item description"),
];

const IMAGE_ITEM: &[FieldSpec] = &[
    figure("url", "Figure ID from the available figures (e.g. 'S3.F1'), never a URL"),
    FieldSpec {
        alias: Some("alt_text"),
        ..text("alt", 100, "Image alt text")
    },
];

const METRIC_VALUE: &[FieldSpec] = &[
    text("value", 20, "Metric value (e.g. '28.4', '3.5 days')"),
    text("label", 50, "Metric label"),
];

const METRIC_WITH_DESCRIPTION: &[FieldSpec] = &[
    text("value", 20, "Metric value (e.g. '41.8', '12%')"),
    text("description", 150, "Metric description"),
];

// ── Layout tables ────────────────────────────────────────────────────────

static TITLE_SLIDE: SlideSchema = SlideSchema {
    slide_type: SlideType::TitleSlide,
    fields: &[
        text("title", 80, "Main presentation title"),
        text("subtitle", 120, "Subtitle or tagline"),
    ],
};

static SECTION_TITLE: SlideSchema = SlideSchema {
    slide_type: SlideType::SectionTitle,
    fields: &[text("title", 60, "Section title")],
};

static SINGLE_CONTENT_WITH_IMAGE: SlideSchema = SlideSchema {
    slide_type: SlideType::SingleContentWithImage,
    fields: &[
        text("title", 60, "Content title"),
        text("description", 300, "Content description"),
        figure("image_url", "Figure ID from the available figures (e.g. 'S3.F1'), never a URL"),
        text("image_alt", 100, "Image alt text"),
    ],
};

static HIGHLIGHT: SlideSchema = SlideSchema {
    slide_type: SlideType::Highlight,
    fields: &[
        text("title", 40, "Highlight title"),
        text("content", 200, "Highlight message"),
    ],
};

static TWO_COLUMN_LIST: SlideSchema = SlideSchema {
    slide_type: SlideType::TwoColumnList,
    fields: &[
        text("title", 40, "List title"),
        list("items", LIST_ITEM, 2, 4, "2-4 list items"),
    ],
};

static VERTICAL_LIST: SlideSchema = SlideSchema {
    slide_type: SlideType::VerticalList,
    fields: &[
        text("title", 60, "List title"),
        list("items", LIST_ITEM, 3, 6, "3-6 list items"),
    ],
};

static HORIZONTAL_3_COLUMN_LIST: SlideSchema = SlideSchema {
    slide_type: SlideType::Horizontal3ColumnList,
    fields: &[
        text("title", 60, "List title"),
        list("items", LIST_ITEM, 3, 3, "Exactly 3 items"),
    ],
};

static TWO_COLUMNS_WITH_GRID: SlideSchema = SlideSchema {
    slide_type: SlideType::TwoColumnsWithGrid,
    fields: &[
        text("title", 40, "Grid title"),
        list("items", LIST_ITEM, 4, 4, "Exactly 4 items for the 2x2 grid"),
    ],
};

static HORIZONTAL_4_COLUMN_LIST: SlideSchema = SlideSchema {
    slide_type: SlideType::Horizontal4ColumnList,
    fields: &[
        text("title", 60, "List title"),
        list("items", LIST_ITEM, 4, 4, "Exactly 4 items"),
    ],
};

static IMAGE_WITH_DESCRIPTION_2: SlideSchema = SlideSchema {
    slide_type: SlideType::ImageWithDescription2,
    fields: &[
        text("title", 60, "Slide title"),
        list("images", IMAGE_ITEM, 2, 2, "Exactly 2 images"),
        list("items", LIST_ITEM, 2, 2, "Exactly 2 descriptions matching the images"),
    ],
};

static IMAGE_WITH_DESCRIPTION_3: SlideSchema = SlideSchema {
    slide_type: SlideType::ImageWithDescription3,
    fields: &[
        text("title", 60, "Slide title"),
        list("images", IMAGE_ITEM, 3, 3, "Exactly 3 images"),
        list("items", LIST_ITEM, 3, 3, "Exactly 3 descriptions matching the images"),
    ],
};

static THREE_COLUMN_METRICS: SlideSchema = SlideSchema {
    slide_type: SlideType::ThreeColumnMetrics,
    fields: &[
        text("title", 60, "Metrics title"),
        list("metrics", METRIC_WITH_DESCRIPTION, 3, 3, "Exactly 3 metrics"),
    ],
};

static METRICS_GRID: SlideSchema = SlideSchema {
    slide_type: SlideType::MetricsGrid,
    fields: &[
        text("title", 40, "Metrics title"),
        text("description", 200, "Description of the metrics"),
        list("metrics", METRIC_VALUE, 4, 4, "Exactly 4 metrics for the 2x2 grid"),
    ],
};

static QUOTE: SlideSchema = SlideSchema {
    slide_type: SlideType::Quote,
    fields: &[
        text("quote", 200, "Quote text without quotation marks"),
        text("author", 80, "Author name"),
    ],
};

/// Look up the schema of a layout.
pub fn schema(slide_type: SlideType) -> &'static SlideSchema {
    match slide_type {
        SlideType::TitleSlide => &TITLE_SLIDE,
        SlideType::SectionTitle => &SECTION_TITLE,
        SlideType::SingleContentWithImage => &SINGLE_CONTENT_WITH_IMAGE,
        SlideType::Highlight => &HIGHLIGHT,
        SlideType::TwoColumnList => &TWO_COLUMN_LIST,
        SlideType::VerticalList => &VERTICAL_LIST,
        SlideType::Horizontal3ColumnList => &HORIZONTAL_3_COLUMN_LIST,
        SlideType::TwoColumnsWithGrid => &TWO_COLUMNS_WITH_GRID,
        SlideType::Horizontal4ColumnList => &HORIZONTAL_4_COLUMN_LIST,
        SlideType::ImageWithDescription2 => &IMAGE_WITH_DESCRIPTION_2,
        SlideType::ImageWithDescription3 => &IMAGE_WITH_DESCRIPTION_3,
        SlideType::ThreeColumnMetrics => &THREE_COLUMN_METRICS,
        SlideType::MetricsGrid => &METRICS_GRID,
        SlideType::Quote => &QUOTE,
    }
}

// ── Validation ───────────────────────────────────────────────────────────

/// One schema violation, addressed by a dotted path such as `items[2].title`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

/// All violations found in one reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationErrors {
    pub slide_type: SlideType,
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} validation error(s) for {}",
            self.violations.len(),
            self.slide_type
        )?;
        for v in &self.violations {
            if v.path.is_empty() {
                write!(f, "\n- {}", v.message)?;
            } else {
                write!(f, "\n- {}: {}", v.path, v.message)?;
            }
        }
        Ok(())
    }
}

/// Validate `content` against the layout's schema and build the typed slide.
pub fn validate(slide_type: SlideType, content: &Value) -> Result<Slide, ValidationErrors> {
    let mut violations = Vec::new();

    match content.as_object() {
        Some(obj) => check_fields(schema(slide_type).fields, obj, "", &mut violations),
        None => violations.push(Violation {
            path: String::new(),
            message: format!("expected a JSON object, got {}", kind_of(content)),
        }),
    }

    if violations.is_empty() {
        build_slide(slide_type, content).map_err(|e| {
            violations.push(Violation {
                path: String::new(),
                message: e.to_string(),
            });
            ValidationErrors {
                slide_type,
                violations,
            }
        })
    } else {
        Err(ValidationErrors {
            slide_type,
            violations,
        })
    }
}

fn check_fields(
    fields: &[FieldSpec],
    obj: &Map<String, Value>,
    prefix: &str,
    out: &mut Vec<Violation>,
) {
    for field in fields {
        let path = if prefix.is_empty() {
            field.name.to_string()
        } else {
            format!("{prefix}.{}", field.name)
        };

        let Some(value) = obj
            .get(field.name)
            .or_else(|| field.alias.and_then(|a| obj.get(a)))
            .filter(|v| !v.is_null())
        else {
            out.push(Violation {
                path,
                message: "field required".to_string(),
            });
            continue;
        };

        match field.kind {
            FieldKind::Text { max } | FieldKind::FigureRef { max } => {
                check_string(value, max, path, out)
            }
            FieldKind::List { item, min, max } => {
                let Some(items) = value.as_array() else {
                    out.push(Violation {
                        path,
                        message: format!("expected an array, got {}", kind_of(value)),
                    });
                    continue;
                };
                if items.len() < min || items.len() > max {
                    let expected = if min == max {
                        format!("exactly {min}")
                    } else {
                        format!("between {min} and {max}")
                    };
                    out.push(Violation {
                        path: path.clone(),
                        message: format!("expected {expected} items, got {}", items.len()),
                    });
                }
                for (i, entry) in items.iter().enumerate() {
                    let entry_path = format!("{path}[{i}]");
                    match entry.as_object() {
                        Some(entry_obj) => check_fields(item, entry_obj, &entry_path, out),
                        None => out.push(Violation {
                            path: entry_path,
                            message: format!("expected an object, got {}", kind_of(entry)),
                        }),
                    }
                }
            }
        }
    }
}

fn check_string(value: &Value, max: usize, path: String, out: &mut Vec<Violation>) {
    let Some(s) = value.as_str() else {
        out.push(Violation {
            path,
            message: format!("expected a string, got {}", kind_of(value)),
        });
        return;
    };
    let len = s.chars().count();
    if len > max {
        out.push(Violation {
            path,
            message: format!("at most {max} characters allowed, got {len}"),
        });
    }
}

fn build_slide(slide_type: SlideType, content: &Value) -> Result<Slide, serde_json::Error> {
    fn parse<T: DeserializeOwned>(content: &Value) -> Result<T, serde_json::Error> {
        T::deserialize(content)
    }

    Ok(match slide_type {
        SlideType::TitleSlide => Slide::TitleSlide(parse::<TitleSlideContent>(content)?),
        SlideType::SectionTitle => Slide::SectionTitle(parse::<SectionTitleContent>(content)?),
        SlideType::SingleContentWithImage => {
            Slide::SingleContentWithImage(parse::<SingleContentWithImageContent>(content)?)
        }
        SlideType::Highlight => Slide::Highlight(parse::<HighlightContent>(content)?),
        SlideType::TwoColumnList => Slide::TwoColumnList(parse::<ListContent>(content)?),
        SlideType::VerticalList => Slide::VerticalList(parse::<ListContent>(content)?),
        SlideType::Horizontal3ColumnList => {
            Slide::Horizontal3ColumnList(parse::<ListContent>(content)?)
        }
        SlideType::TwoColumnsWithGrid => Slide::TwoColumnsWithGrid(parse::<ListContent>(content)?),
        SlideType::Horizontal4ColumnList => {
            Slide::Horizontal4ColumnList(parse::<ListContent>(content)?)
        }
        SlideType::ImageWithDescription2 => {
            Slide::ImageWithDescription2(parse::<ImageDescriptionContent>(content)?)
        }
        SlideType::ImageWithDescription3 => {
            Slide::ImageWithDescription3(parse::<ImageDescriptionContent>(content)?)
        }
        SlideType::ThreeColumnMetrics => {
            Slide::ThreeColumnMetrics(parse::<ThreeColumnMetricsContent>(content)?)
        }
        SlideType::MetricsGrid => Slide::MetricsGrid(parse::<MetricsGridContent>(content)?),
        SlideType::Quote => Slide::Quote(parse::<QuoteContent>(content)?),
    })
}

/// Figure references in `slide` that were not offered as candidates.
///
/// This is a soft check: the slide stays valid, and anything that is not a
/// real identifier gets blanked by the resolver later.
pub fn foreign_figure_refs<'a>(slide: &'a Slide, candidates: &[String]) -> Vec<&'a str> {
    slide
        .figure_refs()
        .into_iter()
        .filter(|r| !r.is_empty() && !candidates.iter().any(|c| c == r))
        .collect()
}

// ── Schema text for prompts ──────────────────────────────────────────────

/// JSON Schema of a layout's content object.
pub fn json_schema(slide_type: SlideType) -> Value {
    let mut obj = object_schema(schema(slide_type).fields);
    obj["title"] = json!(slide_type.as_str());
    obj
}

fn object_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    for field in fields {
        let prop = match field.kind {
            FieldKind::Text { max } | FieldKind::FigureRef { max } => json!({
                "type": "string",
                "maxLength": max,
                "description": field.description,
            }),
            FieldKind::List { item, min, max } => json!({
                "type": "array",
                "minItems": min,
                "maxItems": max,
                "items": object_schema(item),
                "description": field.description,
            }),
        };
        properties.insert(field.name.to_string(), prop);
    }
    let required: Vec<&str> = fields.iter().map(|f| f.name).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
