//! Slide types and their content shapes.
//!
//! [`SlideType`] is the closed set of 14 layouts. [`Slide`] pairs a layout
//! with its content and serialises as `{"type": "...", "content": {...}}`,
//! the shape a [`crate::render::Renderer`] consumes. Every per-variant
//! operation below is an exhaustive `match`, so adding a layout without
//! teaching each operation about it does not compile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the 14 slide layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideType {
    TitleSlide,
    SectionTitle,
    SingleContentWithImage,
    Highlight,
    TwoColumnList,
    VerticalList,
    #[serde(rename = "horizontal_3_column_list")]
    Horizontal3ColumnList,
    TwoColumnsWithGrid,
    #[serde(rename = "horizontal_4_column_list")]
    Horizontal4ColumnList,
    #[serde(rename = "image_with_description_2")]
    ImageWithDescription2,
    #[serde(rename = "image_with_description_3")]
    ImageWithDescription3,
    ThreeColumnMetrics,
    MetricsGrid,
    Quote,
}

impl SlideType {
    /// All layouts, in the order they are presented to the planner.
    pub const ALL: [SlideType; 14] = [
        SlideType::TitleSlide,
        SlideType::SectionTitle,
        SlideType::SingleContentWithImage,
        SlideType::Highlight,
        SlideType::TwoColumnList,
        SlideType::VerticalList,
        SlideType::Horizontal3ColumnList,
        SlideType::TwoColumnsWithGrid,
        SlideType::Horizontal4ColumnList,
        SlideType::ImageWithDescription2,
        SlideType::ImageWithDescription3,
        SlideType::ThreeColumnMetrics,
        SlideType::MetricsGrid,
        SlideType::Quote,
    ];

    /// Wire identifier, e.g. `"metrics_grid"`.
    pub fn as_str(self) -> &'static str {
        match self {
            SlideType::TitleSlide => "title_slide",
            SlideType::SectionTitle => "section_title",
            SlideType::SingleContentWithImage => "single_content_with_image",
            SlideType::Highlight => "highlight",
            SlideType::TwoColumnList => "two_column_list",
            SlideType::VerticalList => "vertical_list",
            SlideType::Horizontal3ColumnList => "horizontal_3_column_list",
            SlideType::TwoColumnsWithGrid => "two_columns_with_grid",
            SlideType::Horizontal4ColumnList => "horizontal_4_column_list",
            SlideType::ImageWithDescription2 => "image_with_description_2",
            SlideType::ImageWithDescription3 => "image_with_description_3",
            SlideType::ThreeColumnMetrics => "three_column_metrics",
            SlideType::MetricsGrid => "metrics_grid",
            SlideType::Quote => "quote",
        }
    }

    /// Plain-language layout description shown to the model.
    pub fn description(self) -> &'static str {
        match self {
            SlideType::TitleSlide => "Opening slide with a main title and subtitle",
            SlideType::SectionTitle => "Centered title slide for dividing presentation sections",
            SlideType::SingleContentWithImage => {
                "Text content on the left with a large image on the right"
            }
            SlideType::Highlight => "Emphasized message with title on left (content max 200 chars)",
            SlideType::TwoColumnList => "Title on left with 2-4 list items stacked on right",
            SlideType::VerticalList => "Full-width title with 3-6 items stacked vertically below",
            SlideType::Horizontal3ColumnList => "Title with exactly 3 items side-by-side",
            SlideType::TwoColumnsWithGrid => "Title on left with exactly 4 items in a 2x2 grid",
            SlideType::Horizontal4ColumnList => "Title with exactly 4 items side-by-side",
            SlideType::ImageWithDescription2 => "Exactly 2 images side-by-side, each with a description",
            SlideType::ImageWithDescription3 => "Exactly 3 images side-by-side, each with a description",
            SlideType::ThreeColumnMetrics => "Exactly 3 metrics with values and descriptions",
            SlideType::MetricsGrid => "Title and description with exactly 4 metrics in a 2x2 grid",
            SlideType::Quote => "Centered quote with author attribution (quote max 200 chars)",
        }
    }

    /// When the planner should pick this layout.
    pub fn use_case(self) -> &'static str {
        match self {
            SlideType::TitleSlide => "Presentation opening, cover slide",
            SlideType::SectionTitle => "Section breaks (Abstract, Method, Results, Conclusion)",
            SlideType::SingleContentWithImage => "Concept explanation with one figure",
            SlideType::Highlight => "Key contribution, important callout",
            SlideType::TwoColumnList => "Bullet points, benefits, short lists",
            SlideType::VerticalList => "Step-by-step processes, detailed lists",
            SlideType::Horizontal3ColumnList => "Three-way comparisons, feature trios",
            SlideType::TwoColumnsWithGrid => "Four-quadrant analysis, four key points",
            SlideType::Horizontal4ColumnList => "Four phases, four categories",
            SlideType::ImageWithDescription2 => "Side-by-side figure comparison",
            SlideType::ImageWithDescription3 => "Three figures with explanations",
            SlideType::ThreeColumnMetrics => "Headline results, key numbers",
            SlideType::MetricsGrid => "Performance summary with four metrics",
            SlideType::Quote => "Closing takeaway message",
        }
    }

    /// Whether the layout has a figure slot.
    pub fn has_figures(self) -> bool {
        matches!(
            self,
            SlideType::SingleContentWithImage
                | SlideType::ImageWithDescription2
                | SlideType::ImageWithDescription3
        )
    }
}

impl fmt::Display for SlideType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown slide type identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown slide type '{0}'")]
pub struct UnknownSlideType(pub String);

impl FromStr for SlideType {
    type Err = UnknownSlideType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SlideType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownSlideType(s.to_string()))
    }
}

// ── Shared components ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub title: String,
    pub description: String,
}

/// An image reference. `url` holds a figure identifier until resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageItem {
    pub url: String,
    #[serde(alias = "alt_text")]
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricWithDescription {
    pub value: String,
    pub description: String,
}

// ── Per-layout content ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleSlideContent {
    pub title: String,
    pub subtitle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTitleContent {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleContentWithImageContent {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub image_alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightContent {
    pub title: String,
    pub content: String,
}

/// Content of the five list layouts; they differ only in item counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListContent {
    pub title: String,
    pub items: Vec<ListItem>,
}

/// Content of the two image-with-description layouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptionContent {
    pub title: String,
    pub images: Vec<ImageItem>,
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreeColumnMetricsContent {
    pub title: String,
    pub metrics: Vec<MetricWithDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsGridContent {
    pub title: String,
    pub description: String,
    pub metrics: Vec<MetricValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteContent {
    pub quote: String,
    pub author: String,
}

/// A validated slide: layout tag plus content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum Slide {
    TitleSlide(TitleSlideContent),
    SectionTitle(SectionTitleContent),
    SingleContentWithImage(SingleContentWithImageContent),
    Highlight(HighlightContent),
    TwoColumnList(ListContent),
    VerticalList(ListContent),
    #[serde(rename = "horizontal_3_column_list")]
    Horizontal3ColumnList(ListContent),
    TwoColumnsWithGrid(ListContent),
    #[serde(rename = "horizontal_4_column_list")]
    Horizontal4ColumnList(ListContent),
    #[serde(rename = "image_with_description_2")]
    ImageWithDescription2(ImageDescriptionContent),
    #[serde(rename = "image_with_description_3")]
    ImageWithDescription3(ImageDescriptionContent),
    ThreeColumnMetrics(ThreeColumnMetricsContent),
    MetricsGrid(MetricsGridContent),
    Quote(QuoteContent),
}

impl Slide {
    pub fn slide_type(&self) -> SlideType {
        match self {
            Slide::TitleSlide(_) => SlideType::TitleSlide,
            Slide::SectionTitle(_) => SlideType::SectionTitle,
            Slide::SingleContentWithImage(_) => SlideType::SingleContentWithImage,
            Slide::Highlight(_) => SlideType::Highlight,
            Slide::TwoColumnList(_) => SlideType::TwoColumnList,
            Slide::VerticalList(_) => SlideType::VerticalList,
            Slide::Horizontal3ColumnList(_) => SlideType::Horizontal3ColumnList,
            Slide::TwoColumnsWithGrid(_) => SlideType::TwoColumnsWithGrid,
            Slide::Horizontal4ColumnList(_) => SlideType::Horizontal4ColumnList,
            Slide::ImageWithDescription2(_) => SlideType::ImageWithDescription2,
            Slide::ImageWithDescription3(_) => SlideType::ImageWithDescription3,
            Slide::ThreeColumnMetrics(_) => SlideType::ThreeColumnMetrics,
            Slide::MetricsGrid(_) => SlideType::MetricsGrid,
            Slide::Quote(_) => SlideType::Quote,
        }
    }

    /// Figure-reference fields with their display paths.
    pub fn figure_fields_mut(&mut self) -> Vec<(String, &mut String)> {
        match self {
            Slide::SingleContentWithImage(c) => vec![("image_url".to_string(), &mut c.image_url)],
            Slide::ImageWithDescription2(c) | Slide::ImageWithDescription3(c) => c
                .images
                .iter_mut()
                .enumerate()
                .map(|(i, img)| (format!("images[{i}].url"), &mut img.url))
                .collect(),
            Slide::TitleSlide(_)
            | Slide::SectionTitle(_)
            | Slide::Highlight(_)
            | Slide::TwoColumnList(_)
            | Slide::VerticalList(_)
            | Slide::Horizontal3ColumnList(_)
            | Slide::TwoColumnsWithGrid(_)
            | Slide::Horizontal4ColumnList(_)
            | Slide::ThreeColumnMetrics(_)
            | Slide::MetricsGrid(_)
            | Slide::Quote(_) => Vec::new(),
        }
    }

    /// Current values of the figure-reference fields.
    pub fn figure_refs(&self) -> Vec<&str> {
        match self {
            Slide::SingleContentWithImage(c) => vec![c.image_url.as_str()],
            Slide::ImageWithDescription2(c) | Slide::ImageWithDescription3(c) => {
                c.images.iter().map(|img| img.url.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Every free-text field, i.e. every string except figure references.
    pub fn text_fields_mut(&mut self) -> Vec<&mut String> {
        fn list_items(items: &mut [ListItem]) -> impl Iterator<Item = &mut String> {
            items
                .iter_mut()
                .flat_map(|i| [&mut i.title, &mut i.description])
        }

        match self {
            Slide::TitleSlide(c) => vec![&mut c.title, &mut c.subtitle],
            Slide::SectionTitle(c) => vec![&mut c.title],
            Slide::SingleContentWithImage(c) => {
                vec![&mut c.title, &mut c.description, &mut c.image_alt]
            }
            Slide::Highlight(c) => vec![&mut c.title, &mut c.content],
            Slide::TwoColumnList(c)
            | Slide::VerticalList(c)
            | Slide::Horizontal3ColumnList(c)
            | Slide::TwoColumnsWithGrid(c)
            | Slide::Horizontal4ColumnList(c) => std::iter::once(&mut c.title)
                .chain(list_items(&mut c.items))
                .collect(),
            Slide::ImageWithDescription2(c) | Slide::ImageWithDescription3(c) => {
                std::iter::once(&mut c.title)
                    .chain(c.images.iter_mut().map(|img| &mut img.alt))
                    .chain(list_items(&mut c.items))
                    .collect()
            }
            Slide::ThreeColumnMetrics(c) => std::iter::once(&mut c.title)
                .chain(
                    c.metrics
                        .iter_mut()
                        .flat_map(|m| [&mut m.value, &mut m.description]),
                )
                .collect(),
            Slide::MetricsGrid(c) => [&mut c.title, &mut c.description]
                .into_iter()
                .chain(c.metrics.iter_mut().flat_map(|m| [&mut m.value, &mut m.label]))
                .collect(),
            Slide::Quote(c) => vec![&mut c.quote, &mut c.author],
        }
    }
}
