//! Content resolver: figure identifiers → URLs, and scrubbing of identifiers
//! that leaked into prose.
//!
//! Runs after generation over the validated slide list. Deterministic, no I/O.
//!
//! Figure fields (`image_url`, `images[].url`):
//!
//! | value                         | result                               |
//! |-------------------------------|--------------------------------------|
//! | empty                         | unchanged                            |
//! | known identifier              | that figure's URL                    |
//! | already an indexed URL        | unchanged                            |
//! | anything else                 | emptied + [`ResolveWarning`]         |
//!
//! Free-text fields: identifier-shaped tokens (`S3.F1`, `Figure S3.F1`,
//! `Fig. S3.F1`) become `(see figure)`. Index identifiers of any other shape
//! (`1`, `fig-attn`) are only replaced after a `Figure` / `Fig.` prefix, so
//! `28.1 days` survives an index that contains `1`.
//!
//! Because a resolved figure field always holds an indexed URL (or nothing)
//! and the placeholder can never start a match, running the resolver twice
//! yields the same slide.

use crate::error::ResolveWarning;
use crate::pipeline::index::FigureIndex;
use crate::slide::Slide;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use tracing::warn;

/// Replaces figure identifiers found in prose.
pub const FIGURE_PLACEHOLDER: &str = "(see figure)";

/// Identifier-shaped token, optionally preceded by `Figure` / `Fig.`.
/// Group 1 is the bare identifier.
pub(crate) static RE_FIGURE_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\b(?:[Ff]igure|[Ff]ig\.?)\s*)?\b(S\d+(?:\.\d+)*\.F\d+)\b").unwrap()
});

/// A slide after resolution plus what went wrong on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub slide: Slide,
    pub warnings: Vec<ResolveWarning>,
}

pub struct FigureResolver<'a> {
    index: &'a FigureIndex,
    /// `Figure <id>` / `Fig. <id>` for index identifiers the pattern would
    /// not catch.
    prefixed_ids: Option<Regex>,
}

impl<'a> FigureResolver<'a> {
    pub fn new(index: &'a FigureIndex) -> Self {
        // Longest first so that overlapping identifiers match whole.
        let mut odd: Vec<&str> = index
            .ids()
            .filter(|id| !RE_FIGURE_REF.is_match(id) && is_scrubbable(id))
            .collect();
        odd.sort_by_key(|id| std::cmp::Reverse(id.len()));

        let prefixed_ids = if odd.is_empty() {
            None
        } else {
            let alternation = odd
                .iter()
                .map(|id| regex::escape(id))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"\b(?:[Ff]igure|[Ff]ig\.?)\s*(?:{alternation})\b")).ok()
        };

        Self {
            index,
            prefixed_ids,
        }
    }

    /// Resolve one slide. `slide_number` is only used in warnings.
    pub fn resolve(&self, slide_number: usize, slide: &Slide) -> Resolved {
        let mut slide = slide.clone();
        let mut warnings = Vec::new();

        for (field, value) in slide.figure_fields_mut() {
            if value.is_empty() {
                continue;
            }
            let trimmed = value.trim();
            if let Some(fig) = self.index.get(trimmed) {
                *value = fig.url.clone();
            } else if self.index.is_indexed_url(value.as_str()) {
                // already resolved
            } else {
                warn!(
                    "Slide {}: figure '{}' in '{}' not in paper; field cleared",
                    slide_number, value, field
                );
                warnings.push(ResolveWarning::FigureUnresolved {
                    slide: slide_number,
                    field,
                    figure_id: std::mem::take(value),
                });
            }
        }

        for text in slide.text_fields_mut() {
            let scrubbed = match self.scrub(text) {
                Cow::Owned(s) => Some(s),
                Cow::Borrowed(_) => None,
            };
            if let Some(s) = scrubbed {
                *text = s;
            }
        }

        Resolved { slide, warnings }
    }

    /// Resolve `(slide_number, slide)` pairs, keeping their order.
    pub fn resolve_all(&self, slides: &[(usize, Slide)]) -> (Vec<Slide>, Vec<ResolveWarning>) {
        let mut out = Vec::with_capacity(slides.len());
        let mut warnings = Vec::new();
        for (n, slide) in slides {
            let r = self.resolve(*n, slide);
            out.push(r.slide);
            warnings.extend(r.warnings);
        }
        (out, warnings)
    }

    fn scrub<'t>(&self, text: &'t str) -> Cow<'t, str> {
        let first = RE_FIGURE_REF.replace_all(text, FIGURE_PLACEHOLDER);
        match &self.prefixed_ids {
            Some(re) if re.is_match(&first) => {
                Cow::Owned(re.replace_all(&first, FIGURE_PLACEHOLDER).into_owned())
            }
            _ => first,
        }
    }
}

/// Identifiers that can never match inside, or run into, the placeholder.
fn is_scrubbable(id: &str) -> bool {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    is_word(id.chars().next())
        && is_word(id.chars().last())
        && !id.contains(['(', ')'])
        && !FIGURE_PLACEHOLDER.contains(id)
}

/// Bare identifiers mentioned in `text`, in order of appearance.
pub(crate) fn figure_ids_in(text: &str) -> impl Iterator<Item = &str> {
    RE_FIGURE_REF
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::index::IndexedFigure;
    use crate::slide::{ImageDescriptionContent, ImageItem, ListItem, SingleContentWithImageContent};

    fn index() -> FigureIndex {
        [("S3.F1", "https://x/1.png"), ("fig-attn", "https://x/attn.png")]
            .into_iter()
            .map(|(id, url)| IndexedFigure {
                figure_id: id.into(),
                url: url.into(),
                caption: String::new(),
                width: None,
                height: None,
            })
            .collect()
    }

    fn single(url: &str, description: &str) -> Slide {
        Slide::SingleContentWithImage(SingleContentWithImageContent {
            title: "Architecture".into(),
            description: description.into(),
            image_url: url.into(),
            image_alt: "diagram".into(),
        })
    }

    fn image_url(slide: &Slide) -> &str {
        match slide {
            Slide::SingleContentWithImage(c) => &c.image_url,
            _ => unreachable!(),
        }
    }

    fn description(slide: &Slide) -> &str {
        match slide {
            Slide::SingleContentWithImage(c) => &c.description,
            _ => unreachable!(),
        }
    }

    #[test]
    fn known_id_becomes_url() {
        let idx = index();
        let r = FigureResolver::new(&idx).resolve(1, &single("S3.F1", "d"));
        assert_eq!(image_url(&r.slide), "https://x/1.png");
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn unknown_id_is_cleared_with_warning() {
        let idx = index();
        let r = FigureResolver::new(&idx).resolve(4, &single("S9.F9", "d"));
        assert_eq!(image_url(&r.slide), "");
        assert_eq!(
            r.warnings,
            vec![ResolveWarning::FigureUnresolved {
                slide: 4,
                field: "image_url".into(),
                figure_id: "S9.F9".into(),
            }]
        );
    }

    #[test]
    fn invented_url_is_cleared() {
        let idx = index();
        let r = FigureResolver::new(&idx).resolve(1, &single("https://evil/x.png", "d"));
        assert_eq!(image_url(&r.slide), "");
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn empty_field_stays_empty_without_warning() {
        let idx = index();
        let r = FigureResolver::new(&idx).resolve(1, &single("", "d"));
        assert_eq!(image_url(&r.slide), "");
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn ids_in_prose_are_replaced() {
        let idx = index();
        let r = FigureResolver::new(&idx).resolve(
            1,
            &single("", "As Figure S3.F1 shows, and S4.2.F3 too; see Fig. fig-attn."),
        );
        assert_eq!(
            description(&r.slide),
            "As (see figure) shows, and (see figure) too; see (see figure)."
        );
    }

    fn index_with(ids: &[&str]) -> FigureIndex {
        ids.iter()
            .map(|id| IndexedFigure {
                figure_id: (*id).into(),
                url: format!("https://x/{id}.png"),
                caption: String::new(),
                width: None,
                height: None,
            })
            .collect()
    }

    #[test]
    fn numeric_id_leaves_prose_numbers_alone() {
        let idx = index_with(&["1", "2"]);
        let resolver = FigureResolver::new(&idx);
        let r = resolver.resolve(1, &single("1", "Trained on 1 GPU for 28.1 days (Table 2)."));
        assert_eq!(image_url(&r.slide), "https://x/1.png");
        assert_eq!(description(&r.slide), "Trained on 1 GPU for 28.1 days (Table 2).");

        let r = resolver.resolve(1, &single("", "As Fig. 1 shows, Figure 2 agrees; Fig. 12 differs."));
        assert_eq!(
            description(&r.slide),
            "As (see figure) shows, (see figure) agrees; Fig. 12 differs."
        );
    }

    #[test]
    fn placeholder_words_as_ids_stay_idempotent() {
        let idx = index_with(&["figure", "see", "1"]);
        let resolver = FigureResolver::new(&idx);
        let slide = single("", "See Figure 1 and the figure below.");
        let once = resolver.resolve(1, &slide);
        let twice = resolver.resolve(1, &once.slide);
        assert_eq!(description(&once.slide), "See (see figure) and the figure below.");
        assert_eq!(once.slide, twice.slide);
    }

    #[test]
    fn resolution_is_idempotent() {
        let idx = index();
        let resolver = FigureResolver::new(&idx);
        let slide = Slide::ImageWithDescription2(ImageDescriptionContent {
            title: "Fig. S3.F1 vs S5.F2".into(),
            images: vec![
                ImageItem { url: "S3.F1".into(), alt: "a".into() },
                ImageItem { url: "S7.F7".into(), alt: "b".into() },
            ],
            items: vec![
                ListItem { title: "x".into(), description: "y".into() },
                ListItem { title: "z".into(), description: "w".into() },
            ],
        });
        let once = resolver.resolve(2, &slide);
        let twice = resolver.resolve(2, &once.slide);
        assert_eq!(once.slide, twice.slide);
        assert!(twice.warnings.is_empty());
        assert_eq!(once.warnings.len(), 1);
    }

    #[test]
    fn resolve_all_keeps_order_and_collects_warnings() {
        let idx = index();
        let (slides, warnings) = FigureResolver::new(&idx).resolve_all(&[
            (1, single("S3.F1", "a")),
            (3, single("S0.F0", "b")),
        ]);
        assert_eq!(image_url(&slides[0]), "https://x/1.png");
        assert_eq!(image_url(&slides[1]), "");
        assert!(matches!(&warnings[0], ResolveWarning::FigureUnresolved { slide: 3, .. }));
    }

    #[test]
    fn figure_ids_in_finds_bare_ids() {
        let ids: Vec<&str> = figure_ids_in("Use Figure S3.F1 and S3.1.F2").collect();
        assert_eq!(ids, vec!["S3.F1", "S3.1.F2"]);
    }
}
