//! Pipeline stages for paper-to-slides conversion.
//!
//! Each submodule implements exactly one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ index ──▶ planner ──▶ generator ──▶ resolver
//! (JSON)   (figures,  (1 call,    (N calls,     (ids → URLs)
//!           sections)  outline)    validated)
//! ```
//!
//! 1. [`input`]     — read the paper from a path or URL
//! 2. [`index`]     — figure index and capped section texts
//! 3. [`planner`]   — one model call producing the outline
//! 4. [`generator`] — per-entry generation with validation-driven retry
//! 5. [`resolver`]  — replace figure identifiers with real URLs
//!
//! [`llm`] is the seam between the model-calling stages and any backend.

pub mod generator;
pub mod index;
pub mod input;
pub mod llm;
pub mod planner;
pub mod resolver;
