//! Output formatting
//!
//! Per-row annotations go through a [`crate::source::ResultSink`]; summaries
//! are rendered as text or JSON, and the parameter report as a two-column CSV.

pub mod annotate;
pub mod json;
pub mod params;
pub mod text;
