//! auditsample - streaming audit sampling over tabular data
//!
//! Selects audit samples from a dataset that may be far larger than memory,
//! reading it page by page through an async [`source::PagedDataSource`] and
//! writing per-row annotations to a [`source::ResultSink`].
//!
//! # Architecture
//!
//! - **Totalization**: one streaming pass sums `|value|` and counts rows, with
//!   an optional significance threshold for the adjusted total
//! - **Sample size**: the monetary formula, a user override, or the attribute
//!   fallback, with the reliability factor taken from a risk table
//! - **Selection**: monetary-unit interval, row interval, or simple random,
//!   all driven by a seed-derived generator so a reviewer can reproduce them
//! - **Output**: annotation columns next to the data, text and JSON summaries,
//!   and a parameter report

pub mod config;
pub mod error;
pub mod output;
pub mod rng;
pub mod sampling;
pub mod source;
pub mod stats;
pub mod util;

// Re-export commonly used types
pub use config::Config;
pub use error::SamplingError;
pub use sampling::{run_sampling, Method, SamplingContext, SamplingOutcome, SamplingRequest};

/// Result type used by collaborators and the binary
pub type Result<T> = anyhow::Result<T>;
