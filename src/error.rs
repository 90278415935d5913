//! Error taxonomy for sampling runs
//!
//! Unparsable cells are not errors: they count as 0 and never surface.
//! Everything else aborts the run with exactly one of these variants.

use thiserror::Error;

/// Fatal outcome of an aggregation or sampling run
#[derive(Debug, Error)]
pub enum SamplingError {
    /// Missing or invalid input; raised before any I/O or output
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Non-finite or non-positive step, interval or total; raised before the selection pass
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Paged read failed; batches already processed stay processed
    #[error("failed to read data at row {offset}: {source:#}")]
    Read {
        offset: u64,
        #[source]
        source: anyhow::Error,
    },

    /// Result write failed; earlier batches remain written
    #[error("failed to write results at row {row}: {source:#}")]
    Write {
        row: u64,
        #[source]
        source: anyhow::Error,
    },

    /// The host abandoned the run at a batch boundary
    #[error("operation cancelled before row {offset}")]
    Cancelled { offset: u64 },
}

impl SamplingError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateInput(msg.into())
    }
}
