//! Sample selection
//!
//! Three selection methods share one streaming pipeline:
//!
//! - **Monetary interval** ([`interval`]): a systematic walk over the
//!   cumulative absolute value. A row is hit once for every interval boundary
//!   that falls inside its value.
//! - **Row interval** ([`interval`]): the same walk over row positions, every
//!   row contributing exactly one unit, wrapping around the end of the data.
//! - **Simple random** ([`random_index`]): distinct row indices drawn uniformly.
//!
//! Every run reads the dataset in batches, annotates every data row and
//! writes the annotations through a [`ResultWriter`](crate::output::annotate::ResultWriter).
//! Memory stays proportional to one batch plus the chosen sample.
//!
//! Configuration and degenerate-input errors are raised before anything is
//! written to the sink.
//!
//! # Example
//!
//! ```
//! use auditsample::sampling::{run_sampling, Method, SamplingContext, SamplingRequest};
//! use auditsample::source::memory::{MemorySink, MemorySource};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut source = MemorySource::from_values("amount", &[10.0; 10]);
//! let mut sink = MemorySink::new();
//! let ctx = SamplingContext::new(SamplingRequest {
//!     method: Method::MonetaryInterval,
//!     sample_size: 5,
//!     seed: Some("fixed".into()),
//!     total_value: None,
//!     exclude_threshold: None,
//! }, 0);
//! let outcome = run_sampling(&mut source, &mut sink, &ctx).await?;
//! assert_eq!(outcome.hits_distributed, 5);
//! # Ok::<(), auditsample::SamplingError>(())
//! # }).unwrap();
//! ```

pub mod interval;
pub mod random_index;
pub mod size;

use crate::error::SamplingError;
use crate::output::annotate::selection_label;
use crate::rng::{self, UnitRandom};
use crate::source::{
    CancelToken, PagedDataSource, RangeShape, ResultSink, RowPosition, DEFAULT_BATCH_SIZE,
    DEFAULT_OUTPUT_BATCH_SIZE, DEFAULT_YIELD_EVERY,
};
use crate::stats::aggregator::{check_value_column, log_dataset_size};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Selection method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Systematic walk over cumulative absolute value
    #[default]
    MonetaryInterval,
    /// Systematic walk over row positions, wrapping at the end
    RowInterval,
    /// Distinct uniformly drawn row indices
    SimpleRandom,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::MonetaryInterval => "monetary-interval",
            Method::RowInterval => "row-interval",
            Method::SimpleRandom => "simple-random",
        };
        f.write_str(name)
    }
}

/// Why a walk or draw landed on a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Hit {
    /// Interval boundaries crossed by the row's value
    Monetary(u64),
    /// Interval positions landing on the row
    Positional(u64),
    /// Drawn by simple random selection
    RandomIndex,
}

impl Hit {
    pub fn count(&self) -> u64 {
        match self {
            Hit::Monetary(n) | Hit::Positional(n) => *n,
            Hit::RandomIndex => 1,
        }
    }
}

/// Why a row is (or is not) in the sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SelectionReason {
    #[default]
    None,
    Hit(Hit),
    /// `|value|` exceeds the significance threshold
    AboveThreshold,
    AboveThresholdAndHit(Hit),
}

impl SelectionReason {
    /// Combine a hit (if any) with the threshold test
    pub fn compose(hit: Option<Hit>, above_threshold: bool) -> Self {
        match (hit, above_threshold) {
            (None, false) => SelectionReason::None,
            (Some(h), false) => SelectionReason::Hit(h),
            (None, true) => SelectionReason::AboveThreshold,
            (Some(h), true) => SelectionReason::AboveThresholdAndHit(h),
        }
    }

    pub fn is_selected(&self) -> bool {
        !matches!(self, SelectionReason::None)
    }

    pub fn hit_count(&self) -> u64 {
        match self {
            SelectionReason::Hit(h) | SelectionReason::AboveThresholdAndHit(h) => h.count(),
            _ => 0,
        }
    }

    pub fn above_threshold(&self) -> bool {
        matches!(
            self,
            SelectionReason::AboveThreshold | SelectionReason::AboveThresholdAndHit(_)
        )
    }
}

/// Verdict for one data row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionResult {
    pub position: RowPosition,
    pub reason: SelectionReason,
}

/// What to sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingRequest {
    pub method: Method,
    /// Requested number of hits, at least 1
    pub sample_size: u64,
    /// Seed string; `None` or empty means not reproducible
    pub seed: Option<String>,
    /// Precomputed walk total; computed by a totalization pass when absent
    pub total_value: Option<f64>,
    /// Significance threshold; `Some` turns exclusion on
    pub exclude_threshold: Option<f64>,
}

/// Batch sizes and scheduling of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub batch_size: usize,
    pub output_batch_size: usize,
    pub yield_every: u64,
}

impl Default for Paging {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            output_batch_size: DEFAULT_OUTPUT_BATCH_SIZE,
            yield_every: DEFAULT_YIELD_EVERY,
        }
    }
}

/// Immutable inputs of one sampling run
///
/// Built once from configuration and passed to every stage; nothing in a run
/// reads shared mutable state.
#[derive(Debug, Clone)]
pub struct SamplingContext {
    pub request: SamplingRequest,
    /// 0-based column of the value within the range
    pub value_column: usize,
    pub paging: Paging,
    pub cancel: Option<CancelToken>,
}

impl SamplingContext {
    /// Context with default paging and no cancellation
    pub fn new(request: SamplingRequest, value_column: usize) -> Self {
        Self {
            request,
            value_column,
            paging: Paging::default(),
            cancel: None,
        }
    }

    pub fn with_paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether rows above the threshold are taken out of the walk
    pub fn exclusion_active(&self) -> bool {
        self.request.exclude_threshold.is_some()
    }

    /// True when `abs` is above the significance threshold and exclusion is on
    pub fn is_above_threshold(&self, abs: f64) -> bool {
        self.request.exclude_threshold.map_or(false, |t| abs > t)
    }

    /// Fail with [`SamplingError::Cancelled`] if the host gave up
    pub(crate) fn check_cancelled(&self, offset: u64) -> Result<(), SamplingError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(SamplingError::Cancelled { offset }),
            _ => Ok(()),
        }
    }

    /// Reject unusable inputs before any I/O
    pub fn validate(&self, shape: &RangeShape) -> Result<(), SamplingError> {
        let request = &self.request;
        if request.sample_size == 0 {
            return Err(SamplingError::config("sample size must be at least 1"));
        }
        if let Some(t) = request.exclude_threshold {
            if !t.is_finite() || t < 0.0 {
                return Err(SamplingError::config(format!(
                    "significance threshold must be a non-negative number, got {}",
                    t
                )));
            }
        }
        if let Some(total) = request.total_value {
            if !total.is_finite() || total < 0.0 {
                return Err(SamplingError::config(format!(
                    "total value must be a non-negative number, got {}",
                    total
                )));
            }
        }
        if self.paging.batch_size == 0 || self.paging.output_batch_size == 0 {
            return Err(SamplingError::config("batch sizes must be at least 1"));
        }
        check_value_column(shape, self.value_column)
    }
}

/// A row that received at least one hit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampledItem {
    pub position: RowPosition,
    pub hits: u64,
    pub above_threshold: bool,
    /// Parsed value of the row, `None` when unparsable
    pub value: Option<f64>,
    pub label: String,
}

/// Summary of a completed sampling run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingOutcome {
    pub method: Method,
    pub sample_size: u64,
    pub data_rows: u64,
    /// Total the walk was spread over (monetary), or the supplied total
    pub total_value: Option<f64>,
    pub step: Option<f64>,
    pub start: Option<f64>,
    /// Sum of hit counts over all rows
    pub hits_distributed: u64,
    /// Rows with at least one hit
    pub selected_rows: u64,
    /// Rows flagged by the significance threshold
    pub above_threshold_rows: u64,
    pub seed: Option<String>,
    pub reproducible: bool,
    /// Annotation rows written, header excluded
    pub rows_written: u64,
    /// Rows with hits, in dataset order
    pub items: Vec<SampledItem>,
}

impl SamplingOutcome {
    pub(crate) fn new(ctx: &SamplingContext, shape: &RangeShape, reproducible: bool) -> Self {
        Self {
            method: ctx.request.method,
            sample_size: ctx.request.sample_size,
            data_rows: shape.data_rows(),
            total_value: ctx.request.total_value,
            step: None,
            start: None,
            hits_distributed: 0,
            selected_rows: 0,
            above_threshold_rows: 0,
            seed: ctx.request.seed.clone().filter(|s| !s.is_empty()),
            reproducible,
            rows_written: 0,
            items: Vec::new(),
        }
    }

    /// Account for one annotated row
    pub(crate) fn record(&mut self, result: &SelectionResult, value: Option<f64>) {
        let hits = result.reason.hit_count();
        if result.reason.above_threshold() {
            self.above_threshold_rows += 1;
        }
        if hits > 0 {
            self.hits_distributed += hits;
            self.selected_rows += 1;
            self.items.push(SampledItem {
                position: result.position,
                hits,
                above_threshold: result.reason.above_threshold(),
                value,
                label: selection_label(&result.reason),
            });
        }
    }
}

/// Run the method named in `ctx` over `source`, annotating into `sink`
pub async fn run_sampling(
    source: &mut dyn PagedDataSource,
    sink: &mut dyn ResultSink,
    ctx: &SamplingContext,
) -> Result<SamplingOutcome, SamplingError> {
    let shape = source.shape();
    ctx.validate(&shape)?;
    log_dataset_size(&shape);

    let mut rng = rng::derive(ctx.request.seed.as_deref());
    if !rng.is_reproducible() {
        warn!("no seed supplied; this selection cannot be reproduced");
    }

    info!(
        method = %ctx.request.method,
        sample_size = ctx.request.sample_size,
        rows = shape.data_rows(),
        exclusion = ctx.exclusion_active(),
        "starting selection"
    );

    let outcome = run_method(source, sink, ctx, rng.as_mut()).await?;

    info!(
        method = %outcome.method,
        hits = outcome.hits_distributed,
        selected = outcome.selected_rows,
        above_threshold = outcome.above_threshold_rows,
        rows_written = outcome.rows_written,
        "selection complete"
    );
    Ok(outcome)
}

async fn run_method(
    source: &mut dyn PagedDataSource,
    sink: &mut dyn ResultSink,
    ctx: &SamplingContext,
    rng: &mut dyn UnitRandom,
) -> Result<SamplingOutcome, SamplingError> {
    match ctx.request.method {
        Method::MonetaryInterval => interval::run_monetary(source, sink, ctx, rng).await,
        Method::RowInterval => interval::run_positional(source, sink, ctx, rng).await,
        Method::SimpleRandom => random_index::run_random(source, sink, ctx, rng).await,
    }
}
