//! Streaming totalization pass
//!
//! Walks a [`PagedDataSource`] batch by batch and folds every data row of the
//! value column into an [`AggregateStats`]. Working memory is one batch,
//! whatever the size of the dataset, and the result does not depend on the
//! batch size chosen: rows are always folded in dataset order.
//!
//! # Example
//!
//! ```
//! use auditsample::source::memory::MemorySource;
//! use auditsample::stats::{aggregate, AggregateOptions};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let mut source = MemorySource::from_values("amount", &[10.0, -20.0, 30.0]);
//! let stats = aggregate(&mut source, 0, &AggregateOptions::default()).await?;
//! assert_eq!(stats.total_absolute_value, 60.0);
//! assert_eq!(stats.row_count, 3);
//! # Ok::<(), auditsample::SamplingError>(())
//! # }).unwrap();
//! ```

use super::AggregateStats;
use crate::error::SamplingError;
use crate::source::{BatchReader, CancelToken, PagedDataSource, RangeShape, DEFAULT_BATCH_SIZE, DEFAULT_YIELD_EVERY};
use crate::util::number::parse_number;
use tracing::{info, warn};

/// Data rows above which a run is reported as large
pub const LARGE_DATASET_THRESHOLD: u64 = 50_000;

/// Data rows above which a run is reported as memory critical
pub const MEMORY_CRITICAL_THRESHOLD: u64 = 200_000;

/// Tuning for a totalization pass
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Rows per read batch
    pub batch_size: usize,
    /// Significance level for the adjusted total, if exclusion is measured
    pub threshold: Option<f64>,
    /// Batches between cooperative yields
    pub yield_every: u64,
    /// Checked at every batch boundary
    pub cancel: Option<CancelToken>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            threshold: None,
            yield_every: DEFAULT_YIELD_EVERY,
            cancel: None,
        }
    }
}

/// Reject a value column outside the range before any row is read
pub(crate) fn check_value_column(shape: &RangeShape, value_column: usize) -> Result<(), SamplingError> {
    if value_column as u64 >= shape.column_count {
        return Err(SamplingError::config(format!(
            "value column {} is outside the data range ({} columns)",
            value_column + 1,
            shape.column_count
        )));
    }
    Ok(())
}

/// Log how heavy the coming pass will be
pub(crate) fn log_dataset_size(shape: &RangeShape) {
    let rows = shape.data_rows();
    if rows > MEMORY_CRITICAL_THRESHOLD {
        warn!(rows, "very large dataset; consider splitting the data");
    } else if rows > LARGE_DATASET_THRESHOLD {
        warn!(rows, "large dataset; processing may take a while");
    }
}

/// Compute the totals of `value_column` over every data row of `source`
pub async fn aggregate(
    source: &mut dyn PagedDataSource,
    value_column: usize,
    options: &AggregateOptions,
) -> Result<AggregateStats, SamplingError> {
    let shape = source.shape();
    check_value_column(&shape, value_column)?;
    if let Some(t) = options.threshold {
        if !t.is_finite() || t < 0.0 {
            return Err(SamplingError::config(format!(
                "significance threshold must be a non-negative number, got {}",
                t
            )));
        }
    }
    log_dataset_size(&shape);

    let mut stats = AggregateStats::default();
    let mut reader = BatchReader::new(source, options.batch_size)
        .with_yield_every(options.yield_every)
        .with_cancel(options.cancel.clone());

    while let Some(batch) = reader.next_batch().await? {
        for (_, row) in batch.data_rows() {
            let value = row.get(value_column).and_then(parse_number);
            stats.record(value, options.threshold);
        }
    }

    info!(
        total = stats.total_absolute_value,
        rows = stats.row_count,
        adjusted = stats.adjusted_total,
        above_threshold = stats.above_threshold_count,
        batches = reader.batches_read(),
        "aggregation complete"
    );

    Ok(stats)
}
