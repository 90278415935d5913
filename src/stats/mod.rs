//! Population statistics
//!
//! [`AggregateStats`] is the result of one streaming totalization pass over a
//! dataset: the sum of absolute values of the value column and the number of
//! data rows. It is created fresh for every run and never mutated after the
//! pass completes.
//!
//! When a significance threshold is supplied, the same pass also produces the
//! adjusted total (rows above the threshold left out) and the number of rows
//! that were left out.
//!
//! # Example
//!
//! ```
//! use auditsample::stats::AggregateStats;
//!
//! let mut stats = AggregateStats::default();
//! stats.record(Some(-40.0), Some(30.0));
//! stats.record(Some(10.0), Some(30.0));
//! stats.record(None, Some(30.0));
//!
//! assert_eq!(stats.total_absolute_value, 50.0);
//! assert_eq!(stats.adjusted_total, 10.0);
//! assert_eq!(stats.above_threshold_count, 1);
//! assert_eq!(stats.row_count, 3);
//! ```

pub mod aggregator;

pub use aggregator::{aggregate, AggregateOptions};

use serde::{Deserialize, Serialize};

/// Totals over the data rows of a dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    /// Sum of `|value|` over all data rows; unparsable cells count as 0
    pub total_absolute_value: f64,
    /// Number of data rows (header excluded)
    pub row_count: u64,
    /// Sum of `|value|` over rows at or below the threshold
    ///
    /// Equals `total_absolute_value` when no threshold was given.
    pub adjusted_total: f64,
    /// Rows whose `|value|` exceeds the threshold
    pub above_threshold_count: u64,
    /// Rows whose value cell could not be parsed
    pub unparsable_count: u64,
}

impl AggregateStats {
    /// Account for one data row
    ///
    /// `value` is the parsed cell (`None` when unparsable); `threshold` is the
    /// significance level, if exclusion is being measured.
    pub fn record(&mut self, value: Option<f64>, threshold: Option<f64>) {
        self.row_count += 1;

        let abs = match value {
            Some(v) => v.abs(),
            None => {
                self.unparsable_count += 1;
                0.0
            }
        };

        self.total_absolute_value += abs;
        match threshold {
            Some(t) if abs > t => self.above_threshold_count += 1,
            _ => self.adjusted_total += abs,
        }
    }

    /// Total rounded up to whole units, as reported to users
    pub fn total_ceil(&self) -> f64 {
        self.total_absolute_value.ceil()
    }

    /// Total the monetary walk should spread its hits over
    pub fn walk_total(&self, exclusion_active: bool) -> f64 {
        if exclusion_active {
            self.adjusted_total
        } else {
            self.total_absolute_value
        }
    }
}
