//! Per-row annotations written next to the dataset
//!
//! The annotation block starts at the header row of the range, one column to
//! the right of it. The monetary walk writes five columns, the positional and
//! random methods write two:
//!
//! | Method             | Columns                                        |
//! |--------------------|------------------------------------------------|
//! | monetary interval  | ABS, Kumulace ABS, Index/krok, Výběr, Důvod    |
//! | row interval       | Pořadí, Výběr                                  |
//! | simple random      | Pořadí, Výběr                                  |
//!
//! [`ResultWriter`] buffers rows and hands them to the sink in blocks of the
//! output batch size, so a host never sees more than one block in flight.

use crate::error::SamplingError;
use crate::sampling::{Hit, SelectionReason, SelectionResult};
use crate::source::{Cell, RangeShape, ResultSink, RowPosition};
use tracing::debug;

/// Header of the monetary walk's annotation block
pub const MONETARY_HEADERS: [&str; 5] = ["ABS", "Kumulace ABS", "Index/krok", "Výběr", "Důvod"];

/// Header of the positional and random annotation block
pub const POSITIONAL_HEADERS: [&str; 2] = ["Pořadí", "Výběr"];

/// Label of a row that was not selected
pub const NOT_SELECTED: &str = "Ne";

const SIGNIFICANCE_LABEL: &str = "Ano - významnost";
const SIGNIFICANCE_REASON: &str = "přesah významnosti";
const MONETARY_REASON: &str = "NPP";

fn hit_label(hit: &Hit) -> String {
    let (tag, count) = match hit {
        Hit::Monetary(n) => ("NPP", *n),
        Hit::Positional(n) => ("NGČ", *n),
        Hit::RandomIndex => ("NGČ", 1),
    };
    if count > 1 {
        format!("Ano - {} (x{})", tag, count)
    } else {
        format!("Ano - {}", tag)
    }
}

/// Text of the `Výběr` column
pub fn selection_label(reason: &SelectionReason) -> String {
    match reason {
        SelectionReason::None => NOT_SELECTED.to_string(),
        SelectionReason::Hit(hit) => hit_label(hit),
        SelectionReason::AboveThreshold => SIGNIFICANCE_LABEL.to_string(),
        SelectionReason::AboveThresholdAndHit(hit) => format!("{}; {}", SIGNIFICANCE_LABEL, hit_label(hit)),
    }
}

/// Text of the monetary `Důvod` column
pub fn reason_label(reason: &SelectionReason) -> String {
    match reason {
        SelectionReason::None => String::new(),
        SelectionReason::Hit(_) => MONETARY_REASON.to_string(),
        SelectionReason::AboveThreshold => SIGNIFICANCE_REASON.to_string(),
        SelectionReason::AboveThresholdAndHit(_) => format!("{}; {}", SIGNIFICANCE_REASON, MONETARY_REASON),
    }
}

/// Monetary annotation: absolute value, running cumulative, cumulative / step, label, reason
pub fn monetary_row(result: &SelectionResult, abs: f64, cumulative: f64, step_index: f64) -> Vec<Cell> {
    vec![
        Cell::Number(abs),
        Cell::Number(cumulative),
        Cell::Number(step_index),
        Cell::Text(selection_label(&result.reason)),
        Cell::Text(reason_label(&result.reason)),
    ]
}

/// Positional annotation: order within the range (header = 0), label
pub fn positional_row(result: &SelectionResult) -> Vec<Cell> {
    vec![
        Cell::from(result.position.range_row),
        Cell::Text(selection_label(&result.reason)),
    ]
}

/// Positional annotation of a row that was never read
pub fn unselected_positional_row(position: RowPosition) -> Vec<Cell> {
    vec![Cell::from(position.range_row), Cell::from(NOT_SELECTED)]
}

/// Buffered writer of one annotation block
pub struct ResultWriter<'a> {
    sink: &'a mut dyn ResultSink,
    shape: RangeShape,
    column: u64,
    batch_size: usize,
    pending: Vec<Vec<Cell>>,
    pending_start: u64,
    rows_written: u64,
    blocks_written: u64,
}

impl<'a> ResultWriter<'a> {
    /// Writer placing its block right of `shape`
    pub fn new(sink: &'a mut dyn ResultSink, shape: RangeShape, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            shape,
            column: shape.next_free_col(),
            batch_size,
            pending: Vec::with_capacity(batch_size),
            pending_start: shape.origin_row + 1,
            rows_written: 0,
            blocks_written: 0,
        }
    }

    /// Sheet column of the first annotation column
    pub fn column(&self) -> u64 {
        self.column
    }

    /// Data rows handed to the sink so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Write the header row at the range origin
    pub async fn write_header(&mut self, headers: &[&str]) -> Result<(), SamplingError> {
        let row = headers.iter().map(|h| Cell::from(*h)).collect();
        let origin = self.shape.origin_row;
        self.sink
            .write_batch(origin, self.column, vec![row])
            .await
            .map_err(|source| SamplingError::Write { row: origin, source })
    }

    /// Queue the annotation for `position`, flushing a full block
    pub async fn push(&mut self, position: RowPosition, cells: Vec<Cell>) -> Result<(), SamplingError> {
        let sheet_row = position.sheet_row(&self.shape);
        if !self.pending.is_empty() && sheet_row != self.pending_start + self.pending.len() as u64 {
            self.flush_pending().await?;
        }
        if self.pending.is_empty() {
            self.pending_start = sheet_row;
        }
        self.pending.push(cells);
        if self.pending.len() >= self.batch_size {
            self.flush_pending().await?;
        }
        Ok(())
    }

    async fn flush_pending(&mut self) -> Result<(), SamplingError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let rows = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let count = rows.len() as u64;
        let start = self.pending_start;
        self.sink
            .write_batch(start, self.column, rows)
            .await
            .map_err(|source| SamplingError::Write { row: start, source })?;

        self.rows_written += count;
        self.blocks_written += 1;
        debug!(block = self.blocks_written, row = start, rows = count, "wrote annotations");
        Ok(())
    }

    /// Write whatever is buffered and flush the sink
    pub async fn finish(mut self) -> Result<u64, SamplingError> {
        self.flush_pending().await?;
        let row = self.pending_start + self.pending.len() as u64;
        self.sink
            .flush()
            .await
            .map_err(|source| SamplingError::Write { row, source })?;
        Ok(self.rows_written)
    }
}
