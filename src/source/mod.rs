//! Paged data source and result sink abstraction
//!
//! The sampling engine never sees the host that holds the data. It talks to a
//! [`PagedDataSource`] that returns rows by explicit offset, and writes its
//! per-row annotations to a [`ResultSink`]. Both are async so a host can
//! suspend at every batch boundary while it fetches or stores a page.
//!
//! # Range model
//!
//! A dataset is a rectangular range: row 0 is the header, rows `1..row_count`
//! are data. The range may sit anywhere on a sheet; [`RangeShape::origin_row`]
//! and [`RangeShape::origin_col`] locate it so sinks can place annotations
//! next to it.
//!
//! # Implementations
//!
//! - [`memory::MemorySource`] / [`memory::MemorySink`]: in-memory, with failure
//!   injection for tests
//! - [`csv::CsvSource`] / [`csv::CsvSink`]: CSV files, streamed
//!
//! # Example
//!
//! ```
//! use auditsample::source::{BatchReader, Cell, memory::MemorySource};
//!
//! # tokio_test_block(async {
//! let mut source = MemorySource::from_values("amount", &[10.0, 20.0, 30.0]);
//! let mut reader = BatchReader::new(&mut source, 2);
//! let mut seen = 0;
//! while let Some(batch) = reader.next_batch().await? {
//!     seen += batch.data_rows().count();
//! }
//! assert_eq!(seen, 3);
//! # Ok::<(), auditsample::SamplingError>(())
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod csv;
pub mod memory;

use crate::error::SamplingError;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default rows per read batch (host paging limit)
pub const DEFAULT_BATCH_SIZE: usize = 1500;

/// Default rows per write batch
pub const DEFAULT_OUTPUT_BATCH_SIZE: usize = 800;

/// Default number of batches between cooperative yields
pub const DEFAULT_YIELD_EVERY: u64 = 10;

/// A single cell value as the host reports it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Bool(bool),
    Text(String),
    Empty,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Text(s) => f.write_str(s),
            Cell::Empty => Ok(()),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<u64> for Cell {
    fn from(n: u64) -> Self {
        Cell::Number(n as f64)
    }
}

/// Location and size of the dataset range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeShape {
    /// Sheet row of the header (0-based)
    pub origin_row: u64,
    /// Sheet column of the first range column (0-based)
    pub origin_col: u64,
    /// Rows in the range, header included
    pub row_count: u64,
    /// Columns in the range
    pub column_count: u64,
}

impl RangeShape {
    /// Number of data rows (header excluded)
    pub fn data_rows(&self) -> u64 {
        self.row_count.saturating_sub(1)
    }

    /// First sheet column to the right of the range
    pub fn next_free_col(&self) -> u64 {
        self.origin_col + self.column_count
    }
}

/// Identity of a data row
///
/// Both conventions are carried together so callers never convert by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowPosition {
    /// 0-based index among data rows (header excluded)
    pub data_index: u64,
    /// Index within the range, header = 0 (so the first data row is 1)
    pub range_row: u64,
}

impl RowPosition {
    /// Position of the `data_index`-th data row
    pub fn from_data_index(data_index: u64) -> Self {
        Self {
            data_index,
            range_row: data_index + 1,
        }
    }

    /// Absolute sheet row for a range with the given shape
    pub fn sheet_row(&self, shape: &RangeShape) -> u64 {
        shape.origin_row + self.range_row
    }
}

/// One page of rows returned by a source
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Rows in range order
    pub rows: Vec<Vec<Cell>>,
    /// Offset of the first row within the range (0 = header)
    pub offset: u64,
}

impl Batch {
    /// Data rows of this batch with their positions
    ///
    /// The header is skipped only when the batch starts at offset 0.
    pub fn data_rows(&self) -> impl Iterator<Item = (RowPosition, &[Cell])> {
        let skip = usize::from(self.offset == 0);
        let offset = self.offset;
        self.rows
            .iter()
            .enumerate()
            .skip(skip)
            .map(move |(i, row)| {
                let range_row = offset + i as u64;
                (
                    RowPosition {
                        data_index: range_row - 1,
                        range_row,
                    },
                    row.as_slice(),
                )
            })
    }
}

/// Paged read access to a dataset
///
/// The engine always requests by explicit offset, in increasing order, one
/// batch at a time. Implementations may return fewer than `limit` rows but
/// must return at least one row for any offset below `row_count`.
#[async_trait]
pub trait PagedDataSource: Send {
    /// Location and size of the range
    fn shape(&self) -> RangeShape;

    /// Read up to `limit` rows starting at range offset `offset` (0 = header)
    async fn read_batch(&mut self, offset: u64, limit: usize) -> Result<Batch>;
}

/// Paged write access for annotations
///
/// Writes are best-effort and ordered; nothing is atomic across batches.
#[async_trait]
pub trait ResultSink: Send {
    /// Write a block of rows with its top-left corner at sheet `(start_row, start_col)`
    async fn write_batch(&mut self, start_row: u64, start_col: u64, rows: Vec<Vec<Cell>>) -> Result<()>;

    /// Make everything written so far durable
    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that drops every row, for runs that only need the summary
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

#[async_trait]
impl ResultSink for DiscardSink {
    async fn write_batch(&mut self, _start_row: u64, _start_col: u64, _rows: Vec<Vec<Cell>>) -> Result<()> {
        Ok(())
    }
}

/// Cooperative cancellation flag checked at batch boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the run stops before its next batch
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Lazy, finite sequence of batches over a source
///
/// Restartable per invocation: construct a new reader for every pass. Memory
/// use is one batch.
pub struct BatchReader<'a> {
    source: &'a mut dyn PagedDataSource,
    shape: RangeShape,
    batch_size: usize,
    offset: u64,
    batches_read: u64,
    yield_every: u64,
    cancel: Option<CancelToken>,
}

impl<'a> BatchReader<'a> {
    /// Create a reader starting at the header
    pub fn new(source: &'a mut dyn PagedDataSource, batch_size: usize) -> Self {
        let shape = source.shape();
        Self {
            source,
            shape,
            batch_size: batch_size.max(1),
            offset: 0,
            batches_read: 0,
            yield_every: DEFAULT_YIELD_EVERY,
            cancel: None,
        }
    }

    /// Yield to the runtime every `n` batches (0 disables)
    pub fn with_yield_every(mut self, n: u64) -> Self {
        self.yield_every = n;
        self
    }

    /// Check `token` before every batch
    pub fn with_cancel(mut self, token: Option<CancelToken>) -> Self {
        self.cancel = token;
        self
    }

    /// Shape of the underlying range
    pub fn shape(&self) -> RangeShape {
        self.shape
    }

    /// Range offset of the next batch
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Number of batches returned so far
    pub fn batches_read(&self) -> u64 {
        self.batches_read
    }

    /// Fetch the next batch, or `None` after the last row
    pub async fn next_batch(&mut self) -> std::result::Result<Option<Batch>, SamplingError> {
        if self.offset >= self.shape.row_count {
            return Ok(None);
        }

        if let Some(token) = &self.cancel {
            if token.is_cancelled() {
                return Err(SamplingError::Cancelled { offset: self.offset });
            }
        }

        if self.yield_every > 0 && self.batches_read > 0 && self.batches_read % self.yield_every == 0 {
            tokio::task::yield_now().await;
        }

        let remaining = self.shape.row_count - self.offset;
        let limit = remaining.min(self.batch_size as u64) as usize;
        let offset = self.offset;

        let batch = self
            .source
            .read_batch(offset, limit)
            .await
            .map_err(|source| SamplingError::Read { offset, source })?;

        if batch.rows.is_empty() {
            return Err(SamplingError::Read {
                offset,
                source: anyhow::anyhow!("source returned no rows before the end of the range"),
            });
        }
        if batch.offset != offset {
            return Err(SamplingError::Read {
                offset,
                source: anyhow::anyhow!("source returned offset {} instead of {}", batch.offset, offset),
            });
        }

        self.offset += batch.rows.len() as u64;
        self.batches_read += 1;
        debug!(
            batch = self.batches_read,
            offset,
            rows = batch.rows.len(),
            total = self.shape.row_count,
            "read batch"
        );

        Ok(Some(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemorySource;
    use super::*;

    #[test]
    fn test_row_position_conventions() {
        let pos = RowPosition::from_data_index(0);
        assert_eq!(pos.range_row, 1);
        let shape = RangeShape {
            origin_row: 4,
            origin_col: 2,
            row_count: 11,
            column_count: 3,
        };
        assert_eq!(pos.sheet_row(&shape), 5);
        assert_eq!(shape.data_rows(), 10);
        assert_eq!(shape.next_free_col(), 5);
    }

    #[test]
    fn test_batch_skips_header_only_at_offset_zero() {
        let first = Batch {
            rows: vec![vec![Cell::from("h")], vec![Cell::from(1.0)]],
            offset: 0,
        };
        let positions: Vec<_> = first.data_rows().map(|(p, _)| p.data_index).collect();
        assert_eq!(positions, vec![0]);

        let later = Batch {
            rows: vec![vec![Cell::from(2.0)], vec![Cell::from(3.0)]],
            offset: 2,
        };
        let positions: Vec<_> = later.data_rows().map(|(p, _)| p.range_row).collect();
        assert_eq!(positions, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_reader_covers_every_row_once() {
        let values: Vec<f64> = (1..=7).map(|v| v as f64).collect();
        let mut source = MemorySource::from_values("amount", &values);
        let mut reader = BatchReader::new(&mut source, 3);

        let mut indices = Vec::new();
        while let Some(batch) = reader.next_batch().await.unwrap() {
            indices.extend(batch.data_rows().map(|(p, _)| p.data_index));
        }
        assert_eq!(indices, (0..7).collect::<Vec<u64>>());
        assert_eq!(reader.batches_read(), 3);
    }

    #[tokio::test]
    async fn test_reader_honours_cancellation() {
        let mut source = MemorySource::from_values("amount", &[1.0, 2.0, 3.0, 4.0]);
        let token = CancelToken::new();
        let mut reader = BatchReader::new(&mut source, 2).with_cancel(Some(token.clone()));

        assert!(reader.next_batch().await.unwrap().is_some());
        token.cancel();
        match reader.next_batch().await {
            Err(SamplingError::Cancelled { offset }) => assert_eq!(offset, 2),
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reader_tags_failures_with_offset() {
        let mut source = MemorySource::from_values("amount", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        source.fail_reads_from(4);
        let mut reader = BatchReader::new(&mut source, 2);

        assert!(reader.next_batch().await.unwrap().is_some());
        assert!(reader.next_batch().await.unwrap().is_some());
        match reader.next_batch().await {
            Err(SamplingError::Read { offset, .. }) => assert_eq!(offset, 4),
            other => panic!("expected read error, got {:?}", other),
        }
    }
}
