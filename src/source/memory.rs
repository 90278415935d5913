//! In-memory source and sink
//!
//! Used in tests and by embedders that already hold the data. Both sides can be
//! told to fail from a given row onward so error paths can be exercised without
//! a real host, and both record what was requested for later verification.

use super::{Batch, Cell, PagedDataSource, RangeShape, ResultSink};
use crate::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Dataset held in memory (header row first)
#[derive(Debug, Clone)]
pub struct MemorySource {
    rows: Vec<Vec<Cell>>,
    origin_row: u64,
    origin_col: u64,
    fail_from: Option<u64>,
    reads: Vec<(u64, usize)>,
}

impl MemorySource {
    /// Create from full rows, the first being the header
    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        Self {
            rows,
            origin_row: 0,
            origin_col: 0,
            fail_from: None,
            reads: Vec::new(),
        }
    }

    /// Single-column dataset of numbers under `header`
    pub fn from_values(header: &str, values: &[f64]) -> Self {
        let mut rows = Vec::with_capacity(values.len() + 1);
        rows.push(vec![Cell::from(header)]);
        rows.extend(values.iter().map(|v| vec![Cell::Number(*v)]));
        Self::from_rows(rows)
    }

    /// Place the range at a sheet position other than A1
    pub fn with_origin(mut self, row: u64, col: u64) -> Self {
        self.origin_row = row;
        self.origin_col = col;
        self
    }

    /// Fail every read whose batch reaches range offset `offset`
    pub fn fail_reads_from(&mut self, offset: u64) {
        self.fail_from = Some(offset);
    }

    /// `(offset, limit)` of every read request so far
    pub fn reads(&self) -> &[(u64, usize)] {
        &self.reads
    }
}

#[async_trait]
impl PagedDataSource for MemorySource {
    fn shape(&self) -> RangeShape {
        RangeShape {
            origin_row: self.origin_row,
            origin_col: self.origin_col,
            row_count: self.rows.len() as u64,
            column_count: self.rows.first().map(|r| r.len()).unwrap_or(0) as u64,
        }
    }

    async fn read_batch(&mut self, offset: u64, limit: usize) -> Result<Batch> {
        self.reads.push((offset, limit));

        let end = (offset + limit as u64).min(self.rows.len() as u64);
        if let Some(fail_from) = self.fail_from {
            if end > fail_from {
                anyhow::bail!("simulated read failure");
            }
        }

        let rows = self.rows[offset as usize..end as usize].to_vec();
        Ok(Batch { rows, offset })
    }
}

/// Sink collecting written cells by sheet coordinate
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    cells: BTreeMap<(u64, u64), Cell>,
    writes: Vec<(u64, u64, usize)>,
    fail_from_row: Option<u64>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write whose block reaches sheet row `row`
    pub fn fail_writes_from(&mut self, row: u64) {
        self.fail_from_row = Some(row);
    }

    /// Cell at sheet `(row, col)` if anything was written there
    pub fn cell(&self, row: u64, col: u64) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// `(start_row, start_col, row_count)` of every successful write
    pub fn writes(&self) -> &[(u64, u64, usize)] {
        &self.writes
    }

    /// Highest sheet row written so far
    pub fn last_row(&self) -> Option<u64> {
        self.cells.keys().map(|(r, _)| *r).max()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn write_batch(&mut self, start_row: u64, start_col: u64, rows: Vec<Vec<Cell>>) -> Result<()> {
        if let Some(fail_from) = self.fail_from_row {
            if start_row + rows.len() as u64 > fail_from {
                anyhow::bail!("simulated write failure");
            }
        }

        let count = rows.len();
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                self.cells.insert((start_row + r as u64, start_col + c as u64), cell);
            }
        }
        self.writes.push((start_row, start_col, count));
        Ok(())
    }
}
