//! CSV-backed source and sink
//!
//! [`CsvSource`] streams a CSV file: the first record is the header, every
//! record after it is a data row. Only one batch of records is held at a time;
//! the row count is established by a counting pass when the file is opened.
//!
//! [`CsvSink`] writes annotation rows to a new CSV file. Each record starts with
//! the 1-based sheet row number the annotation belongs to, so the output can be
//! joined back to the input. The file is created on the first write, so a run
//! that aborts before writing leaves an existing file untouched.

use super::{Batch, Cell, PagedDataSource, RangeShape, ResultSink};
use crate::Result;
use anyhow::Context;
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Streaming CSV dataset
pub struct CsvSource {
    path: PathBuf,
    delimiter: u8,
    shape: RangeShape,
    reader: csv::Reader<File>,
    next_offset: u64,
}

impl CsvSource {
    /// Open `path` and count its records
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let mut counter = open_reader(path, delimiter)?;
        let mut record = csv::StringRecord::new();
        let mut row_count = 0u64;
        let mut column_count = 0u64;
        while counter
            .read_record(&mut record)
            .with_context(|| format!("Failed to scan {} at record {}", path.display(), row_count + 1))?
        {
            if row_count == 0 {
                column_count = record.len() as u64;
            }
            row_count += 1;
        }
        debug!(path = %path.display(), row_count, column_count, "opened CSV source");

        Ok(Self {
            path: path.to_path_buf(),
            delimiter,
            shape: RangeShape {
                origin_row: 0,
                origin_col: 0,
                row_count,
                column_count,
            },
            reader: open_reader(path, delimiter)?,
            next_offset: 0,
        })
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rewind_to(&mut self, offset: u64) -> Result<()> {
        self.reader = open_reader(&self.path, self.delimiter)?;
        let mut record = csv::StringRecord::new();
        for _ in 0..offset {
            if !self.reader.read_record(&mut record)? {
                anyhow::bail!("{} ended before row {}", self.path.display(), offset);
            }
        }
        self.next_offset = offset;
        Ok(())
    }
}

fn open_reader(path: &Path, delimiter: u8) -> Result<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))
}

fn to_cell(field: &str) -> Cell {
    if field.is_empty() {
        Cell::Empty
    } else {
        Cell::Text(field.to_string())
    }
}

#[async_trait]
impl PagedDataSource for CsvSource {
    fn shape(&self) -> RangeShape {
        self.shape
    }

    async fn read_batch(&mut self, offset: u64, limit: usize) -> Result<Batch> {
        if offset != self.next_offset {
            self.rewind_to(offset)?;
        }

        let mut rows = Vec::with_capacity(limit);
        let mut record = csv::StringRecord::new();
        while rows.len() < limit {
            let more = self
                .reader
                .read_record(&mut record)
                .with_context(|| format!("Failed to read {} at row {}", self.path.display(), self.next_offset))?;
            if !more {
                break;
            }
            rows.push(record.iter().map(to_cell).collect());
            self.next_offset += 1;
        }

        Ok(Batch { rows, offset })
    }
}

/// CSV file receiving annotation rows
pub struct CsvSink {
    path: PathBuf,
    delimiter: u8,
    writer: Option<csv::Writer<File>>,
    next_row: Option<u64>,
}

impl CsvSink {
    /// Sink for `path`; the file is created (or truncated) on the first write
    pub fn create(path: &Path, delimiter: u8) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                anyhow::bail!("Output directory {} does not exist", parent.display());
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            delimiter,
            writer: None,
            next_row: None,
        })
    }

    fn writer(&mut self) -> Result<&mut csv::Writer<File>> {
        if self.writer.is_none() {
            let writer = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .flexible(true)
                .from_path(&self.path)
                .with_context(|| format!("Failed to create {}", self.path.display()))?;
            debug!(path = %self.path.display(), "created annotation file");
            self.writer = Some(writer);
        }
        self.writer
            .as_mut()
            .context("annotation writer is not open")
    }
}

#[async_trait]
impl ResultSink for CsvSink {
    async fn write_batch(&mut self, start_row: u64, _start_col: u64, rows: Vec<Vec<Cell>>) -> Result<()> {
        if let Some(next) = self.next_row {
            if start_row < next {
                anyhow::bail!("out-of-order write at row {} (next row is {})", start_row, next);
            }
        }

        let count = rows.len() as u64;
        let writer = self.writer()?;
        for (i, row) in rows.iter().enumerate() {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push((start_row + i as u64 + 1).to_string());
            record.extend(row.iter().map(|c| c.to_string()));
            writer.write_record(&record)?;
        }
        self.next_row = Some(start_row + count);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}
