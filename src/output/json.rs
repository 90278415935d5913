//! JSON output formatting
//!
//! Machine-readable summaries of the three operations. Each summary carries
//! the inputs that shaped the result, so a file on its own is enough to
//! re-run or audit a selection.

use crate::config::reliability::FactorResolution;
use crate::sampling::size::SampleSizeDecision;
use crate::sampling::{Method, SampledItem, SamplingOutcome};
use crate::stats::AggregateStats;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Result of a totalization pass
#[derive(Debug, Clone, Serialize)]
pub struct JsonTotals {
    pub data_rows: u64,
    pub total_absolute_value: f64,
    /// Total rounded up to whole units
    pub total_ceil: f64,
    pub unparsable_cells: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub above_threshold_rows: Option<u64>,
}

impl JsonTotals {
    pub fn new(stats: &AggregateStats, threshold: Option<f64>) -> Self {
        Self {
            data_rows: stats.row_count,
            total_absolute_value: stats.total_absolute_value,
            total_ceil: stats.total_ceil(),
            unparsable_cells: stats.unparsable_count,
            threshold,
            adjusted_total: threshold.map(|_| stats.adjusted_total),
            above_threshold_rows: threshold.map(|_| stats.above_threshold_count),
        }
    }
}

/// Sample size decision with the factor behind it
#[derive(Debug, Clone, Serialize)]
pub struct JsonSize {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factor: Option<FactorResolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materiality: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(flatten)]
    pub decision: SampleSizeDecision,
}

/// One selected row
#[derive(Debug, Clone, Serialize)]
pub struct JsonItem {
    /// 1-based data row, header excluded
    pub row: u64,
    pub hits: u64,
    pub above_threshold: bool,
    pub value: Option<f64>,
    pub label: String,
}

impl From<&SampledItem> for JsonItem {
    fn from(item: &SampledItem) -> Self {
        Self {
            row: item.position.range_row,
            hits: item.hits,
            above_threshold: item.above_threshold,
            value: item.value,
            label: item.label.clone(),
        }
    }
}

/// Complete sampling run
#[derive(Debug, Clone, Serialize)]
pub struct JsonSample {
    pub generated_at: String,
    pub author: String,
    pub method: Method,
    pub size: JsonSize,
    pub data_rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walk_total: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    pub hits_distributed: u64,
    pub selected_rows: u64,
    pub above_threshold_rows: u64,
    pub seed: Option<String>,
    pub reproducible: bool,
    pub rows_written: u64,
    pub items: Vec<JsonItem>,
}

impl JsonSample {
    pub fn new(outcome: &SamplingOutcome, size: JsonSize, author: &str, generated_at: DateTime<Local>) -> Self {
        Self {
            generated_at: generated_at.to_rfc3339(),
            author: author.to_string(),
            method: outcome.method,
            size,
            data_rows: outcome.data_rows,
            walk_total: outcome.total_value,
            step: outcome.step,
            start: outcome.start,
            hits_distributed: outcome.hits_distributed,
            selected_rows: outcome.selected_rows,
            above_threshold_rows: outcome.above_threshold_rows,
            seed: outcome.seed.clone(),
            reproducible: outcome.reproducible,
            rows_written: outcome.rows_written,
            items: outcome.items.iter().map(JsonItem::from).collect(),
        }
    }
}

/// Serialize a summary to a string
pub fn to_json_string<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}

/// Write a summary to a file
pub fn write_json_output<T: Serialize>(output_path: &Path, value: &T, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, value)?;
    } else {
        serde_json::to_writer(writer, value)?;
    }

    Ok(())
}
