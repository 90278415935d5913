//! Systematic interval selection
//!
//! # Monetary walk
//!
//! The total absolute value is cut into `S` equal steps. A random start inside
//! the first step fixes where the boundaries fall; each row then covers the
//! cumulative span `[before, after)` of its absolute value and receives one hit
//! per boundary inside it:
//!
//! ```text
//! step  = total / S
//! start = u * step                     u in [0, 1)
//! hits  = floor(after / step) - floor(before / step)
//! ```
//!
//! Rows above the significance threshold contribute nothing to the walk when
//! exclusion is on, so they can never be hit; they are flagged instead.
//!
//! # Row walk
//!
//! The same idea over positions: every row is one unit wide, the step is
//! `rows / S`, and positions past the end wrap to the start. Only the rows that
//! are hit are kept in memory.

use super::{Hit, SamplingContext, SamplingOutcome, SelectionReason, SelectionResult};
use crate::error::SamplingError;
use crate::output::annotate::{monetary_row, positional_row, ResultWriter, MONETARY_HEADERS, POSITIONAL_HEADERS};
use crate::rng::UnitRandom;
use crate::source::{BatchReader, PagedDataSource, ResultSink};
use crate::stats::{aggregate, AggregateOptions};
use crate::util::number::parse_number;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Slack added before flooring a boundary index
///
/// Absorbs the rounding of a long running sum so the final boundary is not
/// lost to a value like `4.999999999999`.
pub const BOUNDARY_TOLERANCE: f64 = 1e-9;

fn boundary_index(cumulative: f64, step: f64) -> f64 {
    (cumulative / step + BOUNDARY_TOLERANCE).floor()
}

/// State of a monetary walk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonetaryWalk {
    step: f64,
    start: f64,
    sample_size: u64,
    cumulative: f64,
    distributed: u64,
}

impl MonetaryWalk {
    /// Walk spreading `sample_size` hits over `total`, starting at `unit * step`
    pub fn new(total: f64, sample_size: u64, unit: f64) -> Result<Self, SamplingError> {
        if sample_size == 0 {
            return Err(SamplingError::config("sample size must be at least 1"));
        }
        if !total.is_finite() || total <= 0.0 {
            return Err(SamplingError::degenerate(format!(
                "total value is {}; there is nothing to walk over",
                total
            )));
        }
        let step = total / sample_size as f64;
        if !step.is_finite() || step <= 0.0 {
            return Err(SamplingError::degenerate(format!(
                "sampling step {} is not a positive number",
                step
            )));
        }
        let start = unit * step;
        Ok(Self {
            step,
            start,
            sample_size,
            cumulative: start,
            distributed: 0,
        })
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    /// Running cumulative, start included
    pub fn cumulative(&self) -> f64 {
        self.cumulative
    }

    /// `cumulative / step`
    pub fn step_index(&self) -> f64 {
        self.cumulative / self.step
    }

    /// Hits handed out so far
    pub fn distributed(&self) -> u64 {
        self.distributed
    }

    /// Move past a row contributing `contribution`; returns its hits
    ///
    /// The total never exceeds the sample size.
    pub fn advance(&mut self, contribution: f64) -> u64 {
        let before = self.cumulative;
        let after = before + contribution;
        self.cumulative = after;

        let crossed = (boundary_index(after, self.step) - boundary_index(before, self.step)).max(0.0) as u64;
        let hits = crossed.min(self.sample_size - self.distributed);
        self.distributed += hits;
        hits
    }
}

/// Hit positions of a row walk
#[derive(Debug, Clone, PartialEq)]
pub struct PositionalPlan {
    step: f64,
    start: f64,
    data_rows: u64,
    sample_size: u64,
    hits: PlannedHits,
}

#[derive(Debug, Clone, PartialEq)]
enum PlannedHits {
    /// Step of at least one row: only the rows hit are stored
    Sparse(BTreeMap<u64, u64>),
    /// Step below one row: every row is hit, counts follow from the step
    Dense,
}

impl PositionalPlan {
    /// Place `sample_size` positions over `data_rows` rows, starting at `unit * step`
    pub fn new(data_rows: u64, sample_size: u64, unit: f64) -> Result<Self, SamplingError> {
        if sample_size == 0 {
            return Err(SamplingError::config("sample size must be at least 1"));
        }
        if data_rows == 0 {
            return Err(SamplingError::degenerate("the data range has no data rows"));
        }
        let rows = data_rows as f64;
        let step = rows / sample_size as f64;
        if !step.is_finite() || step <= 0.0 {
            return Err(SamplingError::degenerate(format!(
                "sampling step {} is not a positive number",
                step
            )));
        }
        let start = unit * step;

        let hits = if sample_size <= data_rows {
            let mut hits = BTreeMap::new();
            for k in 0..sample_size {
                let position = (start + k as f64 * step) % rows;
                let index = (position.floor() as u64).min(data_rows - 1);
                *hits.entry(index).or_insert(0u64) += 1;
            }
            PlannedHits::Sparse(hits)
        } else {
            PlannedHits::Dense
        };

        Ok(Self {
            step,
            start,
            data_rows,
            sample_size,
            hits,
        })
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    /// Hits on the row with 0-based data index `data_index`
    pub fn hits_at(&self, data_index: u64) -> u64 {
        match &self.hits {
            PlannedHits::Sparse(hits) => hits.get(&data_index).copied().unwrap_or(0),
            // Unwrapped positions span [start, start + rows), so each row owns
            // one unit before the wrap and one after it.
            PlannedHits::Dense => {
                self.positions_within(data_index) + self.positions_within(data_index + self.data_rows)
            }
        }
    }

    /// Number of distinct rows hit
    pub fn rows_hit(&self) -> u64 {
        match &self.hits {
            PlannedHits::Sparse(hits) => hits.len() as u64,
            PlannedHits::Dense => self.data_rows,
        }
    }

    /// Positions `start + k * step` inside the unwrapped unit `[cell, cell + 1)`
    fn positions_within(&self, cell: u64) -> u64 {
        self.positions_before(cell as f64 + 1.0) - self.positions_before(cell as f64)
    }

    /// Positions `start + k * step` below `boundary`, `k < sample_size`
    fn positions_before(&self, boundary: f64) -> u64 {
        let k = ((boundary - self.start) / self.step).ceil();
        if k <= 0.0 {
            0
        } else {
            (k as u64).min(self.sample_size)
        }
    }
}

/// Monetary walk over the value column
pub(crate) async fn run_monetary(
    source: &mut dyn PagedDataSource,
    sink: &mut dyn ResultSink,
    ctx: &SamplingContext,
    rng: &mut dyn UnitRandom,
) -> Result<SamplingOutcome, SamplingError> {
    let shape = source.shape();
    let sample_size = ctx.request.sample_size;

    let total = match ctx.request.total_value {
        Some(total) => total,
        None => {
            let options = AggregateOptions {
                batch_size: ctx.paging.batch_size,
                threshold: ctx.request.exclude_threshold,
                yield_every: ctx.paging.yield_every,
                cancel: ctx.cancel.clone(),
            };
            let stats = aggregate(source, ctx.value_column, &options).await?;
            stats.walk_total(ctx.exclusion_active())
        }
    };

    let mut walk = MonetaryWalk::new(total, sample_size, rng.next_unit())?;
    debug!(total, step = walk.step(), start = walk.start(), "monetary walk planned");

    let mut outcome = SamplingOutcome::new(ctx, &shape, rng.is_reproducible());
    outcome.total_value = Some(total);
    outcome.step = Some(walk.step());
    outcome.start = Some(walk.start());

    let mut writer = ResultWriter::new(sink, shape, ctx.paging.output_batch_size);
    writer.write_header(&MONETARY_HEADERS).await?;

    let mut reader = BatchReader::new(source, ctx.paging.batch_size)
        .with_yield_every(ctx.paging.yield_every)
        .with_cancel(ctx.cancel.clone());

    while let Some(batch) = reader.next_batch().await? {
        for (position, row) in batch.data_rows() {
            let value = row.get(ctx.value_column).and_then(parse_number);
            let abs = value.map_or(0.0, f64::abs);
            let above = ctx.is_above_threshold(abs);

            let hits = walk.advance(if above { 0.0 } else { abs });
            let hit = (hits > 0).then_some(Hit::Monetary(hits));
            let result = SelectionResult {
                position,
                reason: SelectionReason::compose(hit, above),
            };
            outcome.record(&result, value);
            writer
                .push(position, monetary_row(&result, abs, walk.cumulative(), walk.step_index()))
                .await?;
        }
    }

    outcome.rows_written = writer.finish().await?;
    if walk.distributed() < sample_size {
        warn!(
            distributed = walk.distributed(),
            requested = sample_size,
            total,
            "walk ended before every hit was placed; the supplied total may not match the data"
        );
    }
    Ok(outcome)
}

/// Row walk, wrapping past the last row
pub(crate) async fn run_positional(
    source: &mut dyn PagedDataSource,
    sink: &mut dyn ResultSink,
    ctx: &SamplingContext,
    rng: &mut dyn UnitRandom,
) -> Result<SamplingOutcome, SamplingError> {
    let shape = source.shape();
    let rows = shape.data_rows();
    let sample_size = ctx.request.sample_size;

    let plan = PositionalPlan::new(rows, sample_size, rng.next_unit())?;
    if sample_size > rows {
        info!(
            sample_size,
            rows, "sample size exceeds the number of rows; positions wrap and rows repeat"
        );
    }
    debug!(step = plan.step(), start = plan.start(), rows_hit = plan.rows_hit(), "row walk planned");

    let mut outcome = SamplingOutcome::new(ctx, &shape, rng.is_reproducible());
    outcome.step = Some(plan.step());
    outcome.start = Some(plan.start());

    let mut writer = ResultWriter::new(sink, shape, ctx.paging.output_batch_size);
    writer.write_header(&POSITIONAL_HEADERS).await?;

    let mut reader = BatchReader::new(source, ctx.paging.batch_size)
        .with_yield_every(ctx.paging.yield_every)
        .with_cancel(ctx.cancel.clone());

    while let Some(batch) = reader.next_batch().await? {
        for (position, row) in batch.data_rows() {
            let value = row.get(ctx.value_column).and_then(parse_number);
            let above = ctx.is_above_threshold(value.map_or(0.0, f64::abs));

            let hits = plan.hits_at(position.data_index);
            let hit = (hits > 0).then_some(Hit::Positional(hits));
            let result = SelectionResult {
                position,
                reason: SelectionReason::compose(hit, above),
            };
            outcome.record(&result, value);
            writer.push(position, positional_row(&result)).await?;
        }
    }

    outcome.rows_written = writer.finish().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{run_sampling, Method, Paging, SamplingRequest};
    use crate::source::memory::{MemorySink, MemorySource};
    use crate::source::Cell;

    // First output of the generator seeded with "fixed"
    const FIXED_UNIT: f64 = 0.7287279793526977;

    fn context(method: Method, sample_size: u64) -> SamplingContext {
        SamplingContext::new(
            SamplingRequest {
                method,
                sample_size,
                seed: Some("fixed".into()),
                total_value: None,
                exclude_threshold: None,
            },
            0,
        )
    }

    fn walk_hits(values: &[f64], sample_size: u64, unit: f64) -> Vec<u64> {
        let total: f64 = values.iter().map(|v| v.abs()).sum();
        let mut walk = MonetaryWalk::new(total, sample_size, unit).unwrap();
        values.iter().map(|v| walk.advance(v.abs())).collect()
    }

    #[test]
    fn test_walk_known_answer() {
        let walk = MonetaryWalk::new(100.0, 5, FIXED_UNIT).unwrap();
        assert_eq!(walk.step(), 20.0);
        assert!((walk.start() - 14.574559587053955).abs() < 1e-12);

        assert_eq!(walk_hits(&[10.0; 10], 5, FIXED_UNIT), vec![1, 0, 1, 0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_walk_counts_multiple_boundaries() {
        assert_eq!(walk_hits(&[95.0, 5.0], 10, FIXED_UNIT), vec![10, 0]);
    }

    #[test]
    fn test_walk_distributes_exactly_sample_size() {
        let values: Vec<f64> = (0..1000).map(|i| (i % 17) as f64 * 0.01 + 0.07).collect();
        for sample_size in [1, 3, 97, 500, 997, 1000] {
            for unit in [0.0, 0.25, FIXED_UNIT, 0.999_999] {
                let hits: u64 = walk_hits(&values, sample_size, unit).iter().sum();
                assert_eq!(hits, sample_size, "S={} u={}", sample_size, unit);
            }
        }
    }

    #[test]
    fn test_walk_rejects_zero_total() {
        assert!(matches!(
            MonetaryWalk::new(0.0, 5, 0.5),
            Err(SamplingError::DegenerateInput(_))
        ));
        assert!(matches!(
            MonetaryWalk::new(f64::INFINITY, 5, 0.5),
            Err(SamplingError::DegenerateInput(_))
        ));
    }

    #[test]
    fn test_positional_plan_known_answers() {
        let plan = PositionalPlan::new(10, 4, FIXED_UNIT).unwrap();
        let hits: Vec<u64> = (0..10).map(|i| plan.hits_at(i)).collect();
        assert_eq!(hits, vec![0, 1, 0, 0, 1, 0, 1, 0, 0, 1]);

        let plan = PositionalPlan::new(10, 15, FIXED_UNIT).unwrap();
        let hits: Vec<u64> = (0..10).map(|i| plan.hits_at(i)).collect();
        assert_eq!(hits, vec![1, 2, 1, 2, 1, 2, 1, 2, 1, 2]);
        assert_eq!(hits.iter().sum::<u64>(), 15);
        assert_eq!(plan.rows_hit(), 10);
    }

    #[test]
    fn test_positional_plan_sample_far_above_rows() {
        let sample_size = 10_000_000_000_000;
        let plan = PositionalPlan::new(3, sample_size, FIXED_UNIT).unwrap();
        let hits: Vec<u64> = (0..3).map(|i| plan.hits_at(i)).collect();
        assert_eq!(hits.iter().sum::<u64>(), sample_size);
        for h in &hits {
            assert!(h.abs_diff(sample_size / 3) <= 1, "{:?}", hits);
        }
        assert_eq!(plan.rows_hit(), 3);
    }

    #[test]
    fn test_positional_plan_without_rows() {
        assert!(matches!(
            PositionalPlan::new(0, 3, 0.5),
            Err(SamplingError::DegenerateInput(_))
        ));
    }

    #[tokio::test]
    async fn test_monetary_run_annotations() {
        let mut source = MemorySource::from_values("amount", &[10.0; 10]);
        let mut sink = MemorySink::new();
        let ctx = context(Method::MonetaryInterval, 5);
        let outcome = run_sampling(&mut source, &mut sink, &ctx).await.unwrap();

        assert_eq!(outcome.total_value, Some(100.0));
        assert_eq!(outcome.step, Some(20.0));
        assert_eq!(outcome.hits_distributed, 5);
        assert_eq!(outcome.rows_written, 10);
        let selected: Vec<u64> = outcome.items.iter().map(|i| i.position.data_index).collect();
        assert_eq!(selected, vec![0, 2, 4, 6, 8]);

        assert_eq!(sink.cell(0, 1), Some(&Cell::from("ABS")));
        assert_eq!(sink.cell(0, 5), Some(&Cell::from("Důvod")));
        for row in 1..=10u64 {
            let (label, reason) = if row % 2 == 1 { ("Ano - NPP", "NPP") } else { ("Ne", "") };
            assert_eq!(sink.cell(row, 4), Some(&Cell::from(label)), "row {}", row);
            assert_eq!(sink.cell(row, 5), Some(&Cell::from(reason)), "row {}", row);
            assert_eq!(sink.cell(row, 1), Some(&Cell::Number(10.0)));
        }
        match sink.cell(1, 2) {
            Some(Cell::Number(cum)) => assert!((cum - 24.574559587053955).abs() < 1e-9),
            other => panic!("unexpected cumulative {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_monetary_exclusion_flags_and_skips() {
        let mut source = MemorySource::from_values("amount", &[10.0, 10.0, 50.0, 10.0, 10.0]);
        let mut sink = MemorySink::new();
        let mut ctx = context(Method::MonetaryInterval, 2);
        ctx.request.exclude_threshold = Some(40.0);
        let outcome = run_sampling(&mut source, &mut sink, &ctx).await.unwrap();

        assert_eq!(outcome.total_value, Some(40.0));
        assert_eq!(outcome.hits_distributed, 2);
        assert_eq!(outcome.above_threshold_rows, 1);

        assert_eq!(sink.cell(1, 4), Some(&Cell::from("Ano - NPP")));
        assert_eq!(sink.cell(3, 4), Some(&Cell::from("Ano - významnost")));
        assert_eq!(sink.cell(3, 5), Some(&Cell::from("přesah významnosti")));
        assert_eq!(sink.cell(4, 4), Some(&Cell::from("Ano - NPP")));
        // the flagged row leaves the cumulative where it was
        assert_eq!(sink.cell(2, 2), sink.cell(3, 2));
    }

    #[tokio::test]
    async fn test_monetary_uses_supplied_total() {
        let mut source = MemorySource::from_values("amount", &[10.0; 10]);
        let mut sink = MemorySink::new();
        let mut ctx = context(Method::MonetaryInterval, 5);
        ctx.request.total_value = Some(100.0);
        let outcome = run_sampling(&mut source, &mut sink, &ctx).await.unwrap();

        assert_eq!(outcome.hits_distributed, 5);
        assert_eq!(source.reads(), &[(0, 11)]);
    }

    #[tokio::test]
    async fn test_monetary_zero_total_writes_nothing() {
        let mut source = MemorySource::from_values("amount", &[0.0, 0.0, 0.0]);
        let mut sink = MemorySink::new();
        let ctx = context(Method::MonetaryInterval, 2);
        let err = run_sampling(&mut source, &mut sink, &ctx).await.unwrap_err();
        assert!(matches!(err, SamplingError::DegenerateInput(_)));
        assert!(sink.writes().is_empty());
    }

    #[tokio::test]
    async fn test_row_walk_with_significance() {
        let mut values = vec![10.0; 10];
        values[1] = 50.0;
        values[2] = 45.0;
        let mut source = MemorySource::from_values("amount", &values);
        let mut sink = MemorySink::new();
        let mut ctx = context(Method::RowInterval, 4).with_paging(Paging {
            batch_size: 3,
            output_batch_size: 4,
            yield_every: 1,
        });
        ctx.request.exclude_threshold = Some(40.0);
        let outcome = run_sampling(&mut source, &mut sink, &ctx).await.unwrap();

        assert_eq!(outcome.hits_distributed, 4);
        assert_eq!(outcome.above_threshold_rows, 2);
        assert_eq!(sink.cell(0, 1), Some(&Cell::from("Pořadí")));
        assert_eq!(sink.cell(2, 1), Some(&Cell::Number(2.0)));
        assert_eq!(sink.cell(2, 2), Some(&Cell::from("Ano - významnost; Ano - NGČ")));
        assert_eq!(sink.cell(3, 2), Some(&Cell::from("Ano - významnost")));
        assert_eq!(sink.cell(5, 2), Some(&Cell::from("Ano - NGČ")));
        assert_eq!(sink.cell(10, 2), Some(&Cell::from("Ano - NGČ")));
        assert_eq!(sink.cell(1, 2), Some(&Cell::from("Ne")));
    }

    #[tokio::test]
    async fn test_row_walk_wraps_when_sample_exceeds_rows() {
        let mut source = MemorySource::from_values("amount", &[1.0; 10]);
        let mut sink = MemorySink::new();
        let ctx = context(Method::RowInterval, 15);
        let outcome = run_sampling(&mut source, &mut sink, &ctx).await.unwrap();

        assert_eq!(outcome.hits_distributed, 15);
        assert_eq!(outcome.selected_rows, 10);
        assert_eq!(sink.cell(1, 2), Some(&Cell::from("Ano - NGČ")));
        assert_eq!(sink.cell(2, 2), Some(&Cell::from("Ano - NGČ (x2)")));
    }

    #[tokio::test]
    async fn test_row_walk_huge_sample_over_few_rows() {
        let mut source = MemorySource::from_values("amount", &[1.0, 2.0, 3.0]);
        let mut sink = MemorySink::new();
        let ctx = context(Method::RowInterval, 10_000_000_000_000);
        let outcome = run_sampling(&mut source, &mut sink, &ctx).await.unwrap();

        assert_eq!(outcome.hits_distributed, 10_000_000_000_000);
        assert_eq!(outcome.selected_rows, 3);
        assert_eq!(sink.last_row(), Some(3));
        match sink.cell(1, 2) {
            Some(Cell::Text(label)) => assert!(label.starts_with("Ano - NGČ (x333333333333"), "{}", label),
            other => panic!("unexpected label {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_row_walk_without_data_rows() {
        let mut source = MemorySource::from_values("amount", &[]);
        let mut sink = MemorySink::new();
        let ctx = context(Method::RowInterval, 3);
        let err = run_sampling(&mut source, &mut sink, &ctx).await.unwrap_err();
        assert!(matches!(err, SamplingError::DegenerateInput(_)));
        assert!(sink.writes().is_empty());
    }
}
