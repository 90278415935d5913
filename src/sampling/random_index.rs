//! Simple random selection
//!
//! Draws `min(S, rows)` distinct data-row indices up front, then streams the
//! dataset once to annotate it. Without significance exclusion nothing after
//! the last drawn row needs to be read: the remaining rows are annotated as
//! not selected straight away.

use super::{Hit, SamplingContext, SamplingOutcome, SelectionReason, SelectionResult};
use crate::error::SamplingError;
use crate::output::annotate::{positional_row, unselected_positional_row, ResultWriter, POSITIONAL_HEADERS};
use crate::rng::UnitRandom;
use crate::source::{BatchReader, PagedDataSource, ResultSink, RowPosition};
use crate::util::number::parse_number;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Draw `min(sample_size, rows)` distinct indices in `0..rows`
///
/// Each draw is `floor(u * rows)`; a repeat is discarded and drawn again.
pub fn draw_indices(rows: u64, sample_size: u64, rng: &mut dyn UnitRandom) -> BTreeSet<u64> {
    let target = sample_size.min(rows) as usize;
    let mut indices = BTreeSet::new();
    if rows == 0 {
        return indices;
    }
    while indices.len() < target {
        let index = ((rng.next_unit() * rows as f64).floor() as u64).min(rows - 1);
        indices.insert(index);
    }
    indices
}

pub(crate) async fn run_random(
    source: &mut dyn PagedDataSource,
    sink: &mut dyn ResultSink,
    ctx: &SamplingContext,
    rng: &mut dyn UnitRandom,
) -> Result<SamplingOutcome, SamplingError> {
    let shape = source.shape();
    let rows = shape.data_rows();
    let sample_size = ctx.request.sample_size;
    if rows == 0 {
        return Err(SamplingError::degenerate("the data range has no data rows"));
    }
    if sample_size > rows {
        warn!(sample_size, rows, "sample size exceeds the number of rows; every row is selected");
    }

    let indices = draw_indices(rows, sample_size, rng);
    let last = indices.iter().next_back().copied();
    let stop_early = !ctx.exclusion_active();
    debug!(drawn = indices.len(), last = ?last, stop_early, "random indices drawn");

    let mut outcome = SamplingOutcome::new(ctx, &shape, rng.is_reproducible());
    let mut writer = ResultWriter::new(sink, shape, ctx.paging.output_batch_size);
    writer.write_header(&POSITIONAL_HEADERS).await?;

    let mut reader = BatchReader::new(source, ctx.paging.batch_size)
        .with_yield_every(ctx.paging.yield_every)
        .with_cancel(ctx.cancel.clone());

    let mut next_index = 0u64;
    'read: while let Some(batch) = reader.next_batch().await? {
        for (position, row) in batch.data_rows() {
            let value = row.get(ctx.value_column).and_then(parse_number);
            let above = ctx.is_above_threshold(value.map_or(0.0, f64::abs));
            let hit = indices.contains(&position.data_index).then_some(Hit::RandomIndex);
            let result = SelectionResult {
                position,
                reason: SelectionReason::compose(hit, above),
            };
            outcome.record(&result, value);
            writer.push(position, positional_row(&result)).await?;

            next_index = position.data_index + 1;
            if stop_early && Some(position.data_index) == last {
                break 'read;
            }
        }
    }

    if next_index < rows {
        debug!(from = next_index, rows, "annotating unread rows as not selected");
        let check_every = ctx.paging.output_batch_size as u64;
        for data_index in next_index..rows {
            if (data_index - next_index) % check_every == 0 {
                ctx.check_cancelled(data_index + 1)?;
            }
            let position = RowPosition::from_data_index(data_index);
            writer.push(position, unselected_positional_row(position)).await?;
        }
    }

    outcome.rows_written = writer.finish().await?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRandom;
    use crate::sampling::{run_sampling, Method, Paging, SamplingRequest};
    use crate::source::memory::{MemorySink, MemorySource};
    use crate::source::Cell;

    fn context(sample_size: u64, batch_size: usize) -> SamplingContext {
        SamplingContext::new(
            SamplingRequest {
                method: Method::SimpleRandom,
                sample_size,
                seed: Some("fixed".into()),
                total_value: None,
                exclude_threshold: None,
            },
            0,
        )
        .with_paging(Paging {
            batch_size,
            output_batch_size: 4,
            yield_every: 2,
        })
    }

    #[test]
    fn test_draw_known_answer() {
        let mut rng = SeededRandom::from_seed_str("fixed");
        let drawn = draw_indices(10, 3, &mut rng);
        assert_eq!(drawn.into_iter().collect::<Vec<_>>(), vec![3, 7, 8]);
    }

    #[test]
    fn test_draw_caps_at_row_count() {
        let mut rng = SeededRandom::from_seed_str("seed-A");
        let drawn = draw_indices(6, 50, &mut rng);
        assert_eq!(drawn.into_iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_draw_from_empty() {
        let mut rng = SeededRandom::from_seed_str("fixed");
        assert!(draw_indices(0, 5, &mut rng).is_empty());
    }

    #[tokio::test]
    async fn test_random_run_stops_after_last_hit() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let mut source = MemorySource::from_values("amount", &values);
        let mut sink = MemorySink::new();
        let outcome = run_sampling(&mut source, &mut sink, &context(3, 2)).await.unwrap();

        let selected: Vec<u64> = outcome.items.iter().map(|i| i.position.data_index).collect();
        assert_eq!(selected, vec![3, 7, 8]);
        assert_eq!(outcome.hits_distributed, 3);
        assert_eq!(outcome.rows_written, 10);

        // data index 8 is range row 9, read in the batch at offset 8
        assert_eq!(source.reads().last(), Some(&(8, 2)));
        assert_eq!(source.reads().len(), 5);

        assert_eq!(sink.cell(4, 2), Some(&Cell::from("Ano - NGČ")));
        assert_eq!(sink.cell(9, 2), Some(&Cell::from("Ano - NGČ")));
        assert_eq!(sink.cell(10, 1), Some(&Cell::Number(10.0)));
        assert_eq!(sink.cell(10, 2), Some(&Cell::from("Ne")));
    }

    #[tokio::test]
    async fn test_random_run_reads_everything_with_exclusion() {
        let mut values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        values[9] = 500.0;
        let mut source = MemorySource::from_values("amount", &values);
        let mut sink = MemorySink::new();
        let mut ctx = context(3, 2);
        ctx.request.exclude_threshold = Some(100.0);
        let outcome = run_sampling(&mut source, &mut sink, &ctx).await.unwrap();

        assert_eq!(source.reads().len(), 6);
        assert_eq!(outcome.above_threshold_rows, 1);
        assert_eq!(sink.cell(10, 2), Some(&Cell::from("Ano - významnost")));
    }

    #[tokio::test]
    async fn test_random_run_selects_all_when_sample_exceeds_rows() {
        let mut source = MemorySource::from_values("amount", &[1.0, 2.0, 3.0]);
        let mut sink = MemorySink::new();
        let outcome = run_sampling(&mut source, &mut sink, &context(10, 1500)).await.unwrap();

        assert_eq!(outcome.selected_rows, 3);
        assert_eq!(outcome.hits_distributed, 3);
        for row in 1..=3 {
            assert_eq!(sink.cell(row, 2), Some(&Cell::from("Ano - NGČ")));
        }
    }
}
