//! Human-readable text output

use crate::config::reliability::{FactorResolution, FactorSource};
use crate::sampling::size::{SampleSizeDecision, SizeSource};
use crate::sampling::SamplingOutcome;
use crate::stats::AggregateStats;
use crate::util::number::format_integer_with_spaces;
use std::fmt::Write;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Rows listed in the selection table before it is cut short
pub const MAX_LISTED_ITEMS: usize = 50;

fn banner(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "{:^59}", title);
    let _ = writeln!(out, "{}", RULE);
}

/// Totals of a totalization pass
pub fn render_totals(stats: &AggregateStats, threshold: Option<f64>) -> String {
    let mut out = String::new();
    banner(&mut out, "TOTALS");
    let _ = writeln!(out, "Data rows:        {}", stats.row_count);
    let _ = writeln!(out, "Total |value|:    {}", format_integer_with_spaces(stats.total_ceil()));
    if stats.unparsable_count > 0 {
        let _ = writeln!(out, "Unparsable cells: {} (counted as 0)", stats.unparsable_count);
    }
    if let Some(t) = threshold {
        let _ = writeln!(out);
        let _ = writeln!(out, "Significance:     {}", format_integer_with_spaces(t));
        let _ = writeln!(out, "Above it:         {} rows", stats.above_threshold_count);
        let _ = writeln!(out, "Adjusted total:   {}", format_integer_with_spaces(stats.adjusted_total.ceil()));
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

/// Sample size and how it was reached
pub fn render_size(decision: &SampleSizeDecision, factor: Option<&FactorResolution>, total: Option<f64>) -> String {
    let mut out = String::new();
    banner(&mut out, "SAMPLE SIZE");
    if let Some(f) = factor {
        let source = match f.source {
            FactorSource::Explicit => "explicit".to_string(),
            FactorSource::Table { rmm_level } => format!("risk table, RMM {}", rmm_level),
        };
        let _ = writeln!(out, "Reliability factor: {} ({})", f.value, source);
    }
    if let Some(t) = total {
        let _ = writeln!(out, "Total:              {}", format_integer_with_spaces(t.ceil()));
    }
    if let Some(computed) = decision.computed {
        let _ = writeln!(out, "Computed size:      {}", computed);
    }
    let source = match &decision.source {
        SizeSource::Monetary => "monetary formula".to_string(),
        SizeSource::AttributeFallback => "attribute fallback".to_string(),
        SizeSource::Requested { reason: Some(r) } => format!("requested: {}", r),
        SizeSource::Requested { reason: None } => "requested".to_string(),
    };
    let _ = writeln!(out, "Sample size:        {} ({})", decision.size, source);
    let _ = writeln!(out, "{}", RULE);
    out
}

/// Summary of a sampling run with the selected rows
pub fn render_outcome(outcome: &SamplingOutcome) -> String {
    let mut out = String::new();
    banner(&mut out, "SAMPLE");
    let _ = writeln!(out, "Method:        {}", outcome.method);
    let _ = writeln!(out, "Data rows:     {}", outcome.data_rows);
    let share = if outcome.data_rows > 0 {
        outcome.selected_rows as f64 / outcome.data_rows as f64 * 100.0
    } else {
        0.0
    };
    let _ = writeln!(out, "Sample size:   {}", outcome.sample_size);
    let _ = writeln!(out, "Selected rows: {} ({:.2}%)", outcome.selected_rows, share);
    let _ = writeln!(out, "Hits:          {}", outcome.hits_distributed);
    if outcome.above_threshold_rows > 0 {
        let _ = writeln!(out, "Above significance: {}", outcome.above_threshold_rows);
    }
    if let (Some(step), Some(start)) = (outcome.step, outcome.start) {
        let _ = writeln!(out, "Step:          {:.4}", step);
        let _ = writeln!(out, "Start:         {:.4}", start);
    }
    match (&outcome.seed, outcome.reproducible) {
        (Some(seed), true) => {
            let _ = writeln!(out, "Seed:          {}", seed);
        }
        _ => {
            let _ = writeln!(out, "Seed:          none (not reproducible)");
        }
    }

    if !outcome.items.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{:>8}  {:>16}  {}", "Row", "Value", "Selection");
        for item in outcome.items.iter().take(MAX_LISTED_ITEMS) {
            let value = item
                .value
                .map(format_integer_with_spaces)
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "{:>8}  {:>16}  {}", item.position.range_row, value, item.label);
        }
        if outcome.items.len() > MAX_LISTED_ITEMS {
            let _ = writeln!(out, "  ... {} more", outcome.items.len() - MAX_LISTED_ITEMS);
        }
    }
    let _ = writeln!(out, "{}", RULE);
    out
}

pub fn print_totals(stats: &AggregateStats, threshold: Option<f64>) {
    print!("{}", render_totals(stats, threshold));
}

pub fn print_size(decision: &SampleSizeDecision, factor: Option<&FactorResolution>, total: Option<f64>) {
    print!("{}", render_size(decision, factor, total));
}

pub fn print_outcome(outcome: &SamplingOutcome) {
    print!("{}", render_outcome(outcome));
}
