//! Configuration validation
//!
//! Runs before any data is read, so a bad setting never leaves a half-written
//! annotation block behind.

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_data(&config.data)?;
    validate_reliability(&config.reliability)?;
    if let Some(significance) = &config.significance {
        validate_significance(significance)?;
    }
    validate_sample(&config.sample, config.significance.as_ref())?;
    if let Some(fallback) = &config.fallback {
        validate_fallback(fallback)?;
    }
    Ok(())
}

/// Validate the settings needed to read the dataset
pub fn validate_data_source(config: &Config) -> Result<()> {
    if config.data.path.is_none() {
        anyhow::bail!("No input file given (data.path or PATH argument)");
    }
    if config.data.value_column.is_none() {
        anyhow::bail!("No value column given (data.value_column or --column)");
    }
    Ok(())
}

/// Validate paging and column settings
pub fn validate_data(data: &DataConfig) -> Result<()> {
    if data.batch_size == 0 {
        anyhow::bail!("batch_size must be at least 1");
    }
    if data.output_batch_size == 0 {
        anyhow::bail!("output_batch_size must be at least 1");
    }
    if let Some(column) = &data.value_column {
        cli_convert::parse_column(column)?;
    }
    cli_convert::parse_delimiter(&data.delimiter)?;
    Ok(())
}

/// Validate the reliability factor settings
pub fn validate_reliability(reliability: &ReliabilityConfig) -> Result<()> {
    if let Some(factor) = reliability.factor {
        if !factor.is_finite() || factor < 0.0 {
            anyhow::bail!("reliability factor must be a non-negative number, got {}", factor);
        }
    }
    if reliability.factor.is_none() && reliability.is_partial_profile() {
        anyhow::bail!(
            "risk profile is incomplete: control_risk, inherent_risk, analytical_tests and control_tests are all required"
        );
    }
    Ok(())
}

/// Validate the significance level
pub fn validate_significance(significance: &SignificanceConfig) -> Result<()> {
    if significance.kind.trim().is_empty() {
        anyhow::bail!("significance kind must not be empty");
    }
    match significance.amount() {
        Some(amount) if amount > 0.0 => {}
        Some(amount) => anyhow::bail!("significance value must be positive, got {}", amount),
        None => anyhow::bail!("significance value '{}' is not a number", significance.value),
    }
    let has_justification = significance
        .justification
        .as_deref()
        .map_or(false, |j| !j.trim().is_empty());
    if !significance.is_performance() && !has_justification {
        anyhow::bail!(
            "significance kind '{}' requires a justification (only '{}' does not)",
            significance.kind,
            PERFORMANCE_KIND
        );
    }
    Ok(())
}

/// Validate selection settings
pub fn validate_sample(sample: &SampleConfig, significance: Option<&SignificanceConfig>) -> Result<()> {
    if let Some(size) = sample.size {
        if !size.is_finite() || size <= 0.0 {
            anyhow::bail!("requested sample size must be positive, got {}", size);
        }
    }
    if let Some(total) = sample.total {
        if !total.is_finite() || total < 0.0 {
            anyhow::bail!("precomputed total must be a non-negative number, got {}", total);
        }
    }
    if sample.exclude_above_significance && significance.is_none() {
        anyhow::bail!("exclude_above_significance needs a significance level");
    }
    Ok(())
}

/// Validate the attribute fallback
pub fn validate_fallback(fallback: &FallbackConfig) -> Result<()> {
    if !fallback.expected_error_percent.is_finite()
        || fallback.expected_error_percent <= 0.0
        || fallback.expected_error_percent >= 100.0
    {
        anyhow::bail!(
            "expected_error_percent must be between 0 and 100, got {}",
            fallback.expected_error_percent
        );
    }
    if fallback.confidence == 0 || fallback.confidence >= 100 {
        anyhow::bail!("confidence must be between 1 and 99, got {}", fallback.confidence);
    }
    Ok(())
}
