//! Sample-size determination
//!
//! Two formulas are available:
//!
//! - **Monetary** (primary): `n = ceil(total * factor / materiality)`
//! - **Attribute** (fallback): `n = z² p (1-p) / e²` with finite-population
//!   correction `n' = n / (1 + (n-1)/N)`, `p = 0.5`
//!
//! [`resolve_sample_size`] applies a fixed precedence: a size the user asked
//! for, then the monetary formula, then the attribute fallback. If none of them
//! has its inputs, the caller gets a configuration error that names what is
//! missing instead of a guess.

use crate::error::SamplingError;
use serde::{Deserialize, Serialize};

/// `ceil(total_value * factor / materiality)`, at least 1
///
/// `factor` and `materiality` must be positive and `total_value` finite and
/// non-negative.
///
/// ```
/// use auditsample::sampling::size::size;
/// assert_eq!(size(100_000.0, 1.1, 50_000.0).unwrap(), 3);
/// ```
pub fn size(total_value: f64, factor: f64, materiality: f64) -> Result<u64, SamplingError> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(SamplingError::config(format!(
            "reliability factor must be a positive number, got {}",
            factor
        )));
    }
    if !materiality.is_finite() || materiality <= 0.0 {
        return Err(SamplingError::config(format!(
            "materiality must be a positive number, got {}",
            materiality
        )));
    }
    if !total_value.is_finite() || total_value < 0.0 {
        return Err(SamplingError::config(format!(
            "total value must be a non-negative number, got {}",
            total_value
        )));
    }

    let raw = total_value * factor / materiality;
    Ok(round_up_size(raw, "monetary sample size")?.max(1))
}

/// `ceil(raw)` as a count, rejecting results a `u64` cannot hold
fn round_up_size(raw: f64, what: &str) -> Result<u64, SamplingError> {
    let rounded = raw.ceil();
    if !rounded.is_finite() || rounded < 0.0 || rounded >= u64::MAX as f64 {
        return Err(SamplingError::config(format!(
            "{} {} is out of range",
            what, raw
        )));
    }
    Ok(rounded as u64)
}

/// Inputs of the attribute-sampling fallback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributeInputs {
    /// Confidence level in percent (95, 99, anything else is treated as 90)
    pub confidence: u32,
    /// Tolerable error in percent
    pub expected_error_percent: f64,
    /// Population size; 0 disables the finite-population correction
    pub population: u64,
}

/// z-score for a confidence level
pub fn z_score(confidence: u32) -> f64 {
    match confidence {
        95 => 1.96,
        99 => 2.58,
        _ => 1.645,
    }
}

/// Attribute-sampling size with finite-population correction, at least 1
pub fn attribute_size(inputs: &AttributeInputs) -> Result<u64, SamplingError> {
    let e = inputs.expected_error_percent / 100.0;
    if !e.is_finite() || e <= 0.0 {
        return Err(SamplingError::config(format!(
            "expected error must be a positive percentage, got {}",
            inputs.expected_error_percent
        )));
    }

    let z = z_score(inputs.confidence);
    let p = 0.5;
    let mut n = z * z * p * (1.0 - p) / (e * e);
    if inputs.population > 0 {
        n /= 1.0 + (n - 1.0) / inputs.population as f64;
    }
    Ok(round_up_size(n, "attribute sample size")?.max(1))
}

/// A size the user chose instead of the computed one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestedSize {
    /// Requested size before rounding up
    pub value: f64,
    /// Why the computed size was not used
    pub reason: Option<String>,
}

/// Everything [`resolve_sample_size`] may draw on
#[derive(Debug, Clone, Default)]
pub struct SizeInputs {
    pub requested: Option<RequestedSize>,
    pub total_value: Option<f64>,
    pub factor: Option<f64>,
    pub materiality: Option<f64>,
    pub fallback: Option<AttributeInputs>,
}

/// Where the final size came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SizeSource {
    Requested { reason: Option<String> },
    Monetary,
    AttributeFallback,
}

/// Outcome of size resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSizeDecision {
    /// Size the sampling run should use
    pub size: u64,
    /// Which rule produced `size`
    pub source: SizeSource,
    /// Formula result, kept for reporting even when a requested size overrides it
    pub computed: Option<u64>,
}

/// Decide the sample size
///
/// Precedence: requested size, then the monetary formula (when factor,
/// materiality and total are all present and usable), then the attribute
/// fallback (when configured).
pub fn resolve_sample_size(inputs: &SizeInputs) -> Result<SampleSizeDecision, SamplingError> {
    let monetary = match (inputs.total_value, inputs.factor, inputs.materiality) {
        (Some(total), Some(factor), Some(materiality)) if factor > 0.0 && materiality > 0.0 => {
            Some(size(total, factor, materiality)?)
        }
        _ => None,
    };

    let (computed, computed_source) = match (monetary, &inputs.fallback) {
        (Some(n), _) => (Some(n), Some(SizeSource::Monetary)),
        (None, Some(fallback)) => (Some(attribute_size(fallback)?), Some(SizeSource::AttributeFallback)),
        (None, None) => (None, None),
    };

    if let Some(requested) = &inputs.requested {
        if !requested.value.is_finite() || requested.value <= 0.0 {
            return Err(SamplingError::config(format!(
                "requested sample size must be a positive number, got {}",
                requested.value
            )));
        }
        return Ok(SampleSizeDecision {
            size: round_up_size(requested.value, "requested sample size")?,
            source: SizeSource::Requested {
                reason: requested.reason.clone(),
            },
            computed,
        });
    }

    match (computed, computed_source) {
        (Some(n), Some(source)) => Ok(SampleSizeDecision {
            size: n,
            source,
            computed,
        }),
        _ => Err(SamplingError::config(format!(
            "cannot determine sample size: {}",
            describe_missing(inputs)
        ))),
    }
}

fn describe_missing(inputs: &SizeInputs) -> String {
    let mut missing = Vec::new();
    match inputs.factor {
        None => missing.push("reliability factor is not set".to_string()),
        Some(f) if f <= 0.0 => missing.push(format!("reliability factor {} is not positive", f)),
        _ => {}
    }
    match inputs.materiality {
        None => missing.push("materiality is not set".to_string()),
        Some(m) if m <= 0.0 => missing.push(format!("materiality {} is not positive", m)),
        _ => {}
    }
    if inputs.total_value.is_none() {
        missing.push("total value has not been computed".to_string());
    }
    missing.push("no attribute fallback is configured".to_string());
    missing.join("; ")
}
