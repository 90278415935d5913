//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, the risk-factor
//! table and validation.
//!
//! A configuration file has six sections, all optional:
//!
//! ```toml
//! [data]
//! path = "ledger.csv"
//! value_column = "C"        # letter or 1-based number
//! delimiter = ";"
//!
//! [reliability]
//! control_risk = "Střední"
//! inherent_risk = "Vysoké"
//! analytical_tests = "Ne"
//! control_tests = "Ano"
//!
//! [significance]
//! kind = "Prováděcí"
//! value = "50 000"
//!
//! [sample]
//! method = "monetary-interval"
//! seed = "audit-2024"
//! exclude_above_significance = true
//!
//! [fallback]
//! confidence = 95
//! expected_error_percent = 5.0
//!
//! [output]
//! annotations = "ledger-sample.csv"
//! json = "summary.json"
//! ```

pub mod cli;
pub mod cli_convert;
pub mod reliability;
pub mod toml;
pub mod validator;

use crate::sampling::size::{AttributeInputs, RequestedSize, SizeInputs};
use crate::sampling::{Method, Paging};
use crate::source::{Cell, DEFAULT_BATCH_SIZE, DEFAULT_OUTPUT_BATCH_SIZE, DEFAULT_YIELD_EVERY};
use crate::util::number::parse_number;
use anyhow::Result;
use reliability::{Answer, RiskLevel, RiskProfile};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Justification recorded for the `Prováděcí` significance kind
pub const PERFORMANCE_JUSTIFICATION: &str = "NEVYPLŇOVAT";

/// Significance kind that needs no justification
pub const PERFORMANCE_KIND: &str = "Prováděcí";

/// Author recorded when none is configured
pub const DEFAULT_AUTHOR: &str = "Neznámý uživatel";

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub reliability: ReliabilityConfig,
    pub significance: Option<SignificanceConfig>,
    #[serde(default)]
    pub sample: SampleConfig,
    pub fallback: Option<FallbackConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Dataset location and paging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// CSV file holding the range (header row first)
    pub path: Option<PathBuf>,
    /// Value column: letter (`C`, `AB`) or 1-based number
    pub value_column: Option<String>,
    /// Field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Rows per read batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Rows per write batch
    #[serde(default = "default_output_batch_size")]
    pub output_batch_size: usize,
    /// Batches between cooperative yields
    #[serde(default = "default_yield_every")]
    pub yield_every: u64,
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_output_batch_size() -> usize {
    DEFAULT_OUTPUT_BATCH_SIZE
}

fn default_yield_every() -> u64 {
    DEFAULT_YIELD_EVERY
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            value_column: None,
            delimiter: default_delimiter(),
            batch_size: default_batch_size(),
            output_batch_size: default_output_batch_size(),
            yield_every: default_yield_every(),
        }
    }
}

/// Reliability factor: explicit, or looked up from the risk assessment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Explicit factor; wins over the table
    pub factor: Option<f64>,
    pub control_risk: Option<RiskLevel>,
    pub inherent_risk: Option<RiskLevel>,
    pub rmm_level: Option<RiskLevel>,
    pub analytical_tests: Option<Answer>,
    pub control_tests: Option<Answer>,
    /// Replacement risk table (TOML with `[[entry]]` items)
    pub table: Option<PathBuf>,
}

impl ReliabilityConfig {
    /// Risk profile, if every required answer is present
    pub fn risk_profile(&self) -> Option<RiskProfile> {
        Some(RiskProfile {
            control_risk: self.control_risk?,
            inherent_risk: self.inherent_risk?,
            rmm_level: self.rmm_level,
            analytical_tests: self.analytical_tests?,
            control_tests: self.control_tests?,
        })
    }

    /// True when some but not all risk answers are given
    pub fn is_partial_profile(&self) -> bool {
        let given = [
            self.control_risk.is_some(),
            self.inherent_risk.is_some(),
            self.analytical_tests.is_some(),
            self.control_tests.is_some(),
        ];
        given.iter().any(|g| *g) && !given.iter().all(|g| *g)
    }
}

/// Significance (materiality) level
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignificanceConfig {
    /// `Prováděcí` or another kind
    pub kind: String,
    /// Amount, as a number or a formatted string
    pub value: Cell,
    pub justification: Option<String>,
}

impl SignificanceConfig {
    /// `|value|`, if it parses
    pub fn amount(&self) -> Option<f64> {
        parse_number(&self.value).map(f64::abs)
    }

    pub fn is_performance(&self) -> bool {
        self.kind.trim() == PERFORMANCE_KIND
    }

    /// Justification as recorded in reports
    pub fn effective_justification(&self) -> String {
        if self.is_performance() {
            PERFORMANCE_JUSTIFICATION.to_string()
        } else {
            self.justification.clone().unwrap_or_default()
        }
    }
}

/// Selection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleConfig {
    #[serde(default)]
    pub method: Method,
    /// Size to use instead of the computed one
    pub size: Option<f64>,
    /// Why the computed size is overridden
    pub size_reason: Option<String>,
    /// Precomputed walk total (skips the totalization pass)
    pub total: Option<f64>,
    pub seed: Option<String>,
    /// Flag rows above the significance level and keep them out of the walk
    #[serde(default)]
    pub exclude_above_significance: bool,
    /// Recorded in the parameter report
    pub author: Option<String>,
}

/// Attribute-sampling fallback for the size calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_confidence")]
    pub confidence: u32,
    pub expected_error_percent: f64,
    /// Defaults to the number of data rows
    pub population: Option<u64>,
}

fn default_confidence() -> u32 {
    95
}

/// Output destinations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// CSV receiving the per-row annotations
    pub annotations: Option<PathBuf>,
    /// JSON summary file
    pub json: Option<PathBuf>,
    /// Two-column CSV parameter report
    pub params: Option<PathBuf>,
    /// Print the text summary on stdout
    #[serde(default = "default_true")]
    pub print_summary: bool,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// 0-based value column
    pub fn value_column_index(&self) -> Result<usize> {
        match &self.data.value_column {
            Some(column) => cli_convert::parse_column(column),
            None => anyhow::bail!("No value column configured (data.value_column or --column)"),
        }
    }

    /// Field delimiter byte
    pub fn delimiter(&self) -> Result<u8> {
        cli_convert::parse_delimiter(&self.data.delimiter)
    }

    /// Materiality used by the size formula
    pub fn materiality(&self) -> Option<f64> {
        self.significance.as_ref().and_then(|s| s.amount())
    }

    /// Threshold for significance exclusion, when it is on
    pub fn exclude_threshold(&self) -> Option<f64> {
        if self.sample.exclude_above_significance {
            self.materiality()
        } else {
            None
        }
    }

    pub fn paging(&self) -> Paging {
        Paging {
            batch_size: self.data.batch_size,
            output_batch_size: self.data.output_batch_size,
            yield_every: self.data.yield_every,
        }
    }

    /// Inputs for size resolution, given the total, the resolved factor and the row count
    pub fn size_inputs(&self, total: Option<f64>, factor: Option<f64>, data_rows: u64) -> SizeInputs {
        SizeInputs {
            requested: self.sample.size.map(|value| RequestedSize {
                value,
                reason: self.sample.size_reason.clone(),
            }),
            total_value: total,
            factor,
            materiality: self.materiality(),
            fallback: self.fallback.as_ref().map(|f| AttributeInputs {
                confidence: f.confidence,
                expected_error_percent: f.expected_error_percent,
                population: f.population.unwrap_or(data_rows),
            }),
        }
    }

    pub fn author(&self) -> &str {
        self.sample.author.as_deref().unwrap_or(DEFAULT_AUTHOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.data.batch_size, 1500);
        assert_eq!(config.data.output_batch_size, 800);
        assert_eq!(config.sample.method, Method::MonetaryInterval);
        assert_eq!(config.author(), "Neznámý uživatel");
        assert!(config.exclude_threshold().is_none());
    }

    #[test]
    fn test_significance_rules() {
        let sig = SignificanceConfig {
            kind: "Prováděcí".into(),
            value: Cell::from("-50 000"),
            justification: Some("ignored".into()),
        };
        assert_eq!(sig.amount(), Some(50_000.0));
        assert_eq!(sig.effective_justification(), "NEVYPLŇOVAT");

        let sig = SignificanceConfig {
            kind: "Celková".into(),
            value: Cell::Number(1000.0),
            justification: Some("board decision".into()),
        };
        assert_eq!(sig.effective_justification(), "board decision");
    }

    #[test]
    fn test_exclusion_uses_materiality() {
        let mut config = Config::default();
        config.significance = Some(SignificanceConfig {
            kind: "Prováděcí".into(),
            value: Cell::Number(40.0),
            justification: None,
        });
        assert_eq!(config.exclude_threshold(), None);
        config.sample.exclude_above_significance = true;
        assert_eq!(config.exclude_threshold(), Some(40.0));
    }

    #[test]
    fn test_risk_profile_needs_all_answers() {
        let mut rel = ReliabilityConfig {
            control_risk: Some(RiskLevel::Low),
            inherent_risk: Some(RiskLevel::High),
            ..Default::default()
        };
        assert!(rel.risk_profile().is_none());
        assert!(rel.is_partial_profile());

        rel.analytical_tests = Some(Answer::No);
        rel.control_tests = Some(Answer::Yes);
        assert!(rel.risk_profile().is_some());
        assert!(!rel.is_partial_profile());
    }

    #[test]
    fn test_size_inputs_population_defaults_to_rows() {
        let mut config = Config::default();
        config.fallback = Some(FallbackConfig {
            confidence: 95,
            expected_error_percent: 5.0,
            population: None,
        });
        let inputs = config.size_inputs(Some(10.0), None, 1000);
        assert_eq!(inputs.fallback.unwrap().population, 1000);
        assert!(inputs.requested.is_none());
    }
}
