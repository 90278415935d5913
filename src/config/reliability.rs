//! Reliability factor and its risk table
//!
//! The reliability factor scales the monetary sample size. It is either given
//! directly or looked up from the auditor's risk assessment: control risk,
//! inherent risk, the resulting RMM level and whether analytical tests and
//! tests of controls are performed.
//!
//! Some combinations have no factor at all: relying on controls that are not
//! tested (or testing controls that are not relied upon) is inconsistent, and
//! the table marks it with `Test kontrol Error`.
//!
//! A replacement table can be loaded from TOML:
//!
//! ```toml
//! [[entry]]
//! control_risk = "Nízké"
//! inherent_risk = "Nízké"
//! rmm_level = "Nízké"
//! analytical_tests = "Ne"
//! control_tests = "Ano"
//! factor = 0.7
//! ```

use crate::error::SamplingError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Marker the table uses for an inconsistent risk profile
pub const CONTROL_TEST_ERROR: &str = "Test kontrol Error";

/// Risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Nízké", alias = "low")]
    Low,
    #[serde(rename = "Střední", alias = "medium")]
    Medium,
    #[serde(rename = "Vysoké", alias = "high")]
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "Nízké",
            RiskLevel::Medium => "Střední",
            RiskLevel::High => "Vysoké",
        })
    }
}

/// Yes/no answer in the risk assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Answer {
    #[serde(rename = "Ano", alias = "yes")]
    Yes,
    #[serde(rename = "Ne", alias = "no")]
    No,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Answer::Yes => "Ano",
            Answer::No => "Ne",
        })
    }
}

/// Table cell: a factor, or the inconsistency marker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFactor", into = "RawFactor")]
pub enum TableFactor {
    Value(f64),
    ControlTestError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawFactor {
    Number(f64),
    Text(String),
}

impl TryFrom<RawFactor> for TableFactor {
    type Error = String;

    fn try_from(raw: RawFactor) -> Result<Self, Self::Error> {
        match raw {
            RawFactor::Number(v) => Ok(TableFactor::Value(v)),
            RawFactor::Text(s) if s.trim() == CONTROL_TEST_ERROR => Ok(TableFactor::ControlTestError),
            RawFactor::Text(s) => s
                .trim()
                .parse::<f64>()
                .map(TableFactor::Value)
                .map_err(|_| format!("invalid factor '{}'", s)),
        }
    }
}

impl From<TableFactor> for RawFactor {
    fn from(factor: TableFactor) -> Self {
        match factor {
            TableFactor::Value(v) => RawFactor::Number(v),
            TableFactor::ControlTestError => RawFactor::Text(CONTROL_TEST_ERROR.to_string()),
        }
    }
}

/// The auditor's risk assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub control_risk: RiskLevel,
    pub inherent_risk: RiskLevel,
    /// Derived from the other two when absent
    pub rmm_level: Option<RiskLevel>,
    pub analytical_tests: Answer,
    pub control_tests: Answer,
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Kontrolní riziko: {}, Přirozené riziko: {}, Hladina RMM: {}, Analytické testy: {}, Testy kontrol: {}",
            self.control_risk,
            self.inherent_risk,
            self.rmm_level.map_or_else(|| "-".to_string(), |l| l.to_string()),
            self.analytical_tests,
            self.control_tests
        )
    }
}

/// One row of the risk table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorEntry {
    pub control_risk: RiskLevel,
    pub inherent_risk: RiskLevel,
    pub rmm_level: RiskLevel,
    pub analytical_tests: Answer,
    pub control_tests: Answer,
    pub factor: TableFactor,
}

impl FactorEntry {
    fn matches(&self, profile: &RiskProfile) -> bool {
        self.control_risk == profile.control_risk
            && self.inherent_risk == profile.inherent_risk
            && profile.rmm_level.map_or(true, |l| l == self.rmm_level)
            && self.analytical_tests == profile.analytical_tests
            && self.control_tests == profile.control_tests
    }
}

/// Risk-profile to factor mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorTable {
    #[serde(rename = "entry")]
    pub entries: Vec<FactorEntry>,
}

impl Default for FactorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FactorTable {
    /// Table shipped with the tool
    pub fn builtin() -> Self {
        use Answer::{No, Yes};
        use RiskLevel::{High, Low, Medium};
        use TableFactor::{ControlTestError as E, Value as V};

        // (control, inherent, rmm, [factor for analytical/control = Ano/Ano, Ano/Ne, Ne/Ano, Ne/Ne])
        let blocks = [
            (Low, Low, Low, [V(0.0), E, V(0.7), E]),
            (Low, Medium, Low, [V(0.0), E, V(1.1), E]),
            (Low, High, Medium, [V(0.7), E, V(1.6), E]),
            (Medium, Low, Low, [V(0.7), E, V(1.4), E]),
            (Medium, Medium, Medium, [V(1.1), E, V(1.8), E]),
            (Medium, High, Medium, [V(1.4), E, V(2.3), E]),
            (High, Low, Low, [E, V(1.1), E, V(1.9)]),
            (High, Medium, Medium, [E, V(1.4), E, V(2.3)]),
            (High, High, High, [E, V(1.9), E, V(3.0)]),
        ];
        let answers = [(Yes, Yes), (Yes, No), (No, Yes), (No, No)];

        let entries = blocks
            .iter()
            .flat_map(|&(control_risk, inherent_risk, rmm_level, factors)| {
                answers
                    .iter()
                    .zip(factors)
                    .map(move |(&(analytical_tests, control_tests), factor)| FactorEntry {
                        control_risk,
                        inherent_risk,
                        rmm_level,
                        analytical_tests,
                        control_tests,
                        factor,
                    })
            })
            .collect();

        Self { entries }
    }

    /// Parse a table from TOML (`[[entry]]` items)
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        let table: FactorTable = ::toml::from_str(contents).context("Failed to parse factor table")?;
        Ok(table)
    }

    /// Load a table file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read factor table: {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("Failed to parse factor table: {}", path.display()))
    }

    /// First entry matching `profile`
    pub fn lookup(&self, profile: &RiskProfile) -> Option<&FactorEntry> {
        self.entries.iter().find(|e| e.matches(profile))
    }
}

/// Where the factor in use came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FactorSource {
    Explicit,
    Table { rmm_level: RiskLevel },
}

/// A resolved reliability factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FactorResolution {
    pub value: f64,
    pub source: FactorSource,
}

/// Pick the factor: an explicit value wins over the table lookup
///
/// Returns `Ok(None)` when neither is available. A profile the table does not
/// cover, or one marked `Test kontrol Error`, is a configuration error.
pub fn resolve_factor(
    explicit: Option<f64>,
    profile: Option<&RiskProfile>,
    table: &FactorTable,
) -> Result<Option<FactorResolution>, SamplingError> {
    if let Some(value) = explicit {
        if !value.is_finite() || value < 0.0 {
            return Err(SamplingError::config(format!(
                "reliability factor must be a non-negative number, got {}",
                value
            )));
        }
        return Ok(Some(FactorResolution {
            value,
            source: FactorSource::Explicit,
        }));
    }

    let Some(profile) = profile else {
        return Ok(None);
    };
    let entry = table
        .lookup(profile)
        .ok_or_else(|| SamplingError::config(format!("no reliability factor for risk profile ({})", profile)))?;

    match entry.factor {
        TableFactor::Value(value) => Ok(Some(FactorResolution {
            value,
            source: FactorSource::Table {
                rmm_level: entry.rmm_level,
            },
        })),
        TableFactor::ControlTestError => Err(SamplingError::config(format!(
            "risk profile ({}) is inconsistent: {}",
            profile, CONTROL_TEST_ERROR
        ))),
    }
}
