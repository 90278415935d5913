//! Parameter report
//!
//! A key/value record of every input behind a sample, so a reviewer can
//! reproduce it: risk assessment, factor, significance, data, sizes, method,
//! seed, author and time. Written as a two-column CSV or printed.

use crate::config::cli_convert::column_letter;
use crate::config::reliability::{FactorResolution, RiskProfile};
use crate::config::Config;
use crate::sampling::size::{SampleSizeDecision, SizeSource};
use crate::sampling::SamplingOutcome;
use crate::stats::AggregateStats;
use crate::util::number::format_integer_with_spaces;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Local};
use std::path::Path;

/// Title row of the report
pub const REPORT_TITLE: &str = "Parametry vzorkovače";

/// Everything known at the time the report is built
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub config: &'a Config,
    pub factor: Option<&'a FactorResolution>,
    pub totals: Option<&'a AggregateStats>,
    pub size: Option<&'a SampleSizeDecision>,
    pub outcome: Option<&'a SamplingOutcome>,
    pub generated_at: DateTime<Local>,
}

/// Ordered key/value pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterReport {
    pub entries: Vec<(String, String)>,
}

fn yes_no(flag: bool) -> String {
    if flag { "Ano" } else { "Ne" }.to_string()
}

fn or_empty<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl ParameterReport {
    pub fn build(inputs: &ReportInputs<'_>) -> Self {
        let config = inputs.config;
        let rel = &config.reliability;
        let profile: Option<RiskProfile> = rel.risk_profile();
        let mut entries: Vec<(String, String)> = Vec::new();
        let mut push = |key: &str, value: String| entries.push((key.to_string(), value));

        push("Kontrolní riziko", or_empty(rel.control_risk));
        push("Přirozené riziko", or_empty(rel.inherent_risk));
        let rmm = rel.rmm_level.or(match inputs.factor.map(|f| f.source) {
            Some(crate::config::reliability::FactorSource::Table { rmm_level }) => Some(rmm_level),
            _ => None,
        });
        push("Hladina RMM", or_empty(rmm));
        push("Provádím analytické testy?", or_empty(rel.analytical_tests));
        push("Provádím testy kontrol?", or_empty(rel.control_tests));
        let factor = match (inputs.factor, profile) {
            (Some(f), _) => f.value.to_string(),
            (None, Some(p)) => p.to_string(),
            (None, None) => String::new(),
        };
        push("Faktor spolehlivosti (výsledný)", factor);

        let significance = config.significance.as_ref();
        push("Typ významnosti", or_empty(significance.map(|s| s.kind.clone())));
        push(
            "Hodnota významnosti",
            or_empty(config.materiality().map(format_integer_with_spaces)),
        );
        push(
            "Zdůvodnění významnosti",
            or_empty(significance.map(|s| s.effective_justification())),
        );

        push(
            "Oblast dat",
            or_empty(config.data.path.as_ref().map(|p| p.display().to_string())),
        );
        push(
            "Sloupec pro výběr",
            or_empty(config.value_column_index().ok().map(column_letter)),
        );

        push(
            "Celková suma absolutních hodnot",
            or_empty(inputs.totals.map(|t| format_integer_with_spaces(t.total_ceil()))),
        );
        push("Vypočtená velikost vzorku", or_empty(inputs.size.and_then(|s| s.computed)));
        if let Some(decision) = inputs.size {
            match &decision.source {
                SizeSource::Requested { reason } => {
                    push("Použít vypočtenou velikost", yes_no(false));
                    push("Uživatelská velikost vzorku", decision.size.to_string());
                    push("Důvod uživatelské velikosti", reason.clone().unwrap_or_default());
                }
                _ => push("Použít vypočtenou velikost", yes_no(true)),
            }
        }

        push("Metoda výběru vzorku", config.sample.method.to_string());
        push("Finální velikost vzorku", or_empty(inputs.size.map(|s| s.size)));
        push("Vyloučit nadlimitní položky", yes_no(config.sample.exclude_above_significance));
        let walk_total = inputs
            .outcome
            .and_then(|o| o.total_value)
            .or_else(|| inputs.totals.map(|t| t.walk_total(config.sample.exclude_above_significance)));
        push(
            "Suma pro výpočet (po úpravě)",
            or_empty(walk_total.map(format_integer_with_spaces)),
        );
        let above = inputs
            .outcome
            .map(|o| o.above_threshold_rows)
            .or_else(|| inputs.totals.map(|t| t.above_threshold_count));
        push("Počet položek nad významností", or_empty(above));
        push("Seed pro generátor", or_empty(config.sample.seed.as_deref()));

        push("Autor vzorku", config.author().to_string());
        push(
            "Datum a čas vyhotovení",
            inputs.generated_at.format("%d.%m.%Y %H:%M:%S").to_string(),
        );

        Self { entries }
    }

    /// Report as aligned text lines
    pub fn render_text(&self) -> String {
        let width = self.entries.iter().map(|(k, _)| k.chars().count()).max().unwrap_or(0);
        let mut out = format!("{}\n", REPORT_TITLE);
        for (key, value) in &self.entries {
            let pad = width - key.chars().count();
            out.push_str(&format!("  {}{}  {}\n", key, " ".repeat(pad), value));
        }
        out
    }

    /// Write the report as a two-column CSV, title row first
    pub fn write_csv(&self, path: &Path, delimiter: u8) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_path(path)
            .with_context(|| format!("Failed to create parameter report: {}", path.display()))?;
        writer.write_record([REPORT_TITLE, ""])?;
        for (key, value) in &self.entries {
            writer.write_record([key.as_str(), value.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Value recorded under `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::reliability::{Answer, FactorSource, RiskLevel};
    use crate::config::SignificanceConfig;
    use crate::source::Cell;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn config() -> Config {
        let mut config = Config::default();
        config.data.path = Some("ledger.csv".into());
        config.data.value_column = Some("3".into());
        config.reliability.control_risk = Some(RiskLevel::Medium);
        config.reliability.inherent_risk = Some(RiskLevel::High);
        config.reliability.analytical_tests = Some(Answer::No);
        config.reliability.control_tests = Some(Answer::Yes);
        config.significance = Some(SignificanceConfig {
            kind: "Prováděcí".into(),
            value: Cell::from("50000"),
            justification: None,
        });
        config.sample.seed = Some("fixed".into());
        config
    }

    fn timestamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap()
    }

    #[test]
    fn test_report_records_inputs() {
        let config = config();
        let factor = FactorResolution {
            value: 2.3,
            source: FactorSource::Table {
                rmm_level: RiskLevel::Medium,
            },
        };
        let totals = AggregateStats {
            total_absolute_value: 1_234_567.2,
            row_count: 100,
            adjusted_total: 1_234_567.2,
            above_threshold_count: 0,
            unparsable_count: 0,
        };
        let size = SampleSizeDecision {
            size: 57,
            source: SizeSource::Monetary,
            computed: Some(57),
        };
        let report = ParameterReport::build(&ReportInputs {
            config: &config,
            factor: Some(&factor),
            totals: Some(&totals),
            size: Some(&size),
            outcome: None,
            generated_at: timestamp(),
        });

        assert_eq!(report.get("Kontrolní riziko"), Some("Střední"));
        assert_eq!(report.get("Hladina RMM"), Some("Střední"));
        assert_eq!(report.get("Faktor spolehlivosti (výsledný)"), Some("2.3"));
        assert_eq!(report.get("Hodnota významnosti"), Some("50 000"));
        assert_eq!(report.get("Zdůvodnění významnosti"), Some("NEVYPLŇOVAT"));
        assert_eq!(report.get("Sloupec pro výběr"), Some("C"));
        assert_eq!(report.get("Celková suma absolutních hodnot"), Some("1 234 568"));
        assert_eq!(report.get("Použít vypočtenou velikost"), Some("Ano"));
        assert_eq!(report.get("Uživatelská velikost vzorku"), None);
        assert_eq!(report.get("Finální velikost vzorku"), Some("57"));
        assert_eq!(report.get("Autor vzorku"), Some("Neznámý uživatel"));
        assert_eq!(report.get("Datum a čas vyhotovení"), Some("05.03.2024 14:07:09"));
    }

    #[test]
    fn test_report_records_override() {
        let config = config();
        let size = SampleSizeDecision {
            size: 40,
            source: SizeSource::Requested {
                reason: Some("client request".into()),
            },
            computed: Some(57),
        };
        let report = ParameterReport::build(&ReportInputs {
            config: &config,
            factor: None,
            totals: None,
            size: Some(&size),
            outcome: None,
            generated_at: timestamp(),
        });
        assert_eq!(report.get("Použít vypočtenou velikost"), Some("Ne"));
        assert_eq!(report.get("Vypočtená velikost vzorku"), Some("57"));
        assert_eq!(report.get("Uživatelská velikost vzorku"), Some("40"));
        assert_eq!(report.get("Důvod uživatelské velikosti"), Some("client request"));
        assert!(report
            .get("Faktor spolehlivosti (výsledný)")
            .unwrap()
            .starts_with("Kontrolní riziko: Střední"));
    }

    #[test]
    fn test_report_csv() {
        let config = config();
        let report = ParameterReport::build(&ReportInputs {
            config: &config,
            factor: None,
            totals: None,
            size: None,
            outcome: None,
            generated_at: timestamp(),
        });
        let file = NamedTempFile::new().unwrap();
        report.write_csv(file.path(), b',').unwrap();
        let written = std::fs::read_to_string(file.path()).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("Parametry vzorkovače,"));
        assert_eq!(lines.next(), Some("Kontrolní riziko,Střední"));
        assert_eq!(written.lines().count(), report.entries.len() + 1);

        let text = report.render_text();
        assert!(text.starts_with("Parametry vzorkovače\n"));
        assert!(text.contains("Seed pro generátor"));
    }
}
