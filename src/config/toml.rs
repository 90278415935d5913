//! TOML configuration file parsing

use super::*;
use crate::config::cli::{Command, DataArgs, SampleArgs, SizingArgs};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(command: &Command, mut config: Config) -> Result<Config> {
    match command {
        Command::Total(args) => {
            merge_data(&args.data, &mut config);
            if let Some(threshold) = &args.threshold {
                config.significance = Some(SignificanceConfig {
                    kind: config
                        .significance
                        .as_ref()
                        .map(|s| s.kind.clone())
                        .unwrap_or_else(|| PERFORMANCE_KIND.to_string()),
                    value: Cell::from(threshold.as_str()),
                    justification: config.significance.as_ref().and_then(|s| s.justification.clone()),
                });
                config.sample.exclude_above_significance = true;
            }
        }
        Command::Size(args) => {
            merge_data(&args.data, &mut config);
            merge_sizing(&args.sizing, &mut config)?;
        }
        Command::Sample(args) | Command::Params(args) => {
            merge_data(&args.data, &mut config);
            merge_sizing(&args.sizing, &mut config)?;
            merge_sample(args, &mut config);
        }
        Command::Seed => {}
    }
    Ok(config)
}

fn merge_data(args: &DataArgs, config: &mut Config) {
    if let Some(path) = &args.input {
        config.data.path = Some(path.clone());
    }
    if let Some(column) = &args.column {
        config.data.value_column = Some(column.clone());
    }
    if let Some(delimiter) = &args.delimiter {
        config.data.delimiter = delimiter.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.data.batch_size = batch_size;
    }
    if let Some(output_batch_size) = args.output_batch_size {
        config.data.output_batch_size = output_batch_size;
    }
}

fn merge_sizing(args: &SizingArgs, config: &mut Config) -> Result<()> {
    let rel = &mut config.reliability;
    if args.factor.is_some() {
        rel.factor = args.factor;
    }
    if let Some(level) = args.control_risk {
        rel.control_risk = Some(level.into());
    }
    if let Some(level) = args.inherent_risk {
        rel.inherent_risk = Some(level.into());
    }
    if let Some(level) = args.rmm_level {
        rel.rmm_level = Some(level.into());
    }
    if let Some(answer) = args.analytical_tests {
        rel.analytical_tests = Some(answer.into());
    }
    if let Some(answer) = args.control_tests {
        rel.control_tests = Some(answer.into());
    }

    if args.significance.is_some() || args.significance_kind.is_some() || args.justification.is_some() {
        let existing = config.significance.take();
        let value = match (&args.significance, &existing) {
            (Some(raw), _) => Cell::from(raw.as_str()),
            (None, Some(sig)) => sig.value.clone(),
            (None, None) => anyhow::bail!("--significance is required when setting the significance kind or justification"),
        };
        let kind = args
            .significance_kind
            .clone()
            .or_else(|| existing.as_ref().map(|s| s.kind.clone()))
            .unwrap_or_else(|| PERFORMANCE_KIND.to_string());
        let justification = args
            .justification
            .clone()
            .or_else(|| existing.as_ref().and_then(|s| s.justification.clone()));
        config.significance = Some(SignificanceConfig {
            kind,
            value,
            justification,
        });
    }

    if args.total.is_some() {
        config.sample.total = args.total;
    }
    if args.size.is_some() {
        config.sample.size = args.size;
    }
    if args.size_reason.is_some() {
        config.sample.size_reason = args.size_reason.clone();
    }

    if args.confidence.is_some() || args.expected_error.is_some() {
        let existing = config.fallback.take();
        let expected_error_percent = match (args.expected_error, &existing) {
            (Some(e), _) => e,
            (None, Some(f)) => f.expected_error_percent,
            (None, None) => anyhow::bail!("--expected-error is required for the attribute fallback"),
        };
        config.fallback = Some(FallbackConfig {
            confidence: args
                .confidence
                .or_else(|| existing.as_ref().map(|f| f.confidence))
                .unwrap_or(95),
            expected_error_percent,
            population: existing.and_then(|f| f.population),
        });
    }
    Ok(())
}

fn merge_sample(args: &SampleArgs, config: &mut Config) {
    if let Some(method) = args.method {
        config.sample.method = method;
    }
    if args.random_seed {
        config.sample.seed = Some(crate::rng::make_random_seed());
    } else if args.seed.is_some() {
        config.sample.seed = args.seed.clone();
    }
    if args.exclude_above_significance {
        config.sample.exclude_above_significance = true;
    }
    if args.author.is_some() {
        config.sample.author = args.author.clone();
    }
    if args.output.is_some() {
        config.output.annotations = args.output.clone();
    }
    if args.json.is_some() {
        config.output.json = args.json.clone();
    }
    if args.params.is_some() {
        config.output.params = args.params.clone();
    }
    if args.quiet {
        config.output.print_summary = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::Cli;
    use crate::config::reliability::{Answer, RiskLevel};
    use clap::Parser;

    const CONFIG: &str = r#"
        [data]
        path = "ledger.csv"
        value_column = "B"
        delimiter = ";"

        [reliability]
        control_risk = "Střední"
        inherent_risk = "Vysoké"
        analytical_tests = "Ne"
        control_tests = "Ano"

        [significance]
        kind = "Celková"
        value = "50 000"
        justification = "planning memo"

        [sample]
        method = "simple-random"
        seed = "audit-2024"

        [fallback]
        expected_error_percent = 5.0

        [output]
        json = "summary.json"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_toml_string(CONFIG).unwrap();
        assert_eq!(config.data.value_column.as_deref(), Some("B"));
        assert_eq!(config.delimiter().unwrap(), b';');
        assert_eq!(config.data.batch_size, 1500);
        assert_eq!(config.reliability.inherent_risk, Some(RiskLevel::High));
        assert_eq!(config.reliability.control_tests, Some(Answer::Yes));
        assert_eq!(config.materiality(), Some(50_000.0));
        assert_eq!(config.sample.method, Method::SimpleRandom);
        assert_eq!(config.fallback.as_ref().unwrap().confidence, 95);
        assert!(config.output.print_summary);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_toml_string("").unwrap();
        assert!(config.data.path.is_none());
        assert!(config.significance.is_none());
    }

    #[test]
    fn test_numeric_significance_value() {
        let config = parse_toml_string("[significance]\nkind = \"Prováděcí\"\nvalue = 12500\n").unwrap();
        assert_eq!(config.materiality(), Some(12_500.0));
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        assert!(parse_toml_string("[sample]\nmethod = \"stratified\"\n").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let cli = Cli::try_parse_from([
            "auditsample",
            "sample",
            "other.csv",
            "--column",
            "3",
            "--method",
            "monetary-interval",
            "--significance",
            "1 000",
            "--factor",
            "1.4",
            "--quiet",
        ])
        .unwrap();
        let config = merge_cli_with_config(&cli.command, parse_toml_string(CONFIG).unwrap()).unwrap();

        assert_eq!(config.data.path, Some(PathBuf::from("other.csv")));
        assert_eq!(config.value_column_index().unwrap(), 2);
        assert_eq!(config.sample.method, Method::MonetaryInterval);
        assert_eq!(config.sample.seed.as_deref(), Some("audit-2024"));
        assert_eq!(config.reliability.factor, Some(1.4));
        let sig = config.significance.as_ref().unwrap();
        assert_eq!(sig.kind, "Celková");
        assert_eq!(sig.justification.as_deref(), Some("planning memo"));
        assert_eq!(config.materiality(), Some(1000.0));
        assert!(!config.output.print_summary);
    }

    #[test]
    fn test_rmm_level_flag_reaches_risk_profile() {
        let cli = Cli::try_parse_from([
            "auditsample",
            "size",
            "--control-risk",
            "medium",
            "--inherent-risk",
            "high",
            "--rmm-level",
            "low",
            "--analytical-tests",
            "no",
            "--control-tests",
            "yes",
        ])
        .unwrap();
        let config = merge_cli_with_config(&cli.command, Config::default()).unwrap();
        assert_eq!(config.reliability.rmm_level, Some(RiskLevel::Low));
        let profile = config.reliability.risk_profile().unwrap();
        assert_eq!(profile.rmm_level, Some(RiskLevel::Low));
    }

    #[test]
    fn test_random_seed_flag_generates_seed() {
        let cli = Cli::try_parse_from(["auditsample", "sample", "--random-seed"]).unwrap();
        let config = merge_cli_with_config(&cli.command, Config::default()).unwrap();
        let seed = config.sample.seed.unwrap();
        assert!(seed.contains('-'));
    }

    #[test]
    fn test_total_threshold_turns_on_exclusion() {
        let cli = Cli::try_parse_from(["auditsample", "total", "data.csv", "--threshold", "40"]).unwrap();
        let config = merge_cli_with_config(&cli.command, Config::default()).unwrap();
        assert_eq!(config.exclude_threshold(), Some(40.0));
    }

    #[test]
    fn test_fallback_needs_expected_error() {
        let cli = Cli::try_parse_from(["auditsample", "size", "--confidence", "99"]).unwrap();
        assert!(merge_cli_with_config(&cli.command, Config::default()).is_err());
    }
}
