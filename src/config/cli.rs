//! CLI argument parsing using clap

use crate::config::reliability::{Answer, RiskLevel};
use crate::sampling::Method;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// auditsample - streaming audit sampling over tabular data
#[derive(Parser, Debug)]
#[command(name = "auditsample")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file; command-line flags override it
    #[arg(short = 'C', long, global = true, env = "AUDITSAMPLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Operation to run
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sum the absolute values of the value column
    Total(TotalArgs),
    /// Compute the sample size
    Size(SizeArgs),
    /// Select the sample and annotate every row
    Sample(SampleArgs),
    /// Print or write the parameter report without sampling
    Params(SampleArgs),
    /// Generate a fresh seed string
    Seed,
}

/// Where the data is
#[derive(Args, Debug, Clone, Default)]
pub struct DataArgs {
    /// CSV file with a header row
    #[arg(value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Value column: letter (C, AB) or 1-based number
    #[arg(short = 'c', long)]
    pub column: Option<String>,

    /// Field delimiter (a character, or tab / comma / semicolon)
    #[arg(short = 'd', long)]
    pub delimiter: Option<String>,

    /// Rows per read batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Rows per write batch
    #[arg(long)]
    pub output_batch_size: Option<usize>,
}

/// Summary format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SummaryFormat {
    /// Human-readable text on stdout
    #[default]
    Text,
    /// JSON on stdout
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct TotalArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Significance level to compute the adjusted total against
    #[arg(long)]
    pub threshold: Option<String>,

    /// Summary format
    #[arg(long, value_enum, default_value = "text")]
    pub format: SummaryFormat,
}

/// Inputs of the size calculation
#[derive(Args, Debug, Clone, Default)]
pub struct SizingArgs {
    /// Reliability factor (overrides the risk table)
    #[arg(long)]
    pub factor: Option<f64>,

    /// Control risk
    #[arg(long, value_enum)]
    pub control_risk: Option<RiskArg>,

    /// Inherent risk
    #[arg(long, value_enum)]
    pub inherent_risk: Option<RiskArg>,

    /// Risk of material misstatement (inferred from the table when omitted)
    #[arg(long, value_enum)]
    pub rmm_level: Option<RiskArg>,

    /// Analytical tests performed
    #[arg(long, value_enum)]
    pub analytical_tests: Option<AnswerArg>,

    /// Tests of controls performed
    #[arg(long, value_enum)]
    pub control_tests: Option<AnswerArg>,

    /// Significance kind (Prováděcí or another kind)
    #[arg(long)]
    pub significance_kind: Option<String>,

    /// Significance value (e.g. "50 000")
    #[arg(long)]
    pub significance: Option<String>,

    /// Justification for a non-Prováděcí significance
    #[arg(long)]
    pub justification: Option<String>,

    /// Precomputed total (skips the totalization pass)
    #[arg(long)]
    pub total: Option<f64>,

    /// Use this sample size instead of the computed one
    #[arg(short = 'n', long)]
    pub size: Option<f64>,

    /// Why the computed size is overridden
    #[arg(long)]
    pub size_reason: Option<String>,

    /// Fallback confidence level in percent (95, 99, else 90)
    #[arg(long)]
    pub confidence: Option<u32>,

    /// Fallback expected error in percent
    #[arg(long)]
    pub expected_error: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct SizeArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub sizing: SizingArgs,

    /// Summary format
    #[arg(long, value_enum, default_value = "text")]
    pub format: SummaryFormat,
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub sizing: SizingArgs,

    /// Selection method
    #[arg(short = 'm', long, value_enum)]
    pub method: Option<Method>,

    /// Seed string; omit for an unreproducible selection
    #[arg(short = 's', long)]
    pub seed: Option<String>,

    /// Generate a seed and record it
    #[arg(long, conflicts_with = "seed")]
    pub random_seed: bool,

    /// Flag rows above the significance level and keep them out of the walk
    #[arg(long)]
    pub exclude_above_significance: bool,

    /// CSV receiving the per-row annotations
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// JSON summary file
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Two-column CSV parameter report
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Author recorded in the parameter report
    #[arg(long)]
    pub author: Option<String>,

    /// Do not print the text summary
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Risk level on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RiskArg {
    Low,
    Medium,
    High,
}

impl From<RiskArg> for RiskLevel {
    fn from(arg: RiskArg) -> Self {
        match arg {
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::High => RiskLevel::High,
        }
    }
}

/// Yes/no on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnswerArg {
    Yes,
    No,
}

impl From<AnswerArg> for Answer {
    fn from(arg: AnswerArg) -> Self {
        match arg {
            AnswerArg::Yes => Answer::Yes,
            AnswerArg::No => Answer::No,
        }
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
