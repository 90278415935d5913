//! auditsample CLI entry point

use anyhow::{Context, Result};
use auditsample::config::cli::{Cli, Command, SummaryFormat};
use auditsample::config::reliability::{resolve_factor, FactorResolution, FactorTable};
use auditsample::config::toml::{merge_cli_with_config, parse_toml_file};
use auditsample::config::validator::{validate_config, validate_data_source};
use auditsample::config::Config;
use auditsample::output::json::{to_json_string, write_json_output, JsonSample, JsonSize, JsonTotals};
use auditsample::output::params::{ParameterReport, ReportInputs};
use auditsample::output::text;
use auditsample::rng::make_random_seed;
use auditsample::sampling::size::{resolve_sample_size, SampleSizeDecision};
use auditsample::sampling::{run_sampling, Method, SamplingContext, SamplingOutcome, SamplingRequest};
use auditsample::source::csv::{CsvSink, CsvSource};
use auditsample::source::{CancelToken, DiscardSink, PagedDataSource, ResultSink};
use auditsample::stats::{aggregate, AggregateOptions, AggregateStats};
use chrono::Local;
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli.log_level);

    if let Command::Seed = cli.command {
        println!("{}", make_random_seed());
        return Ok(());
    }

    let base = match &cli.config {
        Some(path) => parse_toml_file(path)?,
        None => Config::default(),
    };
    let config = merge_cli_with_config(&cli.command, base)?;
    validate_config(&config).context("Configuration validation failed")?;
    validate_data_source(&config).context("Configuration validation failed")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(async move {
        match &cli.command {
            Command::Total(args) => run_total(&config, args.format).await,
            Command::Size(args) => run_size(&config, args.format).await,
            Command::Sample(_) => run_sample(&config).await,
            Command::Params(_) => run_params(&config).await,
            Command::Seed => Ok(()),
        }
    })
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel the run on Ctrl-C; it stops at the next batch boundary
fn install_cancel_handler() -> CancelToken {
    let token = CancelToken::new();
    let handle = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next batch");
            handle.cancel();
        }
    });
    token
}

fn open_source(config: &Config) -> Result<CsvSource> {
    let path = config.data.path.as_deref().context("No input file configured")?;
    CsvSource::open(path, config.delimiter()?)
}

async fn run_aggregation(
    config: &Config,
    source: &mut dyn PagedDataSource,
    cancel: Option<CancelToken>,
) -> Result<AggregateStats> {
    let options = AggregateOptions {
        batch_size: config.data.batch_size,
        threshold: config.exclude_threshold(),
        yield_every: config.data.yield_every,
        cancel,
    };
    let stats = aggregate(source, config.value_column_index()?, &options)
        .await
        .context("Totalization failed")?;
    Ok(stats)
}

fn resolve_reliability(config: &Config) -> Result<Option<FactorResolution>> {
    let table = match &config.reliability.table {
        Some(path) => FactorTable::load(path)?,
        None => FactorTable::builtin(),
    };
    let profile = config.reliability.risk_profile();
    let factor = resolve_factor(config.reliability.factor, profile.as_ref(), &table)
        .context("Failed to resolve the reliability factor")?;
    Ok(factor)
}

/// Everything needed before selection starts
struct Plan {
    factor: Option<FactorResolution>,
    totals: Option<AggregateStats>,
    decision: SampleSizeDecision,
    /// Total the size formula used
    total: Option<f64>,
}

async fn build_plan(config: &Config, source: &mut dyn PagedDataSource, cancel: Option<CancelToken>) -> Result<Plan> {
    let factor = resolve_reliability(config)?;
    let totals = match config.sample.total {
        Some(_) => None,
        None => Some(run_aggregation(config, source, cancel).await?),
    };
    let total = config
        .sample
        .total
        .or_else(|| totals.map(|t| t.total_absolute_value));
    let data_rows = source.shape().data_rows();
    let decision = resolve_sample_size(&config.size_inputs(total, factor.map(|f| f.value), data_rows))
        .context("Failed to determine the sample size")?;
    info!(size = decision.size, source = ?decision.source, "sample size resolved");
    Ok(Plan {
        factor,
        totals,
        decision,
        total,
    })
}

async fn run_total(config: &Config, format: SummaryFormat) -> Result<()> {
    let mut source = open_source(config)?;
    let stats = run_aggregation(config, &mut source, None).await?;
    let threshold = config.exclude_threshold();
    match format {
        SummaryFormat::Text => text::print_totals(&stats, threshold),
        SummaryFormat::Json => println!("{}", to_json_string(&JsonTotals::new(&stats, threshold), true)?),
    }
    Ok(())
}

async fn run_size(config: &Config, format: SummaryFormat) -> Result<()> {
    let mut source = open_source(config)?;
    let plan = build_plan(config, &mut source, None).await?;
    match format {
        SummaryFormat::Text => text::print_size(&plan.decision, plan.factor.as_ref(), plan.total),
        SummaryFormat::Json => println!("{}", to_json_string(&json_size(config, &plan), true)?),
    }
    Ok(())
}

fn json_size(config: &Config, plan: &Plan) -> JsonSize {
    JsonSize {
        factor: plan.factor,
        materiality: config.materiality(),
        total: plan.total,
        decision: plan.decision.clone(),
    }
}

fn sampling_request(config: &Config, plan: &Plan) -> SamplingRequest {
    let exclusion = config.sample.exclude_above_significance;
    let total_value = match config.sample.method {
        Method::MonetaryInterval => config
            .sample
            .total
            .or_else(|| plan.totals.map(|t| t.walk_total(exclusion))),
        Method::RowInterval | Method::SimpleRandom => None,
    };
    SamplingRequest {
        method: config.sample.method,
        sample_size: plan.decision.size,
        seed: config.sample.seed.clone(),
        total_value,
        exclude_threshold: config.exclude_threshold(),
    }
}

async fn run_sample(config: &Config) -> Result<()> {
    let cancel = install_cancel_handler();
    let mut source = open_source(config)?;
    let plan = build_plan(config, &mut source, Some(cancel.clone())).await?;

    let ctx = SamplingContext::new(sampling_request(config, &plan), config.value_column_index()?)
        .with_paging(config.paging())
        .with_cancel(cancel);

    let mut sink: Box<dyn ResultSink> = match &config.output.annotations {
        Some(path) => Box::new(CsvSink::create(path, config.delimiter()?)?),
        None => Box::new(DiscardSink),
    };
    let outcome = run_sampling(&mut source, sink.as_mut(), &ctx)
        .await
        .context("Sampling failed")?;
    if let Some(path) = &config.output.annotations {
        info!(path = %path.display(), rows = outcome.rows_written, "annotations written");
    }

    write_reports(config, &plan, Some(&outcome))?;
    if config.output.print_summary {
        text::print_outcome(&outcome);
    }
    Ok(())
}

async fn run_params(config: &Config) -> Result<()> {
    let mut source = open_source(config)?;
    let plan = build_plan(config, &mut source, None).await?;
    let report = build_report(config, &plan, None);
    match &config.output.params {
        Some(path) => {
            report.write_csv(path, config.delimiter()?)?;
            info!(path = %path.display(), "parameter report written");
        }
        None => print!("{}", report.render_text()),
    }
    Ok(())
}

fn build_report(config: &Config, plan: &Plan, outcome: Option<&SamplingOutcome>) -> ParameterReport {
    ParameterReport::build(&ReportInputs {
        config,
        factor: plan.factor.as_ref(),
        totals: plan.totals.as_ref(),
        size: Some(&plan.decision),
        outcome,
        generated_at: Local::now(),
    })
}

fn write_reports(config: &Config, plan: &Plan, outcome: Option<&SamplingOutcome>) -> Result<()> {
    if let Some(path) = &config.output.params {
        build_report(config, plan, outcome).write_csv(path, config.delimiter()?)?;
        info!(path = %path.display(), "parameter report written");
    }
    if let (Some(path), Some(outcome)) = (&config.output.json, outcome) {
        let summary = JsonSample::new(outcome, json_size(config, plan), config.author(), Local::now());
        write_json_output(path, &summary, true)?;
        info!(path = %path.display(), "JSON summary written");
    }
    Ok(())
}
