//! CLI entry point for the insight pipeline.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use lex_insight::{
    AnalysisDecision, ChartsMode, ColumnResolver, DatasetLoader, DatasetProfile, FieldProfiler,
    InsightConfig, InsightPipeline, InsightResult, NoiseGate, ReportGenerator, ResolvedColumns,
    TypeCoercer, config::InsightConfigBuilder,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CLI-compatible charts mode enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliChartsMode {
    /// Plan charts only when they carry visual value
    Auto,
    /// Always plan charts
    On,
    /// Never plan charts
    Off,
}

impl From<CliChartsMode> for ChartsMode {
    fn from(cli: CliChartsMode) -> Self {
        match cli {
            CliChartsMode::Auto => ChartsMode::Auto,
            CliChartsMode::On => ChartsMode::On,
            CliChartsMode::Off => ChartsMode::Off,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Rule-gated descriptive analytics for tabular business data",
    long_about = "Profiles a CSV or spreadsheet, decides which analyses are worth running, \
                  and exports structured insights.\n\n\
                  EXAMPLES:\n  \
                  # Basic usage with auto-detection\n  \
                  lex-insight -i sales.csv\n\n  \
                  # Highlight one company and score city opportunities\n  \
                  lex-insight -i sales.xlsx --sheet Q2 --company Acme --segment-column city\n\n  \
                  # Preview profile and gate decisions only\n  \
                  lex-insight -i sales.csv --dry-run"
)]
struct Args {
    /// Path to the CSV, TSV or spreadsheet file to analyze
    #[arg(short, long)]
    input: PathBuf,

    /// Worksheet to read from spreadsheet inputs
    #[arg(long)]
    sheet: Option<String>,

    /// Company to highlight (a value of the core dimension)
    #[arg(long)]
    company: Option<String>,

    /// Time column to use for trend analysis
    #[arg(long)]
    time_column: Option<String>,

    /// Value column to aggregate
    #[arg(long)]
    value_column: Option<String>,

    /// Core business entity column
    #[arg(long)]
    core_dimension: Option<String>,

    /// Coverage unit column (e.g. hospital, store)
    #[arg(long)]
    coverage_column: Option<String>,

    /// Segment column for opportunity scoring (e.g. city)
    #[arg(long)]
    segment_column: Option<String>,

    /// Unit price column for price-volume analysis
    #[arg(long)]
    price_column: Option<String>,

    /// Output directory for results
    ///
    /// Defaults to an `outputs` directory next to the input file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Base name for exported files (default: "insight")
    #[arg(long)]
    output_name: Option<String>,

    /// Chart planning mode
    #[arg(long, value_enum)]
    charts_mode: Option<CliChartsMode>,

    /// Request a screenshot of the rendered report
    #[arg(long)]
    enable_screenshot: bool,

    /// Number of categories kept per TopN table
    #[arg(long)]
    top_n: Option<usize>,

    /// JSON configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Profile the dataset and print gate decisions without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the result as JSON to stdout (disables logging)
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings and the final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber.
///
/// With `json_output` no subscriber is installed so stdout carries only JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let config = build_config(&args)?;

    if args.dry_run {
        return run_dry_run(&args, &config);
    }

    let mut builder = InsightPipeline::builder().config(config.clone());
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    match pipeline.process_file(&args.input) {
        Ok(result) => handle_output(&args, &config, &result),
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(anyhow!("Pipeline failed: {}", e))
        }
    }
}

/// Merge the optional config file with command-line overrides.
fn build_config(args: &Args) -> Result<InsightConfig> {
    let base = match &args.config {
        Some(path) => InsightConfig::from_json_file(path)?,
        None => InsightConfig::default(),
    };

    let mut builder = InsightConfigBuilder::from_config(base);

    if let Some(ref sheet) = args.sheet {
        builder = builder.sheet(sheet);
    }
    if let Some(ref company) = args.company {
        builder = builder.company(company);
    }
    if let Some(ref column) = args.time_column {
        builder = builder.time_column(column);
    }
    if let Some(ref column) = args.value_column {
        builder = builder.value_column(column);
    }
    if let Some(ref column) = args.core_dimension {
        builder = builder.core_dimension(column);
    }
    if let Some(ref column) = args.coverage_column {
        builder = builder.coverage_column(column);
    }
    if let Some(ref column) = args.segment_column {
        builder = builder.segment_column(column);
    }
    if let Some(ref column) = args.price_column {
        builder = builder.price_column(column);
    }
    if let Some(mode) = args.charts_mode {
        builder = builder.charts_mode(mode.into());
    }
    if args.enable_screenshot {
        builder = builder.enable_screenshot(true);
    }
    if let Some(n) = args.top_n {
        builder = builder.top_n(n);
    }
    if let Some(ref name) = args.output_name {
        builder = builder.output_name(name);
    }

    // A config file keeps its own output_dir unless the flag overrides it
    match (&args.output_dir, &args.config) {
        (Some(dir), _) => builder = builder.output_dir(dir),
        (None, None) => builder = builder.output_dir(default_output_dir(&args.input)),
        (None, Some(_)) => {}
    }

    Ok(builder.save_to_disk(!args.dry_run).build()?)
}

/// `<input parent>/outputs`
fn default_output_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join("outputs")
}

#[derive(Serialize)]
struct DryRunReport<'a> {
    input_file: String,
    profile: &'a DatasetProfile,
    resolved_columns: &'a ResolvedColumns,
    decisions: Vec<lex_insight::reporting::DecisionEntry>,
}

/// Profile and gate only; nothing is written.
///
/// Uses `println!` for the user-facing preview, which must stay visible
/// regardless of the log level.
fn run_dry_run(args: &Args, config: &InsightConfig) -> Result<()> {
    let df = DatasetLoader::load(&args.input, config.sheet.as_deref())?;
    let (df, _) = TypeCoercer::new(config.inference.clone()).coerce(df)?;
    let profile = FieldProfiler::new(config.inference.clone()).profile_dataset(&df)?;
    let resolved = ColumnResolver::new(config).resolve(&profile)?;
    let decisions =
        NoiseGate::new(config.gate.clone()).evaluate(&profile, &resolved, config.company.as_deref());

    if args.json {
        let report = DryRunReport {
            input_file: args.input.display().to_string(),
            profile: &profile,
            resolved_columns: &resolved,
            decisions: decisions.iter().map(Into::into).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Profile and analysis decisions");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input.display());
    println!("  Rows: {}", profile.row_count);
    println!("  Columns: {}", profile.column_count);
    println!("  Duplicate rows: {}", profile.duplicate_rows);
    println!();

    println!("FIELD PROFILES");
    println!("{}", "-".repeat(40));
    println!(
        "{:<24} {:<12} {:<10} {:<10} {:<10}",
        "Column", "Type", "Null %", "Unique", "Unique %"
    );
    println!("{}", "-".repeat(70));
    for col in &profile.columns {
        println!(
            "{:<24} {:<12} {:<10.1} {:<10} {:<10.1}",
            truncate_str(&col.name, 23),
            col.inferred_type,
            col.null_rate * 100.0,
            col.unique_count,
            col.unique_ratio * 100.0
        );
    }
    println!();

    println!("RESOLVED COLUMNS");
    println!("{}", "-".repeat(40));
    println!("  Core dimension: {}", resolved.core_dimension_name().unwrap_or("-"));
    println!("  Value column: {}", resolved.value_column.as_deref().unwrap_or("- (row counts)"));
    println!("  Time column: {}", resolved.time_column_name().unwrap_or("-"));
    println!("  Coverage column: {}", resolved.coverage_column.as_deref().unwrap_or("-"));
    println!("  Segment column: {}", resolved.segment_column.as_deref().unwrap_or("-"));
    println!("  Price column: {}", resolved.price_column.as_deref().unwrap_or("-"));
    println!();

    println!("ANALYSIS DECISIONS");
    println!("{}", "-".repeat(40));
    print_decisions(&decisions);
    println!();

    println!("{}", "=".repeat(80));
    println!("To run the analyses and export results, run without --dry-run");
    println!("{}", "=".repeat(80));
    Ok(())
}

fn print_decisions(decisions: &[AnalysisDecision]) {
    for decision in decisions {
        println!(
            "  [{}] {:<22} {:<20} {}",
            if decision.eligible { "x" } else { " " },
            decision.kind.display_name(),
            truncate_str(decision.target.as_deref().unwrap_or("-"), 19),
            decision.explanation()
        );
    }
}

fn handle_output(args: &Args, config: &InsightConfig, result: &InsightResult) -> Result<()> {
    if args.json {
        let input = args.input.display().to_string();
        let report = ReportGenerator::build_report(Some(&input), result, config.enable_screenshot);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("INSIGHT SUMMARY");
    println!("{}\n", "=".repeat(80));
    println!(
        "  Dataset: {} rows x {} columns, {} duplicate row(s) ({} ms)",
        result.profile.row_count,
        result.profile.column_count,
        result.profile.duplicate_rows,
        result.duration_ms
    );
    println!(
        "  Analyses: {} eligible of {}, {} skipped after gating",
        result.eligible_count(),
        result.decisions.len(),
        result.aggregation.skipped.len()
    );
    println!();

    println!("DECISIONS");
    println!("{}", "-".repeat(40));
    print_decisions(&result.decisions);
    println!();

    println!("INSIGHTS");
    println!("{}", "-".repeat(40));
    for insight in &result.insights {
        println!("  - {}", insight.summary);
    }
    println!();

    println!("NARRATIVE");
    println!("{}", "-".repeat(40));
    for (section, text) in result.narrative.sections() {
        println!("  {}: {}", section, text);
    }
    println!();

    if let Some(exports) = &result.exports {
        println!("OUTPUT FILES");
        println!("{}", "-".repeat(40));
        println!("  - {}", exports.report_path.display());
        for table in &exports.tables {
            println!("  - {} ({} rows)", table.path.display(), table.rows);
        }
        println!();
    }

    Ok(())
}

/// Truncate a string to max characters with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
