//! uxm - Command-line interface for UX Metrics
//!
//! Commands:
//! - analyze: Run the full analysis and write every table
//! - extract: Write the task metrics table
//! - audit: Report validity filtering results
//! - config: Print the default configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use ux_metrics::encoder::TableEncoder;
use ux_metrics::pipeline::{audit_study, extract_task_metrics, StudyProcessor};
use ux_metrics::validity::ValidityReport;
use ux_metrics::{AnalysisConfig, AnalysisError, UX_METRICS_VERSION};

/// uxm - UX study metrics and repeated-measures statistics
#[derive(Parser)]
#[command(name = "uxm")]
#[command(version = UX_METRICS_VERSION)]
#[command(about = "Reduce UX study event logs and compare interface conditions", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis
    Analyze {
        /// Study export (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for CSV tables, or file for JSON (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: ReportFormat,
    },

    /// Write the task metrics table
    Extract {
        /// Study export (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV file (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Include rejected tasks
        #[arg(long)]
        all: bool,
    },

    /// Report validity filtering results
    Audit {
        /// Study export (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as TOML
    Config,
}

#[derive(Clone, ValueEnum)]
enum ReportFormat {
    /// One CSV file per table
    Csv,
    /// Pretty-printed JSON report
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ux_metrics=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), UxmCliError> {
    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_toml_file(path)?,
        None => AnalysisConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            input,
            output,
            format,
        } => cmd_analyze(&input, &output, format, config),
        Commands::Extract { input, output, all } => cmd_extract(&input, &output, all, &config),
        Commands::Audit { input, json } => cmd_audit(&input, json, &config),
        Commands::Config => {
            print!("{}", AnalysisConfig::default().to_toml_string()?);
            Ok(())
        }
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    format: ReportFormat,
    config: AnalysisConfig,
) -> Result<(), UxmCliError> {
    let input_data = read_input(input)?;
    let processor = StudyProcessor::new(config)?;
    let report = processor.process_json(&input_data)?;

    if report.records.is_empty() {
        return Err(UxmCliError::NoTasks);
    }

    match format {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            write_output(output, &json)?;
        }
        ReportFormat::Csv => {
            let tables = TableEncoder::encode_report(&report)?;
            let written = TableEncoder::write_all(&tables, output)?;
            eprintln!("Wrote {} tables to {}", written.len(), output.display());
        }
    }

    Ok(())
}

fn cmd_extract(
    input: &Path,
    output: &Path,
    all: bool,
    config: &AnalysisConfig,
) -> Result<(), UxmCliError> {
    let input_data = read_input(input)?;

    let table = if all {
        let records = extract_task_metrics(&input_data, config)?;
        TableEncoder::task_metrics("task_metrics", &records)?
    } else {
        let audit = audit_study(&input_data, config)?;
        TableEncoder::task_metrics("task_metrics_clean", &audit.clean)?
    };

    if table.rows.is_empty() {
        return Err(UxmCliError::NoTasks);
    }

    write_output(output, &table.to_csv())
}

fn cmd_audit(input: &Path, json: bool, config: &AnalysisConfig) -> Result<(), UxmCliError> {
    let input_data = read_input(input)?;
    let report = audit_study(&input_data, config)?;

    if json {
        let summary = AuditSummary::new(&report, config.rejected_sample_size);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_audit(&report, config.rejected_sample_size);
    }

    Ok(())
}

#[derive(serde::Serialize)]
struct AuditSummary<'a> {
    total: usize,
    clean: usize,
    rejected: usize,
    predicate_counts: &'a [ux_metrics::validity::PredicateCount],
    rejected_sample: Vec<&'a ux_metrics::validity::RejectedRecord>,
}

impl<'a> AuditSummary<'a> {
    fn new(report: &'a ValidityReport, sample_size: usize) -> Self {
        Self {
            total: report.total(),
            clean: report.clean.len(),
            rejected: report.rejected.len(),
            predicate_counts: &report.predicate_counts,
            rejected_sample: report.rejected_sample(sample_size),
        }
    }
}

fn print_audit(report: &ValidityReport, sample_size: usize) {
    println!(
        "Rejected rows: {} of {} total task rows",
        report.rejected.len(),
        report.total()
    );
    println!();
    println!("Failed checks (a row may fail several):");
    for count in &report.predicate_counts {
        println!("  {:<26} {}", count.reason.as_str(), count.count);
    }

    let sample = report.rejected_sample(sample_size);
    if sample.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<24} {:<6} {:<10} {:<12} {:>10} {:>6}  reasons",
        "session_id", "step", "interface", "task_type", "time_sec", "inter"
    );
    for entry in sample {
        let record = &entry.record;
        let time = record
            .completion_time_seconds
            .map(|t| format!("{:.1}", t))
            .unwrap_or_else(|| "-".to_string());
        let reasons: Vec<&str> = entry.reasons.iter().map(|r| r.as_str()).collect();
        println!(
            "{:<24} {:<6} {:<10} {:<12} {:>10} {:>6}  {}",
            record.session_id,
            record.step_id,
            record.interface_condition.as_str(),
            record.task_type.as_str(),
            time,
            record.total_interactions,
            reasons.join(", ")
        );
    }
}

fn read_input(input: &Path) -> Result<String, UxmCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), UxmCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum UxmCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
    NoTasks,
}

impl From<io::Error> for UxmCliError {
    fn from(e: io::Error) -> Self {
        UxmCliError::Io(e)
    }
}

impl From<AnalysisError> for UxmCliError {
    fn from(e: AnalysisError) -> Self {
        UxmCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for UxmCliError {
    fn from(e: serde_json::Error) -> Self {
        UxmCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<UxmCliError> for CliError {
    fn from(e: UxmCliError) -> Self {
        match e {
            UxmCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            UxmCliError::Analysis(AnalysisError::ConfigError(message)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message,
                hint: Some("Run 'uxm config' to see every option with its default".to_string()),
            },
            UxmCliError::Analysis(AnalysisError::MissingCollection(name)) => CliError {
                code: "MISSING_COLLECTION".to_string(),
                message: format!("Collection '{}' not found in export", name),
                hint: Some("Set 'collection' in the configuration file".to_string()),
            },
            UxmCliError::Analysis(e) => CliError {
                code: "ANALYSIS_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure the input is a study export with __collections__".to_string()),
            },
            UxmCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            UxmCliError::NoTasks => CliError {
                code: "NO_TASKS".to_string(),
                message: "No analysable tasks found in input".to_string(),
                hint: Some("Check that steps carry taskType and interfaceOption".to_string()),
            },
        }
    }
}
