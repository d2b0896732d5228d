//! Proctor CLI - Command-line interface for the proctor engine
//!
//! Commands:
//! - replay: Run a recorded observation stream through a session
//! - reports: List stored reports, newest first
//! - validate: Validate observation records
//! - config: Print the default configuration or check a config file

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use proctor_engine::schema::{ObservationReader, ObservationRecord, ValidationError, SCHEMA_VERSION};
use proctor_engine::store::{ReportStore, SqliteReportStore};
use proctor_engine::{Monitor, MonitorConfig, ProctorError, Report, ENGINE_VERSION};

/// Proctor - monitoring core for remotely proctored exams
#[derive(Parser)]
#[command(name = "proctor")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Replay proctoring sessions into scored integrity reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded observation stream through a session
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Candidate identifier recorded in the report
        #[arg(long, default_value = "anonymous")]
        candidate: String,

        /// Configuration file (JSON, camelCase keys)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Persist the report to this SQLite database
        #[arg(long)]
        db: Option<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// List stored reports, newest first
    Reports {
        /// SQLite database path
        #[arg(long)]
        db: PathBuf,

        /// Output full reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate observation records
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration, or check a configuration file
    Config {
        /// Configuration file to check
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Ndjson,
    /// JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ProctorCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            candidate,
            config,
            db,
            output,
            output_format,
        } => cmd_replay(
            &input,
            input_format,
            &candidate,
            config.as_deref(),
            db.as_deref(),
            &output,
            output_format,
        ),

        Commands::Reports { db, json } => cmd_reports(&db, json),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Config { check } => cmd_config(check.as_deref()),
    }
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    candidate: &str,
    config_path: Option<&Path>,
    db: Option<&Path>,
    output: &Path,
    output_format: OutputFormat,
) -> Result<(), ProctorCliError> {
    let config = match config_path {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };

    let records = read_records(input, input_format)?;
    let (first, last) = match (records.first(), records.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => return Err(ProctorCliError::NoRecords),
    };

    let failures = ObservationReader::validate_records(&records);
    if let Some(failure) = failures.into_iter().next() {
        return Err(ProctorCliError::Validation(failure.index, failure.error));
    }

    let mut monitor = Monitor::new(candidate, config)?;
    monitor.start(first)?;
    for (index, record) in records.iter().enumerate() {
        let observation = record
            .to_observation()
            .map_err(|e| ProctorCliError::Validation(index, e))?;
        monitor.observe(&observation, record.timestamp)?;
    }
    let report = monitor.end(last)?;
    log::info!(
        "replayed {} records for {}: {} events, score {}",
        records.len(),
        candidate,
        report.events.len(),
        report.final_score()
    );

    if let Some(db_path) = db {
        let store = SqliteReportStore::open(db_path)?;
        monitor.save_report(&store)?;
    }

    let output_data = format_output(&report, &output_format)?;
    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data + "\n")?;
    }

    Ok(())
}

fn cmd_reports(db: &Path, json: bool) -> Result<(), ProctorCliError> {
    if !db.exists() {
        return Err(ProctorCliError::MissingDatabase(db.to_path_buf()));
    }
    let store = SqliteReportStore::open(db)?;
    let reports = store.list_reports()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    println!("Stored Reports");
    println!("==============");
    if reports.is_empty() {
        println!("(none)");
    }
    for report in &reports {
        let consistency = if report.is_consistent() { "" } else { " [INCONSISTENT]" };
        println!(
            "  {}  {:<20} score {:>3}  events {:>4}  ended {}{}",
            report.report_id,
            report.candidate_id,
            report.final_score(),
            report.events.len(),
            report
                .ended_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
            consistency
        );
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), ProctorCliError> {
    let records = read_records(input, input_format)?;
    let results = ObservationReader::validate_records(&records);

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                modality: r.modality.to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:          {}", report.schema_version);
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} record (index {}): {}", err.modality, err.index, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(ProctorCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_config(check: Option<&Path>) -> Result<(), ProctorCliError> {
    match check {
        Some(path) => {
            let config = MonitorConfig::load(path)?;
            println!("[OK] {} is a valid configuration", path.display());
            println!("{}", config.to_json_pretty()?);
        }
        None => println!("{}", MonitorConfig::default().to_json_pretty()?),
    }
    Ok(())
}

// Helper functions

fn read_records(input: &Path, input_format: InputFormat) -> Result<Vec<ObservationRecord>, ProctorCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(ProctorCliError::InteractiveStdin);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match input_format {
        InputFormat::Ndjson => ObservationReader::parse_ndjson(&input_data)?,
        InputFormat::Json => ObservationReader::parse_array(&input_data)?,
    };
    Ok(records)
}

fn format_output(report: &Report, format: &OutputFormat) -> Result<String, ProctorCliError> {
    match format {
        OutputFormat::Ndjson | OutputFormat::Json => Ok(report.to_json()?),
        OutputFormat::JsonPretty => Ok(report.to_json_pretty()?),
    }
}

// Error types

#[derive(Debug)]
enum ProctorCliError {
    Io(io::Error),
    Engine(ProctorError),
    Json(serde_json::Error),
    Validation(usize, ValidationError),
    NoRecords,
    ValidationFailed(usize),
    MissingDatabase(PathBuf),
    InteractiveStdin,
}

impl From<io::Error> for ProctorCliError {
    fn from(e: io::Error) -> Self {
        ProctorCliError::Io(e)
    }
}

impl From<ProctorError> for ProctorCliError {
    fn from(e: ProctorError) -> Self {
        ProctorCliError::Engine(e)
    }
}

impl From<serde_json::Error> for ProctorCliError {
    fn from(e: serde_json::Error) -> Self {
        ProctorCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ProctorCliError> for CliError {
    fn from(e: ProctorCliError) -> Self {
        match e {
            ProctorCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ProctorCliError::Engine(e) => {
                let hint = match &e {
                    ProctorError::InvalidConfig(_) => Some("Run 'proctor config' to see valid defaults"),
                    ProctorError::ParseError(_) => Some("Ensure input matches proctor.observation.v1 schema"),
                    ProctorError::StoreUnavailable(_) => Some("Check the database path and permissions"),
                    _ => None,
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
            ProctorCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ProctorCliError::Validation(index, e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: format!("record {}: {}", index, e),
                hint: Some("Run 'proctor validate' for details".to_string()),
            },
            ProctorCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No observation records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ProctorCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            ProctorCliError::MissingDatabase(path) => CliError {
                code: "STORE_UNAVAILABLE".to_string(),
                message: format!("{} does not exist", path.display()),
                hint: Some("Save a report with 'proctor replay --db' first".to_string()),
            },
            ProctorCliError::InteractiveStdin => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a TTY".to_string(),
                hint: Some("Pipe a recording into stdin or pass --input <file>".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    modality: String,
    error: String,
}
