//! clickflow CLI - Command-line interface for clickflow
//!
//! Commands:
//! - build: Rebuild sessions from raw record batches and persist them
//! - classify: Label each session of a corpus Exploratory or Lookup
//! - funnel: Per-action funnel statistics as CSV
//! - summary: Corpus metrics summary (text or JSON report)
//! - compare: Session counts, lengths and users of two corpora side by side
//! - transcript: Encode a session as a transcript, or decode one back
//! - doctor: Diagnose configuration and corpus health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clickflow::config::AnalysisConfig;
use clickflow::corpus::{load_corpus, load_session_file, persist_sessions, write_output, WriteOutcome};
use clickflow::pipeline::{analyze_corpus, SessionProcessor};
use clickflow::report::{render_summary_text, write_analysis_csv, write_funnel_csv, ReportEncoder};
use clickflow::transcript::{encode_transcript, TranscriptDecoder};
use clickflow::types::parse_timestamp;
use clickflow::{classify, compare_corpora, funnel::aggregate_funnel, summarize, SessionError};
use clickflow::{CLICKFLOW_VERSION, PRODUCER_NAME};

/// clickflow - Session reconstruction and search-behavior analytics
#[derive(Parser)]
#[command(name = "clickflow")]
#[command(version = CLICKFLOW_VERSION)]
#[command(about = "Rebuild clickstream sessions and analyze search behavior", long_about = None)]
struct Cli {
    /// Configuration file (TOML); missing file means defaults
    #[arg(long, global = true, default_value = "clickflow.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild sessions from raw record batches and persist one file per session
    Build {
        /// Input files (use - for stdin)
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Directory receiving <session_id>.json files
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,
    },

    /// Label each session of a corpus
    Classify {
        /// Corpus directory
        #[arg(short, long)]
        corpus: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Per-action funnel statistics as CSV
    Funnel {
        /// Corpus directory
        #[arg(short, long)]
        corpus: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Corpus metrics summary
    Summary {
        /// Corpus directory
        #[arg(short, long)]
        corpus: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "text")]
        format: SummaryFormat,

        /// Dataset name recorded in JSON reports
        #[arg(long, default_value = "default")]
        dataset: String,

        /// Also write the per-session analysis table as CSV
        #[arg(long)]
        analysis_csv: Option<PathBuf>,
    },

    /// Compare two corpora
    Compare {
        /// First corpus directory
        #[arg(long)]
        left: PathBuf,

        /// Second corpus directory
        #[arg(long)]
        right: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Human-readable session transcripts
    Transcript {
        #[command(subcommand)]
        command: TranscriptCommand,
    },

    /// Diagnose configuration and corpus health
    Doctor {
        /// Corpus directory to check
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TranscriptCommand {
    /// Encode a persisted session
    Encode {
        /// Session file
        #[arg(short, long)]
        session: PathBuf,
    },

    /// Decode a transcript into a session
    Decode {
        /// Transcript file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Session start, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        start_date: String,

        /// Fixed session end, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        end_date: Option<String>,

        #[arg(long, default_value = "")]
        session_id: String,

        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        user_id: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Detect from the first character
    Auto,
    /// Newline-delimited JSON (one session record per line)
    Ndjson,
    /// JSON array of session records
    Json,
}

impl From<InputFormat> for clickflow::pipeline::InputFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Auto => Self::Auto,
            InputFormat::Ndjson => Self::Ndjson,
            InputFormat::Json => Self::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SummaryFormat {
    /// Plain-text metrics summary
    Text,
    /// JSON report with producer metadata
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

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

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), ClickflowCliError> {
    // Doctor reports a broken config file as a check instead of failing here
    if let Commands::Doctor { corpus, json } = &cli.command {
        return cmd_doctor(&cli.config, corpus.as_deref(), *json);
    }

    let config = AnalysisConfig::load(&cli.config)?;

    match cli.command {
        Commands::Build {
            input,
            output_dir,
            input_format,
        } => cmd_build(&config, &input, &output_dir, input_format),

        Commands::Classify { corpus, json } => cmd_classify(&config, &corpus, json),

        Commands::Funnel { corpus, output } => cmd_funnel(&config, &corpus, &output),

        Commands::Summary {
            corpus,
            output,
            format,
            dataset,
            analysis_csv,
        } => cmd_summary(
            &config,
            &corpus,
            &output,
            format,
            &dataset,
            analysis_csv.as_deref(),
        ),

        Commands::Compare { left, right, json } => cmd_compare(&config, &left, &right, json),

        Commands::Transcript { command } => match command {
            TranscriptCommand::Encode { session } => cmd_transcript_encode(&session),
            TranscriptCommand::Decode {
                input,
                start_date,
                end_date,
                session_id,
                user_id,
            } => cmd_transcript_decode(&input, &start_date, end_date.as_deref(), session_id, user_id),
        },

        Commands::Doctor { .. } => Ok(()),
    }
}

fn cmd_build(
    config: &AnalysisConfig,
    inputs: &[PathBuf],
    output_dir: &Path,
    input_format: InputFormat,
) -> Result<(), ClickflowCliError> {
    let mut processor = SessionProcessor::with_config(config);

    let format = input_format.into();
    for input in inputs {
        let result = if is_stdin(input) {
            read_stdin()
                .map_err(SessionError::from)
                .and_then(|data| processor.ingest_str(&data, format))
        } else {
            processor.ingest_file(input, format)
        };
        if let Err(e) = result {
            processor.record_failed_input(input, &e);
        }
    }

    let totals = processor.totals();
    let pending = processor.pending_sessions();
    let sessions = processor.finish();
    if sessions.is_empty() {
        return Err(ClickflowCliError::NoSessions);
    }

    let persisted = persist_sessions(
        &sessions,
        output_dir,
        config.corpus.pretty,
        config.corpus.skip_existing,
    )?;

    let report = BuildReport {
        records: totals.records,
        skipped_lines: totals.skipped_lines,
        sessions_seen: pending,
        sessions_kept: sessions.len(),
        failed_inputs: totals.failed_inputs,
        written: persisted.written,
        skipped_existing: persisted.skipped,
        failed_writes: persisted.failed,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn cmd_classify(
    config: &AnalysisConfig,
    corpus: &Path,
    json: bool,
) -> Result<(), ClickflowCliError> {
    let sessions = load_corpus(corpus, &config.corpus.extension)?;

    let labels: Vec<ClassifiedSession> = sessions
        .iter()
        .map(|session| ClassifiedSession {
            session_id: session.session_id.clone(),
            label: classify(session).to_string(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&labels)?);
    } else {
        for entry in &labels {
            println!("{}\t{}", entry.session_id, entry.label);
        }
    }
    Ok(())
}

fn cmd_funnel(
    config: &AnalysisConfig,
    corpus: &Path,
    output: &Path,
) -> Result<(), ClickflowCliError> {
    let taxonomy = config.taxonomy()?;
    let sessions = load_corpus(corpus, &config.corpus.extension)?;
    let rows = aggregate_funnel(&sessions, &taxonomy).rows();

    let mut buf = Vec::new();
    write_funnel_csv(&mut buf, &rows)?;
    emit(output, &buf, config.corpus.skip_existing)
}

fn cmd_summary(
    config: &AnalysisConfig,
    corpus: &Path,
    output: &Path,
    format: SummaryFormat,
    dataset: &str,
    analysis_csv: Option<&Path>,
) -> Result<(), ClickflowCliError> {
    let sessions = load_corpus(corpus, &config.corpus.extension)?;

    let rendered = match format {
        SummaryFormat::Text => {
            let summary = summarize(&sessions, config.caps());
            if let Some(path) = analysis_csv {
                let analysis = analyze_corpus(&sessions, &config.taxonomy()?, config.caps());
                write_analysis(path, &analysis.sessions, config.corpus.skip_existing)?;
            }
            render_summary_text(&summary)
        }
        SummaryFormat::Json => {
            let analysis = analyze_corpus(&sessions, &config.taxonomy()?, config.caps());
            if let Some(path) = analysis_csv {
                write_analysis(path, &analysis.sessions, config.corpus.skip_existing)?;
            }
            ReportEncoder::new().encode_to_json(
                dataset,
                analysis.summary,
                analysis.funnel,
                analysis.sessions,
            )?
        }
    };

    emit(output, rendered.as_bytes(), config.corpus.skip_existing)
}

fn write_analysis(
    path: &Path,
    rows: &[clickflow::SessionAnalysis],
    skip_existing: bool,
) -> Result<(), ClickflowCliError> {
    let mut buf = Vec::new();
    write_analysis_csv(&mut buf, rows)?;
    emit(path, &buf, skip_existing)
}

fn cmd_compare(
    config: &AnalysisConfig,
    left: &Path,
    right: &Path,
    json: bool,
) -> Result<(), ClickflowCliError> {
    let left_sessions = load_corpus(left, &config.corpus.extension)?;
    let right_sessions = load_corpus(right, &config.corpus.extension)?;
    let comparison = compare_corpora(
        left.display().to_string(),
        &left_sessions,
        right.display().to_string(),
        &right_sessions,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        print!("{}", comparison.render_text());
    }
    Ok(())
}

fn cmd_transcript_encode(session: &Path) -> Result<(), ClickflowCliError> {
    let session = load_session_file(session)?;
    println!("{}", encode_transcript(&session));
    Ok(())
}

fn cmd_transcript_decode(
    input: &Path,
    start_date: &str,
    end_date: Option<&str>,
    session_id: String,
    user_id: i64,
) -> Result<(), ClickflowCliError> {
    let start = parse_date_arg(start_date)?;
    let mut decoder = TranscriptDecoder::new(start)
        .with_session_id(session_id)
        .with_user_id(user_id);
    if let Some(end_date) = end_date {
        decoder = decoder.with_end_date(parse_date_arg(end_date)?);
    }

    let transcript = read_input(input)?;
    let session = decoder.decode(&transcript);
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

fn cmd_doctor(
    config_path: &Path,
    corpus: Option<&Path>,
    json: bool,
) -> Result<(), ClickflowCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "clickflow_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("clickflow version {}", CLICKFLOW_VERSION),
    });

    let config = match AnalysisConfig::load(config_path) {
        Ok(config) => {
            let message = if config_path.exists() {
                format!("Configuration valid ({})", config_path.display())
            } else {
                "No configuration file, using defaults".to_string()
            };
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message,
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid configuration: {}", e),
            });
            None
        }
    };

    if let Some(config) = &config {
        match config.taxonomy() {
            Ok(taxonomy) => checks.push(DoctorCheck {
                name: "taxonomy".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "{} action labels ({} overrides)",
                    taxonomy.len(),
                    config.taxonomy.overrides.len()
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "taxonomy".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        }
    }

    if let Some(corpus) = corpus {
        let extension = config
            .as_ref()
            .map(|c| c.corpus.extension.clone())
            .unwrap_or_else(|| "json".to_string());
        match load_corpus(corpus, &extension) {
            Ok(sessions) if sessions.is_empty() => checks.push(DoctorCheck {
                name: "corpus".to_string(),
                status: CheckStatus::Warning,
                message: format!("No sessions found in {}", corpus.display()),
            }),
            Ok(sessions) => {
                let without_click = sessions.iter().filter(|s| !s.has_click).count();
                checks.push(DoctorCheck {
                    name: "corpus".to_string(),
                    status: if without_click > 0 {
                        CheckStatus::Warning
                    } else {
                        CheckStatus::Ok
                    },
                    message: format!(
                        "{} sessions loaded ({} without a click)",
                        sessions.len(),
                        without_click
                    ),
                });
            }
            Err(e) => checks.push(DoctorCheck {
                name: "corpus".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read corpus: {}", e),
            }),
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (batch input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CLICKFLOW_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("clickflow Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ClickflowCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn is_stdin(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

fn read_stdin() -> io::Result<String> {
    if atty::is(atty::Stream::Stdin) {
        tracing::warn!("reading from an interactive terminal; end input with Ctrl-D");
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn read_input(path: &Path) -> Result<String, ClickflowCliError> {
    if is_stdin(path) {
        Ok(read_stdin()?)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn emit(output: &Path, contents: &[u8], skip_existing: bool) -> Result<(), ClickflowCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", String::from_utf8_lossy(contents));
        return Ok(());
    }
    if write_output(output, contents, skip_existing)? == WriteOutcome::SkippedExisting {
        eprintln!("Skipping writing as {} already exists.", output.display());
    }
    Ok(())
}

fn parse_date_arg(raw: &str) -> Result<chrono::NaiveDateTime, ClickflowCliError> {
    parse_timestamp(raw).ok_or_else(|| ClickflowCliError::InvalidDate(raw.to_string()))
}

// Error types

#[derive(Debug)]
enum ClickflowCliError {
    Io(io::Error),
    Session(SessionError),
    Json(serde_json::Error),
    NoSessions,
    InvalidDate(String),
    DoctorFailed,
}

impl From<io::Error> for ClickflowCliError {
    fn from(e: io::Error) -> Self {
        ClickflowCliError::Io(e)
    }
}

impl From<SessionError> for ClickflowCliError {
    fn from(e: SessionError) -> Self {
        ClickflowCliError::Session(e)
    }
}

impl From<serde_json::Error> for ClickflowCliError {
    fn from(e: serde_json::Error) -> Self {
        ClickflowCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ClickflowCliError> for CliError {
    fn from(e: ClickflowCliError) -> Self {
        match e {
            ClickflowCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ClickflowCliError::Session(e) => {
                let (code, hint) = match &e {
                    SessionError::ConfigError(_) | SessionError::UnknownActionLabel(_) => (
                        "CONFIG_ERROR",
                        "Run 'clickflow doctor' to check the configuration",
                    ),
                    SessionError::IoError(_) => ("IO_ERROR", "Check file paths and permissions"),
                    _ => (
                        "PARSE_ERROR",
                        "Ensure input holds session records ({session_id, events} or flattened sessions)",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ClickflowCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ClickflowCliError::NoSessions => CliError {
                code: "NO_SESSIONS".to_string(),
                message: "No sessions with a click found in input".to_string(),
                hint: Some("Sessions without any click action are dropped".to_string()),
            },
            ClickflowCliError::InvalidDate(raw) => CliError {
                code: "INVALID_DATE".to_string(),
                message: format!("Invalid date '{}'", raw),
                hint: Some("Use the format YYYY-MM-DD HH:MM:SS".to_string()),
            },
            ClickflowCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct BuildReport {
    records: usize,
    skipped_lines: usize,
    sessions_seen: usize,
    sessions_kept: usize,
    failed_inputs: usize,
    written: usize,
    skipped_existing: usize,
    failed_writes: usize,
}

#[derive(serde::Serialize)]
struct ClassifiedSession {
    session_id: String,
    label: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
