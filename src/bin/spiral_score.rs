//! Spiral Score CLI - Command-line interface for spiral tremor scoring
//!
//! Commands:
//! - score: Score one spiral trial against a population table
//! - validate: Check that a trial file extracts cleanly
//! - doctor: Diagnose a population statistics file

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use spiral_tremor::extractor::{TemplateExtractor, TraceExtractor};
use spiral_tremor::population::PopulationStats;
use spiral_tremor::{Metric, ScoringConfig, ScoringError, SpiralScorer, SpiralTemplate};
use spiral_tremor::{PRODUCER_NAME, SCORER_VERSION, SCORING_VERSION};

/// Spiral Score - tremor-severity scoring for spiral-drawing trials
#[derive(Parser)]
#[command(name = "spiral-score")]
#[command(version = SCORER_VERSION)]
#[command(about = "Score spiral-drawing trials against a population reference", long_about = None)]
struct Cli {
    /// Enable debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one trial and print the artifact
    Score {
        /// Trial JSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Population statistics JSON file
        #[arg(long)]
        popstats: PathBuf,

        /// Template intercept a
        #[arg(long, requires = "b", allow_negative_numbers = true)]
        a: Option<f64>,

        /// Template slope b (per radian)
        #[arg(long, requires = "a", allow_negative_numbers = true)]
        b: Option<f64>,

        /// JSON file carrying template metadata (a, b)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Scoring configuration JSON file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip the preview image
        #[arg(long)]
        no_image: bool,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Pretty-print the artifact
        #[arg(long)]
        pretty: bool,
    },

    /// Check that a trial extracts cleanly
    Validate {
        /// Trial JSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose a population statistics file
    Doctor {
        /// Population statistics JSON file
        #[arg(long)]
        popstats: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

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

fn run(cli: Cli) -> Result<(), ScoreCliError> {
    match cli.command {
        Commands::Score {
            input,
            popstats,
            a,
            b,
            template,
            config,
            no_image,
            output,
            pretty,
        } => {
            let explicit = a.zip(b).map(|(a, b)| SpiralTemplate::new(a, b));
            cmd_score(
                &input,
                &popstats,
                explicit,
                template.as_deref(),
                config.as_deref(),
                no_image,
                &output,
                pretty,
            )
        }

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { popstats, json } => cmd_doctor(&popstats, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_score(
    input: &Path,
    popstats: &Path,
    explicit: Option<SpiralTemplate>,
    template_file: Option<&Path>,
    config_file: Option<&Path>,
    no_image: bool,
    output: &Path,
    pretty: bool,
) -> Result<(), ScoreCliError> {
    let trial = read_json(input)?;

    let template = match explicit {
        Some(template) => template,
        None => {
            let form = template_file.map(read_json).transpose()?;
            resolve_template(form.as_ref(), &trial)?
        }
    };
    debug!(a = template.a, b = template.b, "using template");

    let mut config = match config_file {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::default(),
    };
    if no_image {
        config.include_image = false;
    }

    let artifact =
        SpiralScorer::with_config(config).score_with_stats_file(&trial, template, popstats)?;

    let rendered = if pretty {
        serde_json::to_string_pretty(&artifact)?
    } else {
        serde_json::to_string(&artifact)?
    };
    write_output(output, &rendered)
}

/// Template file first, then the trial's `data` object, then the trial root
fn resolve_template(form: Option<&Value>, trial: &Value) -> Result<SpiralTemplate, ScoringError> {
    let mut candidates: Vec<&Value> = Vec::with_capacity(3);
    if let Some(form) = form {
        candidates.push(form);
    }
    if let Some(data) = trial.get("data") {
        candidates.push(data);
    }
    candidates.push(trial);
    TemplateExtractor::resolve(&candidates)
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), ScoreCliError> {
    let trial = read_json(input)?;
    let trace = TraceExtractor::extract(&trial)?;
    let template_found = resolve_template(None, &trial).is_ok();

    let report = ValidationReport {
        raw_samples: trace.raw_count(),
        clean_samples: trace.len(),
        duplicates_removed: trace.duplicates_removed(),
        duration_ms: trace.duration_ms(),
        template_found,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Raw samples:        {}", report.raw_samples);
        println!("Clean samples:      {}", report.clean_samples);
        println!("Duplicates removed: {}", report.duplicates_removed);
        println!("Duration (ms):      {}", report.duration_ms);
        println!(
            "Template:           {}",
            if report.template_found { "found" } else { "not found" }
        );
    }

    Ok(())
}

fn cmd_doctor(popstats: &Path, json: bool) -> Result<(), ScoreCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "scoring_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Scoring version {}", SCORING_VERSION),
    });

    match PopulationStats::load(popstats) {
        Ok(stats) => {
            checks.push(DoctorCheck {
                name: "popstats".to_string(),
                status: CheckStatus::Ok,
                message: format!("Population table loaded from {}", popstats.display()),
            });
            for metric in Metric::ALL {
                let entry = stats.entry(metric);
                let neutral = !entry.mean.is_finite() || !entry.std.is_finite() || entry.std == 0.0;
                let (status, message) = if neutral {
                    (
                        CheckStatus::Warning,
                        format!("mean {}, std {} (z-score will be neutral)", entry.mean, entry.std),
                    )
                } else {
                    (CheckStatus::Ok, format!("mean {}, std {}", entry.mean, entry.std))
                };
                checks.push(DoctorCheck {
                    name: metric.code().to_string(),
                    status,
                    message,
                });
            }
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "popstats".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            });
        }
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: SCORER_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Spiral Score Doctor Report");
        println!("==========================");
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
        Err(ScoreCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn read_json(path: &Path) -> Result<Value, ScoreCliError> {
    let content = if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&content)?)
}

fn write_output(path: &Path, content: &str) -> Result<(), ScoreCliError> {
    if path.to_string_lossy() == "-" {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{content}")?;
    } else {
        fs::write(path, format!("{content}\n"))?;
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum ScoreCliError {
    Io(io::Error),
    Json(serde_json::Error),
    Scoring(ScoringError),
    DoctorFailed,
}

impl From<io::Error> for ScoreCliError {
    fn from(e: io::Error) -> Self {
        ScoreCliError::Io(e)
    }
}

impl From<serde_json::Error> for ScoreCliError {
    fn from(e: serde_json::Error) -> Self {
        ScoreCliError::Json(e)
    }
}

impl From<ScoringError> for ScoreCliError {
    fn from(e: ScoringError) -> Self {
        ScoreCliError::Scoring(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ScoreCliError> for CliError {
    fn from(e: ScoreCliError) -> Self {
        match e {
            ScoreCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ScoreCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ScoreCliError::Scoring(e) => CliError {
                code: e.code().to_string(),
                hint: scoring_hint(&e).map(str::to_string),
                message: e.to_string(),
            },
            ScoreCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn scoring_hint(e: &ScoringError) -> Option<&'static str> {
    match e {
        ScoringError::MissingPoints | ScoringError::MissingField { .. } => {
            Some("Run 'spiral-score validate' on the trial file")
        }
        ScoringError::InsufficientSamples { .. } => Some("Record a longer trial"),
        ScoringError::BadTimestep { .. } => Some("Timestamps must increase over the trial"),
        ScoringError::PopulationStatsNotFound { .. }
        | ScoringError::PopulationStatsUnreadable { .. }
        | ScoringError::PopulationStatsIncomplete { .. } => {
            Some("Run 'spiral-score doctor --popstats <file>'")
        }
        ScoringError::MissingTemplate => Some("Pass --a and --b, or --template <file>"),
        ScoringError::Config(_) => Some("Check the configuration file"),
        ScoringError::JsonError(_) => Some("Check JSON syntax"),
        ScoringError::Preview(_) => Some("Retry with --no-image"),
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    raw_samples: usize,
    clean_samples: usize,
    duplicates_removed: usize,
    duration_ms: f64,
    template_found: bool,
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
