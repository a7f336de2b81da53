//! TENSIO CLI - Operator tooling for training and checking stress pipelines
//!
//! Commands:
//! - train: Synthesize data, fit scaler and model, write the pipeline artifact
//! - estimate: Run inference for one input or NDJSON inputs on stdin
//! - inspect: Print artifact metadata and training metrics
//! - doctor: Diagnose artifact and environment health

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

use tensio::artifact::{TrainedPipeline, ARTIFACT_FORMAT_VERSION, DEFAULT_ARTIFACT_FILE};
use tensio::{
    FeatureVector, PipelineConfig, StressEstimate, StressEstimator, TensioError, Trainer,
    PRODUCER_NAME, TENSIO_VERSION,
};

/// TENSIO - Behavioral stress estimation
#[derive(Parser)]
#[command(name = "tensio")]
#[command(version = TENSIO_VERSION)]
#[command(about = "Train and query the TENSIO stress estimation pipeline", long_about = None)]
struct Cli {
    /// Enable debug logging (per-epoch training metrics)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a pipeline and write the artifact
    Train {
        /// Output artifact path
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_FILE)]
        output: PathBuf,

        /// Pipeline configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the synthetic sample count
        #[arg(long)]
        samples: Option<usize>,

        /// Override the synthesis seed
        #[arg(long)]
        seed: Option<u64>,

        /// Override the epoch count
        #[arg(long)]
        epochs: Option<usize>,
    },

    /// Estimate cortisol, stress and advice
    Estimate {
        /// Trained pipeline artifact
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_FILE)]
        pipeline: PathBuf,

        /// Sleep duration in hours (0-7.5)
        #[arg(long, requires_all = ["exercise", "event"])]
        sleep: Option<f64>,

        /// Exercise duration in hours (0-3)
        #[arg(long, requires_all = ["sleep", "event"])]
        exercise: Option<f64>,

        /// Event valence (-5 negative .. 5 positive)
        #[arg(long, allow_hyphen_values = true, requires_all = ["sleep", "exercise"])]
        event: Option<i32>,

        /// Reject inputs outside the documented ranges
        #[arg(long)]
        checked: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        output_format: OutputFormat,
    },

    /// Print artifact metadata and training metrics
    Inspect {
        /// Trained pipeline artifact
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_FILE)]
        pipeline: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose artifact and environment health
    Doctor {
        /// Check a pipeline artifact
        #[arg(long)]
        pipeline: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable line per estimate
    Text,
    /// Newline-delimited JSON (one estimate per line)
    Ndjson,
    /// Pretty-printed JSON array
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

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

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> Result<(), TensioCliError> {
    match cli.command {
        Commands::Train {
            output,
            config,
            samples,
            seed,
            epochs,
        } => cmd_train(&output, config.as_deref(), samples, seed, epochs),

        Commands::Estimate {
            pipeline,
            sleep,
            exercise,
            event,
            checked,
            output_format,
        } => {
            let single = match (sleep, exercise, event) {
                (Some(s), Some(x), Some(e)) => Some(FeatureVector::new(s, x, e)),
                _ => None,
            };
            cmd_estimate(&pipeline, single, checked, output_format)
        }

        Commands::Inspect { pipeline, json } => cmd_inspect(&pipeline, json),

        Commands::Doctor { pipeline, json } => cmd_doctor(pipeline.as_deref(), json),
    }
}

fn cmd_train(
    output: &Path,
    config_path: Option<&Path>,
    samples: Option<usize>,
    seed: Option<u64>,
    epochs: Option<usize>,
) -> Result<(), TensioCliError> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_json(&fs::read_to_string(path)?)?,
        None => PipelineConfig::default(),
    };

    if let Some(samples) = samples {
        config.synthesis.samples = samples;
    }
    if let Some(seed) = seed {
        config.synthesis.seed = seed;
    }
    if let Some(epochs) = epochs {
        config.training.epochs = epochs;
    }

    let trainer = Trainer::new(config)?;
    let pipeline = trainer.run_and_save(output)?;

    let summary = serde_json::json!({
        "artifact": output.display().to_string(),
        "pipeline_id": pipeline.pipeline_id,
        "compatibility_tag": pipeline.compatibility_tag,
        "test_mse": pipeline.report.test_mse,
        "test_mae": pipeline.report.test_mae,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}

fn cmd_estimate(
    pipeline: &Path,
    single: Option<FeatureVector>,
    checked: bool,
    output_format: OutputFormat,
) -> Result<(), TensioCliError> {
    let inputs = match single {
        Some(features) => vec![features],
        None if !atty::is(atty::Stream::Stdin) => read_feature_lines(io::stdin().lock())?,
        None => return Err(TensioCliError::MissingInput),
    };

    if inputs.is_empty() {
        return Err(TensioCliError::MissingInput);
    }

    let estimator = StressEstimator::load(pipeline)?;

    let estimates = inputs
        .iter()
        .map(|f| {
            if checked {
                estimator.estimate_checked(f)
            } else {
                Ok(estimator.estimate(f))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut stdout = io::stdout();
    write!(stdout, "{}", format_output(&estimates, &output_format)?)?;
    stdout.flush()?;

    Ok(())
}

fn read_feature_lines(reader: impl BufRead) -> Result<Vec<FeatureVector>, TensioCliError> {
    let mut inputs = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let features: FeatureVector = serde_json::from_str(trimmed).map_err(|e| {
            TensioCliError::ParseError(format!("line {}: {}", lineno + 1, e))
        })?;
        inputs.push(features);
    }
    Ok(inputs)
}

fn format_output(
    estimates: &[StressEstimate],
    format: &OutputFormat,
) -> Result<String, TensioCliError> {
    match format {
        OutputFormat::Text => {
            let lines: Vec<String> = estimates
                .iter()
                .map(|e| format!("[{}] {}", e.level.label(), e))
                .collect();
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for estimate in estimates {
                lines.push(serde_json::to_string(estimate)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(estimates)? + "\n"),
    }
}

fn cmd_inspect(pipeline_path: &Path, json: bool) -> Result<(), TensioCliError> {
    let pipeline = TrainedPipeline::load(pipeline_path)?;
    let report = &pipeline.report;

    if json {
        let summary = serde_json::json!({
            "format_version": pipeline.format_version,
            "pipeline_id": pipeline.pipeline_id,
            "trained_at": pipeline.trained_at,
            "producer": pipeline.producer,
            "compatibility_tag": pipeline.compatibility_tag,
            "topology": pipeline.model.topology(),
            "parameters": pipeline.model.parameter_count(),
            "scaler": pipeline.scaler,
            "samples": report.samples,
            "epochs": report.epochs,
            "final_epoch": report.final_epoch(),
            "test_mse": report.test_mse,
            "test_mae": report.test_mae,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("TENSIO Pipeline");
    println!("===============");
    println!("Pipeline ID:   {}", pipeline.pipeline_id);
    println!("Trained at:    {}", pipeline.trained_at.to_rfc3339());
    println!(
        "Producer:      {} {}",
        pipeline.producer.name, pipeline.producer.version
    );
    println!("Format:        v{}", pipeline.format_version);
    println!("Compat tag:    {}", pipeline.compatibility_tag);
    println!(
        "Topology:      {:?} ({} parameters)",
        pipeline.model.topology(),
        pipeline.model.parameter_count()
    );
    println!("\nScaler:");
    for (i, name) in tensio::types::FEATURE_NAMES.iter().enumerate() {
        println!(
            "  {:<15} mean {:>8.4}  std {:>8.4}",
            name, pipeline.scaler.mean[i], pipeline.scaler.std[i]
        );
    }
    println!("\nTraining:");
    println!(
        "  samples {} (train {}, fit {}, validation {}, test {})",
        report.samples, report.train_size, report.fit_size, report.validation_size, report.test_size
    );
    println!("  epochs  {}", report.epochs);
    if let Some(last) = report.final_epoch() {
        println!("  final train MSE       {:.4}", last.train_mse);
        if let (Some(mse), Some(mae)) = (last.validation_mse, last.validation_mae) {
            println!("  final validation MSE  {:.4} (MAE {:.4})", mse, mae);
        }
    }
    println!(
        "  test MSE              {:.4} (MAE {:.4})",
        report.test_mse, report.test_mae
    );

    Ok(())
}

fn cmd_doctor(pipeline: Option<&Path>, json: bool) -> Result<(), TensioCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "tensio_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("TENSIO version {}", TENSIO_VERSION),
    });

    checks.push(DoctorCheck {
        name: "artifact_format".to_string(),
        status: CheckStatus::Ok,
        message: format!("Artifact format: v{}", ARTIFACT_FORMAT_VERSION),
    });

    if let Some(path) = pipeline {
        if path.exists() {
            match StressEstimator::load(path) {
                Ok(estimator) => {
                    // Probe the documented centre point; cortisol should sit near 15
                    let probe = estimator.estimate(&FeatureVector::new(4.5, 1.0, 0));
                    checks.push(DoctorCheck {
                        name: "pipeline".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Pipeline valid (centre probe: cortisol {:.2}, stress {:.2})",
                            probe.cortisol, probe.stress
                        ),
                    });
                }
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "pipeline".to_string(),
                        status: CheckStatus::Error,
                        message: format!("Pipeline rejected: {}", e),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "pipeline".to_string(),
                status: CheckStatus::Warning,
                message: "Pipeline file does not exist".to_string(),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (single estimate mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (batch estimate mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: TENSIO_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("TENSIO Doctor Report");
        println!("====================");
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
        Err(TensioCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum TensioCliError {
    Io(io::Error),
    Core(TensioError),
    Json(serde_json::Error),
    MissingInput,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for TensioCliError {
    fn from(e: io::Error) -> Self {
        TensioCliError::Io(e)
    }
}

impl From<TensioError> for TensioCliError {
    fn from(e: TensioError) -> Self {
        TensioCliError::Core(e)
    }
}

impl From<serde_json::Error> for TensioCliError {
    fn from(e: serde_json::Error) -> Self {
        TensioCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TensioCliError> for CliError {
    fn from(e: TensioCliError) -> Self {
        match e {
            TensioCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TensioCliError::Core(e) => {
                let (code, hint) = match &e {
                    TensioError::InputDomain { .. } => (
                        "INPUT_DOMAIN",
                        "Clamp inputs to the documented ranges or drop --checked",
                    ),
                    TensioError::IncompatibleArtifact(_) => (
                        "INCOMPATIBLE_ARTIFACT",
                        "Retrain with 'tensio train' to produce a matching artifact",
                    ),
                    TensioError::ArtifactIo(_) | TensioError::Json(_) => (
                        "ARTIFACT_ERROR",
                        "Ensure the pipeline artifact exists and is not corrupt",
                    ),
                    _ => ("CONFIGURATION_ERROR", "Review the pipeline configuration"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            TensioCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            TensioCliError::MissingInput => CliError {
                code: "MISSING_INPUT".to_string(),
                message: "No input features provided".to_string(),
                hint: Some(
                    "Pass --sleep, --exercise and --event, or pipe NDJSON feature vectors on stdin"
                        .to_string(),
                ),
            },
            TensioCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            TensioCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Each line must look like {\"sleep_hours\":6.0,\"exercise_hours\":1.0,\"event_score\":-2}"
                        .to_string(),
                ),
            },
        }
    }
}

// Report types

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

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use tensio::StressLevel;

    fn estimate(cortisol: f64, stress: f64) -> StressEstimate {
        let level = StressLevel::from_stress(stress);
        StressEstimate {
            cortisol,
            stress,
            level,
            advice: level.advice().to_string(),
        }
    }

    #[test]
    fn test_estimate_flags_require_each_other() {
        for args in [
            vec!["tensio", "estimate", "--exercise", "1", "--event", "2"],
            vec!["tensio", "estimate", "--sleep", "6", "--event", "-2"],
            vec!["tensio", "estimate", "--sleep", "6", "--exercise", "1"],
        ] {
            let err = Cli::try_parse_from(args.iter().copied()).err().unwrap();
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument, "{args:?}");
        }

        let cli = Cli::try_parse_from([
            "tensio",
            "estimate",
            "--sleep",
            "6",
            "--exercise",
            "1",
            "--event",
            "-2",
        ])
        .unwrap();
        match cli.command {
            Commands::Estimate {
                sleep,
                exercise,
                event,
                ..
            } => assert_eq!((sleep, exercise, event), (Some(6.0), Some(1.0), Some(-2))),
            _ => panic!("expected estimate command"),
        }
    }

    #[test]
    fn test_read_feature_lines_skips_blank_lines() {
        let input = concat!(
            "\n",
            "{\"sleep_hours\":6.0,\"exercise_hours\":1.0,\"event_score\":-2}\n",
            "   \n",
            "{\"sleep_hours\":3.5,\"exercise_hours\":0.0,\"event_score\":4}\n",
        );
        let inputs = read_feature_lines(input.as_bytes()).unwrap();
        assert_eq!(
            inputs,
            vec![FeatureVector::new(6.0, 1.0, -2), FeatureVector::new(3.5, 0.0, 4)]
        );
    }

    #[test]
    fn test_read_feature_lines_reports_line_number() {
        let input = concat!(
            "{\"sleep_hours\":6.0,\"exercise_hours\":1.0,\"event_score\":-2}\n",
            "\n",
            "not json\n",
        );
        match read_feature_lines(input.as_bytes()) {
            Err(TensioCliError::ParseError(msg)) => assert!(msg.starts_with("line 3:"), "{msg}"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_format_output_text() {
        let out = format_output(&[estimate(15.0, 5.0)], &OutputFormat::Text).unwrap();
        assert!(out.starts_with("[<6] cortisol 15.00 | stress 5.00 / 10 | "), "{out}");
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_format_output_ndjson_one_line_per_estimate() {
        let estimates = vec![estimate(12.0, 2.7), estimate(19.0, 8.8)];
        let out = format_output(&estimates, &OutputFormat::Ndjson).unwrap();
        let parsed: Vec<StressEstimate> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, estimates);
    }

    #[test]
    fn test_format_output_json_pretty_is_array() {
        let estimates = vec![estimate(15.0, 5.0)];
        let out = format_output(&estimates, &OutputFormat::JsonPretty).unwrap();
        let parsed: Vec<StressEstimate> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, estimates);
    }
}
