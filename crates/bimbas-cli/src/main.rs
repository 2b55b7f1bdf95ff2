use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;

use bimbas_core::{ActivityPipeline, BimbasError, EventSource, Orchestrator, OrchestratorConfig};
use bimbas_reporting::{export_results, ExportFormat};

/// Classify GitHub logins as Bot, Human, Organization, Unknown or Invalid.
///
/// Deliberately minimal — terminal rendering, progress bars and dotfile
/// loading are out of scope; this binary exists to drive `bimbas-core`
/// end-to-end, not to replace an embedding application's own CLI.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Logins to classify, in the order results should be printed.
    logins: Vec<String>,

    /// GitHub API token. Unauthenticated requests are capped at 60/hour.
    #[arg(long, env = "BIMBAS_GITHUB_TOKEN")]
    api_key: Option<String>,

    /// Minimum cumulative event count before attempting classification.
    #[arg(long, default_value_t = 5)]
    min_events: u32,

    /// Confidence threshold that stops pagination early.
    #[arg(long, default_value_t = 1.0)]
    min_confidence: f64,

    /// Maximum event pages fetched per contributor.
    #[arg(long, default_value_t = 3)]
    max_queries: u32,

    /// Never sleep for a rate-limit reset; propagate instead.
    #[arg(long)]
    no_wait: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = CliExportFormat::PlainText)]
    format: CliExportFormat,

    /// Path to the ONNX model, overriding the bundled default.
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Directory holding `event_to_action.json`/`action_to_activity.json`,
    /// overriding the bundled defaults.
    #[arg(long)]
    mapping_dir: Option<PathBuf>,

    /// Include a full error chain on failure.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliExportFormat {
    Csv,
    Json,
    PlainText,
}

impl From<CliExportFormat> for ExportFormat {
    fn from(value: CliExportFormat) -> Self {
        match value {
            CliExportFormat::Csv => ExportFormat::Csv,
            CliExportFormat::Json => ExportFormat::Json,
            CliExportFormat::PlainText => ExportFormat::PlainText,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.logins.is_empty() {
        eprintln!("error: at least one login is required");
        return ExitCode::from(1);
    }

    match run(args).await {
        Ok(()) => ExitCode::from(0),
        Err(CliError::RateLimit) => ExitCode::from(2),
        Err(CliError::Other(err)) => {
            log::error!("{err}");
            ExitCode::from(3)
        }
    }
}

enum CliError {
    RateLimit,
    Other(anyhow::Error),
}

async fn run(args: Args) -> Result<(), CliError> {
    let config = OrchestratorConfig {
        min_events: args.min_events,
        min_confidence: args.min_confidence,
        max_queries: args.max_queries,
        no_wait: args.no_wait,
    };

    let source = EventSource::new(args.api_key, config.max_queries, config.no_wait);
    let mapping = match args.mapping_dir {
        Some(dir) => ActivityPipeline::load_from_dir(&dir).await,
        None => ActivityPipeline::load_default(),
    }
    .map_err(|err| CliError::Other(err.into()))?;

    #[cfg(feature = "onnx")]
    let predictor: Arc<dyn bimbas_core::Predictor> = {
        let model_path = args
            .model_path
            .unwrap_or_else(|| PathBuf::from("resources/models/bimbas.onnx"));
        Arc::new(
            bimbas_core::OnnxPredictor::load(&model_path).map_err(|err| CliError::Other(err.into()))?,
        )
    };
    #[cfg(not(feature = "onnx"))]
    let predictor: Arc<dyn bimbas_core::Predictor> = {
        let _ = args.model_path;
        return Err(CliError::Other(anyhow::anyhow!(
            "this build was compiled without the `onnx` feature; no classifier is available"
        )));
    };

    let orchestrator =
        Orchestrator::new(source, mapping, predictor, config).map_err(|err| CliError::Other(err.into()))?;

    let mut results = Vec::new();
    let mut stream = std::pin::pin!(orchestrator.classify(&args.logins));
    while let Some(result) = stream.next().await {
        match result {
            Ok(result) => results.push(result),
            Err(BimbasError::RateLimitExceeded { .. }) => {
                print_results(&results, args.format)?;
                return Err(CliError::RateLimit);
            }
            Err(err) => {
                print_results(&results, args.format)?;
                if args.verbose {
                    return Err(CliError::Other(anyhow::anyhow!("{err:?}")));
                }
                return Err(CliError::Other(err.into()));
            }
        }
    }

    print_results(&results, args.format)
}

fn print_results(
    results: &[bimbas_core::ContributorResult],
    format: CliExportFormat,
) -> Result<(), CliError> {
    let rendered = export_results(results, format.into()).map_err(|err| CliError::Other(err.into()))?;
    println!("{rendered}");
    Ok(())
}
