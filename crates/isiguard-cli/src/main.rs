//! isiguard CLI
//!
//! Verify the Important Safety Information in a promotional document
//! against the approved text.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use isiguard_core::GroundTruth;
use isiguard_runtime::{
    create_layout_provider, DocumentSource, LayoutKind, ProviderSelection, VerificationOrchestrator,
    VerifierConfig,
};

mod report;

#[derive(Parser)]
#[command(name = "isiguard")]
#[command(version, about = "Important Safety Information compliance verification")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare a document's safety text against the approved ISI
    Verify(VerifyArgs),
}

#[derive(clap::Args)]
struct VerifyArgs {
    /// Approved ISI text
    ground_truth: PathBuf,

    /// Promotional document to check
    document: PathBuf,

    /// YAML file with `scoring` and `runtime` sections
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Layout provider, overriding the config file
    #[arg(long, value_enum)]
    layout: Option<LayoutArg>,

    /// LLM provider for extraction and reasoning, overriding the config file
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Print the full outcome as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LayoutArg {
    Text,
    Azure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    /// Deterministic pipeline only
    None,
    Anthropic,
    Openai,
}

/// A verdict was produced, whatever the score.
const EXIT_VERDICT: u8 = 0;
/// A pipeline stage failed.
const EXIT_FAILED: u8 = 1;
/// Bad arguments, configuration or input files.
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Verify(args) => verify(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Logs go to stderr so stdout carries only the report.
fn init_logging(verbose: bool) {
    let default = if verbose { "isiguard=debug" } else { "isiguard=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn verify(args: VerifyArgs) -> Result<u8> {
    let config = load_config(&args)?;
    let ground_truth = read_ground_truth(&args.ground_truth, &config).await?;
    if ground_truth.is_empty() {
        anyhow::bail!("no ISI text found in {}", args.ground_truth.display());
    }
    tracing::info!(segments = ground_truth.len(), "Ground truth loaded");

    let document = read_document(&args.document)?;
    let orchestrator = VerificationOrchestrator::from_config(config)
        .context("Failed to set up the verification pipeline")?;

    let outcome = orchestrator.verify(&ground_truth, &document).await;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialize outcome")?
        );
    } else {
        print!("{}", report::render(&outcome, &args.ground_truth, &args.document));
    }

    if let Some(failure) = &outcome.failure {
        eprintln!("error: pipeline failed at {}: {}", failure.stage, failure.message);
        return Ok(EXIT_FAILED);
    }
    Ok(EXIT_VERDICT)
}

fn load_config(args: &VerifyArgs) -> Result<VerifierConfig> {
    let mut config = match &args.config {
        Some(path) => VerifierConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => VerifierConfig::default(),
    };

    if let Some(layout) = args.layout {
        config.runtime.layout.kind = match layout {
            LayoutArg::Text => LayoutKind::Text,
            LayoutArg::Azure => LayoutKind::Azure,
        };
    }

    if let Some(provider) = args.provider {
        let provider_type = match provider {
            ProviderArg::None => None,
            ProviderArg::Anthropic => Some("anthropic"),
            ProviderArg::Openai => Some("openai"),
        };
        config.runtime.provider = match (provider_type, config.runtime.provider.take()) {
            (None, _) => None,
            // Keep settings from the config file for the same provider
            (Some(wanted), Some(existing)) if existing.provider_type == wanted => Some(existing),
            (Some(wanted), _) => Some(ProviderSelection::new(wanted)),
        };
    }

    Ok(config)
}

fn read_document(path: &Path) -> Result<DocumentSource> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(DocumentSource::new(bytes, DocumentSource::content_type_for(path)))
}

/// Plain text is segmented directly; anything else goes through the
/// configured layout provider first.
async fn read_ground_truth(path: &Path, config: &VerifierConfig) -> Result<GroundTruth> {
    let source = read_document(path)?;
    if source.content_type.starts_with("text/") {
        let text = String::from_utf8(source.bytes)
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
        return Ok(GroundTruth::from_text(&text));
    }

    let layout = create_layout_provider(&config.runtime.layout)?;
    let elements = layout
        .analyze(&source)
        .await
        .with_context(|| format!("Layout analysis of {} failed", path.display()))?;
    let text = isiguard_core::types::reading_order(&elements)
        .into_iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(GroundTruth::from_text(&text))
}
