// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! ReceiptFlow CLI - receipt ingestion from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Process a fiscal QR payload
//! receiptflow qr "t=20240115T1830&s=1500.00&fn=9999078900004792&i=12345&fp=3522207165&n=1"
//!
//! # Same, streaming events as JSON lines
//! receiptflow qr "t=..." --stream
//!
//! # Process a photo
//! receiptflow image receipt.jpg
//!
//! # Photo from stdin, JSON output
//! cat receipt.jpg | receiptflow image - --format json --pretty
//!
//! # Inspect a QR payload without any network call
//! receiptflow parse-qr "t=..."
//!
//! # Credential pool state
//! receiptflow tokens
//! ```

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use receiptflow_pipeline::{ErrorStage, PipelineError};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{config, image, parse_qr, qr, tokens};

// ============================================================================
// CLI Definition
// ============================================================================

/// ReceiptFlow CLI - receipt ingestion and enrichment.
#[derive(Parser)]
#[command(name = "receiptflow")]
#[command(about = "Receipt ingestion and enrichment CLI")]
#[command(long_about = r#"
ReceiptFlow turns a fiscal QR code or a receipt photo into itemized,
enriched receipt data ready for bill splitting.

QR receipts are looked up with the fiscal authority first; the fiscal
items are stored and kept if enrichment fails. Processing the same QR
twice returns the stored receipt.

Examples:
  receiptflow qr "t=...&s=...&fn=...&i=...&fp=...&n=1"
  receiptflow qr "t=..." --stream        # JSON lines
  receiptflow image receipt.jpg
  receiptflow parse-qr "t=..."
  receiptflow tokens --format json
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Configuration file (defaults to the user config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Receipt database snapshot (defaults to the user data directory).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Process a fiscal QR payload.
    Qr(qr::QrArgs),

    /// Process a receipt photo.
    #[command(visible_alias = "img")]
    Image(image::ImageArgs),

    /// Parse a QR payload without contacting any service.
    ParseQr(parse_qr::ParseQrArgs),

    /// Show fiscal credential pool state.
    Tokens,

    /// Show configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// Input could not be understood.
    InvalidInput = 2,
    /// Fiscal lookup failed.
    FiscalLookup = 3,
    /// Enrichment failed; fallback data was stored.
    Degraded = 4,
    /// Interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Picks the exit code for a pipeline failure stage.
    pub(crate) fn for_stage(stage: ErrorStage) -> Self {
        match stage {
            ErrorStage::Validation => ExitCode::InvalidInput,
            ErrorStage::Fns => ExitCode::FiscalLookup,
            ErrorStage::Enrichment => ExitCode::Degraded,
            ErrorStage::Storage => ExitCode::Error,
        }
    }

    /// Picks the exit code for a failed command.
    fn for_error(error: &anyhow::Error) -> Self {
        error
            .downcast_ref::<PipelineError>()
            .map_or(ExitCode::Error, |e| Self::for_stage(e.stage()))
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("receiptflow=debug,info")
    } else {
        EnvFilter::new("receiptflow=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Qr(args) => qr::run(args, &cli).await,
        Commands::Image(args) => image::run(args, &cli).await,
        Commands::ParseQr(args) => parse_qr::run(args, &cli),
        Commands::Tokens => tokens::run(&cli),
        Commands::Config(args) => config::run(args, &cli),
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {e:#}");
            }
            ExitCode::for_error(&e)
        }
    };

    if code != ExitCode::Success {
        std::process::exit(code as i32);
    }

    Ok(())
}
