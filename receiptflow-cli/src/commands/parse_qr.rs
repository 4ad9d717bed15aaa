//! Parse-qr command - inspect a QR payload offline.

use anyhow::Result;
use clap::Args;
use receiptflow_pipeline::PipelineError;
use receiptflow_providers::fiscal::parse_qr_payload;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the parse-qr command.
#[derive(Args)]
pub struct ParseQrArgs {
    /// Raw QR payload, as a query string or a full URL.
    pub raw: String,
}

/// Runs the parse-qr command.
pub fn run(args: &ParseQrArgs, cli: &Cli) -> Result<ExitCode> {
    let payload = parse_qr_payload(&args.raw).ok_or_else(|| {
        PipelineError::Format("QR payload is missing one of t, s, fn, i, fp, n".to_string())
    })?;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_qr(&payload));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_qr(&payload)?);
        }
    }

    Ok(ExitCode::Success)
}
