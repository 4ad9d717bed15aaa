//! QR command - process a fiscal QR payload.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::render::{print_processed, print_stream};
use crate::context::{AppContext, cancel_on_ctrl_c};
use crate::{Cli, ExitCode};

/// Arguments for the qr command.
#[derive(Args)]
pub struct QrArgs {
    /// Raw QR payload, as a query string or a full URL.
    pub raw: String,

    /// Stream progress as JSON lines.
    #[arg(long, short)]
    pub stream: bool,

    /// Owner recorded on a newly created receipt.
    #[arg(long, default_value = "cli")]
    pub owner: String,
}

/// Runs the qr command.
pub async fn run(args: &QrArgs, cli: &Cli) -> Result<ExitCode> {
    let ctx = AppContext::build(cli).await?;
    info!(owner = %args.owner, stream = args.stream, "Processing QR receipt");

    let code = if args.stream {
        let cancel = cancel_on_ctrl_c();
        let events = ctx.pipeline.process_qr_stream(&args.owner, &args.raw, &cancel);
        print_stream(events).await?
    } else {
        let processed = ctx.pipeline.process_qr(&args.owner, &args.raw).await?;
        print_processed(&processed, cli)?
    };

    ctx.shutdown().await;
    Ok(code)
}
