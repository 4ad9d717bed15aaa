//! Output shared by the processing commands.

use anyhow::Result;
use receiptflow_pipeline::{PipelineEvent, PipelineStream, ProcessedReceipt};
use tracing::debug;

use crate::output::{JsonFormatter, STREAM_END, TextFormatter, event_line};
use crate::{Cli, ExitCode, OutputFormat};

/// Prints a one-shot result and picks the exit code.
pub fn print_processed(processed: &ProcessedReceipt, cli: &Cli) -> Result<ExitCode> {
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_receipt(processed));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(processed)?);
        }
    }

    Ok(if processed.enriched {
        ExitCode::Success
    } else {
        ExitCode::Degraded
    })
}

/// Prints streamed events as JSON lines, then the end marker.
///
/// The exit code follows the terminal event; a stream that ends without one
/// was interrupted.
pub async fn print_stream(mut events: PipelineStream) -> Result<ExitCode> {
    let mut code = ExitCode::Interrupted;

    while let Some(event) = events.next_event().await {
        match &event {
            PipelineEvent::Completed { .. } => code = ExitCode::Success,
            PipelineEvent::Error { stage, .. } => code = ExitCode::for_stage(*stage),
            _ => {}
        }
        println!("{}", event_line(&event)?);
    }

    debug!(?code, "Stream finished");
    println!("{STREAM_END}");
    Ok(code)
}
