//! Image command - process a receipt photo.

use anyhow::{Context, Result};
use clap::Args;
use receiptflow_providers::enrichment::ImagePayload;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use super::render::{print_processed, print_stream};
use crate::context::{AppContext, cancel_on_ctrl_c};
use crate::{Cli, ExitCode};

/// Arguments for the image command.
#[derive(Args)]
pub struct ImageArgs {
    /// Image file, or `-` for stdin. Base64 text and data URLs are accepted
    /// as well as raw image bytes.
    pub path: String,

    /// Stream progress as JSON lines.
    #[arg(long, short)]
    pub stream: bool,

    /// Owner recorded on the receipt.
    #[arg(long, default_value = "cli")]
    pub owner: String,
}

/// Runs the image command.
pub async fn run(args: &ImageArgs, cli: &Cli) -> Result<ExitCode> {
    let image = read_image(&args.path).await?;
    let ctx = AppContext::build(cli).await?;
    info!(owner = %args.owner, stream = args.stream, "Processing image receipt");

    let code = if args.stream {
        let cancel = cancel_on_ctrl_c();
        let events = ctx.pipeline.process_image_stream(&args.owner, &image, &cancel);
        print_stream(events).await?
    } else {
        let processed = ctx.pipeline.process_image(&args.owner, &image).await?;
        print_processed(&processed, cli)?
    };

    ctx.shutdown().await;
    Ok(code)
}

/// Reads the image and returns it in a form the pipeline accepts.
async fn read_image(path: &str) -> Result<String> {
    let bytes = if path == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("failed to read image from stdin")?;
        buf
    } else {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read image {path}"))?
    };

    Ok(normalize_image(&bytes, mime_for_path(path)))
}

/// Passes base64 text through untouched and encodes anything else.
fn normalize_image(bytes: &[u8], mime_type: Option<&str>) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        if ImagePayload::parse(text).is_ok() {
            debug!("Image input is already base64");
            return text.trim().to_string();
        }
    }
    ImagePayload::from_bytes(bytes, mime_type).to_data_url()
}

fn mime_for_path(path: &str) -> Option<&'static str> {
    let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_for_path("receipt.JPG"), Some("image/jpeg"));
        assert_eq!(mime_for_path("/tmp/scan.png"), Some("image/png"));
        assert_eq!(mime_for_path("-"), None);
        assert_eq!(mime_for_path("notes.txt"), None);
    }

    #[test]
    fn test_base64_text_passes_through() {
        let input = b"data:image/png;base64,aGVsbG8=\n";
        assert_eq!(normalize_image(input, None), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_binary_is_encoded() {
        let png_header = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
        let normalized = normalize_image(&png_header, Some("image/png"));

        assert!(normalized.starts_with("data:image/png;base64,"));
        assert_eq!(ImagePayload::parse(&normalized).unwrap().decoded_len, 8);
    }
}
