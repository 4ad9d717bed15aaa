//! Tokens command - show the fiscal credential pool.

use anyhow::Result;

use crate::context::{build_tokens, load_config};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Runs the tokens command.
pub fn run(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(cli)?;
    let tokens = build_tokens(&config)?;
    let stats = tokens.stats();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_tokens(&stats));
            if !cli.quiet {
                println!();
                println!(
                    "{} of {} credentials enabled",
                    tokens.enabled_count(),
                    tokens.len()
                );
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&stats)?);
        }
    }

    Ok(ExitCode::Success)
}
