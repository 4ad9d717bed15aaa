//! Config command - show configuration.

use anyhow::Result;
use clap::Args;
use receiptflow_store::{ENV_ENRICHMENT_URL, ENV_FISCAL_TOKENS, default_config_dir};

use crate::context::{config_path, db_path, load_config};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    /// Show configuration paths only.
    #[arg(long)]
    pub path: bool,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli) -> Result<ExitCode> {
    if args.path {
        show_paths(cli)?;
    } else {
        show_config(cli)?;
    }
    Ok(ExitCode::Success)
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?.redacted();
    let path = config_path(cli);

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", formatter.format_config(&config, &path));
            if let Err(e) = config.validate() {
                println!();
                println!("Warning: {e}");
            }
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&config)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let config_file = config_path(cli);
    let db_file = db_path(cli);

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:   {}", config_dir.display());
            println!("Config file:  {}", config_file.display());
            println!("Receipt data: {}", db_file.display());
            println!();
            println!("Environment:  {ENV_FISCAL_TOKENS}, {ENV_ENRICHMENT_URL}");
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "config_file": config_file.display().to_string(),
                "db_file": db_file.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}
