//! # healthtrack Main Entry Point
//!
//! Loads and validates the service configuration, then initializes telemetry.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use healthtrack::{config::ConfigLoader, telemetry};

#[derive(Debug, Parser)]
#[command(name = "healthtrack", about = "Load and validate healthtrack configuration")]
struct Cli {
    /// Path to the YAML or JSON config file.
    #[arg(long, short, default_value = "./config/config.yaml")]
    config: PathBuf,

    /// Skip the config file; use defaults and environment variables only.
    #[arg(long, conflicts_with = "config")]
    no_config: bool,

    /// Print the loaded configuration with secrets redacted.
    #[arg(long)]
    print: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = (!cli.no_config).then_some(cli.config.as_path());
    let config = ConfigLoader::new()
        .load(path)
        .context("failed to load configuration")?;

    telemetry::init_tracing(&config).context("failed to initialize telemetry")?;

    tracing::info!(
        server_address = %config.server_address(),
        developer_mode = config.developer_mode,
        log_out = %config.log.out,
        "configuration loaded"
    );

    if cli.print {
        println!("{}", config.redacted_json()?);
    }

    Ok(())
}
