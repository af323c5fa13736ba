//! Fleetclaim - Main entry point
//!
//! Two-phase device onboarding: `validate` reconciles a supplier manifest
//! against the dashboard and proposes device names, `claim` claims the
//! validated devices into their networks and applies the metadata.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fleetclaim_dashboard::DashboardClient;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fleetclaim")]
#[command(about = "Validate supplier manifests and claim devices into dashboard networks")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "fleetclaim.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a supplier manifest and write the output sets
    Validate {
        /// Manifest to validate
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Directory for the output files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Claim the devices listed in a validated file
    Claim {
        /// Validated upload file
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Fleetclaim v{}", env!("CARGO_PKG_VERSION"));

    if let Command::InitConfig { force } = args.command {
        if args.config.exists() && !force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                args.config.display()
            );
        }
        commands::ensure_parent(&args.config)?;
        config::save_default_config(&args.config)?;
        info!(path = %args.config.display(), "Wrote default configuration");
        return Ok(());
    }

    let mut config = config::load_config(&args.config)?;

    let dashboard = &config.dashboard;
    let client = DashboardClient::new(
        &dashboard.base_url,
        dashboard.api_key()?,
        dashboard.timeout(),
        dashboard.max_retries,
    )?;

    info!(
        base_url = %dashboard.base_url,
        max_retries = dashboard.max_retries,
        "Configuration loaded"
    );

    match args.command {
        Command::Validate { input, output_dir } => {
            if let Some(input) = input {
                config.validate.input = input;
            }
            if let Some(output_dir) = output_dir {
                config.validate.output_dir = output_dir;
            }
            let files = commands::validate(&client, &config.validate, &config.policy).await?;
            commands::print_outputs(&files);
        }
        Command::Claim { input } => {
            if let Some(input) = input {
                config.claim.input = input;
            }
            if let Some(summary) = commands::claim(&client, &config.claim, &config.policy).await? {
                commands::print_claim_summary(&summary);
            }
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
