//! Scopegate CLI - origin policy checks and dry-run admissions.
//!
//! `scopegate check` loads and validates the configuration, parses every
//! verification key and prints the origin policy. `scopegate admit` runs the
//! connection-admission hook for a single simulated connection.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scopegate_auth::Authorizer;
use scopegate_config::{ResolvedConfig, collect_env_vars};

mod commands;
mod config_bridge;
mod theme;

use commands::{admit, check};
use theme::Theme;

/// Scopegate - origin-scoped file access for browser clients
#[derive(Parser)]
#[command(name = "scopegate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and print the origin policy
    Check,

    /// Run the admission hook for one simulated connection
    Admit {
        /// Value of the connection's Origin header
        #[arg(short, long)]
        origin: Option<String>,

        /// Raw request URL carrying the `token` query parameter
        #[arg(short, long)]
        url: String,

        /// Directory to list through the session's view when accepted
        #[arg(short, long)]
        list: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<ResolvedConfig> {
    let env = collect_env_vars();
    scopegate_config::load(cli.config.as_deref(), &env).context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = match load_config(&cli) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("{}", Theme::failure(&format!("{e:#}")));
            std::process::exit(1);
        },
    };

    let logging = config_bridge::log_config(&resolved.config.logging, cli.verbose)
        .and_then(|config| scopegate_telemetry::setup_logging(&config));
    if let Err(e) = logging {
        eprintln!("Failed to initialize logging: {e}");
    }
    tracing::debug!(
        env_fallbacks = resolved.env_fallbacks,
        "configuration ready"
    );

    match &cli.command {
        Commands::Check => check::run_check(&resolved).await,
        Commands::Admit { origin, url, list } => {
            let authorizer = Authorizer::from_config(&resolved.config)
                .context("failed to build the origin policy")?;
            admit::run_admit(&authorizer, origin.as_deref(), url, list.as_deref()).await
        },
    }
}
