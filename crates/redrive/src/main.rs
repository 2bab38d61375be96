//! Redrive - failure recovery for workflow executions
//!
//! Main entry point for the redrive CLI. Reads one failed-execution
//! invocation, routes it, and prints the resulting record as JSON.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

mod run;

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Redrive - re-queue failed workflow executions from their failing step
#[derive(Parser, Debug)]
#[command(name = "redrive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Invocation JSON file, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub invocation: String,

    /// TOML configuration file (environment variables take precedence)
    #[arg(short, long, env = "REDRIVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = run::load_config(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.verbose, cli.json_logs);

    let result = run::run(&cli.invocation, &config).await?;
    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

/// Install the global subscriber. Logs go to stderr; stdout carries the result.
fn init_tracing(logging: &redrive_config::LoggingConfig, verbose: bool, json: bool) {
    use tracing_subscriber::prelude::*;

    let filter = if verbose {
        "redrive=debug,redrive_core=debug,redrive_client=debug,redrive_config=debug,info"
    } else {
        logging.level.as_str()
    };
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json || logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
