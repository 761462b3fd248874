//! iamsync CLI - plan, check and run IAM policy reconciliation
//!
//! - `plan`: show the document a bind/unbind would produce
//! - `check`: report whether a document already satisfies a binding
//! - `run`: reconcile declarations against policies seeded from files

use clap::{Parser, Subcommand};
use iamsync_reconciler::ReconcilerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod input;
mod output;

use commands::{plan, run};

/// iamsync CLI application
#[derive(Parser)]
#[command(name = "iamsync")]
#[command(about = "iamsync - IAM policy binding reconciler", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "IAMSYNC_CONFIG")]
    config: Option<String>,

    /// Output format (json, yaml)
    #[arg(short, long, default_value = "json")]
    output: output::OutputFormat,

    /// Log level, overriding the configuration file
    #[arg(long, env = "IAMSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Show the policy a binding change would produce
    Plan(plan::BindingArgs),

    /// Check whether a policy already satisfies a binding
    Check(plan::BindingArgs),

    /// Reconcile declarations against seeded policies
    Run(run::RunArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ReconcilerConfig::load(cli.config.as_deref())?;

    // Logs go to stderr so stdout stays machine-readable.
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.log_json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    match cli.command {
        Commands::Plan(args) => plan::plan(args, cli.output),
        Commands::Check(args) => plan::check(args, cli.output),
        Commands::Run(args) => run::execute(args, config, cli.output).await,
    }
}
