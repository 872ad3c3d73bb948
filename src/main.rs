use anyhow::Result;
use clap::{Parser, Subcommand};
use script_bridge::script::Lifecycle;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cmd;

#[derive(Parser)]
#[command(name = "script-bridge")]
#[command(version, about = "Manage a resource through lifecycle scripts")]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "script.toml")]
    pub config: PathBuf,

    /// Path to the JSON state file holding the last known output
    #[arg(short, long, global = true, default_value = "script.state.json")]
    pub state: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the planned output and whether a change is needed
    Plan,
    /// Run the create script and record its output as state
    Create,
    /// Refresh state with the read script and report drift
    Read,
    /// Run the update script against the current state
    Update,
    /// Run the delete script and remove the state file
    Delete,
    /// Run the read script as a data source (no state involved)
    Data,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the resolved configuration for this OS
    Show,
    /// Validate configuration and show any warnings
    Validate,
}

fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "script_bridge=debug,script=trace"
    } else {
        "script_bridge=info,script=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping script");
            interrupt.cancel();
        }
    });

    match &cli.command {
        Commands::Plan => cmd::cmd_lifecycle(&cli, Lifecycle::Plan, &cancel).await?,
        Commands::Create => cmd::cmd_lifecycle(&cli, Lifecycle::Create, &cancel).await?,
        Commands::Read => cmd::cmd_lifecycle(&cli, Lifecycle::Read, &cancel).await?,
        Commands::Update => cmd::cmd_lifecycle(&cli, Lifecycle::Update, &cancel).await?,
        Commands::Delete => cmd::cmd_lifecycle(&cli, Lifecycle::Delete, &cancel).await?,
        Commands::Data => cmd::cmd_data(&cli, &cancel).await?,
        Commands::Config { command } => cmd::cmd_config(&cli.config, command.clone())?,
    }

    Ok(())
}
