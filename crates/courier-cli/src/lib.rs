//! Courier command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};

/// Courier - Facebook Messenger slave channel
#[derive(Parser)]
#[command(name = "courier")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "COURIER_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Manage the login session
    Session(commands::session::SessionArgs),

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Session(args) => commands::session::run(args).await,
        Commands::Config(args) => commands::config::run(args).await,
        Commands::Version => {
            println!("courier {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
