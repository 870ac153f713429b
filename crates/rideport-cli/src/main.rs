//! RidePort CLI - download rides from training devices
//!
//! Provides commands for:
//! - Listing attached ports and supported device types
//! - Downloading rides into the local library
//! - Erasing rides stored on a device
//! - Browsing the library and managing configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rideport_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod observer;
mod output;

use commands::{
    config::ConfigCommand, devices::DevicesCommand, download::DownloadCommand,
    erase::EraseCommand, library::LibraryCommand, ports::PortsCommand, CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "rideport",
    version,
    about = "Download rides from cycling computers and power meters"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List attached ports
    Ports(PortsCommand),
    /// List supported device types
    Devices(DevicesCommand),
    /// Download rides into the library
    Download(DownloadCommand),
    /// Erase the rides stored on a device
    Erase(EraseCommand),
    /// Browse the ride library
    #[command(subcommand)]
    Library(LibraryCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    // Setup tracing
    let filter = if cli.quiet {
        "warn".to_string()
    } else {
        match cli.verbose {
            0 => config.logging.level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CommandContext {
        config_path,
        config,
        format,
    };

    match cli.command {
        Commands::Ports(cmd) => cmd.execute(&ctx).await,
        Commands::Devices(cmd) => cmd.execute(&ctx).await,
        Commands::Download(cmd) => cmd.execute(&ctx).await,
        Commands::Erase(cmd) => cmd.execute(&ctx).await,
        Commands::Library(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
