//! marshal - message and package inspection tool
//!
//! Encodes and decodes fleet manager command messages, creates and inspects
//! package headers, and dumps arbitrary managed messages.

mod commands;
mod config;
mod dump;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "marshal")]
#[command(about = "Encode, decode and inspect marshal messages and package files")]
#[command(version)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, env = "MARSHAL_CONFIG")]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Show raw bytes as hex
    #[arg(long, global = true)]
    hex: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode or decode command messages
    #[command(subcommand)]
    Command(CommandAction),

    /// Create, inspect or list package files
    #[command(subcommand)]
    Package(PackageAction),

    /// Show or save the effective configuration
    #[command(subcommand)]
    Config(ConfigAction),

    /// Decode a managed message using an ad-hoc shape
    Dump {
        /// Message file
        file: PathBuf,

        /// Member types in order, e.g. i32,text,uuid,timestamp
        #[arg(short, long, value_delimiter = ',', required = true)]
        shape: Vec<String>,

        /// Bytes to skip before the message
        #[arg(long, default_value = "0")]
        offset: usize,
    },
}

#[derive(Subcommand)]
pub enum CommandAction {
    /// Write a command message (message header + command) to a file
    Encode {
        /// Target region
        #[arg(short, long)]
        region: String,

        /// Subcommand within the region
        #[arg(short, long)]
        subcommand: String,

        /// Argument string
        #[arg(short, long, default_value = "")]
        args: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Decode a message file
    Decode {
        /// Message file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as YAML
    Show,

    /// Write the effective configuration to a YAML file
    Save {
        /// Output file
        output: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum PackageAction {
    /// Create a header-only package file
    Create {
        /// Package name
        #[arg(short, long)]
        name: String,

        /// Package version
        #[arg(short, long)]
        version: f64,

        /// Output directory (defaults to the configured package directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the header of a package file
    Inspect {
        /// Package file
        file: PathBuf,
    },

    /// List the packages in a directory
    List {
        /// Package directory (defaults to the configured package directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let loaded = Config::load(cli.config.as_deref());

    // Initialize logging
    let default_filter = loaded
        .as_ref()
        .map(|c| c.logging.filter.clone())
        .unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match loaded {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    tracing::debug!(
        package_dir = %config.packages.directory.display(),
        max_managed_length = config.codec.max_managed_length,
        "configuration loaded"
    );

    let ctx = commands::Context::new(config, cli.json, cli.hex);
    match commands::execute(&ctx, cli.command).await {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }
}
