//! DA proxy CLI
//!
//! Command-line tools for the DA proxy's storage layer.
//!
//! # Commands
//!
//! - `check-config` - Validate a manager configuration file
//! - `selftest` - Round-trip blobs through an ephemeral-backed manager

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DA proxy storage tools.
#[derive(Parser)]
#[command(name = "daproxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and print a summary
    CheckConfig {
        /// Configuration file to check
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Put and get a blob in every commitment mode against memstores
    Selftest {
        /// JSON manager configuration, defaults if absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Keep keccak blobs in this directory instead of memory
        #[arg(long)]
        object_store_dir: Option<PathBuf>,

        /// Payload to disperse
        #[arg(short, long, default_value = "daproxy selftest")]
        payload: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::CheckConfig { path, format } => {
            commands::check_config::run(&path, &format)?;
        }
        Commands::Selftest {
            config,
            object_store_dir,
            payload,
            format,
        } => {
            let config = commands::load_config(config.as_deref())?;
            commands::selftest::run(config, object_store_dir.as_deref(), payload.as_bytes(), &format)?;
        }
        Commands::Version => {
            println!("daproxy v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
