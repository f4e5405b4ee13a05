// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! # gitvol
//!
//! The `gitvol` binary is a Docker volume plugin that exposes git
//! repositories as volumes. A volume is cloned when its first container
//! mounts it and deleted from disk when the last one unmounts.
//!
//! ## Commands
//!
//! - `gitvol serve` - Run the plugin on its Unix socket
//! - `gitvol config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use gitvol_core::domain::node_config::DriverConfigManifest;

mod commands;
mod daemon;

use commands::{ConfigCommand, ServeArgs};

/// gitvol - git repositories as Docker volumes
#[derive(Parser)]
#[command(name = "gitvol")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "GITVOL_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to spec.logging.level
    #[arg(long, global = true, env = "GITVOL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, env = "GITVOL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the volume plugin
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| configured_log_level(cli.config.clone()));
    init_logging(&level, cli.log_format)?;

    match cli.command {
        Some(Commands::Serve(args)) => {
            info!("Starting gitvol volume plugin");
            commands::serve::handle_command(args, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Level from the configuration file, read before logging is up
fn configured_log_level(config_path: Option<PathBuf>) -> String {
    DriverConfigManifest::load_or_default(config_path)
        .map(|config| config.spec.logging.level)
        .unwrap_or_else(|_| "info".to_string())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
