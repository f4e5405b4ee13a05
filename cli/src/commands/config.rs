// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use gitvol_core::domain::node_config::DriverConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./gitvol-config.yaml)
        #[arg(short, long, default_value = "./gitvol-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

const CONFIG_WITH_EXAMPLES: &str = r#"# gitvol driver configuration
apiVersion: gitvol.io/v1
kind: DriverConfig
metadata:
  name: gitvol
spec:
  storage:
    # Volumes are cloned into <root>/volumes/<name>
    root: /var/lib/docker-volumes/gitvol
    # Catalog snapshot, written to <root>/state/<state_file>
    state_file: gitfs-state.json
    # Delete leftover checkouts of unmounted volumes at startup
    reconcile_on_startup: false
  plugin:
    socket_path: /run/docker/plugins/gitvol.sock
  secrets:
    # Used when a volume sets auth-type but no secret-driver (stdin | vault)
    default_driver: stdin
  git:
    # Abort a clone or checkout that takes longer than this
    fetch_timeout_secs: 300
  logging:
    level: info
"#;

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = DriverConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. GITVOL_CONFIG_PATH: {}",
            std::env::var("GITVOL_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./gitvol-config.yaml");
        println!("  4. ~/.gitvol/config.yaml");
        println!("  5. /etc/gitvol/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Storage:".bold());
    println!("  Root: {}", config.spec.storage.root.display());
    println!("  Volumes: {}", config.volumes_dir().display());
    println!("  State file: {}", config.state_path().display());
    println!(
        "  Reconcile on startup: {}",
        config.spec.storage.reconcile_on_startup
    );
    println!();

    println!("{}", "Plugin:".bold());
    println!("  Socket: {}", config.spec.plugin.socket_path.display());
    println!("  Default secret driver: {}", config.spec.secrets.default_driver);
    match config.spec.git.fetch_timeout_secs {
        Some(secs) => println!("  Fetch timeout: {}s", secs),
        None => println!("  Fetch timeout: {}", "(unbounded)".dimmed()),
    }
    println!("  Log level: {}", config.spec.logging.level);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = DriverConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        CONFIG_WITH_EXAMPLES.to_string()
    } else {
        DriverConfigManifest::default().to_yaml_string()?
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
