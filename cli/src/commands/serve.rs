// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! `gitvol serve`: run the volume plugin in the foreground

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use gitvol_core::domain::node_config::DriverConfigManifest;

use crate::daemon;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Root directory for volumes and state (overrides config)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Plugin socket path (overrides config)
    #[arg(long, value_name = "FILE")]
    pub socket: Option<PathBuf>,

    /// Remove leftover mount directories when restoring state
    #[arg(long)]
    pub reconcile: bool,
}

impl ServeArgs {
    /// Apply command-line overrides on top of file and environment settings
    pub fn apply_to(&self, config: &mut DriverConfigManifest) {
        if let Some(root) = &self.root {
            config.spec.storage.root = root.clone();
        }
        if let Some(socket) = &self.socket {
            config.spec.plugin.socket_path = socket.clone();
        }
        if self.reconcile {
            config.spec.storage.reconcile_on_startup = true;
        }
    }
}

pub async fn handle_command(args: ServeArgs, config_override: Option<PathBuf>) -> Result<()> {
    let mut config = DriverConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    args.apply_to(&mut config);

    config
        .validate()
        .context("Configuration validation failed")?;

    daemon::start_server(config).await
}
