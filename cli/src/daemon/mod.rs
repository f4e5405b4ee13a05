// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Daemon mode implementation
//!
//! Handles:
//! - Plugin socket preparation and cleanup
//! - Serving the plugin API until shutdown

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod server;

pub use server::start_server;

/// Make sure the socket can be bound: create its directory and remove a
/// socket file left behind by a previous process.
pub fn prepare_socket_path(socket_path: &Path) -> Result<()> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create socket directory {}", parent.display()))?;
    }

    match std::fs::remove_file(socket_path) {
        Ok(()) => {
            info!("Removed stale plugin socket {}", socket_path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e)
            .with_context(|| format!("Failed to remove stale socket {}", socket_path.display())),
    }
}

/// Removes the plugin socket when the server exits
pub struct SocketFileGuard {
    path: PathBuf,
}

impl SocketFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Drop for SocketFileGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove plugin socket {}: {}", self.path.display(), e);
            }
        }
    }
}
