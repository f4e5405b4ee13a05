// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Plugin server implementation

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::signal;
use tracing::{error, info};

use gitvol_core::{
    application::volume_manager::StandardVolumeService,
    domain::node_config::DriverConfigManifest,
    infrastructure::{git::Git2Client, secrets::SecretProviderRegistry},
    presentation::plugin_api,
};

use super::{prepare_socket_path, SocketFileGuard};

pub async fn start_server(config: DriverConfigManifest) -> Result<()> {
    info!(
        "gitvol starting (PID: {}, root: {})",
        std::process::id(),
        config.spec.storage.root.display()
    );

    // Initialize services
    let secret_providers = Arc::new(SecretProviderRegistry::with_builtin_providers());
    info!(
        "Secret drivers available: {}",
        secret_providers.supported_providers().join(", ")
    );

    let volume_service = Arc::new(
        StandardVolumeService::open(&config, secret_providers, Arc::new(Git2Client::new()))
            .await
            .context("Failed to initialize volume service")?,
    );

    // Build plugin router
    let app = plugin_api::app(volume_service);

    // Start plugin server
    let socket_path = &config.spec.plugin.socket_path;
    prepare_socket_path(socket_path)?;
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind to {}", socket_path.display()))?;
    let _guard = SocketFileGuard::new(socket_path);

    info!("Plugin listening on {}", socket_path.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Plugin server failed")?;

    info!("gitvol shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
