// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Volume Manager Application Service
//!
//! Orchestrates the volume lifecycle by coordinating:
//! - Domain layer: `GitVolume` records, `SecretProvider` and `SourceControlClient` traits
//! - Application layer: `VolumeRegistry` (catalog + snapshot persistence)
//! - Infrastructure layer: secret provider registry, libgit2 client, JSON state store
//!
//! The whole catalog sits behind one `RwLock`. Reads take the shared guard;
//! create, remove, mount and unmount take the exclusive guard and hold it
//! across secret resolution, fetch and checkout. A slow clone therefore
//! blocks every other volume operation, and no two materializations ever
//! run at the same time.

use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::volume_options::CreateVolumeOptions;
use crate::application::volume_registry::{remove_mount_path, VolumeRegistry};
use crate::domain::node_config::DriverConfigManifest;
use crate::domain::secret::SecretProvider;
use crate::domain::source_control::{GitCredential, SourceControlClient, SourceControlError};
use crate::domain::volume::{
    validate_volume_name, AuthSpec, Capabilities, GitVolume, VolumeError, VolumeSummary,
};
use crate::infrastructure::secrets::SecretProviderRegistry;
use crate::infrastructure::state_store::JsonFileStateStore;

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait VolumeService: Send + Sync {
    /// Validate options and register a new volume. Nothing is fetched.
    async fn create_volume(
        &self,
        name: &str,
        options: &HashMap<String, String>,
    ) -> Result<(), VolumeError>;

    async fn get_volume(&self, name: &str) -> Result<VolumeSummary, VolumeError>;

    async fn list_volumes(&self) -> Vec<VolumeSummary>;

    /// Delete an unmounted volume and its directory
    async fn remove_volume(&self, name: &str) -> Result<(), VolumeError>;

    /// Add a consumer, materializing the repository on the first one
    async fn mount_volume(&self, name: &str) -> Result<PathBuf, VolumeError>;

    /// Drop a consumer, removing the content when the last one leaves
    async fn unmount_volume(&self, name: &str) -> Result<(), VolumeError>;

    /// Mount path of a volume, whether or not it is mounted
    async fn volume_path(&self, name: &str) -> Result<PathBuf, VolumeError>;

    fn capabilities(&self) -> Capabilities;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardVolumeService {
    registry: RwLock<VolumeRegistry>,
    secret_providers: Arc<SecretProviderRegistry>,
    source_control: Arc<dyn SourceControlClient>,
    volumes_dir: PathBuf,
    default_secret_driver: String,
    fetch_timeout: Option<Duration>,
}

impl StandardVolumeService {
    pub fn new(
        registry: VolumeRegistry,
        secret_providers: Arc<SecretProviderRegistry>,
        source_control: Arc<dyn SourceControlClient>,
        volumes_dir: impl Into<PathBuf>,
        default_secret_driver: impl Into<String>,
    ) -> Self {
        Self {
            registry: RwLock::new(registry),
            secret_providers,
            source_control,
            volumes_dir: volumes_dir.into(),
            default_secret_driver: default_secret_driver.into(),
            fetch_timeout: None,
        }
    }

    /// Bound each fetch and checkout call
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Build the service from the driver configuration: restore the catalog
    /// from the JSON snapshot and make sure the volumes directory exists.
    pub async fn open(
        config: &DriverConfigManifest,
        secret_providers: Arc<SecretProviderRegistry>,
        source_control: Arc<dyn SourceControlClient>,
    ) -> anyhow::Result<Self> {
        let volumes_dir = config.volumes_dir();
        tokio::fs::create_dir_all(&volumes_dir)
            .await
            .with_context(|| format!("Failed to create volumes directory {}", volumes_dir.display()))?;

        let store = Arc::new(JsonFileStateStore::new(config.state_path()));
        let registry = VolumeRegistry::restore(store, config.spec.storage.reconcile_on_startup)
            .await
            .with_context(|| format!("Failed to restore volume state from {}", config.state_path().display()))?;

        if !secret_providers.contains(&config.spec.secrets.default_driver) {
            warn!(
                "Default secret driver '{}' is not registered; authenticated volumes must set secret-driver",
                config.spec.secrets.default_driver
            );
        }

        Ok(Self::new(
            registry,
            secret_providers,
            source_control,
            volumes_dir,
            config.spec.secrets.default_driver.clone(),
        )
        .with_fetch_timeout(config.fetch_timeout()))
    }

    /// Look up the provider named in `auth` and stage its configuration
    fn staged_provider(
        &self,
        auth: &AuthSpec,
    ) -> Result<Box<dyn SecretProvider>, VolumeError> {
        let mut provider = self.secret_providers.lookup(&auth.secret_provider)?;
        for (key, value) in &auth.config {
            provider.add_key(key, value)?;
        }
        provider.validate_keys()?;
        Ok(provider)
    }

    async fn resolve_credential(&self, volume: &GitVolume) -> Result<Option<GitCredential>, VolumeError> {
        if volume.auth.auth_type.is_anonymous() {
            return Ok(None);
        }

        let provider = self.staged_provider(&volume.auth)?;
        debug!(
            "Resolving {} credential for volume {} via '{}'",
            volume.auth.auth_type,
            volume.name,
            provider.name()
        );
        let secret = provider.resolve_secret().await?;

        Ok(Some(GitCredential::new(
            volume.auth.username.clone().unwrap_or_default(),
            volume.auth.auth_type,
            secret,
        )))
    }

    /// Run a source-control call under the fetch timeout.
    ///
    /// On expiry the token is cancelled and the call is still awaited, so
    /// the client has stopped writing before the caller cleans up.
    async fn bounded<F>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<(), VolumeError>
    where
        F: Future<Output = Result<(), SourceControlError>> + Send,
    {
        let Some(limit) = self.fetch_timeout else {
            return call.await.map_err(VolumeError::from);
        };

        tokio::pin!(call);
        match tokio::time::timeout(limit, &mut call).await {
            Ok(result) => result.map_err(VolumeError::from),
            Err(_) => {
                warn!("{} exceeded {:?}, cancelling", operation, limit);
                cancel.cancel();
                if let Err(e) = call.await {
                    debug!("Cancelled {} returned: {}", operation, e);
                }
                Err(VolumeError::Timeout { operation, limit })
            }
        }
    }

    /// Fetch the repository into an empty mount path and check out the ref
    async fn materialize(&self, volume: &GitVolume) -> Result<(), VolumeError> {
        let credential = self.resolve_credential(volume).await?;

        // Content left behind by a crash or failed teardown is discarded
        remove_mount_path(&volume.mount_path).await?;
        tokio::fs::create_dir_all(&volume.mount_path)
            .await
            .map_err(|e| {
                VolumeError::FetchFailed(format!(
                    "failed to create {}: {}",
                    volume.mount_path.display(),
                    e
                ))
            })?;

        let cancel = CancellationToken::new();
        let result = async {
            self.bounded(
                "fetch",
                &cancel,
                self.source_control
                    .fetch(&volume.url, &volume.mount_path, credential.as_ref(), &cancel),
            )
            .await?;

            if let Some(reference) = &volume.ref_name {
                self.bounded(
                    "checkout",
                    &cancel,
                    self.source_control
                        .checkout(&volume.mount_path, reference, &cancel),
                )
                .await?;
            }
            Ok::<(), VolumeError>(())
        }
        .await;

        if result.is_err() {
            if let Err(e) = remove_mount_path(&volume.mount_path).await {
                warn!("Cleanup after failed mount of {} failed: {}", volume.name, e);
            }
        }
        result
    }
}

#[async_trait]
impl VolumeService for StandardVolumeService {
    async fn create_volume(
        &self,
        name: &str,
        options: &HashMap<String, String>,
    ) -> Result<(), VolumeError> {
        info!("VolumeDriver.Create: volume {}", name);

        validate_volume_name(name)?;
        let options = CreateVolumeOptions::parse(options, &self.default_secret_driver)?;

        let auth = match (options.auth_user, options.secret_driver) {
            (Some(user), Some(driver)) => {
                let auth =
                    AuthSpec::with_provider(options.auth_type, driver, user, options.provider_config);
                // Fails fast on an unknown provider or missing keys
                self.staged_provider(&auth)?;
                auth
            }
            _ => AuthSpec::anonymous(),
        };

        let volume = GitVolume::new(
            name,
            options.url,
            options.ref_name,
            auth,
            self.volumes_dir.join(name),
        );

        self.registry.write().await.create(volume).await?;
        info!("Volume {} created", name);
        Ok(())
    }

    async fn get_volume(&self, name: &str) -> Result<VolumeSummary, VolumeError> {
        debug!("VolumeDriver.Get: volume {}", name);
        self.registry.read().await.get(name).map(GitVolume::summary)
    }

    async fn list_volumes(&self) -> Vec<VolumeSummary> {
        debug!("VolumeDriver.List");
        self.registry.read().await.list()
    }

    async fn remove_volume(&self, name: &str) -> Result<(), VolumeError> {
        info!("VolumeDriver.Remove: volume {}", name);
        self.registry.write().await.remove(name).await?;
        info!("Volume {} removed", name);
        Ok(())
    }

    async fn mount_volume(&self, name: &str) -> Result<PathBuf, VolumeError> {
        info!("VolumeDriver.Mount: volume {}", name);

        let mut registry = self.registry.write().await;
        let volume = registry.get_mut(name)?;

        if !volume.is_materialized() {
            info!("Materializing volume {} from {}", name, volume.url);
            self.materialize(volume).await?;
        }

        let count = volume.acquire();
        debug!("Volume {} reference count is now {}", name, count);
        Ok(volume.mount_path.clone())
    }

    async fn unmount_volume(&self, name: &str) -> Result<(), VolumeError> {
        info!("VolumeDriver.Unmount: volume {}", name);

        let mut registry = self.registry.write().await;
        let volume = registry.get_mut(name)?;

        let count = volume.release();
        debug!("Volume {} reference count is now {}", name, count);

        if count == 0 {
            remove_mount_path(&volume.mount_path).await?;
            info!("Volume {} released, removed {}", name, volume.mount_path.display());
        }
        Ok(())
    }

    async fn volume_path(&self, name: &str) -> Result<PathBuf, VolumeError> {
        debug!("VolumeDriver.Path: volume {}", name);
        Ok(self.registry.read().await.get(name)?.mount_path.clone())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::node_local()
    }
}

// ============================================================================
// Tests
// ============================================================================
