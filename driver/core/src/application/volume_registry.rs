// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Volume Registry
//!
//! Authoritative catalog of [`GitVolume`] records and the only component
//! that talks to the [`VolumeStateStore`]. The registry is not internally
//! synchronised; `StandardVolumeService` owns it behind a single lock.
//!
//! Every catalog mutation (create, remove) is followed by a full snapshot
//! write. If the write fails the mutation is rolled back, so the in-memory
//! catalog never runs ahead of what a restart would restore. Reference
//! counts are not part of the snapshot.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::repository::VolumeStateStore;
use crate::domain::volume::{GitVolume, VolumeError, VolumeSummary};

pub struct VolumeRegistry {
    volumes: HashMap<String, GitVolume>,
    store: Arc<dyn VolumeStateStore>,
}

impl VolumeRegistry {
    /// Empty registry backed by `store`. Nothing is loaded.
    pub fn new(store: Arc<dyn VolumeStateStore>) -> Self {
        Self {
            volumes: HashMap::new(),
            store,
        }
    }

    /// Build a registry from the last snapshot in `store`.
    ///
    /// A missing snapshot is a fresh install. With `reconcile` set, any
    /// directory left at a restored volume's mount path is removed: every
    /// restored count is zero, so that content has no consumer.
    pub async fn restore(store: Arc<dyn VolumeStateStore>, reconcile: bool) -> Result<Self, VolumeError> {
        let mut registry = Self::new(store);

        let Some(snapshot) = registry.store.load().await? else {
            info!("No volume state found, starting with an empty catalog");
            return Ok(registry);
        };

        for (name, mut volume) in snapshot {
            // Older snapshots only carry the name as the map key
            volume.name = name.clone();

            if reconcile && volume.mount_path.exists() {
                match remove_mount_path(&volume.mount_path).await {
                    Ok(()) => info!(
                        "Reconciled volume {}: removed stale content at {}",
                        name,
                        volume.mount_path.display()
                    ),
                    Err(e) => warn!("Reconciliation of volume {} failed: {}", name, e),
                }
            }

            registry.volumes.insert(name, volume);
        }

        info!("Restored {} volume(s) from state", registry.volumes.len());
        Ok(registry)
    }

    /// Insert a fully validated record and persist the catalog
    pub async fn create(&mut self, volume: GitVolume) -> Result<(), VolumeError> {
        if self.volumes.contains_key(&volume.name) {
            return Err(VolumeError::AlreadyExists(volume.name));
        }

        let name = volume.name.clone();
        self.volumes.insert(name.clone(), volume);

        if let Err(e) = self.persist().await {
            self.volumes.remove(&name);
            return Err(e);
        }

        debug!("Volume {} added to catalog", name);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&GitVolume, VolumeError> {
        self.volumes
            .get(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut GitVolume, VolumeError> {
        self.volumes
            .get_mut(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.volumes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Summaries of every volume, in no particular order
    pub fn list(&self) -> Vec<VolumeSummary> {
        self.volumes.values().map(GitVolume::summary).collect()
    }

    /// Delete an unreferenced volume's directory tree and catalog entry.
    ///
    /// A failed directory removal aborts before the catalog is touched.
    pub async fn remove(&mut self, name: &str) -> Result<GitVolume, VolumeError> {
        let volume = self.get(name)?;
        if volume.is_materialized() {
            return Err(VolumeError::InUse(name.to_string()));
        }

        remove_mount_path(&volume.mount_path).await?;

        let removed = self
            .volumes
            .remove(name)
            .ok_or_else(|| VolumeError::NotFound(name.to_string()))?;

        if let Err(e) = self.persist().await {
            self.volumes.insert(name.to_string(), removed);
            return Err(e);
        }

        debug!("Volume {} removed from catalog", name);
        Ok(removed)
    }

    /// Overwrite the snapshot with the whole catalog
    pub async fn persist(&self) -> Result<(), VolumeError> {
        self.store.save(&self.volumes).await.map_err(VolumeError::from)
    }
}

/// Remove a mount path and everything below it. A path that is already
/// gone counts as removed.
pub(crate) async fn remove_mount_path(path: &Path) -> Result<(), VolumeError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VolumeError::TeardownFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::{RepositoryError, VolumeSnapshot};
    use crate::domain::volume::AuthSpec;
    use crate::infrastructure::state_store::InMemoryVolumeStateStore;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct FailingStore;

    #[async_trait]
    impl VolumeStateStore for FailingStore {
        async fn load(&self) -> Result<Option<VolumeSnapshot>, RepositoryError> {
            Ok(None)
        }

        async fn save(&self, _volumes: &VolumeSnapshot) -> Result<(), RepositoryError> {
            Err(RepositoryError::Io {
                path: "/readonly/state.json".to_string(),
                reason: "read-only file system".to_string(),
            })
        }
    }

    fn volume(name: &str, root: &Path) -> GitVolume {
        GitVolume::new(
            name,
            "https://example.com/a.git",
            None,
            AuthSpec::anonymous(),
            root.join("volumes").join(name),
        )
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let store = Arc::new(InMemoryVolumeStateStore::new());
        let mut registry = VolumeRegistry::new(store.clone());
        let root = PathBuf::from("/srv/gitvol");

        registry.create(volume("repo1", &root)).await.unwrap();
        let err = registry.create(volume("repo1", &root)).await.unwrap_err();

        assert!(matches!(err, VolumeError::AlreadyExists(ref n) if n == "repo1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(store.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_volume() {
        let registry = VolumeRegistry::new(Arc::new(InMemoryVolumeStateStore::new()));
        assert!(matches!(registry.get("nope"), Err(VolumeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_in_use_leaves_catalog_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut registry = VolumeRegistry::new(Arc::new(InMemoryVolumeStateStore::new()));
        registry.create(volume("repo1", dir.path())).await.unwrap();
        registry.get_mut("repo1").unwrap().acquire();

        let err = registry.remove("repo1").await.unwrap_err();
        assert!(matches!(err, VolumeError::InUse(_)));
        assert!(registry.contains("repo1"));
    }

    #[tokio::test]
    async fn test_remove_deletes_directory_and_entry() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryVolumeStateStore::new());
        let mut registry = VolumeRegistry::new(store.clone());

        let vol = volume("repo1", dir.path());
        std::fs::create_dir_all(vol.mount_path.join("leftover")).unwrap();
        let mount_path = vol.mount_path.clone();
        registry.create(vol).await.unwrap();

        registry.remove("repo1").await.unwrap();

        assert!(!mount_path.exists());
        assert!(registry.is_empty());
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_teardown_keeps_entry_and_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryVolumeStateStore::new());
        let mut registry = VolumeRegistry::new(store.clone());

        // A non-directory at the mount path cannot be removed as a tree,
        // whatever the privileges of the test runner
        let vol = volume("repo1", dir.path());
        std::fs::create_dir_all(dir.path().join("volumes")).unwrap();
        std::fs::write(&vol.mount_path, b"not a checkout").unwrap();
        registry.create(vol).await.unwrap();

        let err = registry.remove("repo1").await.unwrap_err();
        assert!(matches!(err, VolumeError::TeardownFailed { .. }));
        assert!(registry.contains("repo1"));
        assert!(store.snapshot().await.unwrap().contains_key("repo1"));
    }

    #[tokio::test]
    async fn test_persist_failure_rolls_back_create() {
        let mut registry = VolumeRegistry::new(Arc::new(FailingStore));
        let err = registry
            .create(volume("repo1", Path::new("/srv/gitvol")))
            .await
            .unwrap_err();

        assert!(matches!(err, VolumeError::PersistenceFailed(_)));
        assert!(!registry.contains("repo1"));
    }

    #[tokio::test]
    async fn test_restore_sets_names_and_zero_counts() {
        let store = Arc::new(InMemoryVolumeStateStore::new());
        let mut legacy = volume("repo1", Path::new("/srv/gitvol"));
        legacy.name = String::new();
        legacy.acquire();
        store
            .save(&VolumeSnapshot::from([("repo1".to_string(), legacy)]))
            .await
            .unwrap();

        let registry = VolumeRegistry::restore(store, false).await.unwrap();
        let restored = registry.get("repo1").unwrap();
        assert_eq!(restored.name, "repo1");
        assert_eq!(restored.reference_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_with_reconcile_removes_stale_content() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(InMemoryVolumeStateStore::new());
        let vol = volume("repo1", dir.path());
        std::fs::create_dir_all(&vol.mount_path).unwrap();
        std::fs::write(vol.mount_path.join("README"), b"stale").unwrap();
        let mount_path = vol.mount_path.clone();
        store
            .save(&VolumeSnapshot::from([("repo1".to_string(), vol)]))
            .await
            .unwrap();

        let untouched = VolumeRegistry::restore(store.clone(), false).await.unwrap();
        assert!(untouched.contains("repo1"));
        assert!(mount_path.exists());

        let reconciled = VolumeRegistry::restore(store, true).await.unwrap();
        assert!(reconciled.contains("repo1"));
        assert!(!mount_path.exists());
    }

    #[tokio::test]
    async fn test_remove_mount_path_tolerates_missing_directory() {
        let dir = TempDir::new().unwrap();
        remove_mount_path(&dir.path().join("never-created")).await.unwrap();
    }
}
