// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Volume State Stores
//!
//! [`JsonFileStateStore`] keeps the catalog as a single JSON object mapping
//! volume name to record, at `<root>/state/<state-file>`. Every save rewrites
//! the whole file: the snapshot is written to a sibling temp file and renamed
//! over the old one, so a crash mid-write leaves the previous snapshot intact.
//!
//! [`InMemoryVolumeStateStore`] is used by tests and embedded setups that do
//! not need durability.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::repository::{RepositoryError, VolumeSnapshot, VolumeStateStore};

pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(path: &Path, err: std::io::Error) -> RepositoryError {
        RepositoryError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl VolumeStateStore for JsonFileStateStore {
    async fn load(&self) -> Result<Option<VolumeSnapshot>, RepositoryError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state snapshot at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };

        let volumes: VolumeSnapshot = serde_json::from_slice(&data)?;
        Ok(Some(volumes))
    }

    async fn save(&self, volumes: &VolumeSnapshot) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error(parent, e))?;
        }

        let data = serde_json::to_vec_pretty(volumes)?;
        let temp = self.temp_path();

        tokio::fs::write(&temp, &data)
            .await
            .map_err(|e| Self::io_error(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| Self::io_error(&self.path, e))?;

        debug!(
            "Wrote state snapshot with {} volume(s) to {}",
            volumes.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Keeps the snapshot as serialized JSON so runtime-only fields are dropped
/// exactly as they are by the file store
#[derive(Default)]
pub struct InMemoryVolumeStateStore {
    snapshot: Mutex<Option<String>>,
}

impl InMemoryVolumeStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved snapshot, if any
    pub async fn snapshot(&self) -> Option<VolumeSnapshot> {
        self.load().await.ok().flatten()
    }
}

#[async_trait]
impl VolumeStateStore for InMemoryVolumeStateStore {
    async fn load(&self) -> Result<Option<VolumeSnapshot>, RepositoryError> {
        match self.snapshot.lock().await.as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, volumes: &VolumeSnapshot) -> Result<(), RepositoryError> {
        let json = serde_json::to_string(volumes)?;
        *self.snapshot.lock().await = Some(json);
        Ok(())
    }
}
