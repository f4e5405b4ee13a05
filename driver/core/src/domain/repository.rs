// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Durable Volume State
//!
//! Persistence contract for the volume catalog. The registry always writes
//! the full catalog; there is no per-record update.
//!
//! | Trait | Implementations |
//! |-------|----------------|
//! | `VolumeStateStore` | `JsonFileStateStore`, `InMemoryVolumeStateStore` |

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::domain::volume::GitVolume;

/// Snapshot of the catalog keyed by volume name
pub type VolumeSnapshot = HashMap<String, GitVolume>;

#[async_trait]
pub trait VolumeStateStore: Send + Sync {
    /// Load the last snapshot. `Ok(None)` means nothing was ever saved.
    async fn load(&self) -> Result<Option<VolumeSnapshot>, RepositoryError>;

    /// Replace the previous snapshot with `volumes`
    async fn save(&self, volumes: &VolumeSnapshot) -> Result<(), RepositoryError>;
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("IO error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
