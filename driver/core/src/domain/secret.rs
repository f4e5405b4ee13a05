// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Secret Provider Capability
//!
//! Credential backends are hidden behind [`SecretProvider`] so the volume
//! lifecycle never depends on how a password or token is obtained. A provider
//! is configured by staging key/value pairs taken from the volume's create
//! options, validated against the keys it requires, and finally asked to
//! resolve a plaintext credential.
//!
//! Providers are constructed fresh for every use from the
//! `SecretProviderRegistry` (infrastructure layer), so staged keys never leak
//! between volumes.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Registered name of this provider (e.g. "stdin", "vault")
    fn name(&self) -> &str;

    /// Stage a configuration parameter. Staging the same key twice fails.
    fn add_key(&mut self, key: &str, value: &str) -> Result<(), SecretError>;

    /// Fail with every required key that has not been staged yet
    fn validate_keys(&self) -> Result<(), SecretError>;

    /// Resolve the plaintext credential from the staged configuration
    async fn resolve_secret(&self) -> Result<String, SecretError>;
}

/// Staged configuration shared by provider implementations.
///
/// Values may be tokens or passwords, so `Debug` prints key names only.
#[derive(Clone, Default)]
pub struct StagedKeys {
    keys: BTreeMap<String, String>,
}

impl std::fmt::Debug for StagedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.keys.keys().map(|key| (key, "<redacted>")))
            .finish()
    }
}

impl StagedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        if self.keys.contains_key(key) {
            return Err(SecretError::DuplicateKey(key.to_string()));
        }
        self.keys.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    /// Check `required` against what has been staged, preserving the
    /// declaration order in the error
    pub fn require(&self, required: &[&str]) -> Result<(), SecretError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|key| !self.keys.contains_key(**key))
            .map(|key| key.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SecretError::MissingKeys(missing))
        }
    }
}

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("The Secret Driver: {name} is not supported. Supported drivers are {supported}")]
    UnsupportedProvider { name: String, supported: String },

    #[error("{}", crate::domain::volume::missing_keys_message(.0))]
    MissingKeys(Vec<String>),

    #[error("Key '{0}' already exists")]
    DuplicateKey(String),

    #[error("{0}")]
    Unavailable(String),
}
