// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

// Secret Provider Registry - name -> factory lookup
//
// Built once at startup and read-only afterwards. Each lookup constructs a
// fresh provider so staged keys are scoped to a single create or mount.

pub mod stdin;
pub mod vault;

pub use stdin::StdinSecretProvider;
pub use vault::VaultSecretProvider;

use std::collections::HashMap;
use tracing::debug;

use crate::domain::secret::{SecretError, SecretProvider};

pub type SecretProviderFactory = Box<dyn Fn() -> Box<dyn SecretProvider> + Send + Sync>;

#[derive(Default)]
pub struct SecretProviderRegistry {
    factories: HashMap<String, SecretProviderFactory>,
}

impl SecretProviderRegistry {
    /// Empty registry with no providers
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the providers shipped with gitvol
    pub fn with_builtin_providers() -> Self {
        let mut registry = Self::new();
        stdin::register(&mut registry);
        vault::register(&mut registry);
        registry
    }

    /// Register (or replace) the factory for `name`
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn SecretProvider> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering secret provider '{}'", name);
        self.factories.insert(name, Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Construct a new provider instance by name
    pub fn lookup(&self, name: &str) -> Result<Box<dyn SecretProvider>, SecretError> {
        match self.factories.get(name) {
            Some(factory) => Ok(factory()),
            None => Err(SecretError::UnsupportedProvider {
                name: name.to_string(),
                supported: self.supported_providers().join(","),
            }),
        }
    }

    /// Registered provider names, sorted
    pub fn supported_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}
