// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Local password provider.
//!
//! Expects the password in the `auth-password` option. A value of `-`
//! means "read one line from standard input at mount time", for operators
//! who run the plugin in the foreground and do not want the password in the
//! state snapshot.

use async_trait::async_trait;
use std::io::BufRead;

use super::SecretProviderRegistry;
use crate::domain::secret::{SecretError, SecretProvider, StagedKeys};

pub const NAME: &str = "stdin";
pub const PASSWORD_KEY: &str = "auth-password";
const PROMPT_MARKER: &str = "-";

const REQUIRED_KEYS: &[&str] = &[PASSWORD_KEY];

pub(super) fn register(registry: &mut SecretProviderRegistry) {
    registry.register(NAME, || Box::new(StdinSecretProvider::new()));
}

#[derive(Debug, Default)]
pub struct StdinSecretProvider {
    keys: StagedKeys,
}

impl StdinSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretProvider for StdinSecretProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn add_key(&mut self, key: &str, value: &str) -> Result<(), SecretError> {
        self.keys.insert(key, value)
    }

    fn validate_keys(&self) -> Result<(), SecretError> {
        self.keys.require(REQUIRED_KEYS)
    }

    async fn resolve_secret(&self) -> Result<String, SecretError> {
        let staged = self
            .keys
            .get(PASSWORD_KEY)
            .ok_or_else(|| SecretError::MissingKeys(vec![PASSWORD_KEY.to_string()]))?;

        if staged != PROMPT_MARKER {
            return Ok(staged.to_string());
        }

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|e| SecretError::Unavailable(format!("Error reading password: {}", e)))?
        .map_err(|e| SecretError::Unavailable(format!("Error reading password: {}", e)))?;

        let password = line.trim_end_matches(['\r', '\n']).to_string();
        if password.is_empty() {
            return Err(SecretError::Unavailable(
                "No password read from standard input".to_string(),
            ));
        }
        Ok(password)
    }
}
