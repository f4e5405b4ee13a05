// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Source Control Client - Anti-Corruption Layer for git
//!
//! The lifecycle service only needs two things from a git implementation:
//! fetch a repository into an empty directory, and move the working tree to
//! a given revision. Keeping that behind a trait lets tests count fetches
//! without touching the network.
//!
//! Both calls take a `CancellationToken`. Once it is cancelled the client
//! must stop writing to disk and return; the caller awaits that return
//! before it touches the destination again.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::volume::AuthType;

/// Credential handed to the client for a single fetch.
///
/// Built at mount time from the resolved secret and dropped afterwards.
#[derive(Clone)]
pub struct GitCredential {
    pub username: String,
    pub auth_type: AuthType,
    secret: String,
}

impl GitCredential {
    pub fn new(username: impl Into<String>, auth_type: AuthType, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth_type,
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for GitCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredential")
            .field("username", &self.username)
            .field("auth_type", &self.auth_type)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait SourceControlClient: Send + Sync {
    /// Clone `url` into `destination`, which exists and is empty
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        credential: Option<&GitCredential>,
        cancel: &CancellationToken,
    ) -> Result<(), SourceControlError>;

    /// Check out `reference` (branch, tag or commit) in an existing clone
    async fn checkout(
        &self,
        repository: &Path,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SourceControlError>;
}

#[derive(Debug, Error)]
pub enum SourceControlError {
    #[error("{0}")]
    Fetch(String),

    #[error("{0}")]
    Checkout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_debug_redacts_secret() {
        let cred = GitCredential::new("deploy", AuthType::Token, "ghp_supersecret");
        let rendered = format!("{:?}", cred);
        assert!(rendered.contains("deploy"));
        assert!(!rendered.contains("ghp_supersecret"));
        assert_eq!(cred.secret(), "ghp_supersecret");
    }
}
