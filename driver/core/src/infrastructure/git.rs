// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! libgit2-backed Source Control Client
//!
//! Clones and checkouts are blocking libgit2 calls, so each one runs on the
//! tokio blocking pool. Credentials are offered to libgit2 once per fetch;
//! a second credential request means the remote rejected them and the clone
//! is aborted instead of retrying forever.
//!
//! Cancellation is cooperative: libgit2 polls the token from its transfer
//! progress and checkout notification callbacks and aborts the operation
//! when it is set. The blocking task has returned by the time the async
//! call completes.

use async_trait::async_trait;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    CheckoutNotificationType, Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository,
};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::source_control::{GitCredential, SourceControlClient, SourceControlError};
use crate::domain::volume::AuthType;

#[derive(Debug, Clone, Default)]
pub struct Git2Client;

impl Git2Client {
    pub fn new() -> Self {
        Self
    }
}

fn credential_callback(
    credential: &GitCredential,
    username_from_url: Option<&str>,
    allowed: CredentialType,
) -> Result<Cred, git2::Error> {
    let username = if credential.username.is_empty() {
        username_from_url.unwrap_or("git")
    } else {
        credential.username.as_str()
    };

    if allowed.contains(CredentialType::USERNAME) {
        return Cred::username(username);
    }

    match credential.auth_type {
        AuthType::Password | AuthType::Token
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) =>
        {
            Cred::userpass_plaintext(username, credential.secret())
        }
        AuthType::Pubkey if allowed.contains(CredentialType::SSH_KEY) => {
            let secret = credential.secret();
            // Key material resolved from a secret store, or a path on this node
            if secret.trim_start().starts_with("-----BEGIN") {
                Cred::ssh_key_from_memory(username, None, secret, None)
            } else {
                Cred::ssh_key(username, None, Path::new(secret), None)
            }
        }
        _ => Err(git2::Error::from_str(&format!(
            "remote does not accept {} credentials",
            credential.auth_type
        ))),
    }
}

/// Checkout options that abort once `cancel` fires
fn cancellable_checkout<'cb>(cancel: &CancellationToken) -> CheckoutBuilder<'cb> {
    let cancel = cancel.clone();
    let mut checkout = CheckoutBuilder::new();
    checkout
        .notify_on(CheckoutNotificationType::UPDATED)
        .notify(move |_, _, _, _, _| !cancel.is_cancelled());
    checkout
}

fn clone_blocking(
    url: &str,
    destination: &Path,
    credential: Option<GitCredential>,
    cancel: CancellationToken,
) -> Result<(), SourceControlError> {
    if cancel.is_cancelled() {
        return Err(SourceControlError::Fetch("clone cancelled".to_string()));
    }

    let mut callbacks = RemoteCallbacks::new();
    if let Some(credential) = credential {
        let mut offered = false;
        callbacks.credentials(move |_url, username_from_url, allowed| {
            // ssh negotiates the username separately before the key
            if !allowed.contains(CredentialType::USERNAME) {
                if offered {
                    return Err(git2::Error::from_str("authentication failed"));
                }
                offered = true;
            }
            credential_callback(&credential, username_from_url, allowed)
        });
    }

    let transfer_cancel = cancel.clone();
    callbacks.transfer_progress(move |_| !transfer_cancel.is_cancelled());

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);

    RepoBuilder::new()
        .fetch_options(fetch_options)
        .with_checkout(cancellable_checkout(&cancel))
        .clone(url, destination)
        .map(|_| ())
        .map_err(|e| SourceControlError::Fetch(e.message().to_string()))
}

fn checkout_blocking(
    repository: &Path,
    reference: &str,
    cancel: CancellationToken,
) -> Result<(), SourceControlError> {
    let checkout_err = |e: git2::Error| SourceControlError::Checkout(e.message().to_string());

    if cancel.is_cancelled() {
        return Err(SourceControlError::Checkout("checkout cancelled".to_string()));
    }

    let repo = Repository::open(repository).map_err(checkout_err)?;

    // Branches only exist as remote-tracking refs right after a clone
    let (object, gref) = repo
        .revparse_ext(reference)
        .or_else(|_| repo.revparse_ext(&format!("origin/{}", reference)))
        .map_err(|_| {
            SourceControlError::Checkout(format!("reference '{}' not found", reference))
        })?;

    // Fresh clone, nothing local to preserve
    let mut checkout = cancellable_checkout(&cancel);
    checkout.force();
    repo.checkout_tree(&object, Some(&mut checkout))
        .map_err(checkout_err)?;

    let head = match gref {
        Some(gref) if gref.is_branch() => match gref.name() {
            Some(name) => repo.set_head(name),
            None => repo.set_head_detached(object.id()),
        },
        _ => repo.set_head_detached(object.id()),
    };
    head.map_err(checkout_err)
}

#[async_trait]
impl SourceControlClient for Git2Client {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        credential: Option<&GitCredential>,
        cancel: &CancellationToken,
    ) -> Result<(), SourceControlError> {
        debug!("Cloning {} into {}", url, destination.display());

        let url = url.to_string();
        let destination: PathBuf = destination.to_path_buf();
        let credential = credential.cloned();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || clone_blocking(&url, &destination, credential, cancel))
            .await
            .map_err(|e| SourceControlError::Fetch(format!("clone task failed: {}", e)))?
    }

    async fn checkout(
        &self,
        repository: &Path,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<(), SourceControlError> {
        debug!("Checking out {} in {}", reference, repository.display());

        let repository = repository.to_path_buf();
        let reference = reference.to_string();
        let cancel = cancel.clone();

        tokio::task::spawn_blocking(move || checkout_blocking(&repository, &reference, cancel))
            .await
            .map_err(|e| SourceControlError::Checkout(format!("checkout task failed: {}", e)))?
    }
}
