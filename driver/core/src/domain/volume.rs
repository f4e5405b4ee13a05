// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::repository::RepositoryError;
use crate::domain::secret::SecretError;
use crate::domain::source_control::SourceControlError;

// ============================================================================
// Value Objects
// ============================================================================

/// How the source-control client authenticates against the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthType {
    #[default]
    Anonymous,
    Password,
    Pubkey,
    Token,
}

impl AuthType {
    pub const ALL: [AuthType; 4] = [
        AuthType::Anonymous,
        AuthType::Password,
        AuthType::Pubkey,
        AuthType::Token,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Password => "password",
            Self::Pubkey => "pubkey",
            Self::Token => "token",
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl FromStr for AuthType {
    type Err = VolumeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                VolumeError::InvalidOption(format!(
                    "auth-type is not valid. Valid types are {}.",
                    valid.join(", ")
                ))
            })
    }
}

impl std::fmt::Display for AuthType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport schemes accepted for a volume's source URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportScheme {
    Http,
    Https,
    Ssh,
}

impl TransportScheme {
    pub const ALL: [TransportScheme; 3] = [Self::Http, Self::Https, Self::Ssh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ssh => "ssh",
        }
    }

    /// Parse a URL scheme, returning `None` when it is not allow-listed
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(scheme))
    }

    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Deferred credential bundle captured at create time and replayed at mount.
///
/// Only the provider name and its staged configuration are stored here;
/// resolved plaintext secrets never enter the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthSpec {
    #[serde(rename = "Type")]
    pub auth_type: AuthType,

    /// Secret provider name (empty for anonymous volumes)
    #[serde(rename = "Driver", default)]
    pub secret_provider: String,

    #[serde(rename = "User", default, deserialize_with = "empty_string_as_none")]
    pub username: Option<String>,

    #[serde(rename = "Config", default, deserialize_with = "null_as_default")]
    pub config: BTreeMap<String, String>,
}

impl AuthSpec {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_provider(
        auth_type: AuthType,
        secret_provider: impl Into<String>,
        username: impl Into<String>,
        config: BTreeMap<String, String>,
    ) -> Self {
        Self {
            auth_type,
            secret_provider: secret_provider.into(),
            username: Some(username.into()),
            config,
        }
    }
}

/// Scope advertised to the container engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeScope {
    /// Volumes exist on this node only
    Local,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(rename = "Scope")]
    pub scope: VolumeScope,
}

impl Capabilities {
    pub fn node_local() -> Self {
        Self {
            scope: VolumeScope::Local,
        }
    }
}

// ============================================================================
// Volume Record
// ============================================================================

/// A named volume lazily materialized from a remote git repository.
///
/// Everything except `reference_count` is fixed at creation. The count is
/// runtime-only state and is never written to the snapshot, so a restored
/// volume always starts unmounted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitVolume {
    #[serde(rename = "Name", default)]
    pub name: String,

    #[serde(rename = "URL")]
    pub url: String,

    #[serde(
        rename = "Ref",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_string_as_none"
    )]
    pub ref_name: Option<String>,

    #[serde(rename = "Auth", default)]
    pub auth: AuthSpec,

    #[serde(rename = "Mountpoint")]
    pub mount_path: PathBuf,

    #[serde(rename = "CreatedAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(skip)]
    reference_count: u64,
}

impl GitVolume {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        ref_name: Option<String>,
        auth: AuthSpec,
        mount_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ref_name,
            auth,
            mount_path: mount_path.into(),
            created_at: Utc::now(),
            reference_count: 0,
        }
    }

    pub fn reference_count(&self) -> u64 {
        self.reference_count
    }

    /// True when at least one consumer holds the volume (content is on disk)
    pub fn is_materialized(&self) -> bool {
        self.reference_count > 0
    }

    /// Record a new consumer, returning the updated count
    pub fn acquire(&mut self) -> u64 {
        self.reference_count += 1;
        self.reference_count
    }

    /// Drop a consumer. Never goes below zero; a stray release on an
    /// unmounted volume stays at zero.
    pub fn release(&mut self) -> u64 {
        self.reference_count = self.reference_count.saturating_sub(1);
        self.reference_count
    }

    pub fn summary(&self) -> VolumeSummary {
        VolumeSummary {
            name: self.name.clone(),
            mount_path: self.mount_path.clone(),
            created_at: self.created_at,
            reference_count: self.reference_count,
        }
    }
}

/// Read-side projection returned by list/get
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSummary {
    pub name: String,
    pub mount_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub reference_count: u64,
}

/// Reject names that would escape `<root>/volumes/`
pub fn validate_volume_name(name: &str) -> Result<(), VolumeError> {
    if name.is_empty() {
        return Err(VolumeError::InvalidOption(
            "volume name cannot be empty".to_string(),
        ));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(VolumeError::InvalidOption(format!(
            "volume name '{}' is not a valid directory name",
            name
        )));
    }
    Ok(())
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("{0}")]
    InvalidOption(String),

    #[error("Volume {0} already exists")]
    AlreadyExists(String),

    #[error("volume {0} not found")]
    NotFound(String),

    #[error("volume {0} is currently used by a container")]
    InUse(String),

    #[error("The Secret Driver: {name} is not supported. Supported drivers are {supported}")]
    UnsupportedProvider { name: String, supported: String },

    #[error("{}", missing_keys_message(.0))]
    MissingKeys(Vec<String>),

    #[error("Key '{0}' already exists")]
    DuplicateKey(String),

    #[error("{0}")]
    SecretUnavailable(String),

    #[error("{0}")]
    FetchFailed(String),

    #[error("{0}")]
    CheckoutFailed(String),

    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("failed to persist volume state: {0}")]
    PersistenceFailed(String),

    #[error("failed to remove {path}: {reason}")]
    TeardownFailed { path: PathBuf, reason: String },
}

pub(crate) fn missing_keys_message(keys: &[String]) -> String {
    if keys.len() == 1 {
        format!("The option key is missing: {}", keys[0])
    } else {
        format!("The option keys are missing: {}", keys.join(", "))
    }
}

impl From<SecretError> for VolumeError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::UnsupportedProvider { name, supported } => {
                VolumeError::UnsupportedProvider { name, supported }
            }
            SecretError::MissingKeys(keys) => VolumeError::MissingKeys(keys),
            SecretError::DuplicateKey(key) => VolumeError::DuplicateKey(key),
            SecretError::Unavailable(reason) => VolumeError::SecretUnavailable(reason),
        }
    }
}

impl From<SourceControlError> for VolumeError {
    fn from(err: SourceControlError) -> Self {
        match err {
            SourceControlError::Fetch(reason) => VolumeError::FetchFailed(reason),
            SourceControlError::Checkout(reason) => VolumeError::CheckoutFailed(reason),
        }
    }
}

impl From<RepositoryError> for VolumeError {
    fn from(err: RepositoryError) -> Self {
        VolumeError::PersistenceFailed(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
