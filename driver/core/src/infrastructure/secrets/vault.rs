// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! HashiCorp Vault / OpenBao provider.
//!
//! Required options:
//! - `vault-addr`: server address, e.g. `https://vault.internal:8200`
//! - `vault-token`: token used for the read
//! - `vault-secret-path`: `<mount>/<path>` of the secret, e.g. `secret/ci/github`
//! - `vault-secret-field`: field inside the secret holding the credential
//!
//! Optional `vault-kv-version` selects the KV engine version (`1` or `2`,
//! default `2`). For KV v2 a `data/` segment after the mount is accepted and
//! ignored, so both `secret/ci/github` and `secret/data/ci/github` work.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};

use super::SecretProviderRegistry;
use crate::domain::secret::{SecretError, SecretProvider, StagedKeys};

pub const NAME: &str = "vault";
pub const ADDR_KEY: &str = "vault-addr";
pub const TOKEN_KEY: &str = "vault-token";
pub const PATH_KEY: &str = "vault-secret-path";
pub const FIELD_KEY: &str = "vault-secret-field";
pub const KV_VERSION_KEY: &str = "vault-kv-version";

const REQUIRED_KEYS: &[&str] = &[ADDR_KEY, TOKEN_KEY, PATH_KEY, FIELD_KEY];

pub(super) fn register(registry: &mut SecretProviderRegistry) {
    registry.register(NAME, || Box::new(VaultSecretProvider::new()));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KvVersion {
    V1,
    V2,
}

#[derive(Debug, Default)]
pub struct VaultSecretProvider {
    keys: StagedKeys,
}

impl VaultSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn required(&self, key: &str) -> Result<&str, SecretError> {
        self.keys
            .get(key)
            .ok_or_else(|| SecretError::MissingKeys(vec![key.to_string()]))
    }

    fn kv_version(&self) -> Result<KvVersion, SecretError> {
        match self.keys.get(KV_VERSION_KEY) {
            None | Some("2") => Ok(KvVersion::V2),
            Some("1") => Ok(KvVersion::V1),
            Some(other) => Err(SecretError::Unavailable(format!(
                "Unsupported {}: {} (expected 1 or 2)",
                KV_VERSION_KEY, other
            ))),
        }
    }

    fn client(&self) -> Result<VaultClient, SecretError> {
        let addr = self.required(ADDR_KEY)?;
        let token = self.required(TOKEN_KEY)?;

        // The settings builder panics on a malformed address
        url::Url::parse(addr).map_err(|e| {
            SecretError::Unavailable(format!("Error initializing client: {}: {}", addr, e))
        })?;

        let settings = VaultClientSettingsBuilder::default()
            .address(addr)
            .token(token)
            .build()
            .map_err(|e| SecretError::Unavailable(format!("Error initializing client: {}", e)))?;

        VaultClient::new(settings)
            .map_err(|e| SecretError::Unavailable(format!("Error initializing client: {}", e)))
    }
}

/// Split `<mount>/<path>` and drop the KV v2 `data/` segment if present
fn split_secret_path(full: &str, version: KvVersion) -> Result<(&str, &str), SecretError> {
    let trimmed = full.trim_matches('/');
    let (mount, path) = trimmed.split_once('/').ok_or_else(|| {
        SecretError::Unavailable(format!(
            "{} must look like <mount>/<path>: {}",
            PATH_KEY, full
        ))
    })?;

    let path = match version {
        KvVersion::V2 => path.strip_prefix("data/").unwrap_or(path),
        KvVersion::V1 => path,
    };

    if mount.is_empty() || path.is_empty() {
        return Err(SecretError::Unavailable(format!(
            "{} must look like <mount>/<path>: {}",
            PATH_KEY, full
        )));
    }
    Ok((mount, path))
}

#[async_trait]
impl SecretProvider for VaultSecretProvider {
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
        let version = self.kv_version()?;
        let full_path = self.required(PATH_KEY)?;
        let field = self.required(FIELD_KEY)?;
        let (mount, path) = split_secret_path(full_path, version)?;
        let client = self.client()?;

        debug!("Reading secret '{}' from mount '{}' ({:?})", path, mount, version);

        let read = match version {
            KvVersion::V1 => {
                vaultrs::kv1::get::<HashMap<String, serde_json::Value>>(&client, mount, path).await
            }
            KvVersion::V2 => {
                vaultrs::kv2::read::<HashMap<String, serde_json::Value>>(&client, mount, path).await
            }
        };
        let data = read.map_err(|e| {
            SecretError::Unavailable(format!("Error reading {}: {}", full_path, e))
        })?;

        if data.is_empty() {
            return Err(SecretError::Unavailable(format!(
                "No value found at {}",
                full_path
            )));
        }

        match data.get(field) {
            Some(serde_json::Value::String(value)) => Ok(value.clone()),
            _ => Err(SecretError::Unavailable("No value".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_for(addr: &str, path: &str, field: &str, version: Option<&str>) -> VaultSecretProvider {
        let mut provider = VaultSecretProvider::new();
        provider.add_key(ADDR_KEY, addr).unwrap();
        provider.add_key(TOKEN_KEY, "s.testtoken").unwrap();
        provider.add_key(PATH_KEY, path).unwrap();
        provider.add_key(FIELD_KEY, field).unwrap();
        if let Some(v) = version {
            provider.add_key(KV_VERSION_KEY, v).unwrap();
        }
        provider
    }

    #[test]
    fn test_debug_does_not_print_token() {
        let provider = provider_for("https://vault.internal:8200", "secret/ci/github", "token", None);
        let rendered = format!("{:?}", provider);
        assert!(rendered.contains(TOKEN_KEY));
        assert!(!rendered.contains("s.testtoken"));
    }

    #[test]
    fn test_all_missing_keys_reported() {
        let provider = VaultSecretProvider::new();
        let err = provider.validate_keys().unwrap_err();
        assert_eq!(
            err.to_string(),
            "The option keys are missing: vault-addr, vault-token, vault-secret-path, vault-secret-field"
        );
    }

    #[test]
    fn test_split_secret_path() {
        assert_eq!(
            split_secret_path("secret/ci/github", KvVersion::V2).unwrap(),
            ("secret", "ci/github")
        );
        assert_eq!(
            split_secret_path("secret/data/ci/github", KvVersion::V2).unwrap(),
            ("secret", "ci/github")
        );
        assert_eq!(
            split_secret_path("/kv/data/app/", KvVersion::V1).unwrap(),
            ("kv", "data/app")
        );
        assert!(split_secret_path("secret", KvVersion::V2).is_err());
    }

    #[tokio::test]
    async fn test_invalid_address_is_unavailable_not_panic() {
        let provider = provider_for("not a url", "secret/app", "password", None);
        let err = provider.resolve_secret().await.unwrap_err();
        assert!(matches!(err, SecretError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_resolves_kv1_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/secret/gitvol")
            .match_header("x-vault-token", "s.testtoken")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"request_id":"1","lease_id":"","renewable":false,"lease_duration":2764800,
                    "data":{"password":"s3cret","count":3},"wrap_info":null,"warnings":null,"auth":null}"#,
            )
            .expect(2)
            .create_async()
            .await;

        let provider = provider_for(&server.url(), "secret/gitvol", "password", Some("1"));
        assert_eq!(provider.resolve_secret().await.unwrap(), "s3cret");

        let non_string = provider_for(&server.url(), "secret/gitvol", "count", Some("1"));
        let err = non_string.resolve_secret().await.unwrap_err();
        assert_eq!(err.to_string(), "No value");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_resolves_kv2_field() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/secret/data/ci/github")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"request_id":"2","lease_id":"","renewable":false,"lease_duration":0,
                    "data":{"data":{"token":"ghp_abc"},
                            "metadata":{"created_time":"2026-01-01T00:00:00.000000Z","custom_metadata":null,
                                        "deletion_time":"","destroyed":false,"version":1}},
                    "wrap_info":null,"warnings":null,"auth":null}"#,
            )
            .create_async()
            .await;

        let provider = provider_for(&server.url(), "secret/data/ci/github", "token", None);
        assert_eq!(provider.resolve_secret().await.unwrap(), "ghp_abc");
    }

    #[tokio::test]
    async fn test_missing_field() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/secret/gitvol")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"request_id":"3","lease_id":"","renewable":false,"lease_duration":0,
                    "data":{"username":"ci"},"wrap_info":null,"warnings":null,"auth":null}"#,
            )
            .create_async()
            .await;

        let provider = provider_for(&server.url(), "secret/gitvol", "password", Some("1"));
        assert_eq!(provider.resolve_secret().await.unwrap_err().to_string(), "No value");
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/v1/secret/gitvol")
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"errors":["permission denied"]}"#)
            .create_async()
            .await;

        let provider = provider_for(&server.url(), "secret/gitvol", "password", Some("1"));
        let err = provider.resolve_secret().await.unwrap_err();
        assert!(err.to_string().starts_with("Error reading secret/gitvol"));
    }
}
