// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

//! Create-option parsing.
//!
//! Turns the free-form option map of a create request into a typed
//! [`CreateVolumeOptions`]. Checks run in a fixed order so the first
//! problem reported is stable: url presence, url emptiness, url syntax,
//! transport scheme, auth-type, auth-user.

use std::collections::{BTreeMap, HashMap};

use crate::domain::volume::{AuthType, TransportScheme, VolumeError};

pub const OPT_URL: &str = "url";
pub const OPT_REF: &str = "ref";
pub const OPT_AUTH_TYPE: &str = "auth-type";
pub const OPT_AUTH_USER: &str = "auth-user";
pub const OPT_SECRET_DRIVER: &str = "secret-driver";

/// Options consumed by the driver itself; everything else goes to the
/// secret provider
pub const RESERVED_OPTIONS: [&str; 5] = [
    OPT_URL,
    OPT_REF,
    OPT_AUTH_TYPE,
    OPT_AUTH_USER,
    OPT_SECRET_DRIVER,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVolumeOptions {
    pub url: String,
    pub ref_name: Option<String>,
    pub auth_type: AuthType,
    /// Present for every non-anonymous auth type
    pub auth_user: Option<String>,
    /// Present for every non-anonymous auth type
    pub secret_driver: Option<String>,
    /// Options forwarded to the secret provider (empty when anonymous)
    pub provider_config: BTreeMap<String, String>,
}

impl CreateVolumeOptions {
    pub fn parse(
        options: &HashMap<String, String>,
        default_secret_driver: &str,
    ) -> Result<Self, VolumeError> {
        let url = options
            .get(OPT_URL)
            .ok_or_else(|| VolumeError::InvalidOption("url option is mandatory".to_string()))?;
        if url.is_empty() {
            return Err(VolumeError::InvalidOption("url cannot be empty".to_string()));
        }

        let parsed = url::Url::parse(url)
            .map_err(|e| VolumeError::InvalidOption(format!("url is not valid: {}", e)))?;
        if TransportScheme::from_scheme(parsed.scheme()).is_none() {
            return Err(VolumeError::InvalidOption(format!(
                "url transport scheme is not valid. Valid types are {}.",
                TransportScheme::supported()
            )));
        }

        let auth_type = match options.get(OPT_AUTH_TYPE) {
            Some(value) => value.parse::<AuthType>()?,
            None => AuthType::Anonymous,
        };

        let ref_name = options.get(OPT_REF).filter(|r| !r.is_empty()).cloned();

        if auth_type.is_anonymous() {
            return Ok(Self {
                url: url.clone(),
                ref_name,
                auth_type,
                auth_user: None,
                secret_driver: None,
                provider_config: BTreeMap::new(),
            });
        }

        let auth_user = options
            .get(OPT_AUTH_USER)
            .filter(|u| !u.is_empty())
            .cloned()
            .ok_or_else(|| VolumeError::InvalidOption("auth-user option should be set".to_string()))?;

        let secret_driver = options
            .get(OPT_SECRET_DRIVER)
            .filter(|d| !d.is_empty())
            .cloned()
            .unwrap_or_else(|| default_secret_driver.to_string());

        let provider_config = options
            .iter()
            .filter(|(key, _)| !RESERVED_OPTIONS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            url: url.clone(),
            ref_name,
            auth_type,
            auth_user: Some(auth_user),
            secret_driver: Some(secret_driver),
            provider_config,
        })
    }
}
