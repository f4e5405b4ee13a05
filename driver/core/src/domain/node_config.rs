// Copyright (c) 2026 gitvol contributors
// SPDX-License-Identifier: AGPL-3.0

// Driver Configuration Types
//
// Defines the configuration schema for a gitvol node, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Storage layout (volume root, state snapshot, startup reconciliation)
// - Plugin socket location
// - Secret provider defaults and git fetch bounds

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "gitvol.io/v1";
pub const KIND: &str = "DriverConfig";

/// Top-level Kubernetes-style driver configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfigManifest {
    /// API version (must be "gitvol.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "DriverConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: DriverConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable node name
    pub name: String,
}

/// Body of the manifest (content under spec:)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfigSpec {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub plugin: PluginConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory; volumes live in `<root>/volumes/<name>`
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Snapshot file name under `<root>/state/`
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// Remove leftover mount directories when restoring the catalog.
    /// Reference counts are not persisted, so every restored volume is
    /// unmounted and any content on disk belongs to a previous process.
    #[serde(default)]
    pub reconcile_on_startup: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            state_file: default_state_file(),
            reconcile_on_startup: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Unix socket the container engine connects to
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Provider used when a volume asks for auth without naming a secret-driver
    #[serde(default = "default_secret_driver")]
    pub default_driver: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            default_driver: default_secret_driver(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitConfig {
    /// Upper bound for a single fetch or checkout. Unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("/var/lib/docker-volumes/gitvol")
}

fn default_state_file() -> String {
    "gitfs-state.json".to_string()
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/run/docker/plugins/gitvol.sock")
}

fn default_secret_driver() -> String {
    "stdin".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DriverConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "gitvol".to_string(),
            },
            spec: DriverConfigSpec::default(),
        }
    }
}

impl DriverConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Directory holding one sub-directory per volume
    pub fn volumes_dir(&self) -> PathBuf {
        self.spec.storage.root.join("volumes")
    }

    /// Location of the catalog snapshot
    pub fn state_path(&self) -> PathBuf {
        self.spec
            .storage
            .root
            .join("state")
            .join(&self.spec.storage.state_file)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.spec.git.fetch_timeout_secs.map(Duration::from_secs)
    }

    /// Discover configuration file using precedence order
    /// 1. GITVOL_CONFIG_PATH environment variable
    /// 2. ./gitvol-config.yaml (working directory)
    /// 3. ~/.gitvol/config.yaml (user home)
    /// 4. /etc/gitvol/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GITVOL_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./gitvol-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".gitvol").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/gitvol/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must load
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("GITVOL_ROOT") {
            tracing::info!("Environment override: GITVOL_ROOT={}", root);
            self.spec.storage.root = PathBuf::from(root);
        }

        if let Some(socket) = lookup("GITVOL_SOCKET") {
            tracing::info!("Environment override: GITVOL_SOCKET={}", socket);
            self.spec.plugin.socket_path = PathBuf::from(socket);
        }

        if let Some(val) = lookup("GITVOL_FETCH_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: GITVOL_FETCH_TIMEOUT_SECS={}", secs);
                    self.spec.git.fetch_timeout_secs = Some(secs);
                }
                Err(_) => tracing::warn!(
                    "Invalid value for GITVOL_FETCH_TIMEOUT_SECS: '{}'. Expected seconds. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("GITVOL_RECONCILE_ON_STARTUP") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: GITVOL_RECONCILE_ON_STARTUP=true");
                    self.spec.storage.reconcile_on_startup = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: GITVOL_RECONCILE_ON_STARTUP=false");
                    self.spec.storage.reconcile_on_startup = false;
                }
                _ => tracing::warn!(
                    "Invalid value for GITVOL_RECONCILE_ON_STARTUP: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        let storage = &self.spec.storage;
        if storage.root.as_os_str().is_empty() {
            anyhow::bail!("spec.storage.root cannot be empty");
        }
        if !storage.root.is_absolute() {
            anyhow::bail!(
                "spec.storage.root must be an absolute path: {}",
                storage.root.display()
            );
        }

        if storage.state_file.is_empty() {
            anyhow::bail!("spec.storage.state_file cannot be empty");
        }
        if storage.state_file.contains(['/', '\\']) {
            anyhow::bail!(
                "spec.storage.state_file must be a file name, not a path: {}",
                storage.state_file
            );
        }

        if self.spec.plugin.socket_path.as_os_str().is_empty() {
            anyhow::bail!("spec.plugin.socket_path cannot be empty");
        }

        if self.spec.secrets.default_driver.is_empty() {
            anyhow::bail!("spec.secrets.default_driver cannot be empty");
        }

        if self.spec.git.fetch_timeout_secs == Some(0) {
            anyhow::bail!("spec.git.fetch_timeout_secs must be greater than zero");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_manifest() {
        let manifest = DriverConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.secrets.default_driver, "stdin");
        assert!(manifest.fetch_timeout().is_none());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_derived_paths() {
        let mut manifest = DriverConfigManifest::default();
        manifest.spec.storage.root = PathBuf::from("/srv/gitvol");

        assert_eq!(manifest.volumes_dir(), PathBuf::from("/srv/gitvol/volumes"));
        assert_eq!(
            manifest.state_path(),
            PathBuf::from("/srv/gitvol/state/gitfs-state.json")
        );
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
apiVersion: gitvol.io/v1
kind: DriverConfig
metadata:
  name: build-node
spec:
  storage:
    root: /data/gitvol
  git:
    fetch_timeout_secs: 120
"#;
        let manifest = DriverConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.metadata.name, "build-node");
        assert_eq!(manifest.spec.storage.root, PathBuf::from("/data/gitvol"));
        assert_eq!(manifest.spec.storage.state_file, "gitfs-state.json");
        assert_eq!(manifest.fetch_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(
            manifest.spec.plugin.socket_path,
            PathBuf::from("/run/docker/plugins/gitvol.sock")
        );
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut manifest = DriverConfigManifest::default();
        manifest.spec.git.fetch_timeout_secs = Some(30);
        manifest.spec.secrets.default_driver = "vault".to_string();

        let yaml = manifest.to_yaml_string().unwrap();
        let parsed = DriverConfigManifest::from_yaml_str(&yaml).unwrap();
        assert_eq!(parsed.spec.git.fetch_timeout_secs, Some(30));
        assert_eq!(parsed.spec.secrets.default_driver, "vault");
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("GITVOL_ROOT", "/tmp/gv"),
            ("GITVOL_FETCH_TIMEOUT_SECS", "not-a-number"),
            ("GITVOL_RECONCILE_ON_STARTUP", "yes"),
        ]);

        let mut manifest = DriverConfigManifest::default();
        manifest.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(manifest.spec.storage.root, PathBuf::from("/tmp/gv"));
        assert!(manifest.spec.git.fetch_timeout_secs.is_none());
        assert!(manifest.spec.storage.reconcile_on_startup);
    }

    #[test]
    fn test_validation() {
        let mut manifest = DriverConfigManifest::default();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.spec.storage.root = PathBuf::from("relative/root");
        assert!(manifest.validate().is_err());
        manifest.spec.storage.root = PathBuf::from("/srv/gitvol");

        manifest.spec.storage.state_file = "state/nested.json".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.storage.state_file = "gitfs-state.json".to_string();

        manifest.spec.git.fetch_timeout_secs = Some(0);
        assert!(manifest.validate().is_err());
        manifest.spec.git.fetch_timeout_secs = Some(60);

        assert!(manifest.validate().is_ok());
    }
}
