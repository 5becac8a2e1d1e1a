//! Broker configuration
//!
//! A single YAML file describes the broker, the two upstreams it talks to
//! and the service catalog it advertises:
//!
//! ```yaml
//! broker:
//!   name: redis-broker
//! director:
//!   url: https://director.example.com:25555
//!   username: admin
//!   password: secret
//!   stemcell: { os: ubuntu-jammy, version: latest }
//!   releases:
//!     - { name: redis, version: "1.0.0" }
//! registry:
//!   url: https://api.example.com
//!   uaa_url: https://uaa.example.com
//!   client_id: broker
//!   client_secret: secret
//! service_catalog:
//!   id: redis-offering-id
//!   name: redis-on-demand
//!   plans: [...]
//! ```

pub mod error;

pub use error::*;

use odb_core::ServiceOffering;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing directly at a configuration file
pub const CONFIG_PATH_ENV: &str = "ODB_CONFIG_PATH";
/// Overrides `director.password`
pub const DIRECTOR_PASSWORD_ENV: &str = "ODB_DIRECTOR_PASSWORD";
/// Overrides `registry.client_secret`
pub const REGISTRY_SECRET_ENV: &str = "ODB_REGISTRY_CLIENT_SECRET";

const CONFIG_FILE: &str = "broker.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub broker: BrokerSettings,
    pub director: DirectorConfig,
    pub registry: RegistryConfig,
    pub service_catalog: ServiceOffering,

    #[serde(default)]
    pub purge: PurgeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerSettings {
    /// Name the broker is registered under in the marketplace
    pub name: String,

    /// Deadline applied to every request handled by the broker
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub stemcell: StemcellConfig,

    #[serde(default)]
    pub releases: Vec<ReleaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemcellConfig {
    pub os: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub url: String,
    pub uaa_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// How long the purger waits for instance deletions to finish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    60
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PurgeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl BrokerConfig {
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: BrokerConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, apply environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: BrokerConfig = serde_yaml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;

        tracing::debug!(path = %path.display(), plans = config.service_catalog.plans.len(), "Loaded broker configuration");
        Ok(config)
    }

    /// [`find_config_file`] then [`BrokerConfig::load`]
    pub fn discover() -> Result<Self> {
        Self::load(&find_config_file()?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(DIRECTOR_PASSWORD_ENV) {
            self.director.password = password;
        }
        if let Ok(secret) = std::env::var(REGISTRY_SECRET_ENV) {
            self.registry.client_secret = secret;
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.broker.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(ConfigError::Invalid(message));

        if self.broker.name.trim().is_empty() {
            return invalid("broker.name must not be empty".into());
        }
        if self.director.url.trim().is_empty() {
            return invalid("director.url must not be empty".into());
        }
        if self.registry.url.trim().is_empty() {
            return invalid("registry.url must not be empty".into());
        }
        if self.director.releases.is_empty() {
            return invalid("director.releases must list at least one release".into());
        }
        if self.purge.max_attempts == 0 {
            return invalid("purge.max_attempts must be greater than zero".into());
        }

        let catalog = &self.service_catalog;
        if catalog.plans.is_empty() {
            return invalid(format!("service offering {} has no plans", catalog.name));
        }
        if catalog.global_quotas.service_instance_limit == Some(0) {
            return invalid("global service_instance_limit must be greater than zero".into());
        }

        let mut seen = HashSet::new();
        for plan in &catalog.plans {
            if !seen.insert(plan.id.as_str()) {
                return invalid(format!("duplicate plan id: {}", plan.id));
            }
            if plan.instance_groups.is_empty() {
                return invalid(format!("plan {} has no instance groups", plan.name));
            }
            if plan.quotas.service_instance_limit == Some(0) {
                return invalid(format!(
                    "plan {} service_instance_limit must be greater than zero",
                    plan.name
                ));
            }
        }

        Ok(())
    }
}

/// Locate the broker configuration file
///
/// Search order:
/// 1. `$ODB_CONFIG_PATH`
/// 2. `./broker.yml`
/// 3. `./.odb/broker.yml`
/// 4. `<config dir>/odb/broker.yml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{} points to a missing file", CONFIG_PATH_ENV);
    }

    let current_dir = std::env::current_dir()?;
    let candidates = [
        current_dir.join(CONFIG_FILE),
        current_dir.join(".odb").join(CONFIG_FILE),
    ];
    if let Some(path) = candidates.into_iter().find(|path| path.exists()) {
        return Ok(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("odb").join(CONFIG_FILE);
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::NotFound)
}
