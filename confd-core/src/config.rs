//! YAML agent configuration.
//!
//! # Document shape
//!
//! ```yaml
//! apollo:
//!   api: http://apollo-config:8080
//!   app_id: demo
//!   cluster: default
//!   namespaces: [app, config.json]
//! watch:
//!   - onchange: /usr/local/bin/reload
//!     groups:
//!       - path: /etc/app
//!         keys: [app:nginx.conf]
//! ```
//!
//! Each `groups` entry becomes one [`WatchGroup`] that carries its parent's
//! `onchange` command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::WatchGroup;

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "apollo-confd.yaml";

// ---------------------------------------------------------------------------
// 1. Document types
// ---------------------------------------------------------------------------

/// Connection parameters for the Apollo config service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApolloConfig {
    /// Base URL of the config service, e.g. `http://apollo-config:8080`.
    pub api: String,
    pub app_id: String,
    #[serde(default = "default_cluster")]
    pub cluster: String,
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ApolloConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// One target directory and the keys rendered into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// A set of groups sharing one on-change command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default, rename = "onchange")]
    pub on_change: String,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

/// Root of the agent configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfdConfig {
    pub apollo: ApolloConfig,
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

fn default_cluster() -> String {
    "default".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

impl ConfdConfig {
    /// Flatten `watch` into `(group, keys)` pairs in declaration order.
    ///
    /// The position of a pair is the group's stable index.
    pub fn watch_groups(&self) -> Vec<(WatchGroup, Vec<String>)> {
        self.watch
            .iter()
            .flat_map(|watch| {
                watch.groups.iter().map(move |group| {
                    (
                        WatchGroup::new(group.path.clone(), watch.on_change.clone()),
                        group.keys.clone(),
                    )
                })
            })
            .collect()
    }

    /// Reject documents the agent cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.apollo.api.trim().is_empty() {
            return Err(ConfigError::Invalid("apollo.api must not be empty".into()));
        }
        if self.apollo.app_id.trim().is_empty() {
            return Err(ConfigError::Invalid("apollo.app_id must not be empty".into()));
        }
        if self.apollo.namespaces.is_empty() {
            return Err(ConfigError::Invalid(
                "apollo.namespaces must list at least one namespace".into(),
            ));
        }
        for (i, watch) in self.watch.iter().enumerate() {
            for group in &watch.groups {
                if group.path.as_os_str().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "watch[{i}] has a group with an empty path"
                    )));
                }
            }
        }
        Ok(())
    }

    /// YAML echo of the document with the secret masked.
    pub fn to_redacted_yaml(&self) -> Result<String, ConfigError> {
        let mut copy = self.clone();
        if !copy.apollo.secret.is_empty() {
            copy.apollo.secret = "******".to_string();
        }
        Ok(serde_yaml::to_string(&copy)?)
    }
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Parse a config document from a YAML string. `path` is used for error context.
pub fn parse(contents: &str, path: &Path) -> Result<ConfdConfig, ConfigError> {
    let config: ConfdConfig = serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Load and validate the config at `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<ConfdConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse(&contents, path)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
