//! Configuration loading and management
//!
//! Handles parsing of the `.taskdir.toml` file at the store root.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};
use crate::task::model::{Priority, Status};

/// Config file name, relative to the store root.
pub const CONFIG_FILENAME: &str = ".taskdir.toml";

/// Upper bound for `sync.workers`.
pub const MAX_SYNC_WORKERS: usize = 64;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Field defaults for new tasks
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Task id generation
    #[serde(default)]
    pub ids: IdsConfig,

    /// Reconciler settings
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Values applied to a new task when the caller leaves them unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Owner when neither --owner nor TASKDIR_OWNER is given
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default = "default_priority")]
    pub priority: Priority,

    #[serde(default)]
    pub priority_value: u8,

    /// Initial status; must be todo or started
    #[serde(default = "default_status")]
    pub status: Status,
}

fn default_owner() -> String {
    "unassigned".to_string()
}

fn default_priority() -> Priority {
    Priority::Medium
}

fn default_status() -> Status {
    Status::Todo
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
            priority: default_priority(),
            priority_value: 0,
            status: default_status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdsConfig {
    /// How many fresh ids to try before giving up on a collision
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    16
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reader threads used to load task files
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Reconcile before answering `find`
    #[serde(default = "default_true")]
    pub auto: bool,
}

fn default_workers() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            auto: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from a `.taskdir.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the store root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILENAME);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|err| Error::io(path, err))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()?;
        if self.ids.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "ids.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.sync.workers == 0 || self.sync.workers > MAX_SYNC_WORKERS {
            return Err(Error::InvalidConfig(format!(
                "sync.workers must be between 1 and {MAX_SYNC_WORKERS}"
            )));
        }
        Ok(())
    }
}

impl DefaultsConfig {
    fn validate(&self) -> Result<()> {
        let owner = self.owner.trim();
        if owner.is_empty() {
            return Err(Error::InvalidConfig(
                "defaults.owner cannot be empty".to_string(),
            ));
        }
        if owner.contains(['\r', '\n']) {
            return Err(Error::InvalidConfig(
                "defaults.owner cannot contain line breaks".to_string(),
            ));
        }
        if self.status.is_closed() || self.status == Status::Waiting {
            return Err(Error::InvalidConfig(format!(
                "defaults.status '{}' cannot be used for new tasks (use todo or started)",
                self.status
            )));
        }
        Ok(())
    }
}
