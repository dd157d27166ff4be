use crate::definition::{CatalogError, DefinitionRegistry};
use crate::error::ConfigError;
use crate::transport::{StdioLauncher, TransportTimeouts};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serialized settings from ~/.toolhub/config.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Spawn plus handshake budget per server, unless its definition overrides it.
    pub startup_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    /// Extra JSON catalog merged over the built-in definitions.
    pub definitions_path: Option<PathBuf>,
    /// Root of the instance store.
    pub data_dir: Option<PathBuf>,
    /// Working directory for spawned servers; the current one when unset.
    pub server_cwd: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            startup_timeout_secs: 20,
            tool_timeout_secs: 60,
            definitions_path: None,
            data_dir: None,
            server_cwd: None,
        }
    }
}

impl Config {
    pub fn timeouts(&self) -> TransportTimeouts {
        TransportTimeouts {
            startup: Duration::from_secs(self.startup_timeout_secs),
            tool: Duration::from_secs(self.tool_timeout_secs),
        }
    }

    pub fn instance_store_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::store::default_root)
    }

    pub fn launcher(&self) -> StdioLauncher {
        match &self.server_cwd {
            Some(cwd) => StdioLauncher::with_cwd(cwd),
            None => StdioLauncher::new(),
        }
    }

    /// Built-in catalog, plus `definitions_path` when set.
    pub fn definitions(&self) -> Result<DefinitionRegistry, CatalogError> {
        let registry = DefinitionRegistry::builtin();
        match &self.definitions_path {
            Some(path) => registry.with_catalog_file(path),
            None => Ok(registry),
        }
    }
}

/// Helper struct for storing the location to read/write global settings
pub struct ConfigStore {
    path: PathBuf,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    pub fn new() -> Self {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".toolhub");
        path.push("config.json");
        Self { path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the user's saved config, or fallback to Default
    pub fn load(&self) -> Config {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Config::default(),
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring malformed config");
                Config::default()
            }
        }
    }

    /// Save the user's config back to disk
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}
