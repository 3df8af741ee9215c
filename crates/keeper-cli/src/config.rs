//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "cli-config.json";

/// Server used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "https://gateway.pnath.in";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl CliConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|error| {
            CliError::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            CliError::Config(format!("failed to parse {}: {error}", path.display()))
        })
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                CliError::Config(format!(
                    "failed to create {}: {error}",
                    parent.display()
                ))
            })?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|error| {
            CliError::Config(format!("failed to write {}: {error}", path.display()))
        })
    }

    /// Resolve the server base URL: flag, then `KEEPER_SERVER_URL`, then the
    /// config file, then the public gateway.
    pub fn resolve_server(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| std::env::var("KEEPER_SERVER_URL").ok())
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    /// Resolve the data directory: flag, then `KEEPER_DATA_DIR`, then the
    /// config file, then the platform data dir.
    pub fn resolve_data_dir(&self, flag: Option<&Path>) -> Result<PathBuf, CliError> {
        if let Some(dir) = flag {
            return Ok(dir.to_path_buf());
        }
        if let Ok(dir) = std::env::var("KEEPER_DATA_DIR") {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join("keeper"))
            .ok_or_else(|| CliError::Config("failed to resolve a data directory".to_string()))
    }
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("keeper").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("failed to resolve a config directory".to_string()))
}
