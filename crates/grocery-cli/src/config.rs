//! Config file and database location.

use std::path::{Path, PathBuf};

use grocery_core::config::EngineConfigFile;
use grocery_core::EngineConfig;

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "grocery.db";
pub const ENV_DB_PATH: &str = "GROCERY_DB_PATH";

/// Where the CLI reads its config and keeps its database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub config: PathBuf,
    pub db: PathBuf,
}

impl Paths {
    /// Resolve both paths: explicit flag, then environment, then platform default
    pub fn resolve(
        config: Option<PathBuf>,
        db: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CliError> {
        let config = match config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let db = match db.or_else(|| {
            lookup(ENV_DB_PATH)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        }) {
            Some(path) => path,
            None => default_db_path()?,
        };
        Ok(Self { config, db })
    }
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join("grocery").join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI config directory".to_string()))
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("grocery").join(DB_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Read the config file; a missing file is an empty config
pub fn load_config_file(path: &Path) -> Result<EngineConfigFile, CliError> {
    if !path.exists() {
        return Ok(EngineConfigFile::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|error| {
        CliError::Config(format!(
            "Failed to read config at {}: {error}",
            path.display()
        ))
    })?;
    serde_json::from_str(&raw).map_err(|error| {
        CliError::Config(format!(
            "Failed to parse config at {}: {error}",
            path.display()
        ))
    })
}

pub fn save_config_file(path: &Path, file: &EngineConfigFile) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            CliError::Config(format!(
                "Failed to create config directory {}: {error}",
                parent.display()
            ))
        })?;
    }

    let serialized = serde_json::to_string_pretty(file)?;
    std::fs::write(path, serialized).map_err(|error| {
        CliError::Config(format!(
            "Failed to write config at {}: {error}",
            path.display()
        ))
    })
}

/// Load the file, overlay the environment and validate
pub fn resolve_engine_config(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<EngineConfig, CliError> {
    let file = load_config_file(path)?.with_env_overrides(lookup);
    file.resolve().map_err(|error| {
        CliError::Config(format!(
            "{error}. Run `grocery config init --api-base-url <URL>`."
        ))
    })
}

pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
