//! Store configuration

use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable overriding [`StoreConfig::data_dir`]
pub const DATA_DIR_ENV: &str = "SPARSEDB_DATA_DIR";

/// Environment variable overriding [`StoreConfig::database`]
pub const DATABASE_ENV: &str = "SPARSEDB_DATABASE";

/// Where a catalog lives on disk
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory holding one subdirectory per database
    pub data_dir: PathBuf,
    /// Database (catalog) name
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database: "default".to_string(),
        }
    }
}

impl StoreConfig {
    /// Build a config for `database` under `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>, database: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            database: database.into(),
        }
    }

    /// Defaults, overridden by `SPARSEDB_DATA_DIR` / `SPARSEDB_DATABASE`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(name) = std::env::var(DATABASE_ENV) {
            config.database = name;
        }
        config
    }
}
