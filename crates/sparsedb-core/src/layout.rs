//! On-disk layout
//!
//! ```text
//! <data_dir>/<database>/meta.json
//! <data_dir>/<database>/cols/<column>/map/col.map
//! <data_dir>/<database>/cols/<column>/data/col.data
//! ```

use crate::Result;
use crate::config::StoreConfig;
use std::path::{Path, PathBuf};

/// Paths for one database
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Resolve the layout for a config without touching the filesystem
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.data_dir.join(&config.database),
        }
    }

    /// Database directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Catalog metadata document
    pub fn meta_path(&self) -> PathBuf {
        self.root.join("meta.json")
    }

    /// Directory holding one subdirectory per column
    pub fn columns_dir(&self) -> PathBuf {
        self.root.join("cols")
    }

    /// Create the database and column directories
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.columns_dir())?;
        Ok(())
    }
}

/// Paths for one column
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    dir: PathBuf,
}

impl ColumnLayout {
    /// Layout for `name` under a columns directory
    pub fn new(columns_dir: &Path, name: &str) -> Self {
        Self {
            dir: columns_dir.join(name),
        }
    }

    /// Presence index file
    pub fn map_path(&self) -> PathBuf {
        self.dir.join("map").join("col.map")
    }

    /// Value array file
    pub fn data_path(&self) -> PathBuf {
        self.dir.join("data").join("col.data")
    }

    /// Create the `map/` and `data/` directories
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.dir.join("map"))?;
        std::fs::create_dir_all(self.dir.join("data"))?;
        Ok(())
    }
}
