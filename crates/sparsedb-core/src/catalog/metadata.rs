//! Catalog metadata document (`meta.json`)
//!
//! ```json
//! {
//!   "columns": ["x", "y"],
//!   "shape": [128, 2]
//! }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Global catalog extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u64; 2]", into = "[u64; 2]")]
pub struct Shape {
    /// Items addressable in every column, `[0, row_count)`
    pub row_count: u64,
    /// Number of columns
    pub col_count: u64,
}

impl From<[u64; 2]> for Shape {
    fn from([row_count, col_count]: [u64; 2]) -> Self {
        Self {
            row_count,
            col_count,
        }
    }
}

impl From<Shape> for [u64; 2] {
    fn from(shape: Shape) -> Self {
        [shape.row_count, shape.col_count]
    }
}

/// Persisted catalog state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMetadata {
    /// Column names in catalog order
    pub columns: Vec<String>,
    /// Current shape
    pub shape: Shape,
}

impl CatalogMetadata {
    /// Fresh metadata for `columns` with no rows
    pub fn new(columns: Vec<String>) -> Self {
        let col_count = columns.len() as u64;
        Self {
            columns,
            shape: Shape {
                row_count: 0,
                col_count,
            },
        }
    }

    /// Load and validate the document at `path`
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::not_found(format!("catalog metadata {}", path.display())));
        }

        let bytes = std::fs::read(path)?;
        let meta: Self = serde_json::from_slice(&bytes)
            .map_err(|e| Error::corrupt_metadata(format!("{}: {}", path.display(), e)))?;
        meta.validate()?;
        Ok(meta)
    }

    /// Write the document to `path`, replacing any previous version
    pub fn store(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Check `col_count` against the column list and name uniqueness
    pub fn validate(&self) -> Result<()> {
        if self.shape.col_count != self.columns.len() as u64 {
            return Err(Error::corrupt_metadata(format!(
                "shape declares {} columns but {} are listed",
                self.shape.col_count,
                self.columns.len()
            )));
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        if let Some(dup) = self.columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(Error::corrupt_metadata(format!("column '{}' listed twice", dup)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shape_serializes_as_pair() {
        let meta = CatalogMetadata::new(vec!["x".to_string(), "y".to_string()]);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["shape"], serde_json::json!([0, 2]));
        assert_eq!(json["columns"], serde_json::json!(["x", "y"]));
    }

    #[test]
    fn test_store_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");

        let mut meta = CatalogMetadata::new(vec!["a".to_string()]);
        meta.shape.row_count = 64;
        meta.store(&path).unwrap();

        assert_eq!(CatalogMetadata::load(&path).unwrap(), meta);
    }

    #[test]
    fn test_load_missing() {
        let dir = TempDir::new().unwrap();
        let result = CatalogMetadata::load(&dir.path().join("meta.json"));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_col_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, r#"{"columns": ["a", "b"], "shape": [0, 3]}"#).unwrap();

        let result = CatalogMetadata::load(&path);
        assert!(matches!(result, Err(Error::CorruptMetadata(_))));
    }

    #[test]
    fn test_unparseable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, "columns = [").unwrap();

        let result = CatalogMetadata::load(&path);
        assert!(matches!(result, Err(Error::CorruptMetadata(_))));
    }
}
