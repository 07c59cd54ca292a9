//! Presence index - persisted set of item indices holding a value
//!
//! Each column keeps one roaring bitmap of the item indices it stores a value
//! for. The bitmap is loaded in full when opened and, in read-write mode,
//! written back in full on [`PresenceIndex::close`]. Roaring switches each
//! 2^16 chunk between a sorted array and a bitset, so the file grows with the
//! populated chunks rather than with the 2^32 domain.

use crate::{Error, Result};
use roaring::RoaringBitmap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How a per-operation store handle is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Load only; nothing is written back
    Read,
    /// Load (creating if absent) and persist on close
    ReadWrite,
}

impl FromStr for AccessMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "r" => Ok(Self::Read),
            "rw" => Ok(Self::ReadWrite),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

/// Open handle on one column's presence bitmap
///
/// Dropping a read-write handle without calling [`close`](Self::close)
/// discards pending changes: `close` is the commit point.
pub struct PresenceIndex {
    path: PathBuf,
    mode: AccessMode,
    bitmap: RoaringBitmap,
    dirty: bool,
    closed: bool,
}

impl PresenceIndex {
    /// Open the index at `path`
    ///
    /// In [`AccessMode::ReadWrite`] a missing file is created holding the
    /// empty set. In [`AccessMode::Read`] a missing file is `NotFound`.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.is_file() {
            match mode {
                AccessMode::Read => {
                    return Err(Error::not_found(format!(
                        "presence index {}",
                        path.display()
                    )));
                }
                AccessMode::ReadWrite => write_bitmap(&path, &RoaringBitmap::new())?,
            }
        }

        let reader = BufReader::new(File::open(&path)?);
        let bitmap = RoaringBitmap::deserialize_from(reader)?;

        Ok(Self {
            path,
            mode,
            bitmap,
            dirty: false,
            closed: false,
        })
    }

    /// Open with a mode string (`"r"` or `"rw"`)
    pub fn open_with_mode<P: AsRef<Path>>(path: P, mode: &str) -> Result<Self> {
        Self::open(path, mode.parse()?)
    }

    /// The in-memory set, iterated in ascending order
    pub fn current(&self) -> &RoaringBitmap {
        &self.bitmap
    }

    /// Consume the handle and keep the set, discarding any pending write
    pub fn into_bitmap(mut self) -> RoaringBitmap {
        self.closed = true;
        std::mem::take(&mut self.bitmap)
    }

    /// Union `indices` into the set; returns how many were new
    pub fn update<I: IntoIterator<Item = u32>>(&mut self, indices: I) -> u64 {
        let before = self.bitmap.len();
        self.bitmap.extend(indices);
        let added = self.bitmap.len() - before;
        if added > 0 {
            self.dirty = true;
        }
        added
    }

    /// Release the handle, persisting the set in read-write mode
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        if self.mode == AccessMode::ReadWrite {
            write_bitmap(&self.path, &self.bitmap)?;
        }
        Ok(())
    }
}

impl Drop for PresenceIndex {
    fn drop(&mut self) {
        if !self.closed && self.dirty && self.mode == AccessMode::ReadWrite {
            tracing::warn!(
                path = %self.path.display(),
                "presence index dropped without close, discarding {} pending entries",
                self.bitmap.len()
            );
        }
    }
}

/// Replace the file at `path` with the serialized bitmap
fn write_bitmap(path: &Path, bitmap: &RoaringBitmap) -> Result<()> {
    let tmp = path.with_extension("map.tmp");
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        bitmap.serialize_into(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("r".parse::<AccessMode>().unwrap(), AccessMode::Read);
        assert_eq!("rw".parse::<AccessMode>().unwrap(), AccessMode::ReadWrite);
        assert!(matches!(
            "w".parse::<AccessMode>(),
            Err(Error::InvalidMode(m)) if m == "w"
        ));
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let result = PresenceIndex::open(dir.path().join("col.map"), AccessMode::Read);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_read_write_creates_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("col.map");

        let index = PresenceIndex::open(&path, AccessMode::ReadWrite).unwrap();
        assert!(index.current().is_empty());
        index.close().unwrap();

        assert!(path.is_file());
        let index = PresenceIndex::open(&path, AccessMode::Read).unwrap();
        assert!(index.current().is_empty());
    }

    #[test]
    fn test_update_persists_on_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("col.map");

        let mut index = PresenceIndex::open(&path, AccessMode::ReadWrite).unwrap();
        assert_eq!(index.update([5, 1, 3]), 3);
        assert_eq!(index.update([3, 5]), 0);
        index.close().unwrap();

        let index = PresenceIndex::open(&path, AccessMode::Read).unwrap();
        let values: Vec<u32> = index.current().iter().collect();
        assert_eq!(values, vec![1, 3, 5]);
    }

    #[test]
    fn test_read_mode_never_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("col.map");
        PresenceIndex::open(&path, AccessMode::ReadWrite)
            .unwrap()
            .close()
            .unwrap();

        let mut index = PresenceIndex::open(&path, AccessMode::Read).unwrap();
        index.update([7]);
        index.close().unwrap();

        let index = PresenceIndex::open(&path, AccessMode::Read).unwrap();
        assert!(index.current().is_empty());
    }

    #[test]
    fn test_drop_without_close_discards() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("col.map");

        {
            let mut index = PresenceIndex::open(&path, AccessMode::ReadWrite).unwrap();
            index.update([1, 2, 3]);
        }

        let index = PresenceIndex::open(&path, AccessMode::Read).unwrap();
        assert!(index.current().is_empty());
    }

    #[test]
    fn test_domain_edges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("col.map");

        let mut index = PresenceIndex::open(&path, AccessMode::ReadWrite).unwrap();
        index.update([0, u32::MAX]);
        index.close().unwrap();

        let index = PresenceIndex::open(&path, AccessMode::Read).unwrap();
        assert!(index.current().contains(0));
        assert!(index.current().contains(u32::MAX));
        assert_eq!(index.current().len(), 2);
    }
}
