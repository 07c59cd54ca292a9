//! Append-only array of `f64` values, one file per column
//!
//! Values are stored back to back as 8-byte little-endian floats with no
//! header, so the element count is `file_len / 8`.

use crate::index::AccessMode;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const VALUE_SIZE: u64 = 8;

/// Open handle on a value file
///
/// A read-write handle remembers the length it was opened with. If it is
/// dropped without [`close`](Self::close), the file is truncated back to that
/// length, even when the appended values were already synced.
pub struct ValueArray {
    path: PathBuf,
    mode: AccessMode,
    file: File,
    committed_len: u64,
    synced_len: u64,
    len: u64,
    closed: bool,
}

impl ValueArray {
    /// Open the value file at `path`, creating it empty in read-write mode
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = match mode {
            AccessMode::Read => {
                if !path.is_file() {
                    return Err(Error::not_found(format!("value array {}", path.display())));
                }
                File::open(&path)?
            }
            AccessMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?,
        };

        let bytes = file.metadata()?.len();
        if bytes % VALUE_SIZE != 0 {
            return Err(Error::corrupt_column(
                path.display().to_string(),
                format!("value file length {} is not a multiple of {}", bytes, VALUE_SIZE),
            ));
        }
        let len = bytes / VALUE_SIZE;

        Ok(Self {
            path,
            mode,
            file,
            committed_len: len,
            synced_len: len,
            len,
            closed: false,
        })
    }

    /// Number of values, including ones appended through this handle
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True when the array holds no values
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read every value in storage order
    pub fn read_all(&mut self) -> Result<Vec<f64>> {
        let mut bytes = Vec::with_capacity((self.len * VALUE_SIZE) as usize);
        self.file.seek(SeekFrom::Start(0))?;
        (&mut self.file)
            .take(self.len * VALUE_SIZE)
            .read_to_end(&mut bytes)?;

        Ok(bytes
            .chunks_exact(VALUE_SIZE as usize)
            .map(|chunk| {
                let mut raw = [0u8; VALUE_SIZE as usize];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect())
    }

    /// Grow the array by `values`, in order
    pub fn append(&mut self, values: &[f64]) -> Result<()> {
        if self.mode != AccessMode::ReadWrite {
            return Err(Error::InvalidMode(format!(
                "append to {} opened read-only",
                self.path.display()
            )));
        }
        if values.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::with_capacity(values.len() * VALUE_SIZE as usize);
        for value in values {
            buffer.extend_from_slice(&value.to_le_bytes());
        }

        self.file.seek(SeekFrom::Start(self.len * VALUE_SIZE))?;
        self.file.write_all(&buffer)?;
        self.len += values.len() as u64;
        Ok(())
    }

    /// Flush appended values to disk without committing them
    ///
    /// A later drop without [`close`](Self::close) still truncates them.
    pub fn sync(&mut self) -> Result<()> {
        if self.mode == AccessMode::ReadWrite && self.synced_len != self.len {
            self.file.sync_all()?;
            self.synced_len = self.len;
        }
        Ok(())
    }

    /// Commit appended values and release the handle
    ///
    /// The values count as committed even if the final sync fails; only a
    /// drop without `close` rolls them back.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.sync()
    }
}

impl Drop for ValueArray {
    fn drop(&mut self) {
        if self.closed || self.mode != AccessMode::ReadWrite || self.len == self.committed_len {
            return;
        }
        tracing::warn!(
            path = %self.path.display(),
            "value array dropped without close, truncating {} -> {} values",
            self.len,
            self.committed_len
        );
        if let Err(e) = self.file.set_len(self.committed_len * VALUE_SIZE) {
            tracing::error!(path = %self.path.display(), "failed to roll back value array: {}", e);
        }
    }
}
