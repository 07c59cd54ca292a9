//! Column store - one presence index plus its parallel value array

use super::slice::ColumnSlice;
use super::value_array::ValueArray;
use super::vector::ColumnVector;
use crate::index::{AccessMode, PresenceIndex};
use crate::layout::ColumnLayout;
use crate::{Error, MAX_ROWS, Result};
use roaring::RoaringBitmap;
use std::path::Path;
use tracing::debug;

/// Persistent sparse column
///
/// Holds only paths; every operation opens its files and releases them
/// before returning.
#[derive(Debug, Clone)]
pub struct ColumnStore {
    name: String,
    layout: ColumnLayout,
}

impl ColumnStore {
    /// Handle on an existing column under `columns_dir`
    pub fn new(columns_dir: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            layout: ColumnLayout::new(columns_dir, name),
        }
    }

    /// Create the column's empty files if they are missing
    pub fn initialize(columns_dir: &Path, name: &str) -> Result<Self> {
        let store = Self::new(columns_dir, name);
        store.layout.ensure_dirs()?;

        if !store.layout.data_path().is_file() {
            ValueArray::open(store.layout.data_path(), AccessMode::ReadWrite)?.close()?;
        }
        if !store.layout.map_path().is_file() {
            PresenceIndex::open(store.layout.map_path(), AccessMode::ReadWrite)?.close()?;
        }

        Ok(store)
    }

    /// Column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load the column as a sparse vector over the full 32-bit domain
    pub fn read(&self) -> Result<ColumnVector> {
        let mut array = ValueArray::open(self.layout.data_path(), AccessMode::Read)?;
        let presence = PresenceIndex::open(self.layout.map_path(), AccessMode::Read)?;

        let values = array.read_all()?;
        array.close()?;
        let bitmap = presence.into_bitmap();

        if values.len() as u64 != bitmap.len() {
            return Err(Error::corrupt_column(
                &self.name,
                format!(
                    "{} values but {} presence entries",
                    values.len(),
                    bitmap.len()
                ),
            ));
        }

        Ok(ColumnVector::from_parts(
            MAX_ROWS,
            bitmap.iter().collect(),
            values,
        ))
    }

    /// Copy of the column's presence set
    pub fn presence(&self) -> Result<RoaringBitmap> {
        Ok(PresenceIndex::open(self.layout.map_path(), AccessMode::Read)?.into_bitmap())
    }

    /// Largest stored item index
    pub fn stored_max(&self) -> Result<Option<u32>> {
        Ok(self.presence()?.max())
    }

    /// True when either file already holds entries
    pub fn has_data(&self) -> Result<bool> {
        let data = self.layout.data_path();
        if data.is_file() && std::fs::metadata(&data)?.len() > 0 {
            return Ok(true);
        }
        if !self.layout.map_path().is_file() {
            return Ok(false);
        }
        Ok(!self.presence()?.is_empty())
    }

    /// Append `(block_index, slice)` pairs; returns `(max block_index + 1) * blocksize`
    ///
    /// Global index = `block_index * blocksize + local index`. Globals must
    /// rise strictly across the whole call and stay above anything already
    /// stored. The batch is validated before either file is written.
    pub(crate) fn append_blocks(
        &self,
        blocksize: u32,
        blocks: &[(u32, ColumnSlice)],
    ) -> Result<u64> {
        self.prepare_append(blocksize, blocks)?.commit()
    }

    /// Open both files for writing and validate `blocks` against them
    ///
    /// Nothing is written until [`PreparedAppend::commit`]; dropping the
    /// result leaves the column untouched.
    pub(crate) fn prepare_append(
        &self,
        blocksize: u32,
        blocks: &[(u32, ColumnSlice)],
    ) -> Result<PreparedAppend<'_>> {
        let pending = PendingAppend::build(&self.name, blocksize, blocks)?;

        self.layout.ensure_dirs()?;
        let array = ValueArray::open(self.layout.data_path(), AccessMode::ReadWrite)?;
        let presence = PresenceIndex::open(self.layout.map_path(), AccessMode::ReadWrite)?;

        if array.len() != presence.current().len() {
            return Err(Error::corrupt_column(
                &self.name,
                format!(
                    "{} values but {} presence entries",
                    array.len(),
                    presence.current().len()
                ),
            ));
        }
        pending.check_after(&self.name, presence.current().max())?;

        Ok(PreparedAppend {
            column: &self.name,
            blocks: blocks.len(),
            pending,
            array,
            presence,
        })
    }
}

/// A validated append holding both column files open for writing
pub(crate) struct PreparedAppend<'a> {
    column: &'a str,
    blocks: usize,
    pending: PendingAppend,
    array: ValueArray,
    presence: PresenceIndex,
}

impl PreparedAppend<'_> {
    /// Write the batch; returns its extent
    ///
    /// Values are synced before the presence index is replaced. The presence
    /// write is the commit point: if it fails, the value array is dropped
    /// unclosed and truncated back.
    pub(crate) fn commit(self) -> Result<u64> {
        let Self {
            column,
            blocks,
            pending,
            mut array,
            mut presence,
        } = self;

        array.append(&pending.values)?;
        array.sync()?;
        let added = presence.update(pending.indices.iter().copied());
        debug_assert_eq!(added, pending.indices.len() as u64);

        presence.close()?;
        array.close()?;

        debug!(
            column,
            blocks,
            entries = pending.indices.len(),
            extent = pending.extent,
            "appended blocks"
        );

        Ok(pending.extent)
    }
}

/// Validated, globally indexed entries of one append call
#[derive(Debug, Default)]
pub(crate) struct PendingAppend {
    pub(crate) indices: Vec<u32>,
    pub(crate) values: Vec<f64>,
    pub(crate) extent: u64,
}

impl PendingAppend {
    pub(crate) fn build(column: &str, blocksize: u32, blocks: &[(u32, ColumnSlice)]) -> Result<Self> {
        if blocksize == 0 {
            return Err(Error::shape("blocksize must be positive"));
        }

        let mut pending = Self::default();
        for (block_index, slice) in blocks {
            if slice.width() != blocksize {
                return Err(Error::shape(format!(
                    "block {}: slice width {} does not match blocksize {}",
                    block_index,
                    slice.width(),
                    blocksize
                )));
            }

            let base = u64::from(*block_index) * u64::from(blocksize);
            let end = base + u64::from(blocksize);
            if end > MAX_ROWS {
                return Err(Error::shape(format!(
                    "block {}: extent {} exceeds the 2^32 item domain",
                    block_index, end
                )));
            }

            for (&local, &value) in slice.indices().iter().zip(slice.values()) {
                let global = (base + u64::from(local)) as u32;
                if let Some(&previous) = pending.indices.last() {
                    if global <= previous {
                        return Err(Error::OutOfOrder {
                            column: column.to_string(),
                            index: global,
                            previous,
                        });
                    }
                }
                pending.indices.push(global);
                pending.values.push(value);
            }

            pending.extent = pending.extent.max(end);
        }

        Ok(pending)
    }

    /// Reject the batch if its first index is not above `stored_max`
    pub(crate) fn check_after(&self, column: &str, stored_max: Option<u32>) -> Result<()> {
        match (self.indices.first(), stored_max) {
            (Some(&first), Some(previous)) if first <= previous => Err(Error::OutOfOrder {
                column: column.to_string(),
                index: first,
                previous,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn slice(width: u32, indices: &[u32], values: &[f64]) -> ColumnSlice {
        ColumnSlice::new(width, indices.to_vec(), values.to_vec()).unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();
        store
            .append_blocks(4, &[(0, slice(4, &[1], &[2.0]))])
            .unwrap();

        let again = ColumnStore::initialize(dir.path(), "x").unwrap();
        let vector = again.read().unwrap();
        assert_eq!(vector.indices(), &[1]);
        assert_eq!(vector.values(), &[2.0]);
    }

    #[test]
    fn test_read_uninitialized() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::new(dir.path(), "missing");
        assert!(matches!(store.read(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_append_offsets_by_block() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();

        let extent = store
            .append_blocks(
                4,
                &[
                    (0, slice(4, &[0, 2], &[1.0, 2.0])),
                    (2, slice(4, &[1], &[3.0])),
                ],
            )
            .unwrap();
        assert_eq!(extent, 12);

        let vector = store.read().unwrap();
        assert_eq!(vector.indices(), &[0, 2, 9]);
        assert_eq!(vector.values(), &[1.0, 2.0, 3.0]);
        assert_eq!(vector.dimension(), MAX_ROWS);
    }

    #[test]
    fn test_empty_block_still_extends() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();
        let extent = store.append_blocks(8, &[(3, ColumnSlice::empty(8))]).unwrap();
        assert_eq!(extent, 32);
        assert_eq!(store.read().unwrap().nnz(), 0);
    }

    #[test]
    fn test_width_mismatch_names_block() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();

        let result = store.append_blocks(
            4,
            &[(0, slice(4, &[0], &[1.0])), (5, slice(8, &[0], &[1.0]))],
        );
        match result {
            Err(Error::Shape(msg)) => assert!(msg.contains("block 5")),
            other => panic!("expected shape error, got {:?}", other),
        }
        assert_eq!(store.read().unwrap().nnz(), 0);
    }

    #[test]
    fn test_rejects_non_ascending_blocks() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();

        let result = store.append_blocks(
            4,
            &[(1, slice(4, &[0], &[1.0])), (0, slice(4, &[3], &[2.0]))],
        );
        assert!(matches!(result, Err(Error::OutOfOrder { index: 3, previous: 4, .. })));
        assert_eq!(store.read().unwrap().nnz(), 0);
    }

    #[test]
    fn test_rejects_overlap_with_stored() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();
        store
            .append_blocks(4, &[(1, slice(4, &[2], &[1.0]))])
            .unwrap();

        let result = store.append_blocks(4, &[(1, slice(4, &[2], &[1.0]))]);
        assert!(matches!(result, Err(Error::OutOfOrder { index: 6, previous: 6, .. })));

        let vector = store.read().unwrap();
        assert_eq!(vector.indices(), &[6]);
        assert_eq!(vector.values(), &[1.0]);
    }

    #[test]
    fn test_domain_overflow() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();

        let width = 1u32 << 16;
        assert_eq!(
            store
                .append_blocks(width, &[(u16::MAX as u32, ColumnSlice::empty(width))])
                .unwrap(),
            MAX_ROWS
        );
        let result = store.append_blocks(width, &[(1 << 16, ColumnSlice::empty(width))]);
        assert!(matches!(result, Err(Error::Shape(_))));
    }

    #[test]
    fn test_failed_presence_write_rolls_back_values() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();
        store
            .append_blocks(4, &[(0, slice(4, &[1], &[1.0]))])
            .unwrap();

        // a directory in place of the temp file makes the bitmap write fail
        let layout = ColumnLayout::new(dir.path(), "x");
        let blocker = layout.map_path().with_extension("map.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let result = store.append_blocks(4, &[(1, slice(4, &[0, 2], &[2.0, 3.0]))]);
        assert!(matches!(result, Err(Error::Io(_))));

        std::fs::remove_dir(&blocker).unwrap();
        let vector = store.read().unwrap();
        assert_eq!(vector.indices(), &[1]);
        assert_eq!(vector.values(), &[1.0]);

        store
            .append_blocks(4, &[(1, slice(4, &[0], &[4.0]))])
            .unwrap();
        assert_eq!(store.read().unwrap().indices(), &[1, 4]);
    }

    #[test]
    fn test_dropped_preparation_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();
        let blocks = [(0, slice(4, &[0], &[1.0]))];

        drop(store.prepare_append(4, &blocks).unwrap());
        assert!(!store.has_data().unwrap());

        assert_eq!(store.prepare_append(4, &blocks).unwrap().commit().unwrap(), 4);
        assert!(store.has_data().unwrap());
    }

    #[test]
    fn test_detects_length_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = ColumnStore::initialize(dir.path(), "x").unwrap();
        store
            .append_blocks(4, &[(0, slice(4, &[0, 1], &[1.0, 2.0]))])
            .unwrap();

        let data = ColumnLayout::new(dir.path(), "x").data_path();
        std::fs::write(&data, 1.0f64.to_le_bytes()).unwrap();

        assert!(matches!(store.read(), Err(Error::CorruptColumn { .. })));
    }
}
