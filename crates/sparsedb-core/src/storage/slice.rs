//! Sparse append units
//!
//! A block covers `width` consecutive items starting at `block_index * width`.
//! [`ColumnSlice`] carries one column of a block; [`BlockSlice`] carries all
//! columns of a block in catalog order.

use crate::{Error, Result};

/// One column's entries within a block
///
/// Local indices are strictly ascending and below `width`, with one value
/// per index.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSlice {
    width: u32,
    indices: Vec<u32>,
    values: Vec<f64>,
}

impl ColumnSlice {
    /// Build a slice, validating its geometry
    pub fn new(width: u32, indices: Vec<u32>, values: Vec<f64>) -> Result<Self> {
        if indices.len() != values.len() {
            return Err(Error::shape(format!(
                "slice has {} indices but {} values",
                indices.len(),
                values.len()
            )));
        }
        if let Some(w) = indices.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::shape(format!(
                "slice indices not strictly ascending: {} then {}",
                w[0], w[1]
            )));
        }
        if let Some(&last) = indices.last() {
            if last >= width {
                return Err(Error::shape(format!(
                    "slice index {} outside width {}",
                    last, width
                )));
            }
        }

        Ok(Self {
            width,
            indices,
            values,
        })
    }

    /// Slice with no entries
    pub fn empty(width: u32) -> Self {
        Self {
            width,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Declared width (items covered by the block)
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Local indices, ascending
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Values parallel to [`indices`](Self::indices)
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }
}

/// All columns of one block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSlice {
    width: u32,
    columns: Vec<ColumnSlice>,
}

impl BlockSlice {
    /// Assemble a block from per-column slices of the same width
    pub fn from_columns(width: u32, columns: Vec<ColumnSlice>) -> Result<Self> {
        if let Some((col, slice)) = columns
            .iter()
            .enumerate()
            .find(|(_, slice)| slice.width != width)
        {
            return Err(Error::shape(format!(
                "column {} has width {}, block width is {}",
                col, slice.width, width
            )));
        }
        Ok(Self { width, columns })
    }

    /// Assemble a block from `(row, col, value)` entries in any order
    ///
    /// Entries are regrouped per column and sorted by row. A repeated
    /// `(row, col)` pair is a shape error.
    pub fn from_triplets<I>(width: u32, n_cols: usize, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, usize, f64)>,
    {
        let mut per_column: Vec<Vec<(u32, f64)>> = vec![Vec::new(); n_cols];
        for (row, col, value) in entries {
            if col >= n_cols {
                return Err(Error::shape(format!(
                    "entry column {} outside {} columns",
                    col, n_cols
                )));
            }
            per_column[col].push((row, value));
        }

        let columns = per_column
            .into_iter()
            .map(|mut entries| {
                entries.sort_by_key(|(row, _)| *row);
                let (indices, values) = entries.into_iter().unzip();
                ColumnSlice::new(width, indices, values)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { width, columns })
    }

    /// Block width
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of columns carried
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Per-column slices in column order
    pub fn columns(&self) -> &[ColumnSlice] {
        &self.columns
    }

    /// Split into one slice per column
    pub fn split(self) -> Vec<ColumnSlice> {
        self.columns
    }
}
