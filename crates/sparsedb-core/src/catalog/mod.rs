//! Catalog module - column registry, global shape and query entry point
//!
//! A catalog owns the ordered list of column names and the shape
//! `(row_count, col_count)` persisted in `meta.json`, plus one
//! [`ColumnStore`] per column. Reads and appends fan out over the column
//! stores; [`Catalog::find`] evaluates postfix set queries over their
//! presence indexes.
//!
//! # Append policy
//!
//! [`Catalog::append_blocks`] validates the whole batch (block widths,
//! column counts, index ordering against what each column already stores)
//! before any file is opened for writing, so a rejected batch leaves no
//! trace. Once writing starts, columns are committed one by one: an I/O
//! failure on column `k` leaves columns `0..k` committed, rolls column `k`
//! back, and leaves the persisted shape unchanged.

pub mod metadata;

use crate::config::StoreConfig;
use crate::layout::StoreLayout;
use crate::query::{BoolOp, BoolTokenizer, ReversePolish, SetAlgebra};
use crate::storage::{BlockSlice, ColumnSlice, ColumnStore, SparseMatrix};
use crate::{Error, MAX_ROWS, Result};
use roaring::RoaringBitmap;
use std::collections::HashMap;
use tracing::{debug, info};

pub use metadata::{CatalogMetadata, Shape};

/// Sparse column database
///
/// Exclusively owned by its caller; no internal locking.
#[derive(Debug)]
pub struct Catalog {
    layout: StoreLayout,
    meta: CatalogMetadata,
    column_index: HashMap<String, usize>,
    columns: Vec<ColumnStore>,
}

impl Catalog {
    /// Whether catalog metadata is persisted for `config`
    pub fn exists(config: &StoreConfig) -> bool {
        StoreLayout::new(config).meta_path().is_file()
    }

    /// Create a catalog with `columns` and no rows, then attach to it
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sparsedb_core::{Catalog, StoreConfig};
    ///
    /// let config = StoreConfig::new("./data", "events");
    /// let catalog = Catalog::create(&config, &["clicked", "purchased"]).unwrap();
    /// assert_eq!(catalog.shape().col_count, 2);
    /// ```
    pub fn create<S: AsRef<str>>(config: &StoreConfig, columns: &[S]) -> Result<Self> {
        let layout = StoreLayout::new(config);
        if layout.meta_path().is_file() {
            return Err(Error::AlreadyExists(format!(
                "catalog {}",
                layout.root().display()
            )));
        }

        let names: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            validate_column_name(name)?;
            if index.insert(name.as_str(), i).is_some() {
                return Err(Error::DuplicateColumn(name.clone()));
            }
        }

        let columns_dir = layout.columns_dir();
        for name in &names {
            if ColumnStore::new(&columns_dir, name).has_data()? {
                return Err(Error::AlreadyExists(format!(
                    "column '{}' already holds data under {}",
                    name,
                    columns_dir.display()
                )));
            }
        }

        layout.ensure_dirs()?;
        for name in &names {
            ColumnStore::initialize(&columns_dir, name)?;
        }
        CatalogMetadata::new(names).store(&layout.meta_path())?;

        info!(
            catalog = %layout.root().display(),
            columns = columns.len(),
            "created catalog"
        );
        Self::attach(config)
    }

    /// Load an existing catalog
    pub fn attach(config: &StoreConfig) -> Result<Self> {
        let layout = StoreLayout::new(config);
        let meta = CatalogMetadata::load(&layout.meta_path())?;

        let columns_dir = layout.columns_dir();
        let column_index = meta
            .columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let columns = meta
            .columns
            .iter()
            .map(|name| ColumnStore::new(&columns_dir, name))
            .collect();

        info!(
            catalog = %layout.root().display(),
            rows = meta.shape.row_count,
            columns = meta.shape.col_count,
            "attached catalog"
        );

        Ok(Self {
            layout,
            meta,
            column_index,
            columns,
        })
    }

    /// Attach if the catalog exists, otherwise create it with `columns`
    pub fn open_or_create<S: AsRef<str>>(config: &StoreConfig, columns: &[S]) -> Result<Self> {
        if Self::exists(config) {
            Self::attach(config)
        } else {
            Self::create(config, columns)
        }
    }

    /// Current `(row_count, col_count)`
    pub fn shape(&self) -> Shape {
        self.meta.shape
    }

    /// Column names in catalog order
    pub fn column_names(&self) -> &[String] {
        &self.meta.columns
    }

    /// Store for column `name`
    ///
    /// Writes go through [`Catalog::append_blocks`] so the shape stays in step.
    pub fn column(&self, name: &str) -> Result<&ColumnStore> {
        Ok(&self.columns[self.position(name)?])
    }

    /// Read a matrix of items by columns
    ///
    /// `items = None` selects every row `[0, row_count)`; otherwise row `i`
    /// of the result is `items[i]`. `columns = None` selects every column in
    /// catalog order; otherwise columns appear in the order given. Stored
    /// entries at or above `row_count` are not part of the result.
    pub fn read(&self, items: Option<&[u32]>, columns: Option<&[&str]>) -> Result<SparseMatrix> {
        let positions = match columns {
            Some(names) => names
                .iter()
                .map(|name| self.position(name))
                .collect::<Result<Vec<_>>>()?,
            None => (0..self.columns.len()).collect(),
        };

        let row_count = self.meta.shape.row_count;
        if let Some(items) = items {
            if let Some(&item) = items.iter().find(|&&i| u64::from(i) >= row_count) {
                return Err(Error::shape(format!(
                    "item {} outside row_count {}",
                    item, row_count
                )));
            }
        }

        let mut vectors = Vec::with_capacity(positions.len());
        for position in positions {
            let vector = self.columns[position].read()?;
            vectors.push(match items {
                Some(items) => vector.select(items),
                None => vector.restrict(row_count),
            });
        }

        let rows = items.map_or(row_count, |items| items.len() as u64);
        Ok(SparseMatrix::new(rows, vectors))
    }

    /// Append multi-column blocks and grow `row_count` to cover them
    ///
    /// Each block carries one slice per catalog column. Returns the new
    /// shape. See the module docs for the failure policy.
    pub fn append_blocks<I>(&mut self, blocksize: u32, blocks: I) -> Result<Shape>
    where
        I: IntoIterator<Item = (u32, BlockSlice)>,
    {
        if blocksize == 0 {
            return Err(Error::shape("blocksize must be positive"));
        }

        let n_cols = self.columns.len();
        let mut per_column: Vec<Vec<(u32, ColumnSlice)>> = vec![Vec::new(); n_cols];
        let mut batch_extent = 0u64;
        let mut n_blocks = 0usize;

        for (block_index, block) in blocks {
            if block.width() != blocksize {
                return Err(Error::shape(format!(
                    "block {}: width {} does not match blocksize {}",
                    block_index,
                    block.width(),
                    blocksize
                )));
            }
            if block.n_cols() != n_cols {
                return Err(Error::shape(format!(
                    "block {}: {} columns, catalog has {}",
                    block_index,
                    block.n_cols(),
                    n_cols
                )));
            }

            let extent = (u64::from(block_index) + 1) * u64::from(blocksize);
            if extent > MAX_ROWS {
                return Err(Error::shape(format!(
                    "block {}: extent {} exceeds the 2^32 item domain",
                    block_index, extent
                )));
            }
            batch_extent = batch_extent.max(extent);
            n_blocks += 1;

            for (column, slice) in per_column.iter_mut().zip(block.split()) {
                column.push((block_index, slice));
            }
        }

        let prepared = self
            .columns
            .iter()
            .zip(&per_column)
            .map(|(store, batch)| store.prepare_append(blocksize, batch))
            .collect::<Result<Vec<_>>>()?;

        for append in prepared {
            append.commit()?;
        }

        let mut meta = self.meta.clone();
        meta.shape.row_count = meta.shape.row_count.max(batch_extent);
        meta.store(&self.layout.meta_path())?;
        self.meta = meta;

        debug!(
            blocks = n_blocks,
            blocksize,
            rows = self.meta.shape.row_count,
            "appended blocks to catalog"
        );
        Ok(self.meta.shape)
    }

    /// Copy of column `name`'s presence set within `[0, row_count)`
    pub fn presence(&self, name: &str) -> Result<RoaringBitmap> {
        let mut bitmap = self.column(name)?.presence()?;
        let row_count = self.meta.shape.row_count;
        if row_count < MAX_ROWS {
            bitmap.remove_range(row_count as u32..);
        }
        Ok(bitmap)
    }

    /// Evaluate a postfix set expression over column presence sets
    ///
    /// Operators: `&` and, `|` or, `^` xor, `-` difference, `!` not (within
    /// `[0, row_count)`). Returns matching item indices in ascending order.
    ///
    /// ```no_run
    /// # use sparsedb_core::{Catalog, StoreConfig};
    /// # let catalog = Catalog::attach(&StoreConfig::default()).unwrap();
    /// // items that clicked but never purchased
    /// let items = catalog.find("clicked purchased -").unwrap();
    /// ```
    pub fn find(&self, statement: &str) -> Result<Vec<u32>> {
        Ok(self.find_bitmap(statement)?.iter().collect())
    }

    /// Like [`find`](Self::find) but returns the bitmap itself
    pub fn find_bitmap(&self, statement: &str) -> Result<RoaringBitmap> {
        let rpn = ReversePolish::new(
            BoolTokenizer,
            SetAlgebra::new(self.meta.shape.row_count),
            |name: &str| self.presence(name),
        );
        let result: RoaringBitmap = rpn.execute(statement)?;
        debug!(statement, matches = result.len(), "evaluated query");
        Ok(result)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.column_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }
}

/// Reject names that cannot be a directory or a query operand
fn validate_column_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
        || BoolOp::ALL.iter().any(|op| name.contains(op.symbol()));
    if bad {
        return Err(Error::InvalidColumnName(name.to_string()));
    }
    Ok(())
}
