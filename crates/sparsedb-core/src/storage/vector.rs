//! Read-side views: sparse column vectors and the matrices built from them

/// Sparse vector over `[0, dimension)`
///
/// `indices` is strictly ascending and `values[i]` belongs to `indices[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnVector {
    dimension: u64,
    indices: Vec<u32>,
    values: Vec<f64>,
}

impl ColumnVector {
    pub(crate) fn from_parts(dimension: u64, indices: Vec<u32>, values: Vec<f64>) -> Self {
        debug_assert_eq!(indices.len(), values.len());
        debug_assert!(indices.windows(2).all(|w| w[0] < w[1]));
        Self {
            dimension,
            indices,
            values,
        }
    }

    /// Size of the index domain
    pub fn dimension(&self) -> u64 {
        self.dimension
    }

    /// Stored indices, ascending
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Stored values, parallel to [`indices`](Self::indices)
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Value at `index`, if stored
    pub fn get(&self, index: u32) -> Option<f64> {
        self.indices
            .binary_search(&index)
            .ok()
            .map(|pos| self.values[pos])
    }

    /// `(index, value)` pairs in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Same vector over `[0, dimension)`, dropping entries outside it
    pub fn restrict(mut self, dimension: u64) -> Self {
        let keep = self
            .indices
            .partition_point(|&index| u64::from(index) < dimension);
        self.indices.truncate(keep);
        self.values.truncate(keep);
        self.dimension = dimension;
        self
    }

    /// Gather the entries at `items`, in the order given
    ///
    /// Row `i` of the result corresponds to `items[i]`; items without a
    /// stored value stay absent.
    pub fn select(&self, items: &[u32]) -> Self {
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for (row, &item) in items.iter().enumerate() {
            if let Some(value) = self.get(item) {
                indices.push(row as u32);
                values.push(value);
            }
        }
        Self::from_parts(items.len() as u64, indices, values)
    }
}

/// Items-by-columns sparse matrix, stored column-major
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    rows: u64,
    columns: Vec<ColumnVector>,
}

impl SparseMatrix {
    pub(crate) fn new(rows: u64, columns: Vec<ColumnVector>) -> Self {
        Self { rows, columns }
    }

    /// Number of rows (items)
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.columns.len()
    }

    /// Column `col` as a sparse vector over the rows
    pub fn column(&self, col: usize) -> Option<&ColumnVector> {
        self.columns.get(col)
    }

    /// Stored value at `(row, col)`
    pub fn get(&self, row: u32, col: usize) -> Option<f64> {
        self.columns.get(col).and_then(|c| c.get(row))
    }

    /// Total stored entries
    pub fn nnz(&self) -> usize {
        self.columns.iter().map(ColumnVector::nnz).sum()
    }

    /// Row-major dense copy with absent entries as `0.0`
    pub fn to_dense(&self) -> Vec<Vec<f64>> {
        let mut dense = vec![vec![0.0; self.columns.len()]; self.rows as usize];
        for (col, column) in self.columns.iter().enumerate() {
            for (row, value) in column.iter() {
                if let Some(cells) = dense.get_mut(row as usize) {
                    cells[col] = value;
                }
            }
        }
        dense
    }
}
