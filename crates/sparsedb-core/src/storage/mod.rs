//! Storage layer - per-column value arrays and the stores built on them
//!
//! Each column is a directory holding:
//! - `data/col.data`: values as little-endian `f64`, in ascending item order
//! - `map/col.map`: roaring presence bitmap of the items those values belong to
//!
//! The i-th value belongs to the i-th smallest index in the bitmap, so the two
//! files must always agree on length.

pub mod column;
pub mod slice;
pub mod value_array;
pub mod vector;

pub use column::ColumnStore;
pub use slice::{BlockSlice, ColumnSlice};
pub use value_array::ValueArray;
pub use vector::{ColumnVector, SparseMatrix};
