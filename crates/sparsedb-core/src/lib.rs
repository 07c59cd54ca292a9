//! SparseDB Core - column-oriented sparse storage engine
//!
//! Every column stores a sparse vector of `f64` values over a shared item
//! domain `[0, row_count)` with `row_count <= 2^32`:
//! - a roaring bitmap of the item indices holding a value (presence index)
//! - an append-only array of those values in ascending item order
//!
//! Data arrives in fixed-width blocks; item `i` of block `b` is global item
//! `b * blocksize + i`. Boolean set queries over presence indexes are written
//! in postfix form (`"a b & c |"`) and evaluated by a generic stack machine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Catalog                     │
//! │   (column registry, shape, read/append/find) │
//! └──────┬──────────────────────────────┬───────┘
//!        │                              │
//! ┌──────┴───────────────┐   ┌──────────┴───────────┐
//! │     Column Stores     │   │    Query Engine      │
//! │ (value array + index) │   │ (RPN over bitmaps)   │
//! └──────┬───────────────┘   └──────────────────────┘
//!        │
//! ┌──────┴───────────────────────────────────────┐
//! │        Presence Index (roaring bitmap)        │
//! └───────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod layout;
pub mod query;
pub mod storage;

pub use catalog::{Catalog, Shape};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use index::{AccessMode, PresenceIndex};
pub use storage::{BlockSlice, ColumnSlice, ColumnStore, ColumnVector, SparseMatrix};

/// Size of the item domain (indices are `u32`)
pub const MAX_ROWS: u64 = 1 << 32;
