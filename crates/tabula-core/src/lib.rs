//! # tabula-core
//!
//! Core data structures for the tabula table editor.
//!
//! This crate provides the table store consumed by the formula engine:
//! - [`Scalar`] - Cell values (number, text or empty)
//! - [`Table`] - A named table of ordered columns and rows
//! - [`Sheet`] - A table plus its view state (visible columns, row filters)
//! - [`TableStore`] - The set of loaded sheets, addressable by name
//! - [`RowFilter`] - Column predicates producing a sheet's visibility set
//! - [`SortKey`] - Multi-level ordering of a sheet's view
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{Scalar, Table, TableStore};
//!
//! let mut parts = Table::with_columns("Parts", ["Length", "Width"]).unwrap();
//! parts.push_row([10, 5]).unwrap();
//!
//! let mut store = TableStore::new();
//! store.add_sheet(parts).unwrap();
//!
//! assert_eq!(store.cell("Parts", 0, "Width"), Some(&Scalar::Number(5.0)));
//! ```

pub mod error;
pub mod filter;
pub mod sheet;
pub mod sort;
pub mod store;
pub mod table;
pub mod value;

// Re-exports for convenience
pub use error::{Error, Result};
pub use filter::{apply_filters, FilterKind, RowFilter};
pub use sheet::Sheet;
pub use sort::{sort_rows, SortKey, SortOrder};
pub use store::TableStore;
pub use table::Table;
pub use value::{Scalar, ScalarKey};

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
