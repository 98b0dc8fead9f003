//! # tabula
//!
//! A Rust library for tables with computed formula fields.
//!
//! Tabula loads tables (from CSV or built in code) into a [`TableStore`] and
//! lets you add *formula fields*: named columns computed row by row from an
//! expression over the table's own fields, fixed values of other sheets and
//! whole-table aggregates.
//!
//! ## Features
//!
//! - Read and write CSV files
//! - Row filters, multi-level sorting and visible-column projections
//! - Formula fields with `Number`, `Text` and `Auto` result types
//! - Cross-sheet references, `COUNT`, `LOOKUP` and `HAS_VALUE` aggregates
//! - Reusable formula templates stored as JSON
//!
//! ## Example
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let mut parts = Table::with_columns("Parts", ["Length", "Width"]).unwrap();
//! parts.push_row([10, 5]).unwrap();
//! parts.push_row([4, 2]).unwrap();
//!
//! let mut store = TableStore::new();
//! store.add_sheet(parts).unwrap();
//!
//! let mut engine = FormulaEngine::new();
//! engine
//!     .create_formula_field(&mut store, "Parts", "Area", "[Length] * [Width]", ResultType::Number)
//!     .unwrap();
//!
//! assert_eq!(store.cell("Parts", 1, "Area"), Some(&Scalar::Number(8.0)));
//!
//! // Save to file
//! // store.save_csv("Parts", "parts.csv").unwrap();
//! ```

pub mod prelude;
pub mod templates;

pub use templates::{FormulaTemplate, TemplateError, TemplateResult, TemplateStore};

// Re-export core types
pub use tabula_core::{
    apply_filters, sort_rows, Error, FilterKind, Result, RowFilter, Scalar, ScalarKey, Sheet,
    SortKey, SortOrder, Table, TableStore, MAX_SHEET_NAME_LEN,
};

// Re-export formula types
pub use tabula_formula::{
    evaluate, parse_expression, parse_references, validate_references, Aggregate, ColumnValues,
    EngineError, EngineOptions, EngineResult, EvaluationContext, EvaluationStats, Expr,
    FieldRegistry, FormulaEngine, FormulaError, FormulaField, FormulaResult, ParsedFormula,
    Reference, ResultType, ValidationError, ValidationErrorKind, Value,
};

// Re-export I/O types
pub use tabula_csv::{CsvError, CsvReadOptions, CsvReader, CsvWriteOptions, CsvWriter, LineTerminator};

use std::path::Path;

/// Extension trait for TableStore to add file I/O
pub trait TableStoreExt {
    /// Load a CSV file as a new sheet named after the file stem
    ///
    /// Returns the new sheet's name.
    fn open_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<String>;

    /// Load a CSV file as a new sheet with an explicit name
    fn open_csv_as<P: AsRef<Path>>(&mut self, path: P, name: &str) -> Result<String>;

    /// Save a sheet's visible projection to a CSV file
    fn save_csv<P: AsRef<Path>>(&self, sheet: &str, path: P) -> Result<()>;
}

impl TableStoreExt for TableStore {
    fn open_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<String> {
        let path = path.as_ref();
        let table = CsvReader::read_file(path, &CsvReadOptions::default())
            .map_err(|e| Error::other(format!("{}: {}", path.display(), e)))?;
        add_loaded(self, table)
    }

    fn open_csv_as<P: AsRef<Path>>(&mut self, path: P, name: &str) -> Result<String> {
        let path = path.as_ref();
        let table = CsvReader::read_file_as(path, name, &CsvReadOptions::default())
            .map_err(|e| Error::other(format!("{}: {}", path.display(), e)))?;
        add_loaded(self, table)
    }

    fn save_csv<P: AsRef<Path>>(&self, sheet: &str, path: P) -> Result<()> {
        let view = self.require(sheet)?.view();
        CsvWriter::write_file(&view, path, &CsvWriteOptions::default())
            .map_err(|e| Error::other(e.to_string()))
    }
}

fn add_loaded(store: &mut TableStore, table: Table) -> Result<String> {
    let name = table.name().to_string();
    store.add_sheet(table)?;
    log::info!("Loaded sheet '{}'", name);
    Ok(name)
}
