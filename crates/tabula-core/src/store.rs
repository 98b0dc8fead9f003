//! Table store - the set of loaded sheets

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::sheet::Sheet;
use crate::table::Table;
use crate::value::Scalar;
use crate::MAX_SHEET_NAME_LEN;

/// An ordered, name-keyed collection of sheets
///
/// Sheet names are unique (case-insensitively) and must be usable inside
/// formula references, so characters with meaning in the formula syntax are
/// rejected.
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    sheets: Vec<Sheet>,
}

impl TableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of sheets
    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// Check if the store has no sheets
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Sheet names in load order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    /// Check if a sheet exists
    pub fn contains(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    /// Get a sheet by name
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    /// Get a mutable sheet by name
    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }

    /// Get a sheet by name or fail with [`Error::SheetNotFound`]
    pub fn require(&self, name: &str) -> Result<&Sheet> {
        self.sheet(name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))
    }

    /// Get a mutable sheet by name or fail with [`Error::SheetNotFound`]
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        self.sheet_mut(name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))
    }

    /// Canonical table of a sheet
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.sheet(name).map(Sheet::table)
    }

    /// Iterate over all sheets
    pub fn sheets(&self) -> impl Iterator<Item = &Sheet> {
        self.sheets.iter()
    }

    /// Add a table as a new sheet, returning its index
    pub fn add_sheet(&mut self, table: Table) -> Result<usize> {
        self.validate_sheet_name(table.name())?;
        self.sheets.push(Sheet::new(table));
        Ok(self.sheets.len() - 1)
    }

    /// Remove a sheet by name
    pub fn remove_sheet(&mut self, name: &str) -> Result<Sheet> {
        let index = self
            .sheets
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
        Ok(self.sheets.remove(index))
    }

    // === Table Store interface used by the formula engine ===

    /// Column names of a sheet
    pub fn columns(&self, sheet: &str) -> Option<&[String]> {
        self.table(sheet).map(Table::columns)
    }

    /// Row count of a sheet
    pub fn row_count(&self, sheet: &str) -> Option<usize> {
        self.table(sheet).map(Table::row_count)
    }

    /// Read a cell
    pub fn cell(&self, sheet: &str, row: usize, column: &str) -> Option<&Scalar> {
        self.table(sheet).and_then(|t| t.cell(row, column))
    }

    /// Write a whole column of a sheet (appending it if new)
    pub fn set_column(&mut self, sheet: &str, column: &str, values: Vec<Scalar>) -> Result<()> {
        self.require_mut(sheet)?.set_column(column, values)
    }

    /// Current visibility set of a sheet (`None` = every row visible)
    pub fn visibility(&self, sheet: &str) -> Option<&BTreeSet<usize>> {
        self.sheet(sheet).and_then(Sheet::visibility)
    }

    /// Validate a sheet name
    fn validate_sheet_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidSheetName("Sheet name cannot be empty".into()));
        }
        if name.chars().count() > MAX_SHEET_NAME_LEN {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name too long (max {} characters)",
                MAX_SHEET_NAME_LEN
            )));
        }

        // Sheet names appear in `Sheet.Field` references
        if let Some(c) = name.chars().find(|c| !(c.is_alphanumeric() || *c == '_')) {
            return Err(Error::InvalidSheetName(format!(
                "Sheet name cannot contain '{}'",
                c
            )));
        }
        if name.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidSheetName(
                "Sheet name cannot be a number".into(),
            ));
        }

        // Check for duplicate names (case-insensitive)
        let name_lower = name.to_lowercase();
        if self
            .sheets
            .iter()
            .any(|s| s.name().to_lowercase() == name_lower)
        {
            return Err(Error::DuplicateSheetName(name.into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> Table {
        let mut t = Table::with_columns(name, ["A"]).unwrap();
        t.push_row([1]).unwrap();
        t
    }

    #[test]
    fn test_add_and_lookup() {
        let mut store = TableStore::new();
        assert_eq!(store.add_sheet(table("Parts")).unwrap(), 0);
        assert_eq!(store.add_sheet(table("Stock")).unwrap(), 1);

        assert_eq!(store.sheet_names(), vec!["Parts", "Stock"]);
        assert_eq!(store.row_count("Stock"), Some(1));
        assert_eq!(store.cell("Parts", 0, "A"), Some(&Scalar::Number(1.0)));
        assert!(store.columns("Missing").is_none());
    }

    #[test]
    fn test_duplicate_name() {
        let mut store = TableStore::new();
        store.add_sheet(table("Parts")).unwrap();

        // Case-insensitive duplicate check
        assert!(store.add_sheet(table("PARTS")).is_err());
        assert!(store.add_sheet(table("parts")).is_err());
    }

    #[test]
    fn test_invalid_sheet_name() {
        let mut store = TableStore::new();

        assert!(store.add_sheet(table("")).is_err());
        assert!(store.add_sheet(table("My.Sheet")).is_err());
        assert!(store.add_sheet(table("Sheet 1")).is_err());
        assert!(store.add_sheet(table("Sheet[1]")).is_err());
        assert!(store.add_sheet(table("2024")).is_err());

        let long_name = "A".repeat(MAX_SHEET_NAME_LEN + 1);
        assert!(store.add_sheet(table(&long_name)).is_err());

        assert!(store.add_sheet(table("Sheet_2024")).is_ok());
    }

    #[test]
    fn test_set_column_and_remove() {
        let mut store = TableStore::new();
        store.add_sheet(table("Parts")).unwrap();
        store
            .set_column("Parts", "B", vec![Scalar::text("x")])
            .unwrap();
        assert_eq!(store.columns("Parts").unwrap(), ["A", "B"]);
        assert!(store.set_column("Nope", "B", vec![]).is_err());

        store.remove_sheet("Parts").unwrap();
        assert!(store.is_empty());
        assert!(store.remove_sheet("Parts").is_err());
    }
}
