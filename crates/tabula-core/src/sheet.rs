//! Sheet type - a table plus its working view state

use std::collections::BTreeSet;

use crate::error::Result;
use crate::filter::{apply_filters, RowFilter};
use crate::sort::{sort_rows, SortKey};
use crate::table::Table;
use crate::value::Scalar;

/// A sheet in a [`TableStore`](crate::TableStore)
///
/// The sheet owns the canonical table (every column, every row) and the view
/// state the editor keeps around it: an optional visible-column projection,
/// the active row filters with the visibility set they produce, and the sort
/// levels that order the view.
#[derive(Debug, Clone)]
pub struct Sheet {
    /// Canonical data
    table: Table,
    /// Visible-column projection (None = all columns)
    visible_columns: Option<Vec<String>>,
    /// Active row filters
    filters: Vec<RowFilter>,
    /// Rows passing every filter (None = no row excluded)
    visibility: Option<BTreeSet<usize>>,
    /// Sort levels, primary first
    sort_keys: Vec<SortKey>,
}

impl Sheet {
    /// Wrap a table with no projection and no filters
    pub fn new(table: Table) -> Self {
        Self {
            table,
            visible_columns: None,
            filters: Vec::new(),
            visibility: None,
            sort_keys: Vec::new(),
        }
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        self.table.name()
    }

    /// Canonical table
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Mutable canonical table
    ///
    /// Callers that change rows should call [`Sheet::apply_filters`]
    /// afterwards to refresh the visibility set.
    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }

    // === Visible columns ===

    /// Visible-column projection, if one is set
    pub fn visible_columns(&self) -> Option<&[String]> {
        self.visible_columns.as_deref()
    }

    /// Set (or clear) the visible-column projection
    pub fn set_visible_columns(&mut self, columns: Option<Vec<String>>) {
        self.visible_columns = columns;
    }

    /// Add a column to the projection if a projection is set and the column
    /// is not already a member
    pub fn show_column(&mut self, column: &str) {
        if let Some(visible) = &mut self.visible_columns {
            if !visible.iter().any(|c| c == column) {
                visible.push(column.to_string());
            }
        }
    }

    /// Remove a column from the projection
    pub fn hide_column(&mut self, column: &str) {
        if let Some(visible) = &mut self.visible_columns {
            visible.retain(|c| c != column);
        }
    }

    // === Filters ===

    /// Active row filters
    pub fn filters(&self) -> &[RowFilter] {
        &self.filters
    }

    /// Add a filter and recompute the visibility set
    pub fn add_filter(&mut self, filter: RowFilter) {
        self.filters.push(filter);
        self.apply_filters();
    }

    /// Remove every filter
    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.visibility = None;
    }

    /// Recompute the visibility set from the active filters
    pub fn apply_filters(&mut self) {
        self.visibility = apply_filters(&self.table, &self.filters);
    }

    /// Rows passing the active filters, `None` when no row is excluded
    pub fn visibility(&self) -> Option<&BTreeSet<usize>> {
        self.visibility.as_ref()
    }

    /// Check whether a row is visible
    pub fn is_row_visible(&self, row: usize) -> bool {
        match &self.visibility {
            Some(visible) => visible.contains(&row),
            None => row < self.table.row_count(),
        }
    }

    // === Sorting ===

    /// Sort levels applied to the view
    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort_keys
    }

    /// Replace the sort levels
    pub fn set_sort(&mut self, keys: Vec<SortKey>) {
        self.sort_keys = keys;
    }

    /// Return the view to canonical row order
    pub fn clear_sort(&mut self) {
        self.sort_keys.clear();
    }

    /// Visible row indices in view order
    pub fn row_order(&self) -> Vec<usize> {
        let rows: Vec<usize> = match &self.visibility {
            Some(visible) => visible.iter().copied().collect(),
            None => (0..self.table.row_count()).collect(),
        };
        if self.sort_keys.is_empty() {
            rows
        } else {
            sort_rows(&self.table, &self.sort_keys, rows)
        }
    }

    // === Derived tables ===

    /// Canonical table restricted to visible rows (all columns), in view order
    pub fn visible_rows(&self) -> Table {
        if self.visibility.is_none() && self.sort_keys.is_empty() {
            return self.table.clone();
        }
        self.table.select_rows(self.row_order())
    }

    /// The working view: visible columns of visible rows
    pub fn view(&self) -> Table {
        let rows = self.visible_rows();
        match &self.visible_columns {
            Some(columns) => rows.select_columns(columns),
            None => rows,
        }
    }

    /// Write a column on the canonical table and refresh the view state
    pub fn set_column(&mut self, column: &str, values: Vec<Scalar>) -> Result<()> {
        self.table.set_column(column, values)?;
        self.show_column(column);
        self.apply_filters();
        Ok(())
    }

    /// Drop a column from the canonical table and the projection
    pub fn remove_column(&mut self, column: &str) -> Option<Vec<Scalar>> {
        let removed = self.table.remove_column(column);
        self.hide_column(column);
        if removed.is_some() {
            self.apply_filters();
        }
        removed
    }
}

impl From<Table> for Sheet {
    fn from(table: Table) -> Self {
        Sheet::new(table)
    }
}
