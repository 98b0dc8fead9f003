//! Row filters
//!
//! A [`RowFilter`] is a simple column predicate. The filters of a sheet are
//! combined with AND and produce the sheet's visibility set: the row indices
//! that remain "active".
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{apply_filters, FilterKind, RowFilter, Table};
//!
//! let mut table = Table::with_columns("Parts", ["Type"]).unwrap();
//! table.push_row(["bolt"]).unwrap();
//! table.push_row(["nut"]).unwrap();
//!
//! let filters = vec![RowFilter::new("Type", FilterKind::Equals, "bolt")];
//! let visible = apply_filters(&table, &filters).unwrap();
//! assert!(visible.contains(&0));
//! assert!(!visible.contains(&1));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::table::Table;
use crate::value::Scalar;

/// Filter predicate kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    IsEmpty,
    IsNotEmpty,
}

impl FilterKind {
    /// All filter kinds, in menu order
    pub const ALL: [FilterKind; 12] = [
        FilterKind::Equals,
        FilterKind::NotEquals,
        FilterKind::Contains,
        FilterKind::NotContains,
        FilterKind::StartsWith,
        FilterKind::EndsWith,
        FilterKind::GreaterThan,
        FilterKind::LessThan,
        FilterKind::GreaterOrEqual,
        FilterKind::LessOrEqual,
        FilterKind::IsEmpty,
        FilterKind::IsNotEmpty,
    ];

    /// Display name of the filter kind
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Equals => "equals",
            FilterKind::NotEquals => "not equals",
            FilterKind::Contains => "contains",
            FilterKind::NotContains => "not contains",
            FilterKind::StartsWith => "starts with",
            FilterKind::EndsWith => "ends with",
            FilterKind::GreaterThan => "greater than",
            FilterKind::LessThan => "less than",
            FilterKind::GreaterOrEqual => "greater or equal",
            FilterKind::LessOrEqual => "less or equal",
            FilterKind::IsEmpty => "is empty",
            FilterKind::IsNotEmpty => "is not empty",
        }
    }

    /// Whether the filter needs a comparison value
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterKind::IsEmpty | FilterKind::IsNotEmpty)
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKind {
    type Err = Error;

    /// Parse a filter kind; spaces, underscores and hyphens are interchangeable
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(|c: char| c == '_' || c == '-', " ");
        FilterKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::other(format!("Unknown filter type: {}", s)))
    }
}

/// A single column predicate
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    /// Column to test
    pub column: String,
    /// Predicate kind
    pub kind: FilterKind,
    /// Comparison value (ignored by `IsEmpty`/`IsNotEmpty`)
    pub value: String,
    /// Compare text case-sensitively
    pub case_sensitive: bool,
}

impl RowFilter {
    /// Create a case-insensitive filter
    pub fn new(column: impl Into<String>, kind: FilterKind, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            kind,
            value: value.into(),
            case_sensitive: false,
        }
    }

    /// Set case sensitivity
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Test a single cell against this filter
    pub fn matches(&self, cell: &Scalar) -> bool {
        match self.kind {
            FilterKind::IsEmpty => return is_blank(cell),
            FilterKind::IsNotEmpty => return !is_blank(cell),
            FilterKind::GreaterThan
            | FilterKind::LessThan
            | FilterKind::GreaterOrEqual
            | FilterKind::LessOrEqual => return self.matches_ordering(cell),
            _ => {}
        }

        let (text, value) = if self.case_sensitive {
            (cell.to_string(), self.value.clone())
        } else {
            (cell.to_string().to_lowercase(), self.value.to_lowercase())
        };

        match self.kind {
            FilterKind::Equals => text == value,
            FilterKind::NotEquals => text != value,
            FilterKind::Contains => text.contains(&value),
            FilterKind::NotContains => !text.contains(&value),
            FilterKind::StartsWith => text.starts_with(&value),
            FilterKind::EndsWith => text.ends_with(&value),
            _ => unreachable!("ordering and emptiness handled above"),
        }
    }

    fn matches_ordering(&self, cell: &Scalar) -> bool {
        let ordering = match self.value.trim().parse::<f64>() {
            // Numeric comparison; cells that are not numbers never match
            Ok(threshold) => match cell.to_number_lossy() {
                Some(n) => n.partial_cmp(&threshold),
                None => None,
            },
            Err(_) => Some(cell.to_string().as_str().cmp(self.value.as_str())),
        };

        let Some(ordering) = ordering else {
            return false;
        };

        match self.kind {
            FilterKind::GreaterThan => ordering.is_gt(),
            FilterKind::LessThan => ordering.is_lt(),
            FilterKind::GreaterOrEqual => ordering.is_ge(),
            FilterKind::LessOrEqual => ordering.is_le(),
            _ => false,
        }
    }
}

fn is_blank(cell: &Scalar) -> bool {
    match cell {
        Scalar::Empty => true,
        Scalar::Text(s) => s.is_empty(),
        Scalar::Number(_) => false,
    }
}

/// Apply filters (combined with AND) to a table
///
/// Returns the set of row indices that pass every filter, or `None` when no
/// row is excluded. Filters on columns the table does not have are skipped.
pub fn apply_filters(table: &Table, filters: &[RowFilter]) -> Option<BTreeSet<usize>> {
    if filters.is_empty() {
        return None;
    }

    let mut visible: BTreeSet<usize> = (0..table.row_count()).collect();

    for filter in filters {
        let Some(col) = table.column_index(&filter.column) else {
            log::warn!(
                "Filter column '{}' not found in table '{}', skipping",
                filter.column,
                table.name()
            );
            continue;
        };

        let before = visible.len();
        visible.retain(|&row| {
            table
                .cell_at(row, col)
                .map_or(false, |cell| filter.matches(cell))
        });
        log::debug!(
            "Filter '{} {} {}': {} -> {} rows",
            filter.column,
            filter.kind,
            filter.value,
            before,
            visible.len()
        );
    }

    if visible.len() < table.row_count() {
        Some(visible)
    } else {
        None
    }
}
