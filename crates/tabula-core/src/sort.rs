//! Multi-level row sorting
//!
//! A sheet keeps an ordered list of [`SortKey`]s: the first key is primary,
//! later keys break ties. Sorting only reorders the sheet's view; the
//! canonical table keeps its row order, so row-aligned cross-sheet formulas
//! are unaffected.
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{sort_rows, Scalar, SortKey, Table};
//!
//! let mut table = Table::with_columns("Parts", ["Type", "Qty"]).unwrap();
//! table.push_row([Scalar::from("nut"), 2.into()]).unwrap();
//! table.push_row([Scalar::from("bolt"), 9.into()]).unwrap();
//! table.push_row([Scalar::from("bolt"), 10.into()]).unwrap();
//!
//! let keys = ["Type".parse::<SortKey>().unwrap(), "Qty:desc".parse().unwrap()];
//! assert_eq!(sort_rows(&table, &keys, 0..3), vec![2, 1, 0]);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::table::Table;
use crate::value::Scalar;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Smallest first
    #[default]
    Ascending,
    /// Largest first
    Descending,
}

/// A single sort level: a column and its direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Column to sort by
    pub column: String,
    /// Direction
    pub order: SortOrder,
}

impl SortKey {
    /// Create a sort key
    pub fn new(column: impl Into<String>, order: SortOrder) -> Self {
        Self {
            column: column.into(),
            order,
        }
    }

    /// Ascending sort on a column
    pub fn ascending(column: impl Into<String>) -> Self {
        Self::new(column, SortOrder::Ascending)
    }

    /// Descending sort on a column
    pub fn descending(column: impl Into<String>) -> Self {
        Self::new(column, SortOrder::Descending)
    }

    /// Compare two cells under this key
    ///
    /// Numbers (and text that reads as a number) order numerically before
    /// other text; blank cells go last in either direction.
    pub fn compare(&self, a: &Scalar, b: &Scalar) -> Ordering {
        match (is_blank(a), is_blank(b)) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }

        let base = match (a.to_number_lossy(), b.to_number_lossy()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.to_string().cmp(&b.to_string()),
        };

        match self.order {
            SortOrder::Ascending => base,
            SortOrder::Descending => base.reverse(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.order {
            SortOrder::Ascending => write!(f, "{}", self.column),
            SortOrder::Descending => write!(f, "{}:desc", self.column),
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    /// Parse `column`, `column:asc` or `column:desc`
    ///
    /// A suffix that is not a direction is kept as part of the column name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, order) = match s.rsplit_once(':') {
            Some((column, suffix)) => match suffix.trim().to_lowercase().as_str() {
                "asc" | "ascending" => (column, SortOrder::Ascending),
                "desc" | "descending" => (column, SortOrder::Descending),
                _ => (s, SortOrder::Ascending),
            },
            None => (s, SortOrder::Ascending),
        };

        let column = column.trim();
        if column.is_empty() {
            return Err(Error::other(format!("Invalid sort key: '{}'", s)));
        }
        Ok(SortKey::new(column, order))
    }
}

/// Order row indices by the given keys
///
/// The sort is stable: rows that tie on every key keep their input order.
/// Keys naming columns the table does not have are skipped.
pub fn sort_rows<I>(table: &Table, keys: &[SortKey], rows: I) -> Vec<usize>
where
    I: IntoIterator<Item = usize>,
{
    let mut rows: Vec<usize> = rows.into_iter().collect();

    let levels: Vec<(usize, &SortKey)> = keys
        .iter()
        .filter_map(|key| match table.column_index(&key.column) {
            Some(col) => Some((col, key)),
            None => {
                log::warn!(
                    "Sort column '{}' not found in table '{}', skipping",
                    key.column,
                    table.name()
                );
                None
            }
        })
        .collect();
    if levels.is_empty() {
        return rows;
    }

    rows.sort_by(|&a, &b| {
        for &(col, key) in &levels {
            let ordering = match (table.cell_at(a, col), table.cell_at(b, col)) {
                (Some(x), Some(y)) => key.compare(x, y),
                _ => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    rows
}

fn is_blank(cell: &Scalar) -> bool {
    match cell {
        Scalar::Empty => true,
        Scalar::Text(s) => s.trim().is_empty(),
        Scalar::Number(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parts() -> Table {
        let mut t = Table::with_columns("Parts", ["Type", "Qty"]).unwrap();
        for (ty, qty) in [
            (Scalar::from("nut"), Scalar::from("10")),
            (Scalar::from("bolt"), Scalar::from(9)),
            (Scalar::from("bolt"), Scalar::Empty),
            (Scalar::from("washer"), Scalar::from(10)),
            (Scalar::from("bolt"), Scalar::from(9)),
        ] {
            t.push_row([ty, qty]).unwrap();
        }
        t
    }

    #[test]
    fn test_parse_sort_key() {
        assert_eq!("Qty".parse::<SortKey>().unwrap(), SortKey::ascending("Qty"));
        assert_eq!(
            "Qty:DESC".parse::<SortKey>().unwrap(),
            SortKey::descending("Qty")
        );
        assert_eq!(
            "Unit Price : asc".parse::<SortKey>().unwrap(),
            SortKey::ascending("Unit Price")
        );
        assert_eq!(
            "Time:12".parse::<SortKey>().unwrap(),
            SortKey::ascending("Time:12")
        );
        assert!(":desc".parse::<SortKey>().is_err());
        assert_eq!(SortKey::descending("Qty").to_string(), "Qty:desc");
    }

    #[test]
    fn test_numeric_aware_with_blanks_last() {
        let table = parts();
        // "10" as text still sorts after 9
        assert_eq!(
            sort_rows(&table, &[SortKey::ascending("Qty")], 0..5),
            vec![1, 4, 0, 3, 2]
        );
        assert_eq!(
            sort_rows(&table, &[SortKey::descending("Qty")], 0..5),
            vec![0, 3, 1, 4, 2]
        );
    }

    #[test]
    fn test_multi_level_is_stable() {
        let table = parts();
        let keys = [SortKey::ascending("Type"), SortKey::descending("Qty")];
        assert_eq!(sort_rows(&table, &keys, 0..5), vec![1, 4, 2, 0, 3]);
        // Only the given rows are ordered
        assert_eq!(sort_rows(&table, &keys, [3, 2, 0]), vec![2, 0, 3]);
    }

    #[test]
    fn test_unknown_column_is_skipped() {
        let table = parts();
        assert_eq!(
            sort_rows(&table, &[SortKey::ascending("Colour")], 0..5),
            vec![0, 1, 2, 3, 4]
        );
    }
}
