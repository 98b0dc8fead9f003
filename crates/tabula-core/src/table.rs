//! Table type

use crate::error::{Error, Result};
use crate::value::Scalar;

/// A named table of ordered columns and ordered rows
///
/// Every row holds exactly one [`Scalar`] per declared column; empty cells
/// are stored as [`Scalar::Empty`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Table (sheet) name
    name: String,
    /// Column names, in display order
    columns: Vec<String>,
    /// Row-major cell storage
    rows: Vec<Vec<Scalar>>,
}

impl Table {
    /// Create a new empty table with the given name
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Create a new table with the given column names and no rows
    pub fn with_columns<S, I, C>(name: S, columns: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let mut table = Self::new(name);
        for column in columns {
            table.add_column(column)?;
        }
        Ok(table)
    }

    /// Get the table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the table name
    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Check if a column exists
    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Append a row; it must hold one value per column
    pub fn push_row<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Scalar>,
    {
        let row: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        if row.len() != self.columns.len() {
            return Err(Error::RowLength {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Remove a row by index
    pub fn remove_row(&mut self, row: usize) -> Result<Vec<Scalar>> {
        if row >= self.rows.len() {
            return Err(Error::RowOutOfBounds(row, self.rows.len()));
        }
        Ok(self.rows.remove(row))
    }

    /// Add a new column filled with empty values
    pub fn add_column<S: Into<String>>(&mut self, column: S) -> Result<usize> {
        let column = column.into();
        if self.has_column(&column) {
            return Err(Error::DuplicateColumn {
                table: self.name.clone(),
                column,
            });
        }
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(Scalar::Empty);
        }
        Ok(self.columns.len() - 1)
    }

    /// Replace a column's values, appending the column if it does not exist
    ///
    /// `values` is aligned by row position and must have one value per row.
    pub fn set_column<S: Into<String>>(&mut self, column: S, values: Vec<Scalar>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::ColumnLength {
                expected: self.rows.len(),
                actual: values.len(),
            });
        }

        let column = column.into();
        let col = match self.column_index(&column) {
            Some(col) => col,
            None => self.add_column(column)?,
        };

        for (row, value) in self.rows.iter_mut().zip(values) {
            row[col] = value;
        }
        Ok(())
    }

    /// Remove a column, returning its values
    pub fn remove_column(&mut self, column: &str) -> Option<Vec<Scalar>> {
        let col = self.column_index(column)?;
        self.columns.remove(col);
        Some(self.rows.iter_mut().map(|row| row.remove(col)).collect())
    }

    /// Get a cell by row index and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&Scalar> {
        let col = self.column_index(column)?;
        self.cell_at(row, col)
    }

    /// Get a cell by row and column index
    pub fn cell_at(&self, row: usize, col: usize) -> Option<&Scalar> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Set a cell by row index and column name
    pub fn set_cell<V: Into<Scalar>>(&mut self, row: usize, column: &str, value: V) -> Result<()> {
        let col = self
            .column_index(column)
            .ok_or_else(|| Error::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })?;
        let row_count = self.rows.len();
        let cells = self
            .rows
            .get_mut(row)
            .ok_or(Error::RowOutOfBounds(row, row_count))?;
        cells[col] = value.into();
        Ok(())
    }

    /// Iterate over the values of one column
    pub fn column_values<'a>(&'a self, column: &str) -> Option<impl Iterator<Item = &'a Scalar>> {
        let col = self.column_index(column)?;
        Some(self.rows.iter().map(move |row| &row[col]))
    }

    /// Iterate over rows
    pub fn rows(&self) -> impl Iterator<Item = &[Scalar]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Get a row by index
    pub fn row(&self, row: usize) -> Option<&[Scalar]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    /// Build a new table holding only the given rows, in the given order
    ///
    /// Indices out of range are ignored.
    pub fn select_rows<I>(&self, indices: I) -> Table
    where
        I: IntoIterator<Item = usize>,
    {
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: indices
                .into_iter()
                .filter_map(|i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Build a new table holding only the given columns, in the given order
    ///
    /// Unknown column names are ignored.
    pub fn select_columns<S: AsRef<str>>(&self, columns: &[S]) -> Table {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c.as_ref()))
            .collect();
        Table {
            name: self.name.clone(),
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parts() -> Table {
        let mut t = Table::with_columns("Parts", ["Type", "Qty"]).unwrap();
        t.push_row([Scalar::from("bolt"), Scalar::from(4)]).unwrap();
        t.push_row([Scalar::from("nut"), Scalar::Empty]).unwrap();
        t
    }

    #[test]
    fn test_push_row_checks_length() {
        let mut t = parts();
        assert!(t.push_row([Scalar::from("washer")]).is_err());
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn test_add_column_fills_empty() {
        let mut t = parts();
        t.add_column("Note").unwrap();
        assert_eq!(t.cell(0, "Note"), Some(&Scalar::Empty));
        assert!(t.add_column("Note").is_err());
    }

    #[test]
    fn test_set_column_appends_and_overwrites() {
        let mut t = parts();
        t.set_column("Area", vec![1.into(), 2.into()]).unwrap();
        assert_eq!(t.columns(), ["Type", "Qty", "Area"]);

        t.set_column("Area", vec![3.into(), Scalar::Empty]).unwrap();
        assert_eq!(t.cell(0, "Area"), Some(&Scalar::Number(3.0)));
        assert_eq!(t.cell(1, "Area"), Some(&Scalar::Empty));

        assert!(t.set_column("Area", vec![1.into()]).is_err());
    }

    #[test]
    fn test_remove_column() {
        let mut t = parts();
        let values = t.remove_column("Type").unwrap();
        assert_eq!(values, vec![Scalar::from("bolt"), Scalar::from("nut")]);
        assert_eq!(t.columns(), ["Qty"]);
        assert!(t.remove_column("Type").is_none());
    }

    #[test]
    fn test_select_rows_and_columns() {
        let t = parts();
        let subset = t.select_rows([1, 7]);
        assert_eq!(subset.row_count(), 1);
        assert_eq!(subset.cell(0, "Type"), Some(&Scalar::from("nut")));

        let projected = t.select_columns(&["Qty", "Missing"]);
        assert_eq!(projected.columns(), ["Qty"]);
        assert_eq!(projected.row_count(), 2);
    }

    #[test]
    fn test_set_cell() {
        let mut t = parts();
        t.set_cell(1, "Qty", 9).unwrap();
        assert_eq!(t.cell(1, "Qty"), Some(&Scalar::Number(9.0)));
        assert!(t.set_cell(5, "Qty", 1).is_err());
        assert!(t.set_cell(0, "Nope", 1).is_err());
    }
}
