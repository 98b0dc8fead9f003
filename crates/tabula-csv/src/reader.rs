//! CSV reader

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::options::CsvReadOptions;
use tabula_core::{Scalar, Table};

/// CSV file reader
pub struct CsvReader;

impl CsvReader {
    /// Read a CSV file into a table named after the file stem
    pub fn read_file<P: AsRef<Path>>(path: P, options: &CsvReadOptions) -> CsvResult<Table> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Sheet1".to_string());
        Self::read_file_as(path, name, options)
    }

    /// Read a CSV file into a table with an explicit name
    pub fn read_file_as<P: AsRef<Path>, S: Into<String>>(
        path: P,
        name: S,
        options: &CsvReadOptions,
    ) -> CsvResult<Table> {
        let file = File::open(path)?;
        Self::read(file, name, options)
    }

    /// Read CSV from a reader into a table
    ///
    /// Short records are padded with empty cells; records longer than the
    /// header are rejected.
    pub fn read<R: Read, S: Into<String>>(
        reader: R,
        name: S,
        options: &CsvReadOptions,
    ) -> CsvResult<Table> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .has_headers(false)
            .flexible(true)
            .trim(if options.trim {
                csv::Trim::All
            } else {
                csv::Trim::None
            })
            .from_reader(reader);

        let mut records = csv_reader.records();
        let mut table = Table::new(name);
        let mut pending = None;

        if options.has_header {
            if let Some(header) = records.next() {
                for column in header?.iter() {
                    table.add_column(column)?;
                }
            }
        } else if let Some(first) = records.next() {
            let first = first?;
            for i in 0..first.len() {
                table.add_column(format!("Column{}", i + 1))?;
            }
            pending = Some(first);
        }

        let width = table.column_count();
        for (row, record) in pending.into_iter().map(Ok).chain(records).enumerate() {
            let record = record?;
            if record.len() > width {
                return Err(CsvError::Parse {
                    row,
                    message: format!("{} fields, expected at most {}", record.len(), width),
                });
            }

            let mut values: Vec<Scalar> = record
                .iter()
                .map(|field| Self::detect_type(field, options.auto_detect_types))
                .collect();
            values.resize(width, Scalar::Empty);
            table.push_row(values)?;
        }

        log::debug!(
            "Read table '{}': {} rows, {} columns",
            table.name(),
            table.row_count(),
            width
        );
        Ok(table)
    }

    /// Convert one field to a cell value
    fn detect_type(field: &str, auto_detect: bool) -> Scalar {
        if field.is_empty() {
            return Scalar::Empty;
        }
        if auto_detect {
            if let Ok(n) = field.trim().parse::<f64>() {
                if n.is_finite() {
                    return Scalar::Number(n);
                }
            }
        }
        Scalar::text(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_detects_numbers() {
        let data = "Name,Length,Code\nbolt, 12 ,007\nnut,3.5,A1\n";
        let table = CsvReader::read(data.as_bytes(), "Parts", &CsvReadOptions::default()).unwrap();

        assert_eq!(table.name(), "Parts");
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, "Length"), Some(&Scalar::Number(12.0)));
        assert_eq!(table.cell(0, "Code"), Some(&Scalar::Number(7.0)));
        assert_eq!(table.cell(1, "Code"), Some(&Scalar::text("A1")));
    }

    #[test]
    fn test_read_as_text() {
        let options = CsvReadOptions {
            auto_detect_types: false,
            ..Default::default()
        };
        let table = CsvReader::read("A\n42\n".as_bytes(), "T", &options).unwrap();
        assert_eq!(table.cell(0, "A"), Some(&Scalar::text("42")));
    }

    #[test]
    fn test_read_without_header() {
        let options = CsvReadOptions {
            has_header: false,
            ..Default::default()
        };
        let table = CsvReader::read("1,x\n2,y\n".as_bytes(), "T", &options).unwrap();
        assert_eq!(table.columns(), ["Column1", "Column2"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(1, "Column2"), Some(&Scalar::text("y")));
    }

    #[test]
    fn test_short_and_long_records() {
        let table = CsvReader::read("A,B\n1\n".as_bytes(), "T", &CsvReadOptions::default()).unwrap();
        assert_eq!(table.cell(0, "B"), Some(&Scalar::Empty));

        let err = CsvReader::read("A\n1,2\n".as_bytes(), "T", &CsvReadOptions::default());
        assert!(matches!(err, Err(CsvError::Parse { row: 0, .. })));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let err = CsvReader::read("A,A\n1,2\n".as_bytes(), "T", &CsvReadOptions::default());
        assert!(matches!(err, Err(CsvError::Table(_))));
    }
}
