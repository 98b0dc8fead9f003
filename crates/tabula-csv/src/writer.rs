//! CSV writer

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::CsvResult;
use crate::options::{CsvWriteOptions, LineTerminator};
use tabula_core::Table;

/// CSV file writer
pub struct CsvWriter;

impl CsvWriter {
    /// Write a table to a CSV file
    pub fn write_file<P: AsRef<Path>>(
        table: &Table,
        path: P,
        options: &CsvWriteOptions,
    ) -> CsvResult<()> {
        let file = File::create(path)?;
        Self::write(table, file, options)
    }

    /// Write a table to a writer
    ///
    /// Empty cells are written as empty fields.
    pub fn write<W: Write>(table: &Table, writer: W, options: &CsvWriteOptions) -> CsvResult<()> {
        let terminator = match options.line_terminator {
            LineTerminator::LF => csv::Terminator::Any(b'\n'),
            LineTerminator::CRLF => csv::Terminator::CRLF,
        };

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote(options.quote)
            .terminator(terminator)
            .from_writer(writer);

        if options.write_header {
            csv_writer.write_record(table.columns())?;
        }
        for row in table.rows() {
            csv_writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        }

        csv_writer.flush()?;
        Ok(())
    }

    /// Write a table to a string
    pub fn write_string(table: &Table, options: &CsvWriteOptions) -> CsvResult<String> {
        let mut buffer = Vec::new();
        Self::write(table, &mut buffer, options)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CsvReadOptions;
    use crate::reader::CsvReader;
    use pretty_assertions::assert_eq;
    use tabula_core::Scalar;

    fn parts() -> Table {
        let mut table = Table::with_columns("Parts", ["Type", "Area"]).unwrap();
        table.push_row([Scalar::text("bolt, hex"), Scalar::Number(50.0)]).unwrap();
        table.push_row([Scalar::text("nut"), Scalar::Empty]).unwrap();
        table.push_row([Scalar::text("washer"), Scalar::Number(2.5)]).unwrap();
        table
    }

    #[test]
    fn test_write_string() {
        let csv = CsvWriter::write_string(&parts(), &CsvWriteOptions::default()).unwrap();
        assert_eq!(csv, "Type,Area\n\"bolt, hex\",50\nnut,\nwasher,2.5\n");
    }

    #[test]
    fn test_write_without_header_crlf() {
        let options = CsvWriteOptions {
            write_header: false,
            line_terminator: LineTerminator::CRLF,
            ..Default::default()
        };
        let csv = CsvWriter::write_string(&parts(), &options).unwrap();
        assert!(csv.starts_with("\"bolt, hex\",50\r\n"));
    }

    #[test]
    fn test_tsv() {
        let csv = CsvWriter::write_string(&parts(), &CsvWriteOptions::tsv()).unwrap();
        assert_eq!(csv, "Type\tArea\nbolt, hex\t50\nnut\t\nwasher\t2.5\n");

        let table = CsvReader::read(csv.as_bytes(), "Parts", &CsvReadOptions::tsv()).unwrap();
        assert_eq!(table, parts());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Parts.csv");

        CsvWriter::write_file(&parts(), &path, &CsvWriteOptions::default()).unwrap();
        let table = CsvReader::read_file(&path, &CsvReadOptions::default()).unwrap();

        assert_eq!(table, parts());
    }
}
