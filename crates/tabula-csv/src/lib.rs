//! # tabula-csv
//!
//! CSV reader and writer for tabula tables.
//!
//! ```rust
//! use tabula_core::Scalar;
//! use tabula_csv::{CsvReadOptions, CsvReader};
//!
//! let data = "Type,Qty\nbolt,4\nnut,\n";
//! let table = CsvReader::read(data.as_bytes(), "Parts", &CsvReadOptions::default()).unwrap();
//!
//! assert_eq!(table.columns(), ["Type", "Qty"]);
//! assert_eq!(table.cell(0, "Qty"), Some(&Scalar::Number(4.0)));
//! assert_eq!(table.cell(1, "Qty"), Some(&Scalar::Empty));
//! ```

mod error;
mod options;
mod reader;
mod writer;

pub use error::{CsvError, CsvResult};
pub use options::{CsvReadOptions, CsvWriteOptions, LineTerminator};
pub use reader::CsvReader;
pub use writer::CsvWriter;
