//! CSV options

/// How CSV text is turned into a table
#[derive(Debug, Clone)]
pub struct CsvReadOptions {
    /// Separator byte between fields
    pub delimiter: u8,
    /// Byte that encloses quoted fields
    pub quote: u8,
    /// Take column names from the first record
    ///
    /// Without a header, columns are named `Column1`, `Column2`, ...
    pub has_header: bool,
    /// Store numeric-looking fields as numbers instead of text
    pub auto_detect_types: bool,
    /// Strip surrounding whitespace from every field
    pub trim: bool,
}

impl CsvReadOptions {
    /// Tab-separated input, otherwise default options
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: true,
            auto_detect_types: true,
            trim: true,
        }
    }
}

/// How a table is turned into CSV text
#[derive(Debug, Clone)]
pub struct CsvWriteOptions {
    /// Separator byte between fields
    pub delimiter: u8,
    /// Byte used to quote fields that need it
    pub quote: u8,
    /// Emit the column names as the first record
    pub write_header: bool,
    /// Record terminator
    pub line_terminator: LineTerminator,
}

impl CsvWriteOptions {
    /// Tab-separated output, otherwise default options
    pub fn tsv() -> Self {
        Self {
            delimiter: b'\t',
            ..Self::default()
        }
    }
}

impl Default for CsvWriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            write_header: true,
            line_terminator: LineTerminator::LF,
        }
    }
}

/// Record terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineTerminator {
    /// `\n`
    #[default]
    LF,
    /// `\r\n`
    CRLF,
}
