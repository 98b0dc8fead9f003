//! Prelude module - common imports for tabula users
//!
//! ```rust
//! use tabula::prelude::*;
//! ```

pub use crate::{
    // I/O types
    CsvReader,
    CsvWriter,

    // Error types
    EngineError,
    Error,
    Result,
    ValidationErrorKind,

    // Filters and sorting
    FilterKind,
    RowFilter,
    SortKey,

    // Formula types
    FormulaEngine,
    FormulaField,
    ResultType,

    // Main types
    Scalar,
    Sheet,
    Table,
    TableStore,

    // Extension traits
    TableStoreExt,

    // Templates
    TemplateStore,
};
