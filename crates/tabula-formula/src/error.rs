//! Formula error types

use std::fmt;

use thiserror::Error;

/// Result type for formula parsing and evaluation
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Result type for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during formula parsing or evaluation
///
/// A `Parse` error raised while extracting references rejects the formula.
/// Any error raised while evaluating a single row is a row fault: the row
/// falls back to its type default and the column computation continues.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Division or modulo by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// A reference had no value for this row
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),
}

/// Kinds of reference validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Column does not exist in the referenced table
    UnknownField,
    /// Sheet does not exist
    UnknownSheet,
    /// Fixed row index is outside the referenced table
    IndexOutOfBounds,
    /// A cross-sheet reference was used while only one sheet is loaded
    CrossSheetUnavailable,
}

impl ValidationErrorKind {
    /// Short name of the failure kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationErrorKind::UnknownField => "unknown field",
            ValidationErrorKind::UnknownSheet => "unknown sheet",
            ValidationErrorKind::IndexOutOfBounds => "index out of bounds",
            ValidationErrorKind::CrossSheetUnavailable => "cross-sheet references unavailable",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The first reference in a formula that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct ValidationError {
    /// Failure kind
    pub kind: ValidationErrorKind,
    /// Human readable description, suitable for showing to the formula author
    pub detail: String,
}

impl ValidationError {
    /// Create a validation error
    pub fn new(kind: ValidationErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Errors returned by [`FormulaEngine`](crate::FormulaEngine) operations
///
/// Every variant is raised before any table mutation takes place.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed bracket or parenthesis nesting
    #[error("Parse error: {0}")]
    Parse(String),

    /// A reference failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Formula field name is empty
    #[error("Formula field name cannot be empty")]
    EmptyName,

    /// Formula expression is empty
    #[error("Formula expression cannot be empty")]
    EmptyExpression,

    /// A column or formula field with this name already exists
    #[error("Field '{0}' already exists")]
    DuplicateField(String),

    /// No formula field with this name exists on the sheet
    #[error("Formula field '{0}' not found")]
    UnknownFormula(String),

    /// Table store error
    #[error("Table error: {0}")]
    Table(#[from] tabula_core::Error),
}

impl From<FormulaError> for EngineError {
    fn from(err: FormulaError) -> Self {
        match err {
            FormulaError::Parse(msg) => EngineError::Parse(msg),
            other => EngineError::Parse(other.to_string()),
        }
    }
}
