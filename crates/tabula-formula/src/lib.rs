//! # tabula-formula
//!
//! Formula fields for tabula tables.
//!
//! This crate provides:
//! - Reference extraction (formula text → references + template)
//! - Reference validation against the loaded sheets
//! - Expression parsing and evaluation (arithmetic, comparison, logic,
//!   `IF`, `MAX`, `MIN`, `ROUND`, `ABS`)
//! - The [`FormulaEngine`], which computes formula fields row by row and
//!   stores them as table columns
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{Scalar, Table, TableStore};
//! use tabula_formula::{FormulaEngine, ResultType};
//!
//! let mut parts = Table::with_columns("Parts", ["Length", "Type"]).unwrap();
//! parts.push_row([Scalar::from(10), "bolt".into()]).unwrap();
//! parts.push_row([Scalar::from(20), "nut".into()]).unwrap();
//!
//! let mut store = TableStore::new();
//! store.add_sheet(parts).unwrap();
//!
//! let mut engine = FormulaEngine::new();
//! engine
//!     .create_formula_field(
//!         &mut store,
//!         "Parts",
//!         "Label",
//!         "IF([Length] > 15, \"long \" + [Type], [Type])",
//!         ResultType::Text,
//!     )
//!     .unwrap();
//!
//! assert_eq!(store.cell("Parts", 1, "Label"), Some(&Scalar::text("long nut")));
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod field;
pub mod functions;
pub mod parser;
pub mod reference;
pub mod validate;

mod resolve;
mod row;

pub use ast::{BinaryOperator, Expr, UnaryOperator};
pub use engine::{ColumnValues, EngineOptions, EvaluationStats, FormulaEngine};
pub use error::{
    EngineError, EngineResult, FormulaError, FormulaResult, ValidationError, ValidationErrorKind,
};
pub use evaluator::{evaluate, EvaluationContext, Value};
pub use field::{FieldRegistry, FormulaField, ResultType};
pub use parser::{compile, parse_expression};
pub use reference::{parse_references, Aggregate, ParsedFormula, Reference, Segment};
pub use validate::validate_references;
