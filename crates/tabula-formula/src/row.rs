//! Row evaluation
//!
//! Binds each reference slot for one row, evaluates the compiled expression
//! and coerces the result to the field's [`ResultType`]. A failing row never
//! stops the column: it produces a fallback value and reports the fault.

use tabula_core::{Scalar, Table};

use crate::ast::Expr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{evaluate, EvaluationContext, Value};
use crate::field::ResultType;
use crate::reference::ParsedFormula;
use crate::resolve::{bind_scalar, SlotPlan};

/// Outcome for one row
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RowResult {
    /// Value to store
    pub value: Scalar,
    /// Why the row fell back to its default, if it did
    pub fault: Option<FormulaError>,
}

pub(crate) struct RowEvaluator<'a> {
    formula: &'a ParsedFormula,
    /// Compiled template, or why it failed to compile
    expr: Result<Expr, FormulaError>,
    plans: Vec<SlotPlan<'a>>,
    table: &'a Table,
    result_type: ResultType,
}

impl<'a> RowEvaluator<'a> {
    pub fn new(
        formula: &'a ParsedFormula,
        expr: Result<Expr, FormulaError>,
        plans: Vec<SlotPlan<'a>>,
        table: &'a Table,
        result_type: ResultType,
    ) -> Self {
        Self {
            formula,
            expr,
            plans,
            table,
            result_type,
        }
    }

    /// Evaluate one row of the formula's table
    pub fn evaluate_row(&self, row: usize) -> RowResult {
        let bindings = self.bind(row);

        let outcome = match &self.expr {
            Ok(expr) => evaluate(expr, &EvaluationContext::new(&bindings))
                .and_then(|value| coerce(value, self.result_type)),
            Err(err) => Err(err.clone()),
        };

        match outcome {
            Ok(value) => RowResult { value, fault: None },
            Err(err) => RowResult {
                value: self.fallback(&bindings),
                fault: Some(err),
            },
        }
    }

    /// Value of every slot for `row` (`None` = unresolved)
    fn bind(&self, row: usize) -> Vec<Option<Value>> {
        self.plans
            .iter()
            .map(|plan| match plan {
                SlotPlan::Constant(value) => value.clone(),
                SlotPlan::Local { column } => column
                    .and_then(|col| self.table.cell_at(row, col))
                    .map(|cell| bind_scalar(cell, self.result_type)),
                SlotPlan::CrossSheet { table, column } => {
                    let aligned = row.min(table.row_count().saturating_sub(1));
                    column
                        .and_then(|col| table.cell_at(aligned, col))
                        .map(|cell| bind_scalar(cell, self.result_type))
                }
                SlotPlan::CountField { column, counts } => {
                    let cell = column.and_then(|col| self.table.cell_at(row, col))?;
                    let count = cell
                        .key()
                        .and_then(|key| counts.get(&key).copied())
                        .unwrap_or(0);
                    Some(Value::Number(count as f64))
                }
            })
            .collect()
    }

    /// Default stored for a faulted row
    ///
    /// Number fields store 0. Text and Auto fields store the row's expression
    /// text with every resolved reference substituted.
    fn fallback(&self, bindings: &[Option<Value>]) -> Scalar {
        if self.result_type == ResultType::Number {
            return Scalar::Number(0.0);
        }

        let text = self.formula.render(|slot| match bindings.get(slot) {
            Some(Some(Value::Text(s))) => format!("\"{}\"", s),
            Some(Some(value)) => value.to_string(),
            _ => self.formula.references()[slot].to_string(),
        });
        Scalar::Text(text)
    }
}

/// Convert an evaluation result to the stored form
pub(crate) fn coerce(value: Value, result_type: ResultType) -> FormulaResult<Scalar> {
    match result_type {
        ResultType::Number => match value {
            Value::Text(s) if s.trim().is_empty() => Ok(Scalar::Number(0.0)),
            Value::Text(s) => s.trim().parse().map(Scalar::Number).map_err(|_| {
                FormulaError::Evaluation(format!("Cannot convert '{}' to a number", s))
            }),
            other => other.to_number().map(Scalar::Number),
        },
        ResultType::Text => Ok(Scalar::Text(value.to_string())),
        ResultType::Auto => match value {
            Value::Number(n) => Ok(Scalar::Number(n)),
            other => Ok(Scalar::Text(other.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_number() {
        assert_eq!(
            coerce(Value::Boolean(true), ResultType::Number).unwrap(),
            Scalar::Number(1.0)
        );
        assert_eq!(
            coerce(Value::text(" 2.5 "), ResultType::Number).unwrap(),
            Scalar::Number(2.5)
        );
        assert_eq!(
            coerce(Value::text(""), ResultType::Number).unwrap(),
            Scalar::Number(0.0)
        );
        assert!(coerce(Value::text("bolt"), ResultType::Number).is_err());
    }

    #[test]
    fn test_coerce_text_and_auto() {
        assert_eq!(
            coerce(Value::Number(50.0), ResultType::Text).unwrap(),
            Scalar::text("50")
        );
        assert_eq!(
            coerce(Value::Number(50.0), ResultType::Auto).unwrap(),
            Scalar::Number(50.0)
        );
        assert_eq!(
            coerce(Value::Boolean(false), ResultType::Auto).unwrap(),
            Scalar::text("False")
        );
        assert_eq!(
            coerce(Value::text("x"), ResultType::Auto).unwrap(),
            Scalar::text("x")
        );
    }
}
