//! Formula field engine
//!
//! Owns the formula field definitions of every sheet and computes their
//! columns. Every operation names its sheet explicitly; the engine has no
//! notion of a "current" sheet.
//!
//! A computation runs in phases:
//!
//! 1. extract references ([`parse_references`])
//! 2. validate them against the store (abort on the first failure)
//! 3. pre-resolve whole-table aggregates once
//! 4. evaluate each visible row, isolating row faults
//! 5. write the column back to the sheet
//!
//! # Example
//!
//! ```rust
//! use tabula_core::{Scalar, Table, TableStore};
//! use tabula_formula::{FormulaEngine, ResultType};
//!
//! let mut parts = Table::with_columns("Parts", ["Length", "Width"]).unwrap();
//! parts.push_row([10, 5]).unwrap();
//! let mut store = TableStore::new();
//! store.add_sheet(parts).unwrap();
//!
//! let mut engine = FormulaEngine::new();
//! let column = engine
//!     .create_formula_field(&mut store, "Parts", "Area", "[Length] * [Width]", ResultType::Number)
//!     .unwrap();
//! assert_eq!(column.values, vec![Scalar::Number(50.0)]);
//! ```

use ahash::AHashMap;
use tabula_core::{Scalar, TableStore};

use crate::error::{EngineError, EngineResult};
use crate::field::{FieldRegistry, FormulaField, ResultType};
use crate::parser::compile;
use crate::reference::{parse_references, ParsedFormula};
use crate::resolve::{plan_slots, ResolveScope};
use crate::row::RowEvaluator;
use crate::validate::validate_references;

/// Options for formula computation
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Skip rows outside the sheet's visibility set (storing empty values)
    /// and restrict same-sheet aggregates to the visible rows
    pub respect_visibility: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            respect_visibility: true,
        }
    }
}

/// Statistics from one column computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Rows whose expression was evaluated (including faulted rows)
    pub rows_evaluated: usize,
    /// Rows skipped because they are outside the visibility set
    pub rows_skipped: usize,
    /// Evaluated rows that fell back to their type default
    pub rows_faulted: usize,
}

/// A computed column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValues {
    /// One value per table row, in row order
    pub values: Vec<Scalar>,
    /// Computation statistics
    pub stats: EvaluationStats,
}

/// The formula engine
#[derive(Debug, Default)]
pub struct FormulaEngine {
    options: EngineOptions,
    /// Formula fields, keyed by sheet name
    registries: AHashMap<String, FieldRegistry>,
}

impl FormulaEngine {
    /// Create an engine with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with custom options
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            options,
            registries: AHashMap::new(),
        }
    }

    /// Current options
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    // === Definitions ===

    /// Formula fields of a sheet, in creation order
    pub fn fields(&self, sheet: &str) -> impl Iterator<Item = &FormulaField> {
        self.registries.get(sheet).into_iter().flat_map(|r| r.iter())
    }

    /// Formula field by name
    pub fn field(&self, sheet: &str, name: &str) -> Option<&FormulaField> {
        self.registries.get(sheet).and_then(|r| r.get(name))
    }

    /// Check whether a sheet has a formula field with this name
    pub fn is_formula_field(&self, sheet: &str, name: &str) -> bool {
        self.field(sheet, name).is_some()
    }

    /// Drop every definition of a sheet (e.g. after the sheet was closed)
    pub fn forget_sheet(&mut self, sheet: &str) -> Option<FieldRegistry> {
        self.registries.remove(sheet)
    }

    // === Operations ===

    /// Check that a formula is well formed and that every reference resolves
    pub fn validate_formula(
        &self,
        store: &TableStore,
        sheet: &str,
        expression: &str,
    ) -> EngineResult<()> {
        self.prepare(store, sheet, expression).map(|_| ())
    }

    /// Compute a formula's column without storing it
    pub fn compute(
        &self,
        store: &TableStore,
        sheet: &str,
        expression: &str,
        result_type: ResultType,
    ) -> EngineResult<ColumnValues> {
        let formula = self.prepare(store, sheet, expression)?;
        self.compute_parsed(store, sheet, &formula, result_type, &[])
    }

    /// Create a formula field and write its column
    ///
    /// Nothing is stored when the name is taken or the formula is invalid.
    pub fn create_formula_field(
        &mut self,
        store: &mut TableStore,
        sheet: &str,
        name: &str,
        expression: &str,
        result_type: ResultType,
    ) -> EngineResult<ColumnValues> {
        let field = Self::definition(name, expression, result_type)?;

        let table = store.require(sheet)?.table();
        if table.has_column(&field.name) || self.is_formula_field(sheet, &field.name) {
            return Err(EngineError::DuplicateField(field.name));
        }

        let formula = self.prepare(store, sheet, &field.expression)?;
        let column = self.compute_parsed(store, sheet, &formula, result_type, &[])?;

        store.set_column(sheet, &field.name, column.values.clone())?;
        log::debug!("Created formula field '{}' on '{}'", field.name, sheet);
        self.registries
            .entry(sheet.to_string())
            .or_default()
            .insert(field);

        Ok(column)
    }

    /// Replace a formula field's definition (and optionally its name)
    ///
    /// The old definition and column stay untouched unless the new formula
    /// computes successfully. On rename, the old column is dropped.
    pub fn update_formula_field(
        &mut self,
        store: &mut TableStore,
        sheet: &str,
        old_name: &str,
        new_name: &str,
        expression: &str,
        result_type: ResultType,
    ) -> EngineResult<ColumnValues> {
        if !self.is_formula_field(sheet, old_name) {
            return Err(EngineError::UnknownFormula(old_name.to_string()));
        }
        let field = Self::definition(new_name, expression, result_type)?;

        let renamed = field.name != old_name;
        if renamed {
            let table = store.require(sheet)?.table();
            if table.has_column(&field.name) || self.is_formula_field(sheet, &field.name) {
                return Err(EngineError::DuplicateField(field.name));
            }
        }

        let formula = self.prepare(store, sheet, &field.expression)?;
        let column = self.compute_parsed(store, sheet, &formula, result_type, &[old_name])?;

        store.set_column(sheet, &field.name, column.values.clone())?;
        if renamed {
            if let Some(s) = store.sheet_mut(sheet) {
                s.remove_column(old_name);
            }
            log::debug!(
                "Renamed formula field '{}' to '{}' on '{}'",
                old_name,
                field.name,
                sheet
            );
        }
        self.registries
            .entry(sheet.to_string())
            .or_default()
            .replace(old_name, field);

        Ok(column)
    }

    /// Recompute a formula field from the current table data
    pub fn recalculate_formula_field(
        &self,
        store: &mut TableStore,
        sheet: &str,
        name: &str,
    ) -> EngineResult<ColumnValues> {
        let field = self
            .field(sheet, name)
            .ok_or_else(|| EngineError::UnknownFormula(name.to_string()))?;

        let formula = self.prepare(store, sheet, &field.expression)?;
        let column = self.compute_parsed(store, sheet, &formula, field.result_type, &[name])?;
        store.set_column(sheet, name, column.values.clone())?;

        Ok(column)
    }

    /// Recompute every formula field of a sheet, in creation order
    pub fn refresh_all(
        &self,
        store: &mut TableStore,
        sheet: &str,
    ) -> EngineResult<Vec<(String, ColumnValues)>> {
        let names: Vec<String> = self.fields(sheet).map(|f| f.name.clone()).collect();
        log::debug!("Refreshing {} formula fields on '{}'", names.len(), sheet);

        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let column = self.recalculate_formula_field(store, sheet, &name)?;
            columns.push((name, column));
        }
        Ok(columns)
    }

    /// Remove a formula field's definition and column
    ///
    /// Unknown names are ignored.
    pub fn delete_formula_field(
        &mut self,
        store: &mut TableStore,
        sheet: &str,
        name: &str,
    ) -> Option<FormulaField> {
        let field = self.registries.get_mut(sheet)?.remove(name)?;
        if let Some(s) = store.sheet_mut(sheet) {
            s.remove_column(name);
        }
        log::debug!("Deleted formula field '{}' on '{}'", name, sheet);
        Some(field)
    }

    // === Internals ===

    fn definition(
        name: &str,
        expression: &str,
        result_type: ResultType,
    ) -> EngineResult<FormulaField> {
        let name = name.trim();
        let expression = expression.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyName);
        }
        if expression.is_empty() {
            return Err(EngineError::EmptyExpression);
        }
        Ok(FormulaField::new(name, expression, result_type))
    }

    /// Parse and validate a formula for a sheet
    fn prepare(
        &self,
        store: &TableStore,
        sheet: &str,
        expression: &str,
    ) -> EngineResult<ParsedFormula> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(EngineError::EmptyExpression);
        }
        store.require(sheet)?;

        let formula = parse_references(expression)?;
        validate_references(store, sheet, formula.references())?;
        log::debug!(
            "Formula '{}' on '{}': {} references",
            expression,
            sheet,
            formula.references().len()
        );
        Ok(formula)
    }

    /// Evaluate a validated formula over every row of a sheet
    ///
    /// `excluded` columns are left out of same-sheet aggregates so that a
    /// field never counts its own previous values.
    fn compute_parsed(
        &self,
        store: &TableStore,
        sheet: &str,
        formula: &ParsedFormula,
        result_type: ResultType,
        excluded: &[&str],
    ) -> EngineResult<ColumnValues> {
        let current = store.require(sheet)?;
        let table = current.table();
        let visibility = if self.options.respect_visibility {
            current.visibility()
        } else {
            None
        };

        let rows: Vec<usize> = match visibility {
            Some(visible) => visible.iter().copied().collect(),
            None => (0..table.row_count()).collect(),
        };

        let scope = ResolveScope {
            store,
            table,
            excluded,
            rows: &rows,
            result_type,
        };
        let plans = plan_slots(&scope, formula.references());

        let expr = compile(formula);
        if let Err(err) = &expr {
            log::warn!(
                "Formula '{}' does not compile, every row will fault: {}",
                formula.source(),
                err
            );
        }
        let evaluator = RowEvaluator::new(formula, expr, plans, table, result_type);

        let mut stats = EvaluationStats::default();
        let mut values = Vec::with_capacity(table.row_count());
        for row in 0..table.row_count() {
            if visibility.map_or(false, |visible| !visible.contains(&row)) {
                values.push(Scalar::Empty);
                stats.rows_skipped += 1;
                continue;
            }

            let result = evaluator.evaluate_row(row);
            stats.rows_evaluated += 1;
            if let Some(err) = &result.fault {
                log::trace!("Row {} of '{}' faulted: {}", row, sheet, err);
                stats.rows_faulted += 1;
            }
            values.push(result.value);
        }

        log::debug!(
            "Formula '{}' on '{}': {} rows evaluated, {} skipped, {} faulted",
            formula.source(),
            sheet,
            stats.rows_evaluated,
            stats.rows_skipped,
            stats.rows_faulted
        );
        if stats.rows_faulted > 0 {
            log::warn!(
                "{} of {} rows of '{}' fell back to defaults for '{}'",
                stats.rows_faulted,
                stats.rows_evaluated,
                sheet,
                formula.source()
            );
        }

        Ok(ColumnValues { values, stats })
    }
}
