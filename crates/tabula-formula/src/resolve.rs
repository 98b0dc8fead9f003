//! Aggregate pre-resolution
//!
//! Whole-table work is done once per computation, before the row loop:
//! fixed values, `COUNT` totals, `LOOKUP` results and `HAS_VALUE` flags
//! become constants, and `COUNT([Field])` gets its frequency map. Row
//! references are turned into column lookups so the row loop never searches
//! by name.

use ahash::AHashMap;
use tabula_core::{Scalar, ScalarKey, Table, TableStore};

use crate::evaluator::Value;
use crate::field::ResultType;
use crate::reference::{Aggregate, Reference};

/// Everything the pre-resolver needs to know about one computation
pub(crate) struct ResolveScope<'a> {
    pub store: &'a TableStore,
    /// Table the formula belongs to
    pub table: &'a Table,
    /// Columns left out of whole-table aggregates on `table`
    pub excluded: &'a [&'a str],
    /// Rows of `table` that aggregates see
    pub rows: &'a [usize],
    pub result_type: ResultType,
}

/// Implicit row restriction taken from the first `HAS_VALUE` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilterContext {
    pub sheet: String,
    pub column: String,
    pub value: String,
}

/// How a reference slot gets its value for a row
pub(crate) enum SlotPlan<'a> {
    /// Same value for every row (`None` = unresolved)
    Constant(Option<Value>),
    /// Column of the formula's own table
    Local { column: Option<usize> },
    /// Column of another table, row index clamped to its length
    CrossSheet {
        table: &'a Table,
        column: Option<usize>,
    },
    /// Frequency of the row's value in a column of the formula's own table
    CountField {
        column: Option<usize>,
        counts: AHashMap<ScalarKey, usize>,
    },
}

/// Bind a cell for evaluation: empty cells become `0` or `""`
pub(crate) fn bind_scalar(cell: &Scalar, result_type: ResultType) -> Value {
    match cell {
        Scalar::Empty if result_type == ResultType::Number => Value::Number(0.0),
        Scalar::Empty => Value::text(""),
        other => other.into(),
    }
}

/// Plan every reference slot of a formula
pub(crate) fn plan_slots<'a>(
    scope: &ResolveScope<'a>,
    references: &[Reference],
) -> Vec<SlotPlan<'a>> {
    let context = filter_context(scope.store, references);
    if let Some(ctx) = &context {
        log::debug!(
            "Filter context {}.{} == '{}'",
            ctx.sheet,
            ctx.column,
            ctx.value
        );
    }

    references
        .iter()
        .map(|reference| plan_slot(scope, context.as_ref(), reference))
        .collect()
}

fn plan_slot<'a>(
    scope: &ResolveScope<'a>,
    context: Option<&FilterContext>,
    reference: &Reference,
) -> SlotPlan<'a> {
    match reference {
        Reference::LocalField(field) => SlotPlan::Local {
            column: scope.table.column_index(field),
        },

        Reference::CrossSheetField { sheet, field } => match scope.store.table(sheet) {
            Some(table) if !table.is_empty() => SlotPlan::CrossSheet {
                table,
                column: table.column_index(field),
            },
            _ => SlotPlan::Constant(None),
        },

        Reference::FixedValue {
            sheet,
            field,
            index,
        } => {
            let value = fixed_value(scope, context, sheet, field, *index);
            log::debug!("{} = {:?}", reference, value);
            SlotPlan::Constant(value)
        }

        Reference::Aggregate(Aggregate::CountField(field)) => {
            let column = scope.table.column_index(field);
            let counts = column.map(|col| value_counts(scope, col)).unwrap_or_default();
            SlotPlan::CountField { column, counts }
        }

        Reference::Aggregate(aggregate) => {
            let value = resolve_aggregate(scope, aggregate);
            log::debug!("{} = {:?}", reference, value);
            SlotPlan::Constant(value)
        }
    }
}

/// First `HAS_VALUE` call naming a loaded sheet
pub(crate) fn filter_context(
    store: &TableStore,
    references: &[Reference],
) -> Option<FilterContext> {
    references.iter().find_map(|reference| match reference {
        Reference::Aggregate(Aggregate::HasValue {
            sheet,
            column,
            value,
        }) if store.contains(sheet) => Some(FilterContext {
            sheet: sheet.clone(),
            column: column.clone(),
            value: value.clone(),
        }),
        _ => None,
    })
}

/// `Sheet.[Field(index)]`, narrowed by the filter context when it names the
/// same sheet
///
/// The narrowed rows are only used when at least one row matches.
fn fixed_value(
    scope: &ResolveScope<'_>,
    context: Option<&FilterContext>,
    sheet: &str,
    field: &str,
    index: usize,
) -> Option<Value> {
    let table = scope.store.table(sheet)?;
    let column = table.column_index(field)?;

    let narrowed: Vec<usize> = match context {
        Some(ctx) if ctx.sheet == sheet => match table.column_index(&ctx.column) {
            Some(filter_col) => (0..table.row_count())
                .filter(|&row| {
                    table
                        .cell_at(row, filter_col)
                        .map_or(false, |cell| cell.matches_literal(&ctx.value))
                })
                .collect(),
            None => Vec::new(),
        },
        _ => Vec::new(),
    };

    let row = if narrowed.is_empty() {
        index
    } else {
        *narrowed.get(index)?
    };

    table
        .cell_at(row, column)
        .map(|cell| bind_scalar(cell, scope.result_type))
}

fn resolve_aggregate(scope: &ResolveScope<'_>, aggregate: &Aggregate) -> Option<Value> {
    match aggregate {
        Aggregate::CountLiteral {
            sheet: None,
            literal,
        } => {
            let rows = scope.rows.iter().copied();
            let count = count_literal(scope.table, rows, scope.excluded, literal);
            Some(Value::Number(count as f64))
        }

        Aggregate::CountLiteral {
            sheet: Some(sheet),
            literal,
        } => {
            let table = scope.store.table(sheet)?;
            let excluded: &[&str] = if table.name() == scope.table.name() {
                scope.excluded
            } else {
                &[]
            };
            let count = count_literal(table, 0..table.row_count(), excluded, literal);
            Some(Value::Number(count as f64))
        }

        Aggregate::Lookup {
            sheet,
            get_column,
            filter_column,
            filter_value,
        } => Some(
            lookup(scope.store, sheet, get_column, filter_column, filter_value)
                .unwrap_or(Value::Number(0.0)),
        ),

        Aggregate::HasValue {
            sheet,
            column,
            value,
        } => Some(Value::Boolean(has_value(scope.store, sheet, column, value))),

        Aggregate::CountField(_) => None,
    }
}

/// Cells across every (non-excluded) column equal to `literal`
fn count_literal<I>(table: &Table, rows: I, excluded: &[&str], literal: &str) -> usize
where
    I: Iterator<Item = usize>,
{
    let columns: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| !excluded.contains(&name.as_str()))
        .map(|(i, _)| i)
        .collect();

    rows.filter_map(|row| table.row(row))
        .map(|cells| {
            columns
                .iter()
                .filter(|&&col| cells[col].matches_literal(literal))
                .count()
        })
        .sum()
}

/// Frequency of each value of one column over the aggregate rows
fn value_counts(scope: &ResolveScope<'_>, column: usize) -> AHashMap<ScalarKey, usize> {
    let mut counts = AHashMap::new();
    for &row in scope.rows {
        if let Some(key) = scope.table.cell_at(row, column).and_then(Scalar::key) {
            *counts.entry(key).or_insert(0) += 1;
        }
    }
    counts
}

/// First usable `get_column` value among rows where `filter_column` matches
///
/// Empty cells, zero and the texts `"0"` and `""` are skipped.
fn lookup(
    store: &TableStore,
    sheet: &str,
    get_column: &str,
    filter_column: &str,
    filter_value: &str,
) -> Option<Value> {
    let table = store.table(sheet)?;
    let get = table.column_index(get_column)?;
    let filter = table.column_index(filter_column)?;

    table
        .rows()
        .filter(|cells| cells[filter].matches_literal(filter_value))
        .map(|cells| &cells[get])
        .find(|cell| match cell {
            Scalar::Empty => false,
            Scalar::Number(n) => *n != 0.0,
            Scalar::Text(s) => !s.is_empty() && s != "0",
        })
        .map(Value::from)
}

fn has_value(store: &TableStore, sheet: &str, column: &str, value: &str) -> bool {
    store
        .table(sheet)
        .and_then(|table| table.column_values(column))
        .map_or(false, |mut cells| cells.any(|cell| cell.matches_literal(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::parse_references;
    use pretty_assertions::assert_eq;

    fn store() -> TableStore {
        let mut store = TableStore::new();

        let mut parts = Table::with_columns("Parts", ["Type", "Tag"]).unwrap();
        for (ty, tag) in [("bolt", "nut"), ("nut", "x"), ("bolt", "bolt")] {
            parts.push_row([ty, tag]).unwrap();
        }
        store.add_sheet(parts).unwrap();

        let mut prices = Table::with_columns("Prices", ["SKU", "Price", "Status"]).unwrap();
        prices
            .push_row([Scalar::from("A1"), Scalar::from(0), "Old".into()])
            .unwrap();
        prices
            .push_row([Scalar::from("A1"), Scalar::from(12.5), "Active".into()])
            .unwrap();
        prices
            .push_row([Scalar::from("B2"), Scalar::Empty, "Active".into()])
            .unwrap();
        store.add_sheet(prices).unwrap();
        store
    }

    fn constants(store: &TableStore, rows: &[usize], formula: &str) -> Vec<Option<Value>> {
        let parsed = parse_references(formula).unwrap();
        let scope = ResolveScope {
            store,
            table: store.table("Parts").unwrap(),
            excluded: &[],
            rows,
            result_type: ResultType::Number,
        };
        plan_slots(&scope, parsed.references())
            .into_iter()
            .map(|plan| match plan {
                SlotPlan::Constant(value) => value,
                _ => panic!("Expected constant plan"),
            })
            .collect()
    }

    #[test]
    fn test_count_literal_scans_every_column() {
        let store = store();
        assert_eq!(
            constants(&store, &[0, 1, 2], "COUNT(bolt) + COUNT(Prices.Active)"),
            vec![Some(Value::Number(3.0)), Some(Value::Number(2.0))]
        );
        // Only the aggregate rows of the formula's own table are counted
        assert_eq!(
            constants(&store, &[1], "COUNT(bolt)"),
            vec![Some(Value::Number(0.0))]
        );
    }

    #[test]
    fn test_count_literal_excludes_target_column() {
        let store = store();
        let parsed = parse_references("COUNT(nut)").unwrap();
        let scope = ResolveScope {
            store: &store,
            table: store.table("Parts").unwrap(),
            excluded: &["Tag"],
            rows: &[0, 1, 2],
            result_type: ResultType::Number,
        };
        match &plan_slots(&scope, parsed.references())[0] {
            SlotPlan::Constant(value) => assert_eq!(value, &Some(Value::Number(1.0))),
            _ => panic!("Expected constant plan"),
        }
    }

    #[test]
    fn test_lookup_skips_zero_and_empty() {
        let store = store();
        assert_eq!(
            constants(&store, &[0], "LOOKUP(Prices, Price, SKU, A1)"),
            vec![Some(Value::Number(12.5))]
        );
        assert_eq!(
            constants(&store, &[0], "LOOKUP(Prices, Price, SKU, B2)"),
            vec![Some(Value::Number(0.0))]
        );
        assert_eq!(
            constants(&store, &[0], "LOOKUP(Prices, Status, SKU, \"B2\")"),
            vec![Some(Value::text("Active"))]
        );
    }

    #[test]
    fn test_has_value() {
        let store = store();
        assert_eq!(
            constants(&store, &[0], "HAS_VALUE(Prices, Status, Active)"),
            vec![Some(Value::Boolean(true))]
        );
        assert_eq!(
            constants(&store, &[0], "HAS_VALUE(Prices, Status, Retired)"),
            vec![Some(Value::Boolean(false))]
        );
    }

    #[test]
    fn test_fixed_value_uses_filter_context() {
        let store = store();
        // Without context: row 1 of the full table
        assert_eq!(
            constants(&store, &[0], "Prices.[SKU(1)]"),
            vec![Some(Value::text("A1"))]
        );
        // With context: row 1 of the Status == Active rows. Fixed values
        // are extracted before function calls.
        assert_eq!(
            constants(
                &store,
                &[0],
                "IF(HAS_VALUE(Prices, Status, Active), Prices.[SKU(1)], 0)"
            ),
            vec![Some(Value::text("B2")), Some(Value::Boolean(true))]
        );
        // Context matching nothing falls back to the full table
        assert_eq!(
            constants(
                &store,
                &[0],
                "HAS_VALUE(Prices, Status, Gone) + Prices.[SKU(2)]"
            ),
            vec![Some(Value::text("B2")), Some(Value::Boolean(false))]
        );
        // Index past the narrowed rows is unresolved
        assert_eq!(
            constants(
                &store,
                &[0],
                "HAS_VALUE(Prices, Status, Old) + Prices.[SKU(1)]"
            ),
            vec![None, Some(Value::Boolean(true))]
        );
    }

    #[test]
    fn test_fixed_value_null_binding() {
        let store = store();
        assert_eq!(
            constants(&store, &[0], "Prices.[Price(2)]"),
            vec![Some(Value::Number(0.0))]
        );
    }

    #[test]
    fn test_count_field_map() {
        let store = store();
        let parsed = parse_references("COUNT([Type])").unwrap();
        let scope = ResolveScope {
            store: &store,
            table: store.table("Parts").unwrap(),
            excluded: &[],
            rows: &[0, 1, 2],
            result_type: ResultType::Number,
        };
        match &plan_slots(&scope, parsed.references())[0] {
            SlotPlan::CountField { column, counts } => {
                assert_eq!(*column, Some(0));
                assert_eq!(counts.get(&ScalarKey::Text("bolt".into())), Some(&2));
                assert_eq!(counts.get(&ScalarKey::Text("nut".into())), Some(&1));
            }
            _ => panic!("Expected count plan"),
        }
    }
}
