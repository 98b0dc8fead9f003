//! End-to-end tests for formula fields over a table store

use pretty_assertions::assert_eq;
use tabula::prelude::*;
use tabula::{ColumnValues, EngineOptions};

fn table<const N: usize>(name: &str, columns: [&str; N], rows: Vec<[Scalar; N]>) -> Table {
    let mut table = Table::with_columns(name, columns).unwrap();
    for row in rows {
        table.push_row(row).unwrap();
    }
    table
}

fn n(value: f64) -> Scalar {
    Scalar::Number(value)
}

fn t(value: &str) -> Scalar {
    Scalar::text(value)
}

fn store_with(tables: Vec<Table>) -> TableStore {
    let mut store = TableStore::new();
    for table in tables {
        store.add_sheet(table).unwrap();
    }
    store
}

/// Parts with a type column, plus Stock and Prices side sheets
fn inventory() -> TableStore {
    let parts = table(
        "Parts",
        ["Length", "Width", "Type"],
        vec![
            [n(10.0), n(5.0), t("bolt")],
            [n(2.0), n(3.0), t("nut")],
            [n(4.0), n(1.0), t("bolt")],
        ],
    );
    let stock = table(
        "Stock",
        ["Qty", "Status"],
        vec![
            [n(3.0), t("Retired")],
            [n(4.0), t("Pending")],
            [n(5.0), t("Retired")],
        ],
    );
    let prices = table(
        "Prices",
        ["SKU", "Price"],
        vec![[t("B200"), n(1.5)], [t("C300"), n(2.5)]],
    );
    store_with(vec![parts, stock, prices])
}

fn create(
    engine: &mut FormulaEngine,
    store: &mut TableStore,
    name: &str,
    expression: &str,
    result_type: ResultType,
) -> ColumnValues {
    engine
        .create_formula_field(store, "Parts", name, expression, result_type)
        .unwrap()
}

#[test]
fn test_area_single_row() {
    let mut store = store_with(vec![table(
        "Parts",
        ["Length", "Width"],
        vec![[n(10.0), n(5.0)]],
    )]);
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Area", "[Length] * [Width]", ResultType::Number);

    assert_eq!(column.values, vec![n(50.0)]);
    assert_eq!(store.columns("Parts").unwrap(), ["Length", "Width", "Area"]);
    assert_eq!(engine.field("Parts", "Area").unwrap().expression, "[Length] * [Width]");
}

#[test]
fn test_recalculation_is_idempotent() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();
    let expressions = [
        ("Bolts", "COUNT(bolt) + COUNT([Type])"),
        ("Mixed", "IF([Length] > 3, [Width], \"short\")"),
        ("Side", "Stock.Qty + Stock.[Qty(0)]"),
    ];
    for (name, expression) in expressions {
        create(&mut engine, &mut store, name, expression, ResultType::Auto);
    }

    let first = engine.refresh_all(&mut store, "Parts").unwrap();
    let second = engine.refresh_all(&mut store, "Parts").unwrap();
    assert_eq!(first, second);

    let once = engine
        .recalculate_formula_field(&mut store, "Parts", "Bolts")
        .unwrap();
    let twice = engine
        .recalculate_formula_field(&mut store, "Parts", "Bolts")
        .unwrap();
    assert_eq!(once.values, twice.values);
    assert_eq!(once.values, vec![n(4.0), n(3.0), n(4.0)]);
}

#[test]
fn test_unknown_field_is_not_created() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    for expression in ["[Height] * 2", "Stock.Price", "COUNT([Colour])"] {
        let err = engine
            .create_formula_field(&mut store, "Parts", "Bad", expression, ResultType::Number)
            .unwrap_err();
        match err {
            EngineError::Validation(err) => assert_eq!(err.kind, ValidationErrorKind::UnknownField),
            other => panic!("unexpected error for {}: {:?}", expression, other),
        }
        assert!(engine.field("Parts", "Bad").is_none());
        assert!(!store.table("Parts").unwrap().has_column("Bad"));
    }
}

#[test]
fn test_fixed_value_and_cross_sheet_field_coexist() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    let column = create(
        &mut engine,
        &mut store,
        "Stocked",
        "Stock.Qty * 100 + Stock.[Qty(2)]",
        ResultType::Number,
    );

    // Row-aligned Qty (3, 4, 5) scaled, plus the fixed third Qty
    assert_eq!(column.values, vec![n(305.0), n(405.0), n(505.0)]);
}

#[test]
fn test_numeric_literal_is_not_a_sheet() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Scaled", "[Length] * 3.14", ResultType::Number);

    assert_eq!(column.values[1], n(6.28));
    assert_eq!(column.stats.rows_faulted, 0);
}

#[test]
fn test_decimal_before_cross_sheet_field() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Short", "1.5-Stock.Qty", ResultType::Number);
    assert_eq!(column.values, vec![n(-1.5), n(-2.5), n(-3.5)]);
    assert_eq!(column.stats.rows_faulted, 0);

    let column = create(
        &mut engine,
        &mut store,
        "Both",
        "[Length] > 2.5 and Stock.Qty > 3",
        ResultType::Number,
    );
    assert_eq!(column.values, vec![n(0.0), n(0.0), n(1.0)]);

    let column = engine
        .compute(&store, "Parts", "[Length] > 1.5 and Stock.Qty > 2", ResultType::Number)
        .unwrap();
    assert_eq!(column.values, vec![n(1.0); 3]);
    assert_eq!(column.stats.rows_faulted, 0);
}

#[test]
fn test_cross_sheet_field_minus_decimal() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Spare", "Stock.Qty-1.5", ResultType::Number);

    assert_eq!(column.values, vec![n(1.5), n(2.5), n(3.5)]);
}

#[test]
fn test_shorter_sheet_clamps_to_last_row() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    // Prices has two rows; the third Parts row reads the last one
    let column = create(&mut engine, &mut store, "Double", "Prices.Price * 2", ResultType::Number);

    assert_eq!(column.values, vec![n(3.0), n(5.0), n(5.0)]);
    assert_eq!(column.stats.rows_faulted, 0);
}

#[test]
fn test_chained_comparison() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Narrow", "0 < [Width] < 4", ResultType::Number);

    // Width is 5, 3, 1
    assert_eq!(column.values, vec![n(0.0), n(1.0), n(1.0)]);
}

#[test]
fn test_or_yields_operand() {
    let mut store = store_with(vec![table(
        "Parts",
        ["Discount"],
        vec![[n(0.0)], [n(2.0)], [Scalar::Empty]],
    )]);
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Applied", "[Discount] or 5", ResultType::Auto);

    assert_eq!(column.values, vec![n(5.0), n(2.0), n(5.0)]);
}

#[test]
fn test_row_fault_is_isolated() {
    let rows = (0..10)
        .map(|i| [n(i as f64), n(if i == 5 { 0.0 } else { i as f64 + 1.0 })])
        .collect();
    let mut store = store_with(vec![table("Parts", ["Id", "Divisor"], rows)]);
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Share", "100 / [Divisor]", ResultType::Number);

    for (i, value) in column.values.iter().enumerate() {
        if i == 5 {
            assert_eq!(value, &n(0.0));
        } else {
            assert_eq!(value, &n(100.0 / (i as f64 + 1.0)), "row {}", i);
        }
    }
    assert_eq!(column.stats.rows_faulted, 1);
    assert_eq!(column.stats.rows_evaluated, 10);
}

#[test]
fn test_filtered_rows_are_left_empty() {
    let rows = (0..6).map(|i| [n(i as f64)]).collect();
    let mut store = store_with(vec![table("Parts", ["Id"], rows)]);
    {
        let sheet = store.sheet_mut("Parts").unwrap();
        sheet.add_filter(RowFilter::new("Id", FilterKind::NotEquals, "2"));
        sheet.add_filter(RowFilter::new("Id", FilterKind::NotEquals, "4"));
    }
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Double", "[Id] * 2", ResultType::Number);

    assert_eq!(
        column.values,
        vec![n(0.0), n(2.0), Scalar::Empty, n(6.0), Scalar::Empty, n(10.0)]
    );
    assert_eq!(column.stats.rows_skipped, 2);

    // Without visibility every row is computed
    let engine = FormulaEngine::with_options(EngineOptions {
        respect_visibility: false,
    });
    let column = engine
        .compute(&store, "Parts", "[Id] * 2", ResultType::Number)
        .unwrap();
    assert_eq!(column.values[2], n(4.0));
}

#[test]
fn test_count_field_frequencies() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    let column = create(&mut engine, &mut store, "Seen", "COUNT([Type])", ResultType::Number);

    assert_eq!(column.values, vec![n(2.0), n(1.0), n(2.0)]);
}

#[test]
fn test_has_value_without_match_is_false() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    let column = create(
        &mut engine,
        &mut store,
        "Active",
        "HAS_VALUE(Stock, Status, \"Active\")",
        ResultType::Auto,
    );

    assert_eq!(column.values, vec![t("False"); 3]);
}

#[test]
fn test_lookup_without_match_is_zero() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    let column = create(
        &mut engine,
        &mut store,
        "Price",
        "LOOKUP(Prices, Price, SKU, \"A100\")",
        ResultType::Number,
    );
    assert_eq!(column.values, vec![n(0.0); 3]);

    let column = create(
        &mut engine,
        &mut store,
        "Found",
        "LOOKUP(Prices, Price, SKU, \"C300\") * [Length]",
        ResultType::Number,
    );
    assert_eq!(column.values, vec![n(25.0), n(5.0), n(10.0)]);
}

#[test]
fn test_cross_sheet_needs_two_sheets() {
    let mut store = store_with(vec![table("Parts", ["Length"], vec![[n(1.0)]])]);
    let engine = FormulaEngine::new();

    let err = engine
        .validate_formula(&store, "Parts", "Stock.Qty + 1")
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ref e) if e.kind == ValidationErrorKind::CrossSheetUnavailable
    ));

    store
        .add_sheet(table("Other", ["Qty"], vec![[n(1.0)]]))
        .unwrap();
    let err = engine
        .validate_formula(&store, "Parts", "Stock.Qty + 1")
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ref e) if e.kind == ValidationErrorKind::UnknownSheet
    ));
}

#[test]
fn test_formula_on_another_sheet() {
    let mut store = inventory();
    let mut engine = FormulaEngine::new();

    engine
        .create_formula_field(&mut store, "Stock", "Double", "[Qty] * 2", ResultType::Number)
        .unwrap();

    assert_eq!(store.cell("Stock", 2, "Double"), Some(&n(10.0)));
    assert!(engine.field("Parts", "Double").is_none());
    assert_eq!(engine.fields("Stock").count(), 1);
}
