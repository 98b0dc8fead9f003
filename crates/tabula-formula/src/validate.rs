//! Reference validation
//!
//! Every reference in a formula must resolve against the loaded sheets
//! before anything is computed. The first failing reference rejects the
//! whole formula.

use tabula_core::TableStore;

use crate::error::{ValidationError, ValidationErrorKind};
use crate::reference::{Aggregate, Reference};

/// Check every reference against the store
///
/// `sheet` is the sheet the formula belongs to; `[Field]` and `COUNT([Field])`
/// resolve against it.
pub fn validate_references(
    store: &TableStore,
    sheet: &str,
    references: &[Reference],
) -> Result<(), ValidationError> {
    let validator = Validator { store, sheet };
    references.iter().try_for_each(|r| validator.check(r))
}

struct Validator<'a> {
    store: &'a TableStore,
    sheet: &'a str,
}

impl Validator<'_> {
    fn check(&self, reference: &Reference) -> Result<(), ValidationError> {
        match reference {
            Reference::LocalField(field) | Reference::Aggregate(Aggregate::CountField(field)) => {
                self.require_column(self.sheet, field)
            }

            Reference::CrossSheetField { sheet, field } => {
                self.require_cross_sheet(sheet)?;
                self.require_column(sheet, field)
            }

            Reference::FixedValue {
                sheet,
                field,
                index,
            } => {
                self.require_cross_sheet(sheet)?;
                self.require_column(sheet, field)?;
                let rows = self.store.row_count(sheet).unwrap_or(0);
                if *index >= rows {
                    return Err(ValidationError::new(
                        ValidationErrorKind::IndexOutOfBounds,
                        format!(
                            "Index {} out of bounds for sheet '{}' ({} rows)",
                            index, sheet, rows
                        ),
                    ));
                }
                Ok(())
            }

            Reference::Aggregate(Aggregate::CountLiteral { sheet, .. }) => match sheet {
                Some(sheet) => self.require_cross_sheet(sheet),
                None => Ok(()),
            },

            Reference::Aggregate(Aggregate::Lookup {
                sheet,
                get_column,
                filter_column,
                ..
            }) => {
                self.require_cross_sheet(sheet)?;
                self.require_column(sheet, get_column)?;
                self.require_column(sheet, filter_column)
            }

            Reference::Aggregate(Aggregate::HasValue { sheet, column, .. }) => {
                self.require_cross_sheet(sheet)?;
                self.require_column(sheet, column)
            }
        }
    }

    /// Cross-sheet forms need another sheet to be loaded, and the sheet must exist
    fn require_cross_sheet(&self, sheet: &str) -> Result<(), ValidationError> {
        if self.store.sheet_count() <= 1 {
            return Err(ValidationError::new(
                ValidationErrorKind::CrossSheetUnavailable,
                format!(
                    "Reference to sheet '{}' requires more than one loaded sheet",
                    sheet
                ),
            ));
        }
        if !self.store.contains(sheet) {
            return Err(ValidationError::new(
                ValidationErrorKind::UnknownSheet,
                format!("Sheet '{}' not found", sheet),
            ));
        }
        Ok(())
    }

    fn require_column(&self, sheet: &str, column: &str) -> Result<(), ValidationError> {
        let Some(columns) = self.store.columns(sheet) else {
            return Err(ValidationError::new(
                ValidationErrorKind::UnknownSheet,
                format!("Sheet '{}' not found", sheet),
            ));
        };
        if columns.iter().any(|c| c == column) {
            Ok(())
        } else if sheet == self.sheet {
            Err(ValidationError::new(
                ValidationErrorKind::UnknownField,
                format!("Field '{}' not found", column),
            ))
        } else {
            Err(ValidationError::new(
                ValidationErrorKind::UnknownField,
                format!("Field '{}' not found in sheet '{}'", column, sheet),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::parse_references;
    use tabula_core::{Scalar, Table};

    fn store() -> TableStore {
        let mut store = TableStore::new();
        let mut parts = Table::with_columns("Parts", ["Length", "Type"]).unwrap();
        parts.push_row([10, 1]).unwrap();
        store.add_sheet(parts).unwrap();

        let mut stock = Table::with_columns("Stock", ["Qty", "Status"]).unwrap();
        stock.push_row([Scalar::from(3), "Active".into()]).unwrap();
        stock.push_row([Scalar::from(4), "Retired".into()]).unwrap();
        store.add_sheet(stock).unwrap();
        store
    }

    fn check(store: &TableStore, formula: &str) -> Result<(), ValidationError> {
        let parsed = parse_references(formula).unwrap();
        validate_references(store, "Parts", parsed.references())
    }

    fn kind(store: &TableStore, formula: &str) -> ValidationErrorKind {
        check(store, formula).unwrap_err().kind
    }

    #[test]
    fn test_valid_formulas() {
        let store = store();
        assert!(check(&store, "[Length] * 2").is_ok());
        assert!(check(&store, "Stock.Qty + Stock.[Qty(1)]").is_ok());
        assert!(check(&store, "COUNT([Type]) + COUNT(bolt) + COUNT(Stock.Active)").is_ok());
        assert!(check(&store, "LOOKUP(Stock, Qty, Status, \"Active\")").is_ok());
        assert!(check(&store, "HAS_VALUE(Stock, Status, \"Active\")").is_ok());
        assert!(check(&store, "[Length] * 3.14").is_ok());
    }

    #[test]
    fn test_unknown_field() {
        let store = store();
        assert_eq!(kind(&store, "[Width] * 2"), ValidationErrorKind::UnknownField);
        assert_eq!(kind(&store, "COUNT([Width])"), ValidationErrorKind::UnknownField);
        assert_eq!(kind(&store, "Stock.Price"), ValidationErrorKind::UnknownField);
        assert_eq!(
            kind(&store, "LOOKUP(Stock, Price, Status, x)"),
            ValidationErrorKind::UnknownField
        );
        assert_eq!(
            check(&store, "[Width]").unwrap_err().detail,
            "Field 'Width' not found"
        );
    }

    #[test]
    fn test_unknown_sheet() {
        let store = store();
        assert_eq!(kind(&store, "Prices.Price"), ValidationErrorKind::UnknownSheet);
        assert_eq!(
            kind(&store, "HAS_VALUE(Prices, SKU, A100)"),
            ValidationErrorKind::UnknownSheet
        );
        assert_eq!(kind(&store, "COUNT(Prices.x)"), ValidationErrorKind::UnknownSheet);
    }

    #[test]
    fn test_index_out_of_bounds() {
        let store = store();
        assert_eq!(
            kind(&store, "Stock.[Qty(2)]"),
            ValidationErrorKind::IndexOutOfBounds
        );
    }

    #[test]
    fn test_cross_sheet_unavailable() {
        let mut store = store();
        store.remove_sheet("Stock").unwrap();
        assert_eq!(
            kind(&store, "Stock.Qty"),
            ValidationErrorKind::CrossSheetUnavailable
        );
        assert_eq!(
            kind(&store, "LOOKUP(Parts, Length, Type, 1)"),
            ValidationErrorKind::CrossSheetUnavailable
        );
        assert!(check(&store, "[Length] + COUNT(1)").is_ok());
    }

    #[test]
    fn test_first_failure_wins() {
        let store = store();
        let err = check(&store, "[Width] + Prices.Price").unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::UnknownField);
    }
}
