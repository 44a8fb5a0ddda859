//! Row and column checks over a fact table.
//!
//! Every check borrows its input and either returns a new table or fails with
//! a [`FactError`]. The caller's table is never modified, so the same raw
//! table can be checked repeatedly. Checks compose with [`apply_checks`].

use crate::error::{ConversionError, FactContext, FactError, Result};
use crate::schema::{Cell, Column, FactTable};
use crate::utils::{parse_date, parse_number};

/// A single step of a validation chain.
pub type Check = fn(&FactTable) -> Result<FactTable>;

/// Runs `checks` in order, feeding each the previous output. Stops at the first failure.
pub fn apply_checks(table: &FactTable, checks: &[Check]) -> Result<FactTable> {
    let mut current = table.clone();
    for check in checks {
        current = check(&current)?;
    }
    Ok(current)
}

/// True if the table has no rows or every `value` cell is none-like.
pub fn data_missing(table: &FactTable) -> bool {
    table.is_empty() || table.rows().iter().all(|row| row.is_none_like(Column::Value))
}

/// Fails with `MissingFact` if any cell of `column` is none-like.
///
/// Only `column` is inspected.
pub fn err_if_none_in_column(column: Column, table: &FactTable) -> Result<()> {
    let offending = table.labels_where(|row| row.is_none_like(column));
    if offending.is_empty() {
        return Ok(());
    }

    let concepts: Vec<String> = table
        .iter()
        .filter(|(label, _)| offending.contains(label))
        .map(|(_, row)| row.concept.clone())
        .collect();

    Err(FactError::missing(
        FactContext::new().column(column).rows(offending),
        format!(
            "Found none-like value(s) in column '{}' for {}",
            column,
            concepts.join(", ")
        ),
    ))
}

/// Converts every `value` cell to a number.
///
/// Fails with `InvalidFact` on the first cell that is not numeric.
pub fn values_to_num(table: &FactTable) -> Result<FactTable> {
    let mut out = table.clone();
    for (label, row) in out.iter_mut() {
        let number = match &row.value {
            Cell::Number(n) if n.is_finite() => *n,
            Cell::Number(n) => {
                return Err(FactError::conversion(
                    value_context(label),
                    format!("Failed to convert value of {} to numeric", row.concept),
                    ConversionError::NotFinite(n.to_string()),
                ))
            }
            Cell::Text(text) => parse_number(text).map_err(|e| {
                FactError::conversion(
                    value_context(label),
                    format!(
                        "Failed to convert value '{}' of {} to numeric",
                        text, row.concept
                    ),
                    e,
                )
            })?,
            Cell::Null => {
                return Err(FactError::conversion(
                    value_context(label),
                    format!("Failed to convert value of {} to numeric", row.concept),
                    ConversionError::Empty,
                ))
            }
            Cell::Date(date) => {
                return Err(FactError::invalid(
                    value_context(label),
                    format!(
                        "Value of {} is a date ({}), expected a number",
                        row.concept, date
                    ),
                ))
            }
        };
        row.value = Cell::Number(number);
    }
    Ok(out)
}

/// Fails with `InvalidFact` if any value is < 0.
pub fn values_not_negative(table: &FactTable) -> Result<FactTable> {
    check_values(table, "should not be < 0", |v| v >= 0.0)
}

/// Fails with `InvalidFact` if any value is <= 0.
pub fn values_positive(table: &FactTable) -> Result<FactTable> {
    check_values(table, "should be > 0", |v| v > 0.0)
}

/// Fails with `InvalidFact` if any value is > 0.
pub fn values_non_positive(table: &FactTable) -> Result<FactTable> {
    check_values(table, "should not be > 0", |v| v <= 0.0)
}

/// Requires and parses `period_start` and `period_end`.
pub fn duration_to_date(table: &FactTable) -> Result<FactTable> {
    err_if_none_in_column(Column::PeriodStart, table)?;
    err_if_none_in_column(Column::PeriodEnd, table)?;
    let out = column_to_date(Column::PeriodStart, table)?;
    column_to_date(Column::PeriodEnd, &out)
}

/// Requires and parses `period_instant`.
pub fn instant_to_date(table: &FactTable) -> Result<FactTable> {
    err_if_none_in_column(Column::PeriodInstant, table)?;
    column_to_date(Column::PeriodInstant, table)
}

fn value_context(label: usize) -> FactContext {
    FactContext::new().column(Column::Value).rows(vec![label])
}

// All rows are checked together so the error names every violation.
fn check_values<F>(table: &FactTable, constraint: &str, accept: F) -> Result<FactTable>
where
    F: Fn(f64) -> bool,
{
    let unconverted = table.labels_where(|row| row.value.as_number().is_none());
    if !unconverted.is_empty() {
        return Err(FactError::invalid(
            FactContext::new().column(Column::Value).rows(unconverted),
            "Value is not numeric; convert values before checking their sign",
        ));
    }

    let offending = table.labels_where(|row| row.value.as_number().is_some_and(|v| !accept(v)));
    if !offending.is_empty() {
        return Err(FactError::invalid(
            FactContext::new().column(Column::Value).rows(offending),
            format!("Value {}", constraint),
        ));
    }

    Ok(table.clone())
}

fn column_to_date(column: Column, table: &FactTable) -> Result<FactTable> {
    let mut out = table.clone();
    for (label, row) in out.iter_mut() {
        let concept = row.concept.clone();
        let Some(cell) = row.cell_mut(column) else {
            return Err(FactError::invalid(
                FactContext::new().column(column),
                format!("Column '{}' does not hold dates", column),
            ));
        };

        let date = match &*cell {
            Cell::Date(date) => *date,
            Cell::Text(text) => parse_date(text).map_err(|e| {
                FactError::conversion(
                    FactContext::new().column(column).rows(vec![label]),
                    format!("Failed to convert '{}' of {} to date", text, concept),
                    e,
                )
            })?,
            Cell::Number(n) => {
                return Err(FactError::invalid(
                    FactContext::new().column(column).rows(vec![label]),
                    format!("Failed to convert {} of {} to date", n, concept),
                ))
            }
            Cell::Null => {
                return Err(FactError::missing(
                    FactContext::new().column(column).rows(vec![label]),
                    format!("No date for {}", concept),
                ))
            }
        };
        *cell = Cell::Date(date);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactErrorKind;
    use crate::schema::FactRow;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn table_of_values(values: Vec<Cell>) -> FactTable {
        values
            .into_iter()
            .map(|v| FactRow::duration("us-gaap:Revenues", v, "2020-07-01", "2020-10-01"))
            .collect()
    }

    fn numbers(values: &[f64]) -> FactTable {
        table_of_values(values.iter().map(|v| Cell::Number(*v)).collect())
    }

    #[test]
    fn test_data_missing_empty() {
        assert!(data_missing(&FactTable::new()));
    }

    #[rstest]
    #[case(vec![Cell::Null, Cell::Null])]
    #[case(vec![Cell::text(""), Cell::text("")])]
    #[case(vec![Cell::text("  "), Cell::Number(f64::NAN)])]
    fn test_data_missing_all_none_like(#[case] values: Vec<Cell>) {
        assert!(data_missing(&table_of_values(values)));
    }

    #[rstest]
    #[case(vec![Cell::text("234561"), Cell::text("")])]
    #[case(vec![Cell::text("3400521"), Cell::text("42145")])]
    #[case(vec![Cell::Null, Cell::Number(0.0)])]
    fn test_data_missing_returns_false(#[case] values: Vec<Cell>) {
        assert!(!data_missing(&table_of_values(values)));
    }

    #[test]
    fn test_err_if_none_in_column_names_rows() {
        let table = table_of_values(vec![Cell::text("1"), Cell::text(" "), Cell::Null]);
        let err = err_if_none_in_column(Column::Value, &table).unwrap_err();
        assert_eq!(err.kind(), FactErrorKind::MissingFact);
        assert_eq!(err.context().column, Some(Column::Value));
        assert_eq!(err.context().rows, vec![1, 2]);
    }

    #[test]
    fn test_err_if_none_in_column_ignores_other_columns() {
        let table = table_of_values(vec![Cell::Null]);
        assert!(err_if_none_in_column(Column::PeriodEnd, &table).is_ok());
        // Duration rows carry no instant.
        assert!(err_if_none_in_column(Column::PeriodInstant, &table).is_err());
    }

    #[test]
    fn test_values_to_num_converts_copy() {
        let table = table_of_values(vec![Cell::text("100000"), Cell::text("-3000"), Cell::Number(1.5)]);
        let converted = values_to_num(&table).unwrap();
        let values: Vec<f64> = converted
            .rows()
            .iter()
            .filter_map(|r| r.value.as_number())
            .collect();
        assert_eq!(values, vec![100000.0, -3000.0, 1.5]);
        assert_eq!(table.rows()[0].value, Cell::text("100000"));
    }

    #[rstest]
    #[case(Cell::text("NVDA"))]
    #[case(Cell::text("NaN"))]
    #[case(Cell::Null)]
    #[case(Cell::Number(f64::INFINITY))]
    fn test_values_to_num_rejects(#[case] bad: Cell) {
        let table = table_of_values(vec![Cell::text("1"), bad]);
        let err = values_to_num(&table).unwrap_err();
        assert!(err.is_invalid());
        assert_eq!(err.context().rows, vec![1]);
    }

    #[test]
    fn test_values_to_num_wraps_cause() {
        use std::error::Error as _;
        let err = values_to_num(&table_of_values(vec![Cell::text("bla")])).unwrap_err();
        let FactError::InvalidFact { cause, .. } = &err else {
            panic!("expected InvalidFact, got {:?}", err);
        };
        assert!(matches!(cause, Some(ConversionError::Number(_))));
        assert!(err.source().is_some());
    }

    #[rstest]
    #[case(&[0.0, 5.0], true)]
    #[case(&[1.0, -0.01], false)]
    fn test_values_not_negative(#[case] values: &[f64], #[case] ok: bool) {
        assert_eq!(values_not_negative(&numbers(values)).is_ok(), ok);
    }

    #[rstest]
    #[case(&[1.0, 400000.0], true)]
    #[case(&[0.0], false)]
    #[case(&[-1.0], false)]
    fn test_values_positive(#[case] values: &[f64], #[case] ok: bool) {
        assert_eq!(values_positive(&numbers(values)).is_ok(), ok);
    }

    #[rstest]
    #[case(&[0.0, -3000.0], true)]
    #[case(&[3000.0], false)]
    fn test_values_non_positive(#[case] values: &[f64], #[case] ok: bool) {
        assert_eq!(values_non_positive(&numbers(values)).is_ok(), ok);
    }

    #[test]
    fn test_sign_check_reports_every_violation() {
        let err = values_not_negative(&numbers(&[-1.0, 2.0, -3.0])).unwrap_err();
        assert!(err.is_invalid());
        assert_eq!(err.context().rows, vec![0, 2]);
    }

    #[test]
    fn test_sign_check_requires_numbers() {
        let err = values_positive(&table_of_values(vec![Cell::text("5")])).unwrap_err();
        assert!(err.is_invalid());
    }

    #[test]
    fn test_duration_to_date() {
        let table = table_of_values(vec![Cell::text("1")]);
        let converted = duration_to_date(&table).unwrap();
        let row = &converted.rows()[0];
        assert_eq!(row.period_start.as_date(), NaiveDate::from_ymd_opt(2020, 7, 1));
        assert_eq!(row.period_end.as_date(), NaiveDate::from_ymd_opt(2020, 10, 1));
    }

    #[test]
    fn test_duration_to_date_missing_start() {
        let table: FactTable =
            vec![FactRow::duration("us-gaap:Revenues", "1", Cell::Null, "2020-10-01")].into();
        let err = duration_to_date(&table).unwrap_err();
        assert!(err.is_missing());
        assert_eq!(err.context().column, Some(Column::PeriodStart));
    }

    #[test]
    fn test_duration_to_date_unparseable() {
        let table: FactTable =
            vec![FactRow::duration("us-gaap:Revenues", "1", "2020-07-01", "Q3")].into();
        let err = duration_to_date(&table).unwrap_err();
        assert!(err.is_invalid());
        assert_eq!(err.context().column, Some(Column::PeriodEnd));
    }

    #[test]
    fn test_instant_to_date() {
        let table: FactTable = vec![
            FactRow::instant("us-gaap:CashAndCashEquivalentsAtCarryingValue", "1", "2020-10-01"),
            FactRow::instant("us-gaap:CashAndCashEquivalentsAtCarryingValue", "2", ""),
        ]
        .into();
        assert!(instant_to_date(&table).unwrap_err().is_missing());

        let table: FactTable =
            vec![FactRow::instant("us-gaap:Assets", "1", "2020-10-01T00:00:00")].into();
        let converted = instant_to_date(&table).unwrap();
        assert_eq!(
            converted.rows()[0].period_instant,
            Cell::Date(NaiveDate::from_ymd_opt(2020, 10, 1).unwrap())
        );
    }

    #[test]
    fn test_apply_checks_stops_at_first_failure() {
        let table = table_of_values(vec![Cell::text("abc")]);
        let err = apply_checks(&table, &[values_to_num, values_positive]).unwrap_err();
        assert!(matches!(
            err,
            FactError::InvalidFact {
                cause: Some(ConversionError::Number(_)),
                ..
            }
        ));

        let table = table_of_values(vec![Cell::text("7")]);
        let out = apply_checks(&table, &[values_to_num, values_positive]).unwrap();
        assert_eq!(out.rows()[0].value, Cell::Number(7.0));
    }
}
