//! Conversion of cleaned-table cells into JSON values the store will accept.

use serde_json::{Number, Value};
use std::collections::BTreeSet;

use crate::app::ports::Record;
use crate::pipeline::storage::csv_table::CleanTable;

/// The JSON shape a column travels as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
}

/// Decide each column's kind from its present cells, the way a dataframe
/// reader infers dtypes: integer if every cell is an `i64`, real if every cell
/// is an `f64` (including `NaN`/`inf`), text otherwise. `text_columns` are
/// always text; numeric `int_columns` are always integer.
pub fn infer_kinds(
    table: &CleanTable,
    int_columns: &BTreeSet<String>,
    text_columns: &BTreeSet<String>,
) -> Vec<ColumnKind> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if text_columns.contains(name) {
                return ColumnKind::Text;
            }
            let mut cells = table
                .rows
                .iter()
                .filter_map(|row| row.get(idx).and_then(|c| c.as_deref()));

            let kind = if cells.clone().all(|c| c.parse::<i64>().is_ok()) {
                ColumnKind::Integer
            } else if cells.all(|c| c.parse::<f64>().is_ok()) {
                ColumnKind::Real
            } else {
                ColumnKind::Text
            };

            if kind != ColumnKind::Text && int_columns.contains(name) {
                ColumnKind::Integer
            } else {
                kind
            }
        })
        .collect()
}

/// Convert one cell. Absent, non-finite and unparseable numerics become `null`.
pub fn wire_value(cell: Option<&str>, kind: ColumnKind) -> Value {
    let Some(text) = cell else {
        return Value::Null;
    };
    match kind {
        ColumnKind::Text => Value::String(text.to_string()),
        ColumnKind::Real => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ColumnKind::Integer => {
            if let Ok(v) = text.parse::<i64>() {
                return Value::Number(v.into());
            }
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                    Value::Number((v as i64).into())
                }
                _ => Value::Null,
            }
        }
    }
}

/// Build the records for rows `[start, end)` of the table
pub fn to_records(table: &CleanTable, kinds: &[ColumnKind], start: usize, end: usize) -> Vec<Record> {
    table.rows[start..end]
        .iter()
        .map(|row| {
            table
                .columns
                .iter()
                .zip(kinds)
                .enumerate()
                .map(|(idx, (name, kind))| {
                    let cell = row.get(idx).and_then(|c| c.as_deref());
                    (name.clone(), wire_value(cell, *kind))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn table(csv: &str) -> CleanTable {
        CleanTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn kinds_follow_column_contents() {
        let t = table(
            "federal_provider_number,overall_rating,total_amount_of_fines_in_dollars,state\n\
             015009,3,1234.5,AL\n\
             015010,,0,AK\n",
        );
        let kinds = infer_kinds(&t, &set(&[]), &set(&["federal_provider_number"]));
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Text,
                ColumnKind::Integer,
                ColumnKind::Real,
                ColumnKind::Text
            ]
        );
    }

    #[test]
    fn int_columns_override_real_inference() {
        let t = table("staffing_rating,score\n3.0,1.5\n,2\n");
        let kinds = infer_kinds(&t, &set(&["staffing_rating"]), &set(&[]));
        assert_eq!(kinds, vec![ColumnKind::Integer, ColumnKind::Real]);

        let records = to_records(&t, &kinds, 0, 2);
        assert_eq!(records[0]["staffing_rating"], json!(3));
        assert_eq!(records[1]["staffing_rating"], Value::Null);
    }

    #[test]
    fn without_text_override_padded_keys_would_lose_zeros() {
        let t = table("federal_provider_number\n015009\n");
        let inferred = infer_kinds(&t, &set(&[]), &set(&[]));
        assert_eq!(inferred, vec![ColumnKind::Integer]);

        let forced = infer_kinds(&t, &set(&[]), &set(&["federal_provider_number"]));
        let records = to_records(&t, &forced, 0, 1);
        assert_eq!(records[0]["federal_provider_number"], json!("015009"));
    }

    #[test]
    fn non_finite_reals_become_null() {
        assert_eq!(wire_value(Some("NaN"), ColumnKind::Real), Value::Null);
        assert_eq!(wire_value(Some("inf"), ColumnKind::Real), Value::Null);
        assert_eq!(wire_value(Some("-inf"), ColumnKind::Integer), Value::Null);
        assert_eq!(wire_value(Some("85.0"), ColumnKind::Real), json!(85.0));
    }

    #[test]
    fn absent_cells_are_explicit_null() {
        assert_eq!(wire_value(None, ColumnKind::Text), Value::Null);
        assert_eq!(wire_value(None, ColumnKind::Integer), Value::Null);
    }

    #[test]
    fn fractional_values_in_int_columns_are_null() {
        assert_eq!(wire_value(Some("3.5"), ColumnKind::Integer), Value::Null);
        assert_eq!(wire_value(Some("4"), ColumnKind::Integer), json!(4));
    }

    #[test]
    fn text_passes_through_unchanged() {
        assert_eq!(
            wire_value(Some("Falls, major injury"), ColumnKind::Text),
            json!("Falls, major injury")
        );
    }

    #[test]
    fn records_keep_column_order_and_null_cells() {
        let t = table("federal_provider_number,survey_date\n015009,2023-03-14\n015010,\n");
        let kinds = infer_kinds(&t, &set(&[]), &set(&["federal_provider_number"]));
        let records = to_records(&t, &kinds, 1, 2);
        assert_eq!(records.len(), 1);
        assert_eq!(
            Value::Object(records[0].clone()),
            json!({"federal_provider_number": "015010", "survey_date": null})
        );
    }
}
