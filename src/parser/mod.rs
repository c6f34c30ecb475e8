// LedgerLens - GPL-3.0-or-later
// This file is part of LedgerLens.
//
// Copyright (C) 2025 Daniel Freiermuth
//
// LedgerLens is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// LedgerLens is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with LedgerLens.  If not, see <https://www.gnu.org/licenses/>.

//! Turning raw filing records into fixed-width feature vectors.
//!
//! Normalization is deliberately lossy: a missing field, an empty string,
//! garbage text and a reported `0` all become `0.0`. Downstream code (most
//! visibly the narrator) treats zero as "not reported" for that reason.

pub mod record;

pub use record::Record;

use ndarray::Array2;
use serde_json::Value;

/// Number of features every record is reduced to
pub const N_FEATURES: usize = 6;

/// Feature columns, in matrix column order
pub const FEATURES: [&str; N_FEATURES] = [
    "taxableIncome",
    "salary",
    "revenue",
    "amountTaxable",
    "bubblegumTax",
    "confectionarySalesTaxPercent",
];

/// Column index of a feature name, if it belongs to the feature set
#[must_use]
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURES.iter().position(|f| *f == name)
}

/// Parse one raw field value. Never fails; anything unusable is `0.0`.
#[must_use]
pub fn parse_value(value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::String(text)) => parse_amount(text),
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::Bool(flag)) => f64::from(u8::from(*flag)),
        Some(Value::Array(_) | Value::Object(_)) => 0.0,
    }
}

/// Parse currency-formatted text such as `"$1,234.56"`
fn parse_amount(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned.trim().parse::<f64>().unwrap_or(0.0)
}

/// Reduce one record to its feature vector, in [`FEATURES`] order
#[must_use]
pub fn normalize_record(record: &Record) -> [f64; N_FEATURES] {
    FEATURES.map(|feature| parse_value(record.get(feature)))
}

/// Build the feature matrix for a batch, one row per record in input order
#[must_use]
pub fn feature_matrix(records: &[Record]) -> Array2<f64> {
    let mut matrix = Array2::zeros((records.len(), N_FEATURES));
    for (mut row, record) in matrix.rows_mut().into_iter().zip(records) {
        for (cell, value) in row.iter_mut().zip(normalize_record(record)) {
            *cell = value;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        serde_json::from_value(value).expect("record literal")
    }

    #[test]
    fn test_currency_strings() {
        assert!((parse_value(Some(&json!("$1,234.56"))) - 1234.56).abs() < 1e-9);
        assert!((parse_value(Some(&json!("  42.5 "))) - 42.5).abs() < 1e-9);
        assert!((parse_value(Some(&json!("$1,000,000"))) - 1_000_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_and_garbage_are_zero() {
        assert_eq!(parse_value(None), 0.0);
        assert_eq!(parse_value(Some(&Value::Null)), 0.0);
        assert_eq!(parse_value(Some(&json!(""))), 0.0);
        assert_eq!(parse_value(Some(&json!("n/a"))), 0.0);
        assert_eq!(parse_value(Some(&json!("$"))), 0.0);
        assert_eq!(parse_value(Some(&json!([1, 2]))), 0.0);
        assert_eq!(parse_value(Some(&json!({"amount": 5}))), 0.0);
    }

    #[test]
    fn test_numbers_pass_through() {
        assert_eq!(parse_value(Some(&json!(7))), 7.0);
        assert_eq!(parse_value(Some(&json!(-3.25))), -3.25);
        assert_eq!(parse_value(Some(&json!(true))), 1.0);
    }

    #[test]
    fn test_normalize_record_order_and_width() {
        let rec = record(json!({
            "id": 9,
            "salary": "$2,000",
            "taxableIncome": 100,
            "confectionarySalesTaxPercent": "7.5",
            "unrelated": "ignored"
        }));

        let vector = normalize_record(&rec);
        assert_eq!(vector.len(), FEATURES.len());
        assert_eq!(vector, [100.0, 2000.0, 0.0, 0.0, 0.0, 7.5]);
    }

    #[test]
    fn test_feature_matrix_rows_follow_input() {
        let records = vec![
            record(json!({"revenue": 1})),
            record(json!({})),
            record(json!({"revenue": "$3"})),
        ];

        let matrix = feature_matrix(&records);
        assert_eq!(matrix.dim(), (3, N_FEATURES));
        assert_eq!(matrix[[0, 2]], 1.0);
        assert_eq!(matrix[[1, 2]], 0.0);
        assert_eq!(matrix[[2, 2]], 3.0);
    }

    #[test]
    fn test_feature_index() {
        assert_eq!(feature_index("taxableIncome"), Some(0));
        assert_eq!(feature_index("confectionarySalesTaxPercent"), Some(5));
        assert_eq!(feature_index("corpName"), None);
    }
}
