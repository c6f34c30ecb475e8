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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const UNKNOWN: &str = "Unknown";

/// One input filing: an open field map, echoed back verbatim in reports.
///
/// Only the feature columns are interpreted numerically; `id`, `corpName`
/// and `corpId` are carried through as opaque JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The record's `id`, or its position in the batch when it has none.
    /// A present-but-null `id` is kept as null.
    #[must_use]
    pub fn record_id(&self, index: usize) -> Value {
        self.fields
            .get("id")
            .cloned()
            .unwrap_or_else(|| Value::from(index))
    }

    #[must_use]
    pub fn corp_name(&self) -> Value {
        self.identity_field("corpName")
    }

    #[must_use]
    pub fn corp_id(&self) -> Value {
        self.identity_field("corpId")
    }

    fn identity_field(&self, field: &str) -> Value {
        self.fields
            .get(field)
            .cloned()
            .unwrap_or_else(|| Value::from(UNKNOWN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_defaults() {
        let record: Record = serde_json::from_value(json!({"salary": 10})).expect("record");
        assert_eq!(record.record_id(4), json!(4));
        assert_eq!(record.corp_name(), json!("Unknown"));
        assert_eq!(record.corp_id(), json!("Unknown"));
    }

    #[test]
    fn test_identity_passthrough() {
        let record: Record = serde_json::from_value(json!({
            "id": "F-17",
            "corpName": "Acme Sweets",
            "corpId": 1234
        }))
        .expect("record");

        assert_eq!(record.record_id(0), json!("F-17"));
        assert_eq!(record.corp_name(), json!("Acme Sweets"));
        assert_eq!(record.corp_id(), json!(1234));
    }

    #[test]
    fn test_null_id_is_kept() {
        let record: Record = serde_json::from_value(json!({"id": null})).expect("record");
        assert_eq!(record.record_id(3), Value::Null);
    }

    #[test]
    fn test_serializes_verbatim() {
        let raw = json!({"id": 1, "revenue": "$5,000.00", "note": null});
        let record: Record = serde_json::from_value(raw.clone()).expect("record");
        assert_eq!(serde_json::to_value(&record).expect("serialize"), raw);
    }
}
