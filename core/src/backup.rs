//! Backup document: the whole record collection as one JSON array.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::Record;

/// Fields every imported element must carry with a non-empty value.
pub const REQUIRED_FIELDS: [&str; 4] = ["timestamp", "value", "unit", "category"];

/// Why an import did not happen. The collection is never touched when one of
/// these is returned.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("backup is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("backup must be a JSON array of records")]
    NotAnArray,

    #[error("record {index} is missing '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("record {index} is malformed: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// The document was fine but writing it to storage failed.
    #[error("failed to save imported records: {0:#}")]
    Storage(anyhow::Error),
}

/// Serialize the collection as a pretty-printed JSON array.
pub fn to_json(records: &[Record]) -> Result<String> {
    serde_json::to_string_pretty(records).context("Failed to serialize backup")
}

/// Download name for a backup taken on `date`.
#[must_use]
pub fn backup_file_name(date: NaiveDate) -> String {
    format!("sugartrack_backup_{}.json", date.format("%Y-%m-%d"))
}

/// Parse and validate a backup document.
///
/// Validation is a presence check: each element needs a non-empty
/// `timestamp`, `value`, `unit` and `category` (zero, `false`, `""` and
/// `null` count as missing). Elements without an id, or repeating an id
/// already seen, get a fresh one.
pub fn parse_backup(text: &str) -> Result<Vec<Record>, ImportError> {
    let root: Value = serde_json::from_str(text).map_err(ImportError::InvalidJson)?;
    let Value::Array(items) = root else {
        return Err(ImportError::NotAnArray);
    };

    for (index, item) in items.iter().enumerate() {
        for field in REQUIRED_FIELDS {
            if !item.get(field).is_some_and(is_truthy) {
                return Err(ImportError::MissingField { index, field });
            }
        }
    }

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let record: Record = serde_json::from_value(item)
            .map_err(|source| ImportError::InvalidRecord { index, source })?;
        records.push(record);
    }

    let mut seen = HashSet::new();
    for record in &mut records {
        if record.id.is_empty() || !seen.insert(record.id.clone()) {
            let id = Uuid::new_v4().to_string();
            warn!(old = %record.id, new = %id, "assigning fresh id to imported record");
            seen.insert(id.clone());
            record.id = id;
        }
    }

    debug!(count = records.len(), "parsed backup");
    Ok(records)
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Unit};

    fn sample() -> Vec<Record> {
        vec![
            Record {
                id: "b".to_string(),
                timestamp: 1_709_798_700_000,
                category: Category::AfterLunch,
                value: 7.2,
                unit: Unit::MmolL,
                notes: "sandwich".to_string(),
            },
            Record {
                id: "a".to_string(),
                timestamp: 1_709_712_300_000,
                category: Category::BeforeBreakfast,
                value: 98.0,
                unit: Unit::MgDl,
                notes: String::new(),
            },
        ]
    }

    #[test]
    fn test_export_then_import_is_identical() {
        let records = sample();
        let json = to_json(&records).unwrap();
        let back = parse_backup(&json).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn test_export_is_array_with_stable_fields() {
        let json = to_json(&sample()).unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        let first = v.as_array().unwrap()[0].as_object().unwrap();
        let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["category", "id", "notes", "timestamp", "unit", "value"]
        );
    }

    #[test]
    fn test_backup_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(backup_file_name(date), "sugartrack_backup_2024-03-07.json");
    }

    #[test]
    fn test_import_rejects_bad_json() {
        assert!(matches!(
            parse_backup("{oops"),
            Err(ImportError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_import_rejects_non_array() {
        assert!(matches!(
            parse_backup(r#"{"records": []}"#),
            Err(ImportError::NotAnArray)
        ));
    }

    #[test]
    fn test_import_rejects_missing_field() {
        let text = r#"[
            {"id":"1","timestamp":1,"category":"Other","value":100,"unit":"mg/dL"},
            {"id":"2","timestamp":2,"category":"Other","unit":"mg/dL"}
        ]"#;
        match parse_backup(text) {
            Err(ImportError::MissingField { index, field }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "value");
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_import_accepts_null_notes_and_numeric_ids() {
        let text = r#"[
            {"id":1700000000000,"timestamp":1,"category":"Other","value":100,"unit":"mg/dL","notes":null},
            {"id":null,"timestamp":2,"category":"Other","value":5.5,"unit":"mmol/L"}
        ]"#;
        let records = parse_backup(text).unwrap();
        assert_eq!(records[0].id, "1700000000000");
        assert_eq!(records[0].notes, "");
        assert!(!records[1].id.is_empty());
        assert_eq!(records[1].notes, "");
    }

    #[test]
    fn test_import_treats_zero_and_empty_as_missing() {
        let zero = r#"[{"id":"1","timestamp":0,"category":"Other","value":100,"unit":"mg/dL"}]"#;
        assert!(matches!(
            parse_backup(zero),
            Err(ImportError::MissingField {
                field: "timestamp",
                ..
            })
        ));

        let empty = r#"[{"id":"1","timestamp":1,"category":"","value":100,"unit":"mg/dL"}]"#;
        assert!(matches!(
            parse_backup(empty),
            Err(ImportError::MissingField {
                field: "category",
                ..
            })
        ));
    }

    #[test]
    fn test_import_rejects_unknown_category() {
        let text = r#"[{"id":"1","timestamp":1,"category":"Brunch","value":100,"unit":"mg/dL"}]"#;
        assert!(matches!(
            parse_backup(text),
            Err(ImportError::InvalidRecord { index: 0, .. })
        ));
    }

    #[test]
    fn test_import_empty_array_is_valid() {
        assert!(parse_backup("[]").unwrap().is_empty());
    }

    #[test]
    fn test_import_fills_missing_and_duplicate_ids() {
        let text = r#"[
            {"timestamp":1,"category":"Other","value":100,"unit":"mg/dL"},
            {"id":"dup","timestamp":2,"category":"Other","value":101,"unit":"mg/dL"},
            {"id":"dup","timestamp":3,"category":"Other","value":102,"unit":"mg/dL"}
        ]"#;
        let records = parse_backup(text).unwrap();
        assert_eq!(records.len(), 3);
        assert!(!records[0].id.is_empty());
        assert_eq!(records[1].id, "dup");
        assert_ne!(records[2].id, "dup");
        let unique: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_import_accepts_integer_values_and_missing_notes() {
        let text = r#"[{"id":"x","timestamp":5,"category":"After Sleep","value":6,"unit":"mmol/L"}]"#;
        let records = parse_backup(text).unwrap();
        assert!((records[0].value - 6.0).abs() < f64::EPSILON);
        assert_eq!(records[0].notes, "");
        assert_eq!(records[0].category, Category::AfterSleep);
    }
}
