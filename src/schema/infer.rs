//! Schema inference from sample rows

use serde_json::{Value as JsonValue, json};

use super::field::Field;
use crate::types::string::detect_format;
use crate::value::Value;

/// Where column names come from
#[derive(Debug, Clone, PartialEq)]
pub enum Headers {
    /// 1-based number of the header row in the sample; `0` means no header
    /// row and columns are named `field1`, `field2`, ...
    Row(usize),
    /// Explicit column names, every sample row is data
    Names(Vec<String>),
}

impl Default for Headers {
    fn default() -> Self {
        Headers::Row(1)
    }
}

impl From<usize> for Headers {
    fn from(row: usize) -> Self {
        Headers::Row(row)
    }
}

impl From<Vec<String>> for Headers {
    fn from(names: Vec<String>) -> Self {
        Headers::Names(names)
    }
}

/// Candidate (type, format) pairs, narrowest first
const CANDIDATES: &[(&str, &str)] = &[
    ("integer", "default"),
    ("number", "default"),
    ("boolean", "default"),
    ("date", "default"),
    ("time", "default"),
    ("datetime", "default"),
    ("datetime", "any"),
    ("yearmonth", "default"),
    ("duration", "default"),
    ("object", "default"),
    ("array", "default"),
];

/// Split a sample into header names and data rows
pub(crate) fn split_headers(rows: &[Vec<Value>], headers: &Headers) -> (Vec<String>, Vec<Vec<Value>>) {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    match headers {
        Headers::Names(names) => (names.clone(), rows.to_vec()),
        Headers::Row(0) => (
            (1..=width).map(|i| format!("field{}", i)).collect(),
            rows.to_vec(),
        ),
        Headers::Row(row) => {
            let names = rows
                .get(row - 1)
                .map(|header| header.iter().map(Value::to_raw_string).collect())
                .unwrap_or_default();
            let data = rows.iter().skip(*row).cloned().collect();
            (names, data)
        }
    }
}

/// Infer one field descriptor per header
pub(crate) fn infer_fields(headers: &[String], rows: &[Vec<Value>], missing_values: &[String]) -> Vec<JsonValue> {
    headers
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let name = if header.trim().is_empty() {
                format!("field{}", index + 1)
            } else {
                header.clone()
            };
            let samples: Vec<&Value> = rows
                .iter()
                .filter_map(|row| row.get(index))
                .filter(|value| !is_missing(value, missing_values))
                .collect();
            infer_field(name, &samples)
        })
        .collect()
}

fn is_missing(value: &Value, missing_values: &[String]) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => missing_values.iter().any(|m| m == s),
        _ => false,
    }
}

fn infer_field(name: String, samples: &[&Value]) -> JsonValue {
    if !samples.is_empty() {
        for (field_type, format) in CANDIDATES {
            let descriptor = json!({"name": name, "type": field_type, "format": format});
            let Ok(field) = Field::new(descriptor.clone(), None) else {
                continue;
            };
            if samples.iter().all(|value| field.test_value(value, false)) {
                return descriptor;
            }
        }
    }

    // Mixed native values only fit `any`
    let strings: Option<Vec<&str>> = samples.iter().map(|value| value.as_str()).collect();
    match strings {
        Some(strings) => json!({"name": name, "type": "string", "format": detect_format(strings)}),
        None => json!({"name": name, "type": "any", "format": "default"}),
    }
}
