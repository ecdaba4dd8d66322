//! Row shapes emitted by table iteration

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;
use crate::value::Value;

/// Row keyed by header name, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedRow(Vec<(String, Value)>);

impl KeyedRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair headers with values; extra values or headers are dropped
    pub fn from_parts(headers: &[String], values: Vec<Value>) -> Self {
        Self(headers.iter().cloned().zip(values).collect())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(key, _)| key == name).map(|(_, value)| value)
    }

    /// Set a value, replacing an existing entry in place
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.0.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.0.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0.into_iter().map(|(_, value)| value).collect()
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(self.to_map())
    }

    pub(crate) fn to_map(&self) -> Map<String, JsonValue> {
        self.0
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for KeyedRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = KeyedRow::new();
        for (key, value) in iter {
            row.insert(key, value);
        }
        row
    }
}

impl Serialize for KeyedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A row produced by [`crate::Table::iter`]
#[derive(Debug)]
pub enum Row {
    /// Positional values in column order
    Values(Vec<Value>),
    /// Values keyed by header
    Keyed(KeyedRow),
    /// Source row number, headers and positional values
    Extended {
        row_number: usize,
        headers: Vec<String>,
        values: Vec<Value>,
    },
    /// Row that failed casting or checks while iterating with `force_cast`
    Invalid { row_number: usize, error: Error },
}

impl Row {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Row::Invalid { .. })
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Row::Invalid { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Values in column order, `None` for invalid rows
    pub fn values(&self) -> Option<Vec<Value>> {
        match self {
            Row::Values(values) | Row::Extended { values, .. } => Some(values.clone()),
            Row::Keyed(row) => Some(row.values().cloned().collect()),
            Row::Invalid { .. } => None,
        }
    }

    pub fn as_keyed(&self) -> Option<&KeyedRow> {
        match self {
            Row::Keyed(row) => Some(row),
            _ => None,
        }
    }

    /// JSON form: an array, an object, `[rowNumber, headers, values]`, or
    /// `{"rowNumber": .., "error": ..}` for invalid rows
    pub fn to_json(&self) -> JsonValue {
        fn values(values: &[Value]) -> JsonValue {
            JsonValue::Array(values.iter().map(Value::to_json).collect())
        }
        match self {
            Row::Values(row) => values(row),
            Row::Keyed(row) => row.to_json(),
            Row::Extended {
                row_number,
                headers,
                values: row,
            } => serde_json::json!([row_number, headers, values(row)]),
            Row::Invalid { row_number, error } => {
                serde_json::json!({"rowNumber": row_number, "error": error.to_string()})
            }
        }
    }
}
