//! Cell values produced by casting
//!
//! Raw data arrives as strings (CSV) or JSON values (inline data); casting
//! turns them into typed [`Value`]s. `Value::Null` is the "no value"
//! sentinel that missing-value tokens map to.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::types::duration::IsoDuration;

/// A single typed cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
    Year(i32),
    YearMonth(i32, u32),
    Duration(IsoDuration),
    GeoPoint { lon: f64, lat: f64 },
    Array(Vec<JsonValue>),
    Object(Map<String, JsonValue>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::DateTime(_) => "datetime",
            Value::Year(_) => "year",
            Value::YearMonth(..) => "yearmonth",
            Value::Duration(_) => "duration",
            Value::GeoPoint { .. } => "geopoint",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Textual form written to CSV files. `Null` becomes an empty string.
    pub fn to_raw_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Array(_) | Value::Object(_) => self.to_json().to_string(),
            other => other.to_string(),
        }
    }

    /// Convert into a JSON value (temporal values as ISO strings)
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Integer(i) => JsonValue::from(*i),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(JsonValue::Number)
                .unwrap_or_else(|| JsonValue::String(n.to_string())),
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Year(y) => JsonValue::from(*y),
            Value::GeoPoint { lon, lat } => serde_json::json!([lon, lat]),
            Value::Array(items) => JsonValue::Array(items.clone()),
            Value::Object(map) => JsonValue::Object(map.clone()),
            other => JsonValue::String(other.to_string()),
        }
    }

    /// Key used for uniqueness and relation lookups.
    ///
    /// Integers and integral numbers share a key so `1` and `1.0` collide.
    pub(crate) fn lookup_key(&self) -> String {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                format!("integer:{}", *n as i64)
            }
            Value::Integer(i) => format!("integer:{}", i),
            other => format!("{}:{}", other.kind(), other.to_raw_string()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Number(b)) => (*a as f64).partial_cmp(b),
            (Value::Number(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            (Value::Time(a), Value::Time(b)) => a.partial_cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.partial_cmp(b),
            (Value::Year(a), Value::Year(b)) => a.partial_cmp(b),
            (Value::YearMonth(ay, am), Value::YearMonth(by, bm)) => (ay, am).partial_cmp(&(by, bm)),
            (Value::Duration(a), Value::Duration(b)) => a.total_seconds().partial_cmp(&b.total_seconds()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    write!(f, "{}", if *n > 0.0 { "INF" } else { "-INF" })
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Year(y) => write!(f, "{:04}", y),
            Value::YearMonth(y, m) => write!(f, "{:04}-{:02}", y, m),
            Value::Duration(d) => write!(f, "{}", d),
            Value::GeoPoint { lon, lat } => write!(f, "{}, {}", lon, lat),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Boolean(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Array(items),
            JsonValue::Object(map) => Value::Object(map),
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(value: &JsonValue) -> Self {
        Value::from(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(1)), Value::Integer(1));
        assert_eq!(Value::from(json!(1.5)), Value::Number(1.5));
        assert_eq!(Value::from(json!("a")), Value::from("a"));
        assert_eq!(Value::from(json!([1, 2])), Value::Array(vec![json!(1), json!(2)]));
    }

    #[test]
    fn test_to_json_temporal_as_strings() {
        let date = Value::Date(NaiveDate::from_ymd_opt(2012, 6, 15).unwrap());
        assert_eq!(date.to_json(), json!("2012-06-15"));
        assert_eq!(Value::YearMonth(2012, 6).to_json(), json!("2012-06"));
        let time = NaiveTime::from_hms_milli_opt(6, 30, 15, 250).unwrap();
        assert_eq!(Value::Time(time).to_json(), json!("06:30:15.250"));
        let whole = NaiveTime::from_hms_opt(6, 30, 15).unwrap();
        assert_eq!(Value::Time(whole).to_raw_string(), "06:30:15");
        assert_eq!(Value::GeoPoint { lon: 10.0, lat: 20.0 }.to_json(), json!([10.0, 20.0]));
    }

    #[test]
    fn test_raw_string() {
        assert_eq!(Value::Null.to_raw_string(), "");
        assert_eq!(Value::Integer(3).to_raw_string(), "3");
        assert_eq!(Value::Number(f64::INFINITY).to_raw_string(), "INF");
        assert_eq!(Value::Year(812).to_raw_string(), "0812");
    }

    #[test]
    fn test_ordering_across_numeric_variants() {
        assert!(Value::Integer(2) > Value::Number(1.5));
        assert!(Value::Number(0.5) < Value::Integer(1));
        assert_eq!(Value::String("a".into()).partial_cmp(&Value::Integer(1)), None);
    }

    #[test]
    fn test_lookup_key_integral_numbers() {
        assert_eq!(Value::Integer(1).lookup_key(), Value::Number(1.0).lookup_key());
        assert_ne!(Value::Integer(1).lookup_key(), Value::from("1").lookup_key());
    }
}
