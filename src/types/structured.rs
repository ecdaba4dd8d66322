//! `object` and `array` types: JSON values or JSON text

use serde_json::Value as JsonValue;

use crate::value::Value;

pub fn cast_object(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(s) => match serde_json::from_str::<JsonValue>(s).ok()? {
            JsonValue::Object(map) => Some(Value::Object(map)),
            _ => None,
        },
        _ => None,
    }
}

pub fn cast_array(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) => Some(value.clone()),
        Value::String(s) => match serde_json::from_str::<JsonValue>(s).ok()? {
            JsonValue::Array(items) => Some(Value::Array(items)),
            _ => None,
        },
        _ => None,
    }
}
