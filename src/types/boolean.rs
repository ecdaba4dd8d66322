//! `boolean` type

use super::CastOptions;
use crate::value::Value;

pub fn cast_boolean(value: &Value, options: &CastOptions) -> Option<Value> {
    match value {
        Value::Boolean(_) => Some(value.clone()),
        Value::String(raw) => {
            let text = raw.trim();
            if options.true_values.iter().any(|v| v == text) {
                Some(Value::Boolean(true))
            } else if options.false_values.iter().any(|v| v == text) {
                Some(Value::Boolean(false))
            } else {
                None
            }
        }
        _ => None,
    }
}
