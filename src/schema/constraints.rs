//! Field constraints

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::types::{CastOptions, FieldType};
use crate::value::Value;

/// Constraint set of a field descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<JsonValue>>,
}

/// Constraints with bounds and enum members cast to the field type and
/// the pattern compiled
#[derive(Debug, Clone)]
pub(crate) struct CompiledConstraints {
    pattern: Option<Regex>,
    minimum: Option<Value>,
    maximum: Option<Value>,
    enum_values: Option<Vec<Value>>,
    min_length: Option<usize>,
    max_length: Option<usize>,
}

impl CompiledConstraints {
    pub(crate) fn compile(
        field: &str,
        constraints: &Constraints,
        field_type: FieldType,
        format: &str,
        options: &CastOptions,
    ) -> Result<Self> {
        let cast_bound = |name: &str, raw: &JsonValue| -> Result<Value> {
            field_type
                .cast(format, &Value::from(raw), options)
                .ok_or_else(|| {
                    Error::Descriptor(format!(
                        "Constraint \"{}\" of field \"{}\" can't be cast as {}: {}",
                        name, field, field_type, raw
                    ))
                })
        };

        let pattern = match &constraints.pattern {
            Some(pattern) => Some(Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                Error::Descriptor(format!(
                    "Invalid pattern constraint of field \"{}\": {}",
                    field, e
                ))
            })?),
            None => None,
        };

        Ok(Self {
            pattern,
            minimum: constraints
                .minimum
                .as_ref()
                .map(|raw| cast_bound("minimum", raw))
                .transpose()?,
            maximum: constraints
                .maximum
                .as_ref()
                .map(|raw| cast_bound("maximum", raw))
                .transpose()?,
            enum_values: constraints
                .enum_values
                .as_ref()
                .map(|items| {
                    items
                        .iter()
                        .map(|raw| cast_bound("enum", raw))
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?,
            min_length: constraints.min_length,
            max_length: constraints.max_length,
        })
    }

    /// Check a cast, non-null value. `raw` is the value before casting.
    pub(crate) fn check(&self, field: &str, raw: &Value, cast: &Value) -> Result<()> {
        if let Some(length) = value_length(cast) {
            if let Some(min) = self.min_length
                && length < min
            {
                return Err(Error::constraint(
                    field,
                    format!("length {} is less than minLength {}", length, min),
                ));
            }
            if let Some(max) = self.max_length
                && length > max
            {
                return Err(Error::constraint(
                    field,
                    format!("length {} is greater than maxLength {}", length, max),
                ));
            }
        }

        if let Some(min) = &self.minimum
            && cast.partial_cmp(min) == Some(std::cmp::Ordering::Less)
        {
            return Err(Error::constraint(
                field,
                format!("value {} is less than minimum {}", cast, min),
            ));
        }
        if let Some(max) = &self.maximum
            && cast.partial_cmp(max) == Some(std::cmp::Ordering::Greater)
        {
            return Err(Error::constraint(
                field,
                format!("value {} is greater than maximum {}", cast, max),
            ));
        }

        if let Some(pattern) = &self.pattern {
            let text = match raw {
                Value::String(s) => s.clone(),
                other => other.to_raw_string(),
            };
            if !pattern.is_match(&text) {
                return Err(Error::constraint(
                    field,
                    format!("value \"{}\" does not match pattern {}", text, pattern.as_str()),
                ));
            }
        }

        if let Some(members) = &self.enum_values {
            let key = cast.lookup_key();
            if !members.iter().any(|m| m.lookup_key() == key) {
                return Err(Error::constraint(
                    field,
                    format!("value {} is not in the enum", cast),
                ));
            }
        }

        Ok(())
    }
}

fn value_length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}
