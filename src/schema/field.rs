//! Field: a single column definition and value casting

use serde_json::{Map, Value as JsonValue};

use super::constraints::{CompiledConstraints, Constraints};
use crate::error::{Error, Result};
use crate::types::{CastOptions, FieldType};
use crate::value::Value;

/// Default missing-value tokens
pub const DEFAULT_MISSING_VALUES: [&str; 1] = [""];

/// Field model built from a Table Schema field descriptor
///
/// # Example
///
/// ```rust
/// use data_package_sdk::{Field, Value};
/// use serde_json::json;
///
/// let field = Field::new(json!({"name": "age", "type": "integer"}), None).unwrap();
/// assert_eq!(field.cast_value(&Value::from("42"), true).unwrap(), Value::Integer(42));
/// assert_eq!(field.cast_value(&Value::from(""), true).unwrap(), Value::Null);
/// ```
#[derive(Debug, Clone)]
pub struct Field {
    descriptor: JsonValue,
    name: String,
    field_type: FieldType,
    format: String,
    constraints: Constraints,
    missing_values: Vec<String>,
    cast_options: CastOptions,
    compiled: CompiledConstraints,
}

impl Field {
    /// Build a field from its descriptor.
    ///
    /// `missing_values` defaults to `[""]`. Type defaults to `string` and
    /// format to `default`.
    pub fn new(descriptor: JsonValue, missing_values: Option<Vec<String>>) -> Result<Self> {
        let object = descriptor
            .as_object()
            .ok_or_else(|| Error::Descriptor(format!("Field descriptor must be an object: {}", descriptor)))?;

        let name = object
            .get("name")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| Error::Descriptor("Field descriptor requires a \"name\"".to_string()))?
            .to_string();

        let field_type: FieldType = object
            .get("type")
            .and_then(JsonValue::as_str)
            .unwrap_or("string")
            .parse()
            .map_err(|e: String| Error::Descriptor(format!("Field \"{}\": {}", name, e)))?;

        let format = object
            .get("format")
            .and_then(JsonValue::as_str)
            .unwrap_or("default")
            .to_string();

        let constraints: Constraints = match object.get("constraints") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| {
                Error::Descriptor(format!("Invalid constraints of field \"{}\": {}", name, e))
            })?,
            None => Constraints::default(),
        };

        let cast_options = CastOptions::from_descriptor(object);
        let compiled =
            CompiledConstraints::compile(&name, &constraints, field_type, &format, &cast_options)?;

        Ok(Self {
            descriptor: expand_field_descriptor(object),
            name,
            field_type,
            format,
            constraints,
            missing_values: missing_values
                .unwrap_or_else(|| DEFAULT_MISSING_VALUES.iter().map(|s| s.to_string()).collect()),
            cast_options,
            compiled,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn required(&self) -> bool {
        self.constraints.required
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Field descriptor with type and format defaults filled in
    pub fn descriptor(&self) -> &JsonValue {
        &self.descriptor
    }

    pub fn missing_values(&self) -> &[String] {
        &self.missing_values
    }

    fn is_missing(&self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(s) => self.missing_values.iter().any(|m| m == s),
            _ => false,
        }
    }

    /// Cast a value to the field type.
    ///
    /// Missing values become `Value::Null`. With `constraints` enabled the
    /// required, length, range, pattern and enum constraints are checked;
    /// `unique` needs the whole column and is checked by the table.
    pub fn cast_value(&self, value: &Value, constraints: bool) -> Result<Value> {
        if self.is_missing(value) {
            if constraints && self.constraints.required {
                return Err(Error::constraint(&self.name, "field is required"));
            }
            return Ok(Value::Null);
        }

        let cast = self
            .field_type
            .cast(&self.format, value, &self.cast_options)
            .ok_or_else(|| {
                Error::cast(
                    &self.name,
                    format!(
                        "can't cast {} \"{}\" as {} (format \"{}\")",
                        value.kind(),
                        value,
                        self.field_type,
                        self.format
                    ),
                )
            })?;

        if constraints {
            self.compiled.check(&self.name, value, &cast)?;
        }

        Ok(cast)
    }

    /// Same as [`Field::cast_value`] but reports success as a boolean
    pub fn test_value(&self, value: &Value, constraints: bool) -> bool {
        self.cast_value(value, constraints).is_ok()
    }
}

fn expand_field_descriptor(object: &Map<String, JsonValue>) -> JsonValue {
    let mut expanded = object.clone();
    expanded
        .entry("type")
        .or_insert_with(|| JsonValue::String("string".to_string()));
    expanded
        .entry("format")
        .or_insert_with(|| JsonValue::String("default".to_string()));
    JsonValue::Object(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let field = Field::new(json!({"name": "name"}), None).unwrap();
        assert_eq!(field.name(), "name");
        assert_eq!(field.field_type(), FieldType::String);
        assert_eq!(field.format(), "default");
        assert!(!field.required());
        assert_eq!(field.descriptor()["type"], json!("string"));
        assert_eq!(field.missing_values(), &["".to_string()]);
    }

    #[test]
    fn test_invalid_descriptors() {
        assert!(matches!(Field::new(json!({"type": "integer"}), None), Err(Error::Descriptor(_))));
        assert!(matches!(
            Field::new(json!({"name": "a", "type": "decimal"}), None),
            Err(Error::Descriptor(_))
        ));
        assert!(Field::new(json!("a"), None).is_err());
    }

    #[test]
    fn test_cast_value() {
        let field = Field::new(json!({"name": "id", "type": "integer"}), None).unwrap();
        assert_eq!(field.cast_value(&Value::from("1"), true).unwrap(), Value::Integer(1));
        let error = field.cast_value(&Value::from("x"), true).unwrap_err();
        assert!(error.is_cast());
    }

    #[test]
    fn test_missing_values() {
        let field = Field::new(
            json!({"name": "id", "type": "integer"}),
            Some(vec!["".to_string(), "NA".to_string()]),
        )
        .unwrap();
        assert_eq!(field.cast_value(&Value::from("NA"), true).unwrap(), Value::Null);
        assert_eq!(field.cast_value(&Value::Null, true).unwrap(), Value::Null);
    }

    #[test]
    fn test_required_constraint() {
        let field = Field::new(
            json!({"name": "id", "type": "integer", "constraints": {"required": true}}),
            None,
        )
        .unwrap();
        let error = field.cast_value(&Value::from(""), true).unwrap_err();
        assert!(error.is_constraint());
        // Constraint checks can be disabled
        assert_eq!(field.cast_value(&Value::from(""), false).unwrap(), Value::Null);
    }

    #[test]
    fn test_value_check() {
        let field = Field::new(
            json!({"name": "score", "type": "number", "constraints": {"maximum": 10}}),
            None,
        )
        .unwrap();
        assert!(field.test_value(&Value::from("9.5"), true));
        assert!(!field.test_value(&Value::from("10.5"), true));
        assert!(field.test_value(&Value::from("10.5"), false));
        assert!(!field.test_value(&Value::from("ten"), false));
    }

    #[test]
    fn test_cast_is_deterministic_and_idempotent() {
        let field = Field::new(json!({"name": "when", "type": "date"}), None).unwrap();
        let first = field.cast_value(&Value::from("2020-02-29"), true).unwrap();
        let second = field.cast_value(&Value::from("2020-02-29"), true).unwrap();
        assert_eq!(first, second);
        assert_eq!(field.cast_value(&first, true).unwrap(), first);
    }
}
