//! Table Schema: ordered fields plus primary and foreign keys
//!
//! A [`Schema`] keeps two descriptors: the committed one its fields were
//! built from, and a working copy edited through [`Schema::descriptor_mut`].
//! [`Schema::commit`] rebuilds fields and keys from the working copy.
//!
//! In strict mode any descriptor error is returned from `load`/`commit`;
//! otherwise errors are kept in [`Schema::errors`] and [`Schema::valid`]
//! reports whether there are none.

pub mod constraints;
pub mod field;
pub mod infer;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use crate::descriptor::{self, DescriptorSource};
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::storage;
use crate::value::Value;

pub use constraints::Constraints;
pub use field::{DEFAULT_MISSING_VALUES, Field};
pub use infer::Headers;

/// Options for [`Schema::load`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaOptions {
    /// Return descriptor errors instead of collecting them
    pub strict: bool,
    /// Match data headers to field names ignoring case
    pub case_insensitive_headers: bool,
}

impl SchemaOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Default::default()
        }
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyReference {
    /// Referenced resource name; empty for a self reference
    pub resource: String,
    pub fields: Vec<String>,
}

/// Foreign key from local fields to fields of another resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub fields: Vec<String>,
    pub reference: ForeignKeyReference,
}

impl ForeignKey {
    pub fn is_self_reference(&self) -> bool {
        self.reference.resource.is_empty()
    }
}

/// State derived from a descriptor
#[derive(Debug, Default)]
struct Built {
    fields: Vec<Field>,
    primary_key: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
    errors: Vec<Error>,
}

/// Table Schema model
///
/// # Example
///
/// ```rust
/// use data_package_sdk::{Schema, SchemaOptions, Value};
/// use serde_json::json;
///
/// let schema = Schema::from_descriptor(
///     json!({"fields": [{"name": "id", "type": "integer"}, {"name": "age", "type": "integer"}]}),
///     SchemaOptions::strict(),
/// )
/// .unwrap();
/// let row = schema.cast_row(&[Value::from("1"), Value::from("2")], true).unwrap();
/// assert_eq!(row, vec![Value::Integer(1), Value::Integer(2)]);
/// ```
#[derive(Debug)]
pub struct Schema {
    current: JsonValue,
    next: JsonValue,
    strict: bool,
    case_insensitive_headers: bool,
    profile: Profile,
    built: Built,
}

impl Schema {
    /// Load a schema from an inline descriptor, local path or URL
    pub async fn load(source: impl Into<DescriptorSource>, options: SchemaOptions) -> Result<Self> {
        let source = source.into();
        let descriptor = descriptor::retrieve(&source, None).await?;
        if let Some(location) = source.location() {
            info!("Loaded Table Schema from {}", location);
        }
        Self::from_descriptor(descriptor, options)
    }

    /// Build a schema from an already retrieved descriptor
    pub fn from_descriptor(descriptor: JsonValue, options: SchemaOptions) -> Result<Self> {
        let mut schema = Self {
            current: descriptor.clone(),
            next: descriptor,
            strict: options.strict,
            case_insensitive_headers: options.case_insensitive_headers,
            profile: Profile::from_registry("table-schema")?,
            built: Built::default(),
        };
        schema.build()?;
        Ok(schema)
    }

    fn build(&mut self) -> Result<()> {
        let mut descriptor = self.next.clone();
        let built = match descriptor::expand_schema(&mut descriptor) {
            Ok(()) => self.derive(&descriptor),
            Err(error) => Built {
                errors: vec![error],
                ..Default::default()
            },
        };

        if self.strict && !built.errors.is_empty() {
            return Err(Error::from_errors(built.errors));
        }
        if !built.errors.is_empty() {
            warn!("Table Schema has {} validation error(s)", built.errors.len());
        }

        self.current = descriptor.clone();
        self.next = descriptor;
        self.built = built;
        Ok(())
    }

    fn derive(&self, descriptor: &JsonValue) -> Built {
        let mut built = Built {
            errors: self.profile.validate(descriptor).errors,
            ..Default::default()
        };

        let missing_values: Vec<String> = descriptor
            .get("missingValues")
            .and_then(JsonValue::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_MISSING_VALUES.iter().map(|s| s.to_string()).collect());

        if let Some(fields) = descriptor.get("fields").and_then(JsonValue::as_array) {
            for field in fields {
                match Field::new(field.clone(), Some(missing_values.clone())) {
                    Ok(field) => built.fields.push(field),
                    Err(error) if built.errors.is_empty() => built.errors.push(error),
                    Err(_) => {}
                }
            }
        }

        if let Some(primary_key) = descriptor.get("primaryKey") {
            built.primary_key = serde_json::from_value(primary_key.clone()).unwrap_or_default();
        }
        if let Some(foreign_keys) = descriptor.get("foreignKeys") {
            built.foreign_keys = serde_json::from_value(foreign_keys.clone()).unwrap_or_default();
        }

        built
    }

    pub fn valid(&self) -> bool {
        self.built.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.built.errors
    }

    /// Committed descriptor with defaults expanded
    pub fn descriptor(&self) -> &JsonValue {
        &self.current
    }

    /// Working descriptor; call [`Schema::commit`] to apply edits
    pub fn descriptor_mut(&mut self) -> &mut JsonValue {
        &mut self.next
    }

    pub fn primary_key(&self) -> &[String] {
        &self.built.primary_key
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.built.foreign_keys
    }

    pub fn fields(&self) -> &[Field] {
        &self.built.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.built.fields.iter().map(Field::name).collect()
    }

    pub fn case_insensitive_headers(&self) -> bool {
        self.case_insensitive_headers
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Field by name; `index` picks among fields sharing the name
    pub fn get_field(&self, name: &str, index: usize) -> Option<&Field> {
        self.built
            .fields
            .iter()
            .filter(|field| field.name() == name)
            .nth(index)
    }

    /// Append a field descriptor and commit.
    ///
    /// In strict mode an invalid field is rejected and the schema is left
    /// unchanged.
    pub fn add_field(&mut self, field: JsonValue) -> Result<Option<&Field>> {
        let name = field.get("name").and_then(JsonValue::as_str).map(str::to_string);
        let previous = self.next.clone();
        match self.next.get_mut("fields").and_then(JsonValue::as_array_mut) {
            Some(fields) => fields.push(field),
            None => {
                let Some(object) = self.next.as_object_mut() else {
                    return Err(Error::Descriptor("Table Schema descriptor must be a JSON object".to_string()));
                };
                object.insert("fields".to_string(), JsonValue::Array(vec![field]));
            }
        }

        if let Err(error) = self.commit(None) {
            self.next = previous;
            return Err(error);
        }
        Ok(name.and_then(|name| self.built.fields.iter().rev().find(|f| f.name() == name)))
    }

    /// Remove the first field named `name` and commit. Returns the removed
    /// field descriptor, `None` when there is no such field.
    pub fn remove_field(&mut self, name: &str) -> Result<Option<JsonValue>> {
        let previous = self.next.clone();
        let Some(fields) = self.next.get_mut("fields").and_then(JsonValue::as_array_mut) else {
            return Ok(None);
        };
        let Some(position) = fields
            .iter()
            .position(|f| f.get("name").and_then(JsonValue::as_str) == Some(name))
        else {
            return Ok(None);
        };
        let removed = fields.remove(position);

        if let Err(error) = self.commit(None) {
            self.next = previous;
            return Err(error);
        }
        Ok(Some(removed))
    }

    /// Cast a positional row by field order.
    ///
    /// With `fail_fast` the first field error is returned; otherwise every
    /// field error is collected into one error.
    pub fn cast_row(&self, row: &[Value], fail_fast: bool) -> Result<Vec<Value>> {
        cast_values(&self.built.fields, row, fail_fast)
    }

    /// Infer fields from sample rows, replace the descriptor fields and commit.
    ///
    /// Each column gets the narrowest type accepting all of its non-missing
    /// sample values, `string` when none does.
    pub fn infer(&mut self, rows: &[Vec<Value>], headers: impl Into<Headers>) -> Result<&JsonValue> {
        let (headers, data) = infer::split_headers(rows, &headers.into());
        let fields = infer::infer_fields(&headers, &data, &self.missing_values());

        let Some(object) = self.next.as_object_mut() else {
            return Err(Error::Descriptor("Table Schema descriptor must be a JSON object".to_string()));
        };
        object.insert("fields".to_string(), JsonValue::Array(fields));
        self.commit(None)?;
        info!("Inferred Table Schema with {} fields", self.built.fields.len());
        Ok(&self.current)
    }

    /// Missing-value tokens of the committed descriptor
    pub fn missing_values(&self) -> Vec<String> {
        self.current
            .get("missingValues")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(|| DEFAULT_MISSING_VALUES.iter().map(|s| s.to_string()).collect())
    }

    /// Rebuild from the working descriptor.
    ///
    /// `strict` switches the validation mode and forces a rebuild. Returns
    /// `false` when the working descriptor is unchanged.
    pub fn commit(&mut self, strict: Option<bool>) -> Result<bool> {
        match strict {
            Some(strict) => self.strict = strict,
            None if self.next == self.current => return Ok(false),
            None => {}
        }
        self.build()?;
        Ok(true)
    }

    /// Write the committed descriptor as pretty JSON
    pub async fn save(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        let content = serde_json::to_string_pretty(&self.current)?;
        storage::write_location(&target.to_string_lossy(), content.as_bytes()).await?;
        info!("Saved Table Schema to {}", target.display());
        Ok(())
    }
}

/// Cast `row` with `fields` in order
pub(crate) fn cast_values(fields: &[Field], row: &[Value], fail_fast: bool) -> Result<Vec<Value>> {
    if row.len() != fields.len() {
        return Err(Error::cast(
            fields.iter().map(Field::name).collect::<Vec<_>>().join(", "),
            format!(
                "row length {} doesn't match fields count {}",
                row.len(),
                fields.len()
            ),
        ));
    }

    let mut result = Vec::with_capacity(row.len());
    let mut errors = Vec::new();
    for (field, value) in fields.iter().zip(row) {
        match field.cast_value(value, true) {
            Ok(cast) => result.push(cast),
            Err(error) if fail_fast => return Err(error),
            Err(error) => errors.push(error),
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(Error::from_errors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id_age() -> JsonValue {
        json!({"fields": [{"name": "id", "type": "integer"}, {"name": "age", "type": "integer"}]})
    }

    #[test]
    fn test_expanded_descriptor() {
        let schema = Schema::from_descriptor(json!({"fields": [{"name": "name"}]}), SchemaOptions::default()).unwrap();
        assert!(schema.valid());
        assert_eq!(
            schema.descriptor(),
            &json!({
                "fields": [{"name": "name", "type": "string", "format": "default"}],
                "missingValues": [""],
            })
        );
    }

    #[test]
    fn test_lenient_collects_errors() {
        let schema = Schema::from_descriptor(
            json!({"fields": [{"name": "id", "type": "decimal"}]}),
            SchemaOptions::default(),
        )
        .unwrap();
        assert!(!schema.valid());
        assert!(!schema.errors().is_empty());
    }

    #[test]
    fn test_strict_raises() {
        let result = Schema::from_descriptor(
            json!({"fields": [{"name": "id", "type": "decimal"}]}),
            SchemaOptions::strict(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cast_row_example() {
        let schema = Schema::from_descriptor(id_age(), SchemaOptions::strict()).unwrap();
        assert_eq!(
            schema.cast_row(&[Value::from("1"), Value::from("2")], true).unwrap(),
            vec![Value::Integer(1), Value::Integer(2)]
        );

        let error = schema.cast_row(&[Value::from("x"), Value::from("2")], true).unwrap_err();
        assert!(matches!(&error, Error::Cast { field, .. } if field == "id"));
    }

    #[test]
    fn test_cast_row_collects_all_errors() {
        let schema = Schema::from_descriptor(id_age(), SchemaOptions::strict()).unwrap();
        let error = schema.cast_row(&[Value::from("x"), Value::from("y")], false).unwrap_err();
        match error {
            Error::Multiple(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        let single = schema.cast_row(&[Value::from("x"), Value::from("2")], false).unwrap_err();
        assert!(matches!(single, Error::Cast { .. }));
    }

    #[test]
    fn test_cast_row_length_mismatch() {
        let schema = Schema::from_descriptor(id_age(), SchemaOptions::strict()).unwrap();
        let error = schema.cast_row(&[Value::from("1")], true).unwrap_err();
        assert!(error.is_cast());
    }

    #[test]
    fn test_cast_row_is_idempotent() {
        let schema = Schema::from_descriptor(
            json!({"fields": [
                {"name": "id", "type": "integer"},
                {"name": "when", "type": "datetime"},
                {"name": "tags", "type": "array"},
            ]}),
            SchemaOptions::strict(),
        )
        .unwrap();
        let row = vec![
            Value::from("7"),
            Value::from("2021-03-04T05:06:07Z"),
            Value::from("[1, 2]"),
        ];
        let once = schema.cast_row(&row, true).unwrap();
        let twice = schema.cast_row(&once, true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_get_field_with_duplicates() {
        let schema = Schema::from_descriptor(
            json!({"fields": [{"name": "a", "type": "integer"}, {"name": "a", "type": "string"}]}),
            SchemaOptions::default(),
        )
        .unwrap();
        assert_eq!(schema.get_field("a", 0).unwrap().field_type().as_str(), "integer");
        assert_eq!(schema.get_field("a", 1).unwrap().field_type().as_str(), "string");
        assert!(schema.get_field("a", 2).is_none());
        assert!(schema.get_field("b", 0).is_none());
    }

    #[test]
    fn test_add_and_remove_field() {
        let mut schema = Schema::from_descriptor(id_age(), SchemaOptions::strict()).unwrap();
        let added = schema.add_field(json!({"name": "name"})).unwrap().unwrap();
        assert_eq!(added.name(), "name");
        assert_eq!(schema.field_names(), vec!["id", "age", "name"]);

        let removed = schema.remove_field("age").unwrap().unwrap();
        assert_eq!(removed["name"], json!("age"));
        assert_eq!(schema.field_names(), vec!["id", "name"]);
        assert!(schema.remove_field("missing").unwrap().is_none());
    }

    #[test]
    fn test_strict_add_field_rolls_back() {
        let mut schema = Schema::from_descriptor(id_age(), SchemaOptions::strict()).unwrap();
        assert!(schema.add_field(json!({"name": "bad", "type": "decimal"})).is_err());
        assert_eq!(schema.field_names(), vec!["id", "age"]);
        assert_eq!(schema.descriptor_mut()["fields"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_commit() {
        let mut schema = Schema::from_descriptor(id_age(), SchemaOptions::default()).unwrap();
        assert!(!schema.commit(None).unwrap());

        schema.descriptor_mut()["fields"][0]["type"] = json!("number");
        assert!(schema.commit(None).unwrap());
        assert_eq!(schema.fields()[0].field_type().as_str(), "number");

        // Switching mode always rebuilds
        assert!(schema.commit(Some(true)).unwrap());
        assert!(schema.strict());
    }

    #[test]
    fn test_keys_are_normalized() {
        let schema = Schema::from_descriptor(
            json!({
                "fields": [{"name": "id"}, {"name": "parent"}],
                "primaryKey": "id",
                "foreignKeys": [{"fields": "parent", "reference": {"resource": "", "fields": "id"}}],
            }),
            SchemaOptions::strict(),
        )
        .unwrap();
        assert_eq!(schema.primary_key(), &["id".to_string()]);
        assert_eq!(schema.foreign_keys().len(), 1);
        assert!(schema.foreign_keys()[0].is_self_reference());
        assert_eq!(schema.foreign_keys()[0].reference.fields, vec!["id".to_string()]);
    }

    #[test]
    fn test_unknown_primary_key_is_invalid() {
        let result = Schema::from_descriptor(
            json!({"fields": [{"name": "id"}], "primaryKey": "key"}),
            SchemaOptions::strict(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_infer_then_cast() {
        let rows: Vec<Vec<Value>> = vec![
            vec!["id".into(), "age".into(), "name".into()],
            vec!["1".into(), "39".into(), "Paul".into()],
            vec!["2".into(), "23".into(), "Jimmy".into()],
            vec!["3".into(), "".into(), "Jane".into()],
        ];
        let mut schema = Schema::from_descriptor(json!({"fields": []}), SchemaOptions::default()).unwrap();
        let descriptor = schema.infer(&rows, Headers::Row(1)).unwrap().clone();
        assert_eq!(descriptor["fields"][0]["type"], json!("integer"));
        assert_eq!(descriptor["fields"][2]["type"], json!("string"));

        for row in &rows[1..] {
            schema.cast_row(row, true).unwrap();
        }
    }

    #[tokio::test]
    async fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, id_age().to_string()).unwrap();

        let schema = Schema::load(path.as_path(), SchemaOptions::strict()).await.unwrap();
        assert_eq!(schema.field_names(), vec!["id", "age"]);

        let target = dir.path().join("saved.json");
        schema.save(&target).await.unwrap();
        let saved: JsonValue = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(&saved, schema.descriptor());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_descriptor_error() {
        let result = Schema::load("does/not/exist.json", SchemaOptions::default()).await;
        assert!(matches!(result, Err(Error::Descriptor(_))));
    }
}
