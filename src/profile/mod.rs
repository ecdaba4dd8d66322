//! JSON Schema profiles for Table Schema, Data Resource and Data Package descriptors
//!
//! Registry profiles are bundled with the crate; any other profile is
//! fetched from a URL or local path and compiled on load.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::descriptor::{self, DescriptorSource};
use crate::error::{Error, Result};
use crate::schema::Field;

const TABLE_SCHEMA: &str = include_str!("../../schemas/table-schema.json");
const DATA_RESOURCE: &str = include_str!("../../schemas/data-resource.json");
const TABULAR_DATA_RESOURCE: &str = include_str!("../../schemas/tabular-data-resource.json");
const DATA_PACKAGE: &str = include_str!("../../schemas/data-package.json");
const TABULAR_DATA_PACKAGE: &str = include_str!("../../schemas/tabular-data-package.json");

/// Names of the bundled profiles
pub const REGISTRY: [&str; 5] = [
    "table-schema",
    "data-resource",
    "tabular-data-resource",
    "data-package",
    "tabular-data-package",
];

/// Result of validating a descriptor against a profile
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<Error>,
}

impl ValidationReport {
    /// Turn the report into `Ok(())` or the collected errors
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::from_errors(self.errors))
        }
    }
}

/// A compiled JSON Schema profile
#[derive(Clone)]
pub struct Profile {
    name: String,
    jsonschema: JsonValue,
    validator: Arc<Validator>,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile").field("name", &self.name).finish()
    }
}

impl Profile {
    /// Load a bundled profile by name, or fetch one from a URL or path
    pub async fn load(profile: &str) -> Result<Self> {
        if REGISTRY.contains(&profile) {
            return Self::from_registry(profile);
        }
        debug!("Fetching profile {}", profile);
        let jsonschema = descriptor::retrieve(&DescriptorSource::from(profile), None).await?;
        Self::from_jsonschema(profile, jsonschema)
    }

    /// Bundled profile by name
    pub fn from_registry(name: &str) -> Result<Self> {
        let source = match name {
            "table-schema" => TABLE_SCHEMA,
            "data-resource" => DATA_RESOURCE,
            "tabular-data-resource" => TABULAR_DATA_RESOURCE,
            "data-package" => DATA_PACKAGE,
            "tabular-data-package" => TABULAR_DATA_PACKAGE,
            other => {
                return Err(Error::Descriptor(format!(
                    "Profile \"{}\" is not in the registry",
                    other
                )));
            }
        };
        let jsonschema: JsonValue = serde_json::from_str(source)?;
        Self::from_jsonschema(name, jsonschema)
    }

    /// Compile a profile from a JSON Schema document
    pub fn from_jsonschema(name: impl Into<String>, jsonschema: JsonValue) -> Result<Self> {
        let name = name.into();
        let validator = Validator::new(&jsonschema)
            .map_err(|e| Error::Descriptor(format!("Failed to compile profile \"{}\": {}", name, e)))?;
        Ok(Self {
            name,
            jsonschema,
            validator: Arc::new(validator),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn jsonschema(&self) -> &JsonValue {
        &self.jsonschema
    }

    /// Validate a descriptor without modifying it
    pub fn validate(&self, descriptor: &JsonValue) -> ValidationReport {
        let mut errors: Vec<Error> = self
            .validator
            .iter_errors(descriptor)
            .map(|error| Error::Validation(format_validation_error(&error, &self.name)))
            .collect();

        // Key checks need a structurally valid descriptor
        if errors.is_empty() {
            match self.name.as_str() {
                "table-schema" => errors.extend(check_table_schema(descriptor)),
                "data-package" | "tabular-data-package" => {
                    errors.extend(check_resource_names(descriptor))
                }
                _ => {}
            }
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}

fn format_validation_error(error: &jsonschema::ValidationError, profile: &str) -> String {
    let path = error.instance_path().to_string();
    let path = if path == "/" || path.is_empty() {
        "root".to_string()
    } else {
        path
    };
    format!("Descriptor validation error at '{}' ({}): {}", path, profile, error)
}

fn name_list(value: Option<&JsonValue>) -> Vec<String> {
    match value {
        Some(JsonValue::String(s)) => vec![s.clone()],
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn check_table_schema(descriptor: &JsonValue) -> Vec<Error> {
    // Field construction compiles patterns and casts constraint bounds
    let mut errors: Vec<Error> = descriptor
        .get("fields")
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
        .filter_map(|field| Field::new(field.clone(), None).err())
        .collect();
    let field_names: Vec<&str> = descriptor
        .get("fields")
        .and_then(JsonValue::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f.get("name").and_then(JsonValue::as_str))
                .collect()
        })
        .unwrap_or_default();

    for name in name_list(descriptor.get("primaryKey")) {
        if !field_names.contains(&name.as_str()) {
            errors.push(Error::Validation(format!(
                "Table Schema primary key \"{}\" is not a field",
                name
            )));
        }
    }

    if let Some(foreign_keys) = descriptor.get("foreignKeys").and_then(JsonValue::as_array) {
        for foreign_key in foreign_keys {
            let fields = name_list(foreign_key.get("fields"));
            for name in &fields {
                if !field_names.contains(&name.as_str()) {
                    errors.push(Error::Validation(format!(
                        "Table Schema foreign key field \"{}\" is not a field",
                        name
                    )));
                }
            }
            let reference = name_list(foreign_key.get("reference").and_then(|r| r.get("fields")));
            if reference.len() != fields.len() {
                errors.push(Error::Validation(format!(
                    "Table Schema foreign key fields \"{}\" do not match the reference fields \"{}\"",
                    fields.join(", "),
                    reference.join(", ")
                )));
            }
        }
    }

    errors
}

fn check_resource_names(descriptor: &JsonValue) -> Vec<Error> {
    let mut seen = HashSet::new();
    descriptor
        .get("resources")
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("name").and_then(JsonValue::as_str))
        .filter(|name| !seen.insert(*name))
        .map(|name| Error::Validation(format!("Data Package has duplicate resource name \"{}\"", name)))
        .collect()
}
