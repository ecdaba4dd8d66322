//! Descriptor sources, retrieval, default expansion and pointer dereferencing
//!
//! Every `load` accepts a [`DescriptorSource`]: an inline JSON object, a
//! local path or a remote URL. Local and remote descriptors are fetched
//! through the storage layer and parsed as JSON (or YAML for `.yaml`/`.yml`).

use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::{self, filesystem::FileSystemStorageBackend};

/// Where a descriptor comes from
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorSource {
    Inline(JsonValue),
    Path(PathBuf),
    Url(String),
}

impl From<JsonValue> for DescriptorSource {
    fn from(value: JsonValue) -> Self {
        DescriptorSource::Inline(value)
    }
}

impl From<&str> for DescriptorSource {
    fn from(value: &str) -> Self {
        if storage::is_remote_path(value) {
            DescriptorSource::Url(value.to_string())
        } else {
            DescriptorSource::Path(PathBuf::from(value))
        }
    }
}

impl From<String> for DescriptorSource {
    fn from(value: String) -> Self {
        DescriptorSource::from(value.as_str())
    }
}

impl From<&Path> for DescriptorSource {
    fn from(value: &Path) -> Self {
        DescriptorSource::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for DescriptorSource {
    fn from(value: PathBuf) -> Self {
        DescriptorSource::Path(value)
    }
}

impl DescriptorSource {
    /// Directory (or URL prefix) relative data paths resolve against
    pub fn base_path(&self) -> Option<String> {
        match self {
            DescriptorSource::Inline(_) => None,
            DescriptorSource::Path(path) => Some(
                path.parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(|| ".".to_string()),
            ),
            DescriptorSource::Url(url) => url.rfind('/').map(|i| url[..i].to_string()),
        }
    }

    /// Location as a string, `None` for inline descriptors
    pub fn location(&self) -> Option<String> {
        match self {
            DescriptorSource::Inline(_) => None,
            DescriptorSource::Path(path) => Some(path.to_string_lossy().into_owned()),
            DescriptorSource::Url(url) => Some(url.clone()),
        }
    }
}

/// Fetch and parse a descriptor.
///
/// Relative paths are resolved against `base_path` and must stay inside it.
pub async fn retrieve(source: &DescriptorSource, base_path: Option<&str>) -> Result<JsonValue> {
    let location = match source {
        DescriptorSource::Inline(value) => return Ok(value.clone()),
        DescriptorSource::Path(path) => path.to_string_lossy().into_owned(),
        DescriptorSource::Url(url) => url.clone(),
    };

    if base_path.is_some()
        && !storage::is_remote_path(&location)
        && !FileSystemStorageBackend::is_safe_path(&location)
    {
        return Err(Error::Descriptor(format!(
            "Descriptor path \"{}\" is not safe",
            location
        )));
    }

    debug!("Retrieving descriptor from {}", location);
    let bytes = storage::read_location(base_path, &location)
        .await
        .map_err(|e| Error::Descriptor(format!("Unable to load descriptor at {}: {}", location, e)))?;

    parse(&location, &bytes)
}

/// Parse descriptor bytes, as YAML when the location has a YAML extension
pub fn parse(location: &str, bytes: &[u8]) -> Result<JsonValue> {
    let lower = location.to_ascii_lowercase();
    let parsed = if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        serde_yaml::from_slice::<JsonValue>(bytes).map_err(|e| e.to_string())
    } else {
        serde_json::from_slice::<JsonValue>(bytes).map_err(|e| e.to_string())
    };
    parsed.map_err(|e| Error::Descriptor(format!("Unable to parse descriptor at {}: {}", location, e)))
}

fn as_object<'a>(descriptor: &'a mut JsonValue, what: &str) -> Result<&'a mut Map<String, JsonValue>> {
    descriptor
        .as_object_mut()
        .ok_or_else(|| Error::Descriptor(format!("{} descriptor must be a JSON object", what)))
}

fn string_to_list(value: &mut JsonValue) {
    if let JsonValue::String(s) = value {
        *value = json!([s.clone()]);
    }
}

/// Fill Table Schema defaults in place: field `type`/`format`,
/// `missingValues`, and list forms of primary and foreign key fields
pub fn expand_schema(descriptor: &mut JsonValue) -> Result<()> {
    let schema = as_object(descriptor, "Table Schema")?;

    if let Some(JsonValue::Array(fields)) = schema.get_mut("fields") {
        for field in fields.iter_mut().filter_map(JsonValue::as_object_mut) {
            field.entry("type").or_insert_with(|| json!("string"));
            field.entry("format").or_insert_with(|| json!("default"));
        }
    }

    schema.entry("missingValues").or_insert_with(|| json!([""]));

    if let Some(primary_key) = schema.get_mut("primaryKey") {
        string_to_list(primary_key);
    }

    if let Some(JsonValue::Array(foreign_keys)) = schema.get_mut("foreignKeys") {
        for foreign_key in foreign_keys.iter_mut().filter_map(JsonValue::as_object_mut) {
            if let Some(fields) = foreign_key.get_mut("fields") {
                string_to_list(fields);
            }
            if let Some(fields) = foreign_key
                .get_mut("reference")
                .and_then(JsonValue::as_object_mut)
                .and_then(|reference| reference.get_mut("fields"))
            {
                string_to_list(fields);
            }
        }
    }

    Ok(())
}

/// Fill CSV dialect defaults in place
pub fn expand_dialect(dialect: &mut Map<String, JsonValue>) {
    let defaults = [
        ("delimiter", json!(",")),
        ("doubleQuote", json!(true)),
        ("lineTerminator", json!("\r\n")),
        ("quoteChar", json!("\"")),
        ("skipInitialSpace", json!(true)),
        ("header", json!(true)),
        ("caseSensitiveHeader", json!(false)),
    ];
    for (key, value) in defaults {
        dialect.entry(key).or_insert(value);
    }
}

/// Fill Data Resource defaults in place. Tabular resources also get
/// schema and dialect defaults.
pub fn expand_resource(descriptor: &mut JsonValue) -> Result<()> {
    let resource = as_object(descriptor, "Data Resource")?;
    resource.entry("profile").or_insert_with(|| json!("data-resource"));
    resource.entry("encoding").or_insert_with(|| json!("utf-8"));

    if resource.get("profile").and_then(JsonValue::as_str) == Some("tabular-data-resource") {
        if let Some(schema) = resource.get_mut("schema").filter(|s| s.is_object()) {
            expand_schema(schema)?;
        }
        let dialect = resource.entry("dialect").or_insert_with(|| json!({}));
        if let Some(dialect) = dialect.as_object_mut() {
            expand_dialect(dialect);
        }
    }

    Ok(())
}

/// Fill Data Package defaults in place, including every resource
pub fn expand_package(descriptor: &mut JsonValue) -> Result<()> {
    let package = as_object(descriptor, "Data Package")?;
    package.entry("profile").or_insert_with(|| json!("data-package"));
    package.entry("resources").or_insert_with(|| json!([]));

    if let Some(JsonValue::Array(resources)) = package.get_mut("resources") {
        for resource in resources.iter_mut() {
            expand_resource(resource)?;
        }
    }

    Ok(())
}

fn is_pointer(value: &JsonValue) -> Option<&str> {
    value.as_str().filter(|s| s.starts_with("#/"))
}

/// Replace `#/...` pointers in the `schema` and `dialect` properties of
/// every resource with the value they point to inside the package
pub fn dereference_package(descriptor: &mut JsonValue) -> Result<()> {
    let root = descriptor.clone();
    let Some(JsonValue::Array(resources)) = descriptor.get_mut("resources") else {
        return Ok(());
    };

    for resource in resources.iter_mut().filter_map(JsonValue::as_object_mut) {
        for key in ["schema", "dialect"] {
            let Some(pointer) = resource.get(key).and_then(is_pointer).map(str::to_string) else {
                continue;
            };
            let target = root.pointer(&pointer[1..]).cloned().ok_or_else(|| {
                Error::Descriptor(format!("Not resolved pointer \"{}\" for {}", pointer, key))
            })?;
            debug!("Dereferenced {} pointer {}", key, pointer);
            resource.insert(key.to_string(), target);
        }
    }

    Ok(())
}

/// Fetch `schema` and `dialect` given as local paths or URLs.
///
/// `#/` pointers are left for [`dereference_package`].
pub async fn dereference_resource(descriptor: &mut JsonValue, base_path: Option<&str>) -> Result<()> {
    for key in ["schema", "dialect"] {
        let Some(location) = descriptor
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.starts_with('#'))
            .map(str::to_string)
        else {
            continue;
        };

        if !storage::is_remote_path(&location) && !FileSystemStorageBackend::is_safe_path(&location) {
            return Err(Error::Descriptor(format!(
                "Not safe path in {} reference \"{}\"",
                key, location
            )));
        }

        let target = retrieve(&DescriptorSource::from(location.as_str()), base_path).await?;
        if let Some(object) = descriptor.as_object_mut() {
            object.insert(key.to_string(), target);
        }
    }

    Ok(())
}
