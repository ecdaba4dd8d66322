//! Data Resource: descriptor metadata around a data source
//!
//! A resource points at inline `data`, a local path, a URL or several
//! path parts. Tabular resources expose their rows through a [`Table`]
//! built on demand from the committed descriptor.

use std::io::Cursor;

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::descriptor::{self, DescriptorSource};
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::schema::{Schema, SchemaOptions};
use crate::storage::{self, filesystem::FileSystemStorageBackend};
use crate::table::{
    Dialect, IterOptions, KeyedRow, Relations, Row, SchemaSource, Table, TableOptions, TableRows,
    TableSource, reader,
};

const TABULAR_FORMATS: [&str; 2] = ["csv", "tsv"];

/// Options for [`Resource::load`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOptions {
    /// Directory or URL prefix relative paths resolve against. Defaults to
    /// the descriptor location.
    pub base_path: Option<String>,
    pub strict: bool,
}

/// Options for [`Resource::iter`] and [`Resource::read`]
#[derive(Debug, Clone)]
pub struct ResourceIterOptions {
    pub keyed: bool,
    pub extended: bool,
    pub cast: bool,
    /// Resolve foreign keys against the referenced resources
    pub relations: bool,
    pub force_cast: bool,
}

impl Default for ResourceIterOptions {
    fn default() -> Self {
        Self {
            keyed: false,
            extended: false,
            cast: true,
            relations: false,
            force_cast: false,
        }
    }
}

/// Where resource data lives. Paths are kept as written in the descriptor
/// and resolved against the base path when read.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSource {
    Inline(JsonValue),
    Path(String),
    Multipart(Vec<String>),
}

/// Package descriptor the resource belongs to, used to reach sibling
/// resources when resolving foreign keys
#[derive(Debug, Clone)]
pub(crate) struct PackageContext {
    pub(crate) descriptor: JsonValue,
    pub(crate) base_path: Option<String>,
    /// Non-registry resource profiles fetched when the package was loaded
    pub(crate) profiles: Vec<Profile>,
}

#[derive(Debug, Default)]
struct Built {
    source: Option<ResourceSource>,
    schema: Option<Schema>,
    errors: Vec<Error>,
}

/// Data Resource model
#[derive(Debug)]
pub struct Resource {
    current: JsonValue,
    next: JsonValue,
    strict: bool,
    base_path: Option<String>,
    package: Option<PackageContext>,
    profile: Profile,
    built: Built,
}

fn paths(descriptor: &JsonValue) -> Vec<String> {
    match descriptor.get("path") {
        Some(JsonValue::String(path)) => vec![path.clone()],
        Some(JsonValue::Array(parts)) => parts
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn extension(path: &str) -> Option<String> {
    path.split(['?', '#'])
        .next()
        .and_then(|p| p.rsplit('/').next())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

fn is_tabular(descriptor: &JsonValue, strict: bool) -> bool {
    if descriptor.get("profile").and_then(JsonValue::as_str) == Some("tabular-data-resource") {
        return true;
    }
    if strict {
        return false;
    }
    let format = descriptor
        .get("format")
        .and_then(JsonValue::as_str)
        .map(str::to_ascii_lowercase)
        .or_else(|| paths(descriptor).first().and_then(|p| extension(p)));
    if format.is_some_and(|f| TABULAR_FORMATS.contains(&f.as_str())) {
        return true;
    }
    descriptor.get("data").is_some_and(JsonValue::is_array)
}

/// Profile for `name`: `current` or a known profile when one matches,
/// otherwise a registry profile
pub(crate) fn resolve_profile(current: &Profile, name: &str, known: &[Profile]) -> Result<Profile> {
    if current.name() == name {
        return Ok(current.clone());
    }
    match known.iter().find(|profile| profile.name() == name) {
        Some(profile) => Ok(profile.clone()),
        None => Profile::from_registry(name),
    }
}

/// Profile a descriptor starts with. In lenient mode an unresolvable
/// profile falls back to `fallback`; the build then records the failure.
pub(crate) fn initial_profile(
    descriptor: &JsonValue,
    fallback: &str,
    strict: bool,
    known: &[Profile],
) -> Result<Profile> {
    let name = descriptor
        .get("profile")
        .and_then(JsonValue::as_str)
        .unwrap_or(fallback);
    match known.iter().find(|profile| profile.name() == name) {
        Some(profile) => Ok(profile.clone()),
        None => match Profile::from_registry(name) {
            Ok(profile) => Ok(profile),
            Err(error) if strict => Err(error),
            Err(_) => Profile::from_registry(fallback),
        },
    }
}

/// Fetch a profile by name, falling back to `fallback` in lenient mode
pub(crate) async fn load_profile(name: &str, fallback: &str, strict: bool) -> Result<Profile> {
    match Profile::load(name).await {
        Ok(profile) => Ok(profile),
        Err(error) if strict => Err(error),
        Err(error) => {
            warn!("Profile \"{}\" could not be loaded: {}", name, error);
            Profile::from_registry(fallback)
        }
    }
}

impl Resource {
    /// Load a resource descriptor from an inline value, local path or URL.
    ///
    /// `schema` and `dialect` given as paths or URLs are fetched and
    /// inlined.
    pub async fn load(source: impl Into<DescriptorSource>, options: ResourceOptions) -> Result<Self> {
        let source = source.into();
        let base_path = options.base_path.or_else(|| source.base_path());
        let mut descriptor = descriptor::retrieve(&source, None).await?;
        descriptor::dereference_resource(&mut descriptor, base_path.as_deref()).await?;

        let profile_name = descriptor
            .get("profile")
            .and_then(JsonValue::as_str)
            .unwrap_or("data-resource")
            .to_string();
        let profile = load_profile(&profile_name, "data-resource", options.strict).await?;

        let resource = Self::build_new(descriptor, base_path, options.strict, None, profile)?;
        info!(
            "Loaded Data Resource {}",
            resource.name().unwrap_or("(unnamed)")
        );
        Ok(resource)
    }

    /// Build a resource from an already retrieved descriptor
    pub fn from_descriptor(descriptor: JsonValue, options: ResourceOptions) -> Result<Self> {
        let profile = initial_profile(&descriptor, "data-resource", options.strict, &[])?;
        Self::build_new(descriptor, options.base_path, options.strict, None, profile)
    }

    pub(crate) fn in_package(
        descriptor: JsonValue,
        strict: bool,
        package: PackageContext,
    ) -> Result<Self> {
        let profile = initial_profile(&descriptor, "data-resource", strict, &package.profiles)?;
        Self::build_new(
            descriptor,
            package.base_path.clone(),
            strict,
            Some(package),
            profile,
        )
    }

    fn build_new(
        descriptor: JsonValue,
        base_path: Option<String>,
        strict: bool,
        package: Option<PackageContext>,
        profile: Profile,
    ) -> Result<Self> {
        let mut resource = Self {
            current: descriptor.clone(),
            next: descriptor,
            strict,
            base_path,
            package,
            profile,
            built: Built::default(),
        };
        resource.build()?;
        Ok(resource)
    }

    fn build(&mut self) -> Result<()> {
        let mut descriptor = self.next.clone();
        let mut built = Built::default();
        let mut profile = self.profile.clone();

        match descriptor::expand_resource(&mut descriptor) {
            Ok(()) => {
                let name = descriptor
                    .get("profile")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("data-resource");
                let known = self
                    .package
                    .as_ref()
                    .map(|package| package.profiles.as_slice())
                    .unwrap_or_default();
                match resolve_profile(&self.profile, name, known) {
                    Ok(resolved) => {
                        profile = resolved;
                        built.errors = profile.validate(&descriptor).errors;
                    }
                    Err(error) => built.errors.push(error),
                }
                self.derive(&descriptor, &mut built);
            }
            Err(error) => built.errors.push(error),
        }

        if self.strict && !built.errors.is_empty() {
            return Err(Error::from_errors(built.errors));
        }
        if !built.errors.is_empty() {
            warn!("Data Resource has {} validation error(s)", built.errors.len());
        }

        self.current = descriptor.clone();
        self.next = descriptor;
        self.profile = profile;
        self.built = built;
        Ok(())
    }

    fn derive(&self, descriptor: &JsonValue, built: &mut Built) {
        let parts = paths(descriptor);
        for part in &parts {
            if !storage::is_remote_path(part) && !FileSystemStorageBackend::is_safe_path(part) {
                built
                    .errors
                    .push(Error::Descriptor(format!("Local path \"{}\" is not safe", part)));
            }
        }

        built.source = match (descriptor.get("data"), parts.len()) {
            (Some(data), _) => Some(ResourceSource::Inline(data.clone())),
            (None, 0) => None,
            (None, 1) => Some(ResourceSource::Path(parts[0].clone())),
            (None, _) => Some(ResourceSource::Multipart(parts)),
        };

        if let Some(schema) = descriptor.get("schema").filter(|s| s.is_object()) {
            let options = SchemaOptions {
                strict: self.strict,
                ..Default::default()
            };
            match Schema::from_descriptor(schema.clone(), options) {
                Ok(schema) => built.schema = Some(schema),
                Err(error) => built.errors.push(error),
            }
        }
    }

    pub fn valid(&self) -> bool {
        self.built.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.built.errors
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Committed descriptor with defaults expanded
    pub fn descriptor(&self) -> &JsonValue {
        &self.current
    }

    /// Working descriptor; call [`Resource::commit`] to apply edits
    pub fn descriptor_mut(&mut self) -> &mut JsonValue {
        &mut self.next
    }

    pub fn name(&self) -> Option<&str> {
        self.current.get("name").and_then(JsonValue::as_str)
    }

    pub fn inline(&self) -> bool {
        matches!(self.built.source, Some(ResourceSource::Inline(_)))
    }

    /// Data read from local files; false without `data` or `path`
    pub fn local(&self) -> bool {
        self.built.source.is_some() && !self.inline() && !self.remote()
    }

    /// Path is a URL, or relative to a remote base path
    pub fn remote(&self) -> bool {
        let first = match &self.built.source {
            Some(ResourceSource::Path(path)) => Some(path),
            Some(ResourceSource::Multipart(parts)) => parts.first(),
            _ => None,
        };
        first.is_some_and(|part| {
            storage::is_remote_path(&storage::join_location(self.base_path.as_deref(), part))
        })
    }

    pub fn multipart(&self) -> bool {
        matches!(self.built.source, Some(ResourceSource::Multipart(_)))
    }

    /// Tabular profile, or in lenient mode csv/tsv data or inline rows
    pub fn tabular(&self) -> bool {
        is_tabular(&self.current, self.strict)
    }

    pub fn source(&self) -> Option<&ResourceSource> {
        self.built.source.as_ref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.built.schema.as_ref()
    }

    /// Header names of a tabular resource
    pub async fn headers(&self) -> Result<Option<Vec<String>>> {
        if !self.tabular() {
            return Ok(None);
        }
        let table = self.table().await?;
        Ok(table.headers().map(<[String]>::to_vec))
    }

    fn check_tabular(&self) -> Result<()> {
        if self.tabular() {
            Ok(())
        } else {
            Err(Error::Descriptor(
                "Methods iter/read are not supported for non tabular data".to_string(),
            ))
        }
    }

    /// Table over the resource data with its schema and dialect
    pub async fn table(&self) -> Result<Table> {
        let (source, location) = match &self.built.source {
            Some(ResourceSource::Inline(data)) => (TableSource::from_json(data)?, None),
            Some(ResourceSource::Path(path)) => {
                let location = self.locate(path)?;
                (TableSource::Path(location.clone()), Some(location))
            }
            Some(ResourceSource::Multipart(parts)) => (
                TableSource::Reader(Box::new(Cursor::new(self.raw_read().await?))),
                parts.first().cloned(),
            ),
            None => return Err(Error::Descriptor("Resource has no data or path".to_string())),
        };

        let format = self.current.get("format").and_then(JsonValue::as_str);
        let mut dialect = match self.current.get("dialect").filter(|d| d.is_object()) {
            Some(dialect) => Some(Dialect::from_descriptor(dialect)?),
            None => None,
        };
        if let Some(implied) = reader::dialect_for_format(format, location.as_deref())? {
            match dialect.as_mut() {
                Some(dialect) if dialect.delimiter == "," => dialect.delimiter = implied.delimiter,
                Some(_) => {}
                None => dialect = Some(implied),
            }
        }

        let schema = match self.current.get("schema").filter(|s| s.is_object()) {
            Some(schema) => Some(SchemaSource::Loaded(Schema::from_descriptor(
                schema.clone(),
                SchemaOptions {
                    strict: self.strict,
                    ..Default::default()
                },
            )?)),
            None => None,
        };

        Table::load(
            source,
            TableOptions {
                schema,
                strict: self.strict,
                headers: None,
                format: None,
                encoding: self
                    .current
                    .get("encoding")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string),
                dialect,
            },
        )
        .await
    }

    /// Iterate the rows of a tabular resource
    pub async fn iter(&self, options: ResourceIterOptions) -> Result<TableRows> {
        self.check_tabular()?;
        let relations = if options.relations {
            Some(self.get_relations().await?)
        } else {
            None
        };
        let mut table = self.table().await?;
        table.iter(IterOptions {
            keyed: options.keyed,
            extended: options.extended,
            cast: options.cast,
            force_cast: options.force_cast,
            relations,
        })
    }

    /// Read the rows of a tabular resource, at most `limit` of them
    pub async fn read(&self, options: ResourceIterOptions, limit: Option<usize>) -> Result<Vec<Row>> {
        let rows = self.iter(options).await?;
        match limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }

    /// Read every row with foreign keys resolved; the first broken
    /// reference is returned as an error
    pub async fn check_relations(&self) -> Result<bool> {
        self.read(
            ResourceIterOptions {
                relations: true,
                ..Default::default()
            },
            None,
        )
        .await?;
        Ok(true)
    }

    /// Keyed, cast rows without relation resolution
    async fn table_rows(&self) -> Result<Vec<KeyedRow>> {
        let mut table = self.table().await?;
        table
            .iter(IterOptions::keyed())?
            .filter_map(|row| match row {
                Ok(Row::Keyed(row)) => Some(Ok(row)),
                Ok(_) => None,
                Err(error) => Some(Err(error)),
            })
            .collect()
    }

    async fn get_relations(&self) -> Result<Relations> {
        let mut relations = Relations::new();
        let Some(schema) = self.schema() else {
            return Ok(relations);
        };

        for foreign_key in schema.foreign_keys() {
            let name = &foreign_key.reference.resource;
            if relations.contains_key(name) {
                continue;
            }
            let rows = if foreign_key.is_self_reference() {
                self.table_rows().await?
            } else {
                self.sibling(name)?.table_rows().await?
            };
            debug!("Loaded {} referenced rows from \"{}\"", rows.len(), name);
            relations.insert(name.clone(), rows);
        }

        Ok(relations)
    }

    fn sibling(&self, name: &str) -> Result<Resource> {
        let package = self.package.as_ref().ok_or_else(|| {
            Error::Relation(format!(
                "Resource \"{}\" is referenced but this resource is not in a package",
                name
            ))
        })?;
        let descriptor = package
            .descriptor
            .get("resources")
            .and_then(JsonValue::as_array)
            .and_then(|resources| {
                resources
                    .iter()
                    .find(|r| r.get("name").and_then(JsonValue::as_str) == Some(name))
            })
            .cloned()
            .ok_or_else(|| {
                Error::Relation(format!("Referenced resource \"{}\" is not in the package", name))
            })?;
        Resource::in_package(descriptor, false, package.clone())
    }

    /// Readable location of a path part: URLs as is, local parts checked
    /// and resolved below the base directory
    fn locate(&self, part: &str) -> Result<String> {
        if storage::is_remote_path(part) {
            return Ok(part.to_string());
        }
        if !FileSystemStorageBackend::is_safe_path(part) {
            return Err(Error::Descriptor(format!("Local path \"{}\" is not safe", part)));
        }
        match self.base_path.as_deref() {
            Some(base) if storage::is_remote_path(base) => {
                Ok(storage::join_location(Some(base), part))
            }
            base => {
                let backend = FileSystemStorageBackend::new(base.unwrap_or("."));
                Ok(backend.resolve_path(part)?.to_string_lossy().into_owned())
            }
        }
    }

    fn raw_locations(&self) -> Result<Vec<String>> {
        let parts = match &self.built.source {
            Some(ResourceSource::Path(path)) => std::slice::from_ref(path),
            Some(ResourceSource::Multipart(parts)) => parts.as_slice(),
            Some(ResourceSource::Inline(_)) => {
                return Err(Error::Descriptor(
                    "Methods rawIter/rawRead are not supported for inline data".to_string(),
                ));
            }
            None => return Err(Error::Descriptor("Resource has no data or path".to_string())),
        };
        parts.iter().map(|part| self.locate(part)).collect()
    }

    /// Stream the raw bytes, one chunk per path part
    pub fn raw_iter(&self) -> Result<impl Stream<Item = Result<Vec<u8>>> + use<>> {
        let locations = self.raw_locations()?;
        Ok(stream::iter(locations).then(|location| async move {
            storage::read_location(None, &location)
                .await
                .map_err(Error::from)
        }))
    }

    /// All raw bytes, multipart parts concatenated
    pub async fn raw_read(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut chunks = Box::pin(self.raw_iter()?);
        while let Some(chunk) = chunks.next().await {
            bytes.extend(chunk?);
        }
        Ok(bytes)
    }

    /// Fill name, format, mediatype, encoding, size, hash, schema and
    /// profile from the data, then commit
    pub async fn infer(&mut self) -> Result<&JsonValue> {
        let parts = paths(&self.current);
        let mut descriptor = self.current.clone();
        let Some(object) = descriptor.as_object_mut() else {
            return Err(Error::Descriptor("Data Resource descriptor must be a JSON object".to_string()));
        };

        if !object.contains_key("name") {
            let name = parts
                .first()
                .and_then(|p| p.rsplit('/').next())
                .map(|file| file.rsplit_once('.').map_or(file, |(stem, _)| stem))
                .map(slugify)
                .unwrap_or_else(|| "inline".to_string());
            object.insert("name".to_string(), json!(name));
        }
        if !object.contains_key("format")
            && let Some(format) = parts.first().and_then(|p| extension(p))
        {
            object.insert("format".to_string(), json!(format));
        }
        if !object.contains_key("mediatype")
            && let Some(format) = object.get("format").and_then(JsonValue::as_str)
        {
            let mediatype = match format {
                "tsv" => "text/tab-separated-values".to_string(),
                other => format!("text/{}", other),
            };
            object.insert("mediatype".to_string(), json!(mediatype));
        }
        object.entry("encoding").or_insert_with(|| json!("utf-8"));

        if !self.inline() {
            let bytes = self.raw_read().await?;
            object.insert("bytes".to_string(), json!(bytes.len()));
            object.insert(
                "hash".to_string(),
                json!(format!("sha256:{:x}", Sha256::digest(&bytes))),
            );
        }

        if is_tabular(&descriptor, false) {
            if descriptor.get("schema").filter(|s| s.is_object()).is_none() {
                let mut table = self.table().await?;
                let schema = table.infer(None)?.clone();
                if let Some(object) = descriptor.as_object_mut() {
                    object.insert("schema".to_string(), schema);
                }
            }
            if let Some(object) = descriptor.as_object_mut() {
                object.insert("profile".to_string(), json!("tabular-data-resource"));
            }
        }

        self.next = descriptor;
        self.commit(None)?;
        info!("Inferred Data Resource {}", self.name().unwrap_or("(unnamed)"));
        Ok(&self.current)
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
    pub async fn save(&self, target: impl AsRef<std::path::Path>) -> Result<()> {
        let target = target.as_ref();
        let content = serde_json::to_string_pretty(&self.current)?;
        storage::write_location(&target.to_string_lossy(), content.as_bytes()).await?;
        info!("Saved Data Resource to {}", target.display());
        Ok(())
    }
}

/// Resource name from a file stem: lowercase, invalid characters as `-`
fn slugify(stem: &str) -> String {
    stem.chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn write(dir: &std::path::Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn based(dir: &std::path::Path) -> ResourceOptions {
        ResourceOptions {
            base_path: Some(dir.to_string_lossy().into_owned()),
            strict: false,
        }
    }

    #[test]
    fn test_inline_resource() {
        let resource = Resource::from_descriptor(
            json!({"name": "people", "data": [["id", "name"], [1, "ann"]]}),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(resource.valid());
        assert!(resource.inline());
        assert!(!resource.local());
        assert!(resource.tabular());
        assert_eq!(resource.descriptor()["encoding"], json!("utf-8"));
        assert_eq!(resource.profile().name(), "data-resource");
    }

    #[test]
    fn test_locality_flags() {
        let remote = Resource::from_descriptor(
            json!({"name": "r", "path": "https://example.com/data.csv"}),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(remote.remote());
        assert!(remote.tabular());

        let multipart = Resource::from_descriptor(
            json!({"name": "m", "path": ["a.csv", "b.csv"]}),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(multipart.multipart());
        assert!(multipart.local());
        assert_eq!(
            multipart.source(),
            Some(&ResourceSource::Multipart(vec!["a.csv".to_string(), "b.csv".to_string()]))
        );

        let binary = Resource::from_descriptor(
            json!({"name": "b", "path": "image.png"}),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(!binary.tabular());
    }

    #[test]
    fn test_unsafe_path() {
        let lenient = Resource::from_descriptor(
            json!({"name": "r", "path": "../secret.csv"}),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(!lenient.valid());

        let strict = Resource::from_descriptor(
            json!({"name": "r", "path": "/etc/passwd"}),
            ResourceOptions {
                strict: true,
                ..Default::default()
            },
        );
        assert!(strict.is_err());
    }

    #[tokio::test]
    async fn test_unsafe_path_is_never_read() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "secret.csv", "token\nTOP-SECRET\n");
        let package_dir = dir.path().join("pkg");
        std::fs::create_dir(&package_dir).unwrap();

        let resource = Resource::load(json!({"name": "r", "path": "../secret.csv"}), based(&package_dir))
            .await
            .unwrap();
        assert!(!resource.valid());
        assert!(resource.raw_read().await.is_err());
        assert!(resource.read(ResourceIterOptions::default(), None).await.is_err());

        let absolute = dir.path().join("secret.csv").to_string_lossy().into_owned();
        let resource = Resource::from_descriptor(
            json!({"name": "r", "path": [absolute, "part.csv"]}),
            based(&package_dir),
        )
        .unwrap();
        assert!(resource.raw_read().await.is_err());
    }

    #[test]
    fn test_no_data_is_not_local() {
        let resource = Resource::from_descriptor(json!({"name": "empty"}), ResourceOptions::default()).unwrap();
        assert!(resource.source().is_none());
        assert!(!resource.local());
        assert!(!resource.remote());
        assert!(!resource.inline());
    }

    #[test]
    fn test_unknown_profile_is_collected_when_lenient() {
        let descriptor = json!({
            "name": "r",
            "profile": "https://example.com/profile.json",
            "data": [["a"], [1]],
        });
        let lenient = Resource::from_descriptor(descriptor.clone(), ResourceOptions::default()).unwrap();
        assert!(!lenient.valid());
        assert_eq!(lenient.profile().name(), "data-resource");

        let strict = Resource::from_descriptor(
            descriptor,
            ResourceOptions {
                strict: true,
                ..Default::default()
            },
        );
        assert!(strict.is_err());
    }

    #[test]
    fn test_strict_profile_errors() {
        let result = Resource::from_descriptor(
            json!({"path": "data.csv"}),
            ResourceOptions {
                strict: true,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_commit_rebuilds_tabular_defaults() {
        let mut resource = Resource::from_descriptor(
            json!({"name": "r", "data": [["a"], ["1"]]}),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(!resource.commit(None).unwrap());

        resource.descriptor_mut()["profile"] = json!("tabular-data-resource");
        resource.descriptor_mut()["schema"] = json!({"fields": [{"name": "a", "type": "integer"}]});
        assert!(resource.commit(None).unwrap());
        assert_eq!(resource.descriptor()["dialect"]["delimiter"], json!(","));
        assert_eq!(resource.profile().name(), "tabular-data-resource");
        assert_eq!(resource.schema().unwrap().field_names(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_read_local_csv() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "data.csv", "id,name\n1,english\n2,中国人\n");
        let resource = Resource::load(
            json!({
                "name": "langs",
                "path": "data.csv",
                "schema": {"fields": [{"name": "id", "type": "integer"}, {"name": "name"}]},
            }),
            based(dir.path()),
        )
        .await
        .unwrap();

        assert_eq!(
            resource.headers().await.unwrap(),
            Some(vec!["id".to_string(), "name".to_string()])
        );
        let rows = resource
            .read(
                ResourceIterOptions {
                    keyed: true,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_keyed().unwrap().get("id"), Some(&Value::Integer(1)));
    }

    #[tokio::test]
    async fn test_multipart_raw_read() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "part1.csv", "id\n1\n");
        write(dir.path(), "part2.csv", "2\n");
        let resource = Resource::load(
            json!({"name": "parts", "path": ["part1.csv", "part2.csv"]}),
            based(dir.path()),
        )
        .await
        .unwrap();
        assert_eq!(resource.raw_read().await.unwrap(), b"id\n1\n2\n".to_vec());
        let chunks: Vec<Vec<u8>> = resource
            .raw_iter()
            .unwrap()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(resource.read(ResourceIterOptions::default(), None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_tabular_read_fails() {
        let resource = Resource::from_descriptor(
            json!({"name": "img", "path": "image.png"}),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(resource.read(ResourceIterOptions::default(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_infer_local_csv() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Cities.csv", "city,population\nLondon,8\nParis,2\n");
        let mut resource = Resource::from_descriptor(json!({"path": "Cities.csv"}), based(dir.path())).unwrap();
        let descriptor = resource.infer().await.unwrap().clone();

        assert_eq!(descriptor["name"], json!("cities"));
        assert_eq!(descriptor["format"], json!("csv"));
        assert_eq!(descriptor["mediatype"], json!("text/csv"));
        assert_eq!(descriptor["profile"], json!("tabular-data-resource"));
        assert_eq!(descriptor["bytes"], json!(33));
        assert!(descriptor["hash"].as_str().unwrap().starts_with("sha256:"));
        assert_eq!(descriptor["schema"]["fields"][1]["type"], json!("integer"));
        assert!(resource.valid());
    }

    #[tokio::test]
    async fn test_infer_name_keeps_inner_dots() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "my.data.csv", "id\n1\n");
        let mut resource = Resource::from_descriptor(json!({"path": "my.data.csv"}), based(dir.path())).unwrap();
        let descriptor = resource.infer().await.unwrap().clone();
        assert_eq!(descriptor["name"], json!("my.data"));
        assert_eq!(descriptor["format"], json!("csv"));
    }

    #[tokio::test]
    async fn test_self_reference_check() {
        let mut descriptor = json!({
            "name": "tree",
            "data": [["id", "parent"], ["1", ""], ["2", "1"]],
            "schema": {
                "fields": [{"name": "id", "type": "integer"}, {"name": "parent", "type": "integer"}],
                "foreignKeys": [{"fields": "parent", "reference": {"resource": "", "fields": "id"}}],
            },
        });
        let resource = Resource::from_descriptor(descriptor.clone(), ResourceOptions::default()).unwrap();
        assert!(resource.check_relations().await.unwrap());

        descriptor["data"][2][1] = json!("9");
        let broken = Resource::from_descriptor(descriptor, ResourceOptions::default()).unwrap();
        let error = broken.check_relations().await.unwrap_err();
        assert!(error.is_relation());
    }

    #[tokio::test]
    async fn test_save_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let resource = Resource::from_descriptor(
            json!({"name": "r", "data": [["a"], [1]]}),
            ResourceOptions::default(),
        )
        .unwrap();
        let target = dir.path().join("resource.json");
        resource.save(&target).await.unwrap();
        let saved: JsonValue = serde_json::from_str(&std::fs::read_to_string(&target).unwrap()).unwrap();
        assert_eq!(saved["name"], json!("r"));
    }
}
