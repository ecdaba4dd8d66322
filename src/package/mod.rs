//! Data Package: a named collection of resources
//!
//! Packages load from an inline descriptor, a `datapackage.json` path or
//! URL, or a zip bundle. Resources are rebuilt from the package descriptor
//! on every commit.

pub mod bundle;

use std::path::Path;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tempfile::TempDir;
use tracing::{info, warn};

use crate::descriptor::{self, DescriptorSource};
use crate::error::{Error, Result};
use crate::profile::{Profile, REGISTRY};
use crate::resource::{
    PackageContext, Resource, ResourceOptions, ResourceSource, initial_profile, load_profile,
    resolve_profile,
};
use crate::storage;

/// Distinct `profile` values of the resource descriptors
fn resource_profile_names(descriptor: &JsonValue) -> Vec<String> {
    let mut names: Vec<String> = descriptor
        .get("resources")
        .and_then(JsonValue::as_array)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("profile").and_then(JsonValue::as_str))
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Options for [`Package::load`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOptions {
    /// Directory or URL prefix resource paths resolve against. Defaults to
    /// the descriptor location.
    pub base_path: Option<String>,
    pub strict: bool,
}

/// Data Package model
///
/// # Example
///
/// ```rust
/// use data_package_sdk::{Package, PackageOptions};
/// use serde_json::json;
///
/// let package = Package::from_descriptor(
///     json!({"name": "demo", "resources": [{"name": "numbers", "data": [["n"], [1]]}]}),
///     PackageOptions::default(),
/// )
/// .unwrap();
/// assert!(package.valid());
/// assert_eq!(package.resource_names(), vec!["numbers"]);
/// ```
#[derive(Debug)]
pub struct Package {
    current: JsonValue,
    next: JsonValue,
    strict: bool,
    base_path: Option<String>,
    profile: Profile,
    errors: Vec<Error>,
    resources: Vec<Resource>,
    resource_profiles: Vec<Profile>,
    // Keeps files extracted from a bundle alive
    _bundle: Option<TempDir>,
}

impl Package {
    /// Load a package from an inline descriptor, local path, URL or zip bundle
    pub async fn load(source: impl Into<DescriptorSource>, options: PackageOptions) -> Result<Self> {
        let mut source = source.into();
        let mut bundle = None;

        if let DescriptorSource::Path(path) = &source
            && bundle::is_bundle(&path.to_string_lossy())
        {
            let (dir, descriptor_path) = bundle::extract(path)?;
            info!("Loading Data Package bundle {}", path.display());
            source = DescriptorSource::Path(descriptor_path);
            bundle = Some(dir);
        }

        let base_path = if bundle.is_some() {
            source.base_path()
        } else {
            options.base_path.or_else(|| source.base_path())
        };

        let mut descriptor = descriptor::retrieve(&source, None).await?;
        descriptor::dereference_package(&mut descriptor)?;
        if let Some(JsonValue::Array(resources)) = descriptor.get_mut("resources") {
            for resource in resources.iter_mut() {
                descriptor::dereference_resource(resource, base_path.as_deref()).await?;
            }
        }

        let profile_name = descriptor
            .get("profile")
            .and_then(JsonValue::as_str)
            .unwrap_or("data-package")
            .to_string();
        let profile = load_profile(&profile_name, "data-package", options.strict).await?;

        let mut resource_profiles: Vec<Profile> = Vec::new();
        for name in resource_profile_names(&descriptor) {
            if REGISTRY.contains(&name.as_str()) {
                continue;
            }
            match Profile::load(&name).await {
                Ok(loaded) => resource_profiles.push(loaded),
                Err(error) if options.strict => return Err(error),
                Err(error) => warn!("Resource profile \"{}\" could not be loaded: {}", name, error),
            }
        }

        let mut package =
            Self::build_new(descriptor, base_path, options.strict, profile, resource_profiles)?;
        package._bundle = bundle;
        info!(
            "Loaded Data Package {} with {} resource(s)",
            package.name().unwrap_or("(unnamed)"),
            package.resources.len()
        );
        Ok(package)
    }

    /// Build a package from an already retrieved descriptor
    pub fn from_descriptor(descriptor: JsonValue, options: PackageOptions) -> Result<Self> {
        let profile = initial_profile(&descriptor, "data-package", options.strict, &[])?;
        Self::build_new(descriptor, options.base_path, options.strict, profile, Vec::new())
    }

    fn build_new(
        descriptor: JsonValue,
        base_path: Option<String>,
        strict: bool,
        profile: Profile,
        resource_profiles: Vec<Profile>,
    ) -> Result<Self> {
        let mut package = Self {
            current: descriptor.clone(),
            next: descriptor,
            strict,
            base_path,
            profile,
            errors: Vec::new(),
            resources: Vec::new(),
            resource_profiles,
            _bundle: None,
        };
        package.build()?;
        Ok(package)
    }

    fn build(&mut self) -> Result<()> {
        let mut descriptor = self.next.clone();
        let mut errors = Vec::new();
        let mut profile = self.profile.clone();

        let expanded = descriptor::dereference_package(&mut descriptor)
            .and_then(|()| descriptor::expand_package(&mut descriptor));
        match expanded {
            Ok(()) => {
                let name = descriptor
                    .get("profile")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("data-package");
                match resolve_profile(&self.profile, name, &[]) {
                    Ok(resolved) => {
                        profile = resolved;
                        errors = profile.validate(&descriptor).errors;
                    }
                    Err(error) => errors.push(error),
                }
            }
            Err(error) => errors.push(error),
        }

        if self.strict && !errors.is_empty() {
            return Err(Error::from_errors(errors));
        }

        let context = PackageContext {
            descriptor: descriptor.clone(),
            base_path: self.base_path.clone(),
            profiles: self.resource_profiles.clone(),
        };
        let mut resources = Vec::new();
        if let Some(items) = descriptor.get("resources").and_then(JsonValue::as_array) {
            for item in items {
                resources.push(Resource::in_package(item.clone(), self.strict, context.clone())?);
            }
        }

        if !errors.is_empty() {
            warn!("Data Package has {} validation error(s)", errors.len());
        }

        self.current = descriptor.clone();
        self.next = descriptor;
        self.profile = profile;
        self.errors = errors;
        self.resources = resources;
        Ok(())
    }

    /// True when the package descriptor and every resource are valid
    pub fn valid(&self) -> bool {
        self.errors.is_empty() && self.resources.iter().all(Resource::valid)
    }

    /// Package errors followed by the errors of each resource
    pub fn errors(&self) -> Vec<&Error> {
        self.errors
            .iter()
            .chain(self.resources.iter().flat_map(|r| r.errors().iter()))
            .collect()
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Committed descriptor with defaults expanded
    pub fn descriptor(&self) -> &JsonValue {
        &self.current
    }

    /// Working descriptor; call [`Package::commit`] to apply edits
    pub fn descriptor_mut(&mut self) -> &mut JsonValue {
        &mut self.next
    }

    pub fn name(&self) -> Option<&str> {
        self.current.get("name").and_then(JsonValue::as_str)
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().filter_map(Resource::name).collect()
    }

    pub fn get_resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name() == Some(name))
    }

    fn next_resources(&mut self) -> Result<&mut Vec<JsonValue>> {
        let package = self
            .next
            .as_object_mut()
            .ok_or_else(|| Error::Descriptor("Data Package descriptor must be a JSON object".to_string()))?;
        match package.entry("resources").or_insert_with(|| json!([])) {
            JsonValue::Array(resources) => Ok(resources),
            _ => Err(Error::Descriptor("Data Package resources must be an array".to_string())),
        }
    }

    /// Append a resource descriptor and commit. The name must be unique.
    pub fn add_resource(&mut self, descriptor: JsonValue) -> Result<Option<&Resource>> {
        let name = descriptor.get("name").and_then(JsonValue::as_str).map(str::to_string);
        if let Some(name) = &name
            && self.get_resource(name).is_some()
        {
            return Err(Error::Descriptor(format!("Resource name \"{}\" already exists", name)));
        }

        let previous = self.next.clone();
        self.next_resources()?.push(descriptor);
        if let Err(error) = self.commit(None) {
            self.next = previous;
            return Err(error);
        }
        Ok(self.resources.last())
    }

    /// Remove a resource by name and commit; returns its descriptor
    pub fn remove_resource(&mut self, name: &str) -> Result<Option<JsonValue>> {
        let previous = self.next.clone();
        let resources = self.next_resources()?;
        let Some(index) = resources
            .iter()
            .position(|r| r.get("name").and_then(JsonValue::as_str) == Some(name))
        else {
            return Ok(None);
        };
        let removed = resources.remove(index);
        if let Err(error) = self.commit(None) {
            self.next = previous;
            return Err(error);
        }
        Ok(Some(removed))
    }

    /// Add resources for files matching `pattern` under the base path, then
    /// infer every resource. The profile becomes `tabular-data-package` when
    /// all resources are tabular.
    pub async fn infer(&mut self, pattern: Option<&str>) -> Result<&JsonValue> {
        if let Some(pattern) = pattern {
            let base = self.base_path.clone().ok_or_else(|| {
                Error::Descriptor("Package inference by pattern requires a base path".to_string())
            })?;
            let full = format!("{}/{}", base.trim_end_matches('/'), pattern);
            let entries = glob::glob(&full)
                .map_err(|e| Error::Descriptor(format!("Invalid pattern \"{}\": {}", pattern, e)))?;

            let mut paths: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .filter(|path| path.is_file())
                .filter_map(|path| {
                    path.strip_prefix(&base)
                        .ok()
                        .map(|relative| relative.to_string_lossy().replace('\\', "/"))
                })
                .collect();
            paths.sort();
            for path in paths {
                self.next_resources()?.push(json!({"path": path}));
            }
        }

        let options = ResourceOptions {
            base_path: self.base_path.clone(),
            strict: false,
        };
        let mut inferred = Vec::new();
        for item in self.next_resources()?.clone() {
            let mut resource = Resource::from_descriptor(item, options.clone())?;
            resource.infer().await?;
            inferred.push(resource);
        }

        let all_tabular = !inferred.is_empty() && inferred.iter().all(Resource::tabular);
        let descriptors: Vec<JsonValue> = inferred.iter().map(|r| r.descriptor().clone()).collect();
        *self.next_resources()? = descriptors;
        if all_tabular && let Some(package) = self.next.as_object_mut() {
            package.insert("profile".to_string(), json!("tabular-data-package"));
        }

        self.commit(None)?;
        info!("Inferred Data Package with {} resource(s)", self.resources.len());
        Ok(&self.current)
    }

    /// Check the foreign keys of every tabular resource
    pub async fn check_relations(&self) -> Result<bool> {
        for resource in &self.resources {
            let has_foreign_keys = resource
                .schema()
                .is_some_and(|schema| !schema.foreign_keys().is_empty());
            if resource.tabular() && has_foreign_keys {
                resource.check_relations().await?;
            }
        }
        Ok(true)
    }

    /// Rebuild the package and its resources from the working descriptor.
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

    /// Save the descriptor as JSON, or as a zip bundle with the local data
    /// files when `target` ends with `.zip`
    pub async fn save(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        let content = serde_json::to_string_pretty(&self.current)?;

        let location = target.to_string_lossy();

        if !bundle::is_bundle(&location) {
            storage::write_location(&location, content.as_bytes()).await?;
            info!("Saved Data Package descriptor to {}", target.display());
            return Ok(());
        }

        let mut files = Vec::new();
        for resource in self.resources.iter().filter(|r| r.local()) {
            let parts = match resource.source() {
                Some(ResourceSource::Path(path)) => vec![path.clone()],
                Some(ResourceSource::Multipart(parts)) => parts.clone(),
                _ => continue,
            };
            let mut chunks = Box::pin(resource.raw_iter()?);
            for name in parts {
                match chunks.next().await {
                    Some(bytes) => files.push((name, bytes?)),
                    None => break,
                }
            }
        }

        let archive = bundle::write(content.as_bytes(), &files)?;
        storage::write_location(&location, &archive).await?;
        info!(
            "Saved Data Package bundle to {} with {} data file(s)",
            target.display(),
            files.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use crate::table::Row;
    use crate::resource::ResourceIterOptions;

    fn countries() -> JsonValue {
        json!({
            "name": "geo",
            "schemas": {
                "country": {"fields": [{"name": "code"}, {"name": "name"}], "primaryKey": "code"},
            },
            "resources": [
                {
                    "name": "countries",
                    "profile": "tabular-data-resource",
                    "data": [["code", "name"], ["de", "Germany"], ["fr", "France"]],
                    "schema": "#/schemas/country",
                },
                {
                    "name": "cities",
                    "profile": "tabular-data-resource",
                    "data": [["city", "country"], ["Berlin", "de"], ["Paris", "fr"]],
                    "schema": {
                        "fields": [{"name": "city"}, {"name": "country"}],
                        "foreignKeys": [{"fields": "country", "reference": {"resource": "countries", "fields": "code"}}],
                    },
                },
            ],
        })
    }

    #[test]
    fn test_pointer_dereferenced_and_defaults() {
        let package = Package::from_descriptor(countries(), PackageOptions::default()).unwrap();
        assert!(package.valid(), "{:?}", package.errors());
        assert_eq!(package.profile().name(), "data-package");
        let countries = package.get_resource("countries").unwrap();
        assert_eq!(countries.schema().unwrap().primary_key(), &["code".to_string()]);
        assert_eq!(countries.descriptor()["dialect"]["delimiter"], json!(","));
    }

    #[test]
    fn test_unresolved_pointer() {
        let mut descriptor = countries();
        descriptor["resources"][0]["schema"] = json!("#/schemas/missing");
        let strict = Package::from_descriptor(
            descriptor.clone(),
            PackageOptions {
                strict: true,
                ..Default::default()
            },
        );
        assert!(matches!(strict, Err(Error::Descriptor(_))));

        let lenient = Package::from_descriptor(descriptor, PackageOptions::default()).unwrap();
        assert!(!lenient.valid());
    }

    #[test]
    fn test_add_and_remove_resource() {
        let mut package = Package::from_descriptor(countries(), PackageOptions::default()).unwrap();
        let added = package
            .add_resource(json!({"name": "extra", "data": [["a"], [1]]}))
            .unwrap()
            .unwrap();
        assert_eq!(added.name(), Some("extra"));
        assert_eq!(package.resource_names(), vec!["countries", "cities", "extra"]);

        assert!(package.add_resource(json!({"name": "extra", "data": []})).is_err());
        assert_eq!(package.resources().len(), 3);

        let removed = package.remove_resource("extra").unwrap().unwrap();
        assert_eq!(removed["name"], json!("extra"));
        assert!(package.remove_resource("extra").unwrap().is_none());
        assert_eq!(package.resources().len(), 2);
    }

    #[test]
    fn test_strict_add_rolls_back() {
        let mut package = Package::from_descriptor(
            countries(),
            PackageOptions {
                strict: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(package.add_resource(json!({"data": [["a"]]})).is_err());
        assert_eq!(package.descriptor_mut()["resources"].as_array().unwrap().len(), 2);
        assert!(!package.commit(None).unwrap());
    }

    #[tokio::test]
    async fn test_relations_resolve_across_resources() {
        let package = Package::from_descriptor(countries(), PackageOptions::default()).unwrap();
        assert!(package.check_relations().await.unwrap());

        let rows = package
            .get_resource("cities")
            .unwrap()
            .read(
                ResourceIterOptions {
                    keyed: true,
                    relations: true,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        match &rows[0] {
            Row::Keyed(row) => match row.get("country") {
                Some(Value::Object(country)) => assert_eq!(country["name"], json!("Germany")),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broken_relation() {
        let mut descriptor = countries();
        descriptor["resources"][1]["data"][2][1] = json!("es");
        let package = Package::from_descriptor(descriptor, PackageOptions::default()).unwrap();
        let error = package.check_relations().await.unwrap_err();
        assert!(error.is_relation());
        assert_eq!(error.row_number(), Some(3));
    }

    #[tokio::test]
    async fn test_infer_from_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("data")).unwrap();
        std::fs::write(dir.path().join("data/people.csv"), "id,name\n1,ann\n").unwrap();
        std::fs::write(dir.path().join("data/pets.csv"), "id,kind\n1,cat\n").unwrap();

        let mut package = Package::from_descriptor(
            json!({"name": "inferred"}),
            PackageOptions {
                base_path: Some(dir.path().to_string_lossy().into_owned()),
                strict: false,
            },
        )
        .unwrap();
        let descriptor = package.infer(Some("data/*.csv")).await.unwrap().clone();

        assert_eq!(descriptor["profile"], json!("tabular-data-package"));
        assert_eq!(package.resource_names(), vec!["people", "pets"]);
        assert_eq!(descriptor["resources"][0]["path"], json!("data/people.csv"));
        assert_eq!(
            descriptor["resources"][0]["schema"]["fields"][0]["type"],
            json!("integer")
        );
        assert!(package.valid(), "{:?}", package.errors());
    }

    #[test]
    fn test_unknown_resource_profile_when_lenient() {
        let mut descriptor = countries();
        descriptor["resources"][1]["profile"] = json!("https://example.com/profile.json");

        let lenient = Package::from_descriptor(descriptor.clone(), PackageOptions::default()).unwrap();
        assert!(!lenient.valid());
        assert_eq!(lenient.resource_names(), vec!["countries", "cities"]);
        assert!(lenient.get_resource("countries").unwrap().valid());

        let strict = Package::from_descriptor(
            descriptor,
            PackageOptions {
                strict: true,
                ..Default::default()
            },
        );
        assert!(strict.is_err());
    }

    #[tokio::test]
    async fn test_load_resolves_custom_resource_profile() {
        let dir = tempfile::tempdir().unwrap();
        let profile_path = dir.path().join("titled.json");
        std::fs::write(
            &profile_path,
            r#"{"type": "object", "required": ["name", "title"]}"#,
        )
        .unwrap();
        let profile_name = profile_path.to_string_lossy().into_owned();

        let mut descriptor = countries();
        descriptor["resources"][0]["profile"] = json!(profile_name);
        descriptor["resources"][0]["title"] = json!("Countries");
        let package = Package::load(descriptor.clone(), PackageOptions::default()).await.unwrap();
        assert!(package.valid(), "{:?}", package.errors());
        assert_eq!(
            package.get_resource("countries").unwrap().profile().name(),
            profile_name
        );

        descriptor["resources"][0]
            .as_object_mut()
            .unwrap()
            .remove("title");
        let package = Package::load(descriptor, PackageOptions::default()).await.unwrap();
        assert!(!package.get_resource("countries").unwrap().valid());
    }

    #[tokio::test]
    async fn test_save_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let package = Package::from_descriptor(countries(), PackageOptions::default()).unwrap();
        let target = dir.path().join("datapackage.json");
        package.save(&target).await.unwrap();

        let reloaded = Package::load(target.as_path(), PackageOptions::default()).await.unwrap();
        assert_eq!(reloaded.resource_names(), vec!["countries", "cities"]);
    }
}
