//! Validate command implementation

use anyhow::{Context, Result, bail};
use data_package_sdk::{Package, PackageOptions, Resource, ResourceOptions, Schema, SchemaOptions};

use crate::Kind;
use crate::output::print_errors;

/// Descriptor kind implied by the file name
fn guess_kind(source: &str) -> Kind {
    let name = source.rsplit('/').next().unwrap_or(source).to_ascii_lowercase();
    if name.ends_with(".zip") || name.starts_with("datapackage") {
        Kind::Package
    } else if name.contains("schema") {
        Kind::Schema
    } else {
        Kind::Resource
    }
}

/// Handle the validate command
pub async fn handle_validate(source: &str, kind: Option<Kind>, relations: bool) -> Result<()> {
    let kind = kind.unwrap_or_else(|| guess_kind(source));

    let errors: Vec<String> = match kind {
        Kind::Schema => {
            let schema = Schema::load(source, SchemaOptions::default())
                .await
                .with_context(|| format!("Failed to load Table Schema {}", source))?;
            schema.errors().iter().map(ToString::to_string).collect()
        }
        Kind::Resource => {
            let resource = Resource::load(source, ResourceOptions::default())
                .await
                .with_context(|| format!("Failed to load Data Resource {}", source))?;
            resource.errors().iter().map(ToString::to_string).collect()
        }
        Kind::Package => {
            let package = Package::load(source, PackageOptions::default())
                .await
                .with_context(|| format!("Failed to load Data Package {}", source))?;
            let mut errors: Vec<String> = package.errors().iter().map(ToString::to_string).collect();
            if relations
                && errors.is_empty()
                && let Err(error) = package.check_relations().await
            {
                errors.push(error.to_string());
            }
            errors
        }
    };

    if !errors.is_empty() {
        print_errors(&errors);
        bail!("Validation failed with {} error(s)", errors.len());
    }

    println!("Validation successful");
    Ok(())
}
