//! Infer command implementation

use std::path::Path;

use anyhow::{Context, Result};
use data_package_sdk::{Package, PackageOptions, Table, TableOptions};
use serde_json::json;

use crate::output::write_json;

/// Handle the infer command
///
/// A directory becomes a Data Package with one resource per matched file;
/// anything else is read as a table and gets a Table Schema.
pub async fn handle_infer(source: &str, pattern: &str, limit: usize, output: Option<&Path>) -> Result<()> {
    let descriptor = if Path::new(source).is_dir() {
        let mut package = Package::from_descriptor(
            json!({}),
            PackageOptions {
                base_path: Some(source.to_string()),
                strict: false,
            },
        )?;
        eprintln!("Inferring Data Package from {} ({})", source, pattern);
        package
            .infer(Some(pattern))
            .await
            .with_context(|| format!("Failed to infer Data Package from {}", source))?
            .clone()
    } else {
        let mut table = Table::load(source, TableOptions::default())
            .await
            .with_context(|| format!("Failed to load table {}", source))?;
        eprintln!("Inferring Table Schema from {} ({} rows)", source, limit);
        table.infer(Some(limit))?.clone()
    };

    write_json(&descriptor, output).await
}
