//! Read command implementation

use anyhow::{Context, Result, anyhow};
use data_package_sdk::{
    IterOptions, Package, PackageOptions, ResourceIterOptions, Row, SchemaSource, Table,
    TableOptions,
};

use crate::RowFormat;
use crate::output::print_rows;

/// Arguments for the read command
pub struct ReadArgs {
    pub source: String,
    pub schema: Option<String>,
    pub resource: Option<String>,
    pub limit: Option<usize>,
    pub keyed: bool,
    pub force_cast: bool,
    pub format: RowFormat,
}

async fn read_resource(args: &ReadArgs, name: &str) -> Result<Vec<Row>> {
    let package = Package::load(args.source.as_str(), PackageOptions::default())
        .await
        .with_context(|| format!("Failed to load Data Package {}", args.source))?;
    let resource = package.get_resource(name).ok_or_else(|| {
        anyhow!(
            "Resource \"{}\" not found; available: {}",
            name,
            package.resource_names().join(", ")
        )
    })?;
    let rows = resource
        .read(
            ResourceIterOptions {
                keyed: args.keyed,
                force_cast: args.force_cast,
                ..Default::default()
            },
            args.limit,
        )
        .await?;
    Ok(rows)
}

async fn read_table(args: &ReadArgs) -> Result<Vec<Row>> {
    let mut table = Table::load(
        args.source.as_str(),
        TableOptions {
            schema: args.schema.as_deref().map(SchemaSource::from),
            ..Default::default()
        },
    )
    .await
    .with_context(|| format!("Failed to load table {}", args.source))?;
    let rows = table.read(
        IterOptions {
            keyed: args.keyed,
            force_cast: args.force_cast,
            ..Default::default()
        },
        args.limit,
    )?;
    Ok(rows)
}

/// Handle the read command
pub async fn handle_read(args: &ReadArgs) -> Result<()> {
    let rows = match &args.resource {
        Some(name) => read_resource(args, name).await?,
        None => read_table(args).await?,
    };
    print_rows(&rows, args.format);
    Ok(())
}
