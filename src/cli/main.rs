//! `datapackage` command line tool

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Validate, infer and read Table Schemas and Data Packages
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Descriptor kind of a validated source
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Kind {
    Schema,
    Resource,
    Package,
}

/// Row output format
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum RowFormat {
    /// One JSON value per line
    #[default]
    Json,
    /// Aligned text columns
    Table,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a Table Schema, Data Resource or Data Package descriptor
    Validate {
        /// Descriptor path or URL
        source: String,
        /// Descriptor kind; guessed from the file name when omitted
        #[arg(long, value_enum)]
        kind: Option<Kind>,
        /// Also check foreign keys of every package resource
        #[arg(long)]
        relations: bool,
    },
    /// Infer a Table Schema from a CSV file, or a Data Package from a directory
    Infer {
        /// CSV path or URL, or a package directory
        source: String,
        /// Glob pattern of data files when inferring a package
        #[arg(long, default_value = "**/*.csv")]
        pattern: String,
        /// Number of rows sampled per table
        #[arg(long, default_value = "100")]
        limit: usize,
        /// Output file (stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Read rows from a CSV file or a package resource
    Read {
        /// CSV path or URL, or a package descriptor with --resource
        source: String,
        /// Table Schema used to cast the rows
        #[arg(long)]
        schema: Option<String>,
        /// Resource name inside the package
        #[arg(long)]
        resource: Option<String>,
        /// Maximum number of rows
        #[arg(long)]
        limit: Option<usize>,
        /// Emit rows keyed by header
        #[arg(long)]
        keyed: bool,
        /// Keep going past rows that fail casting
        #[arg(long)]
        force_cast: bool,
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: RowFormat,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            source,
            kind,
            relations,
        } => commands::validate::handle_validate(&source, kind, relations).await,
        Commands::Infer {
            source,
            pattern,
            limit,
            output,
        } => commands::infer::handle_infer(&source, &pattern, limit, output.as_deref()).await,
        Commands::Read {
            source,
            schema,
            resource,
            limit,
            keyed,
            force_cast,
            format,
        } => {
            let args = commands::read::ReadArgs {
                source,
                schema,
                resource,
                limit,
                keyed,
                force_cast,
                format,
            };
            commands::read::handle_read(&args).await
        }
    }
}
