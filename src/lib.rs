//! Data Package SDK - Table Schema and Data Package library
//!
//! Provides:
//! - Field and Schema models with typed value casting and schema inference
//! - Tables over CSV files, URLs, readers and in-memory rows
//! - Data Resources and Data Packages with profile validation
//! - Zip bundles for package save/load
//! - Storage backends for local and remote descriptors and data

pub mod descriptor;
pub mod error;
pub mod package;
pub mod profile;
pub mod resource;
pub mod schema;
pub mod storage;
pub mod table;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use descriptor::DescriptorSource;
pub use error::{Error, Result};
pub use package::{Package, PackageOptions};
pub use profile::{Profile, ValidationReport};
pub use resource::{Resource, ResourceIterOptions, ResourceOptions, ResourceSource};
pub use schema::{Constraints, Field, ForeignKey, ForeignKeyReference, Headers, Schema, SchemaOptions};
pub use storage::filesystem::FileSystemStorageBackend;
pub use storage::{StorageBackend, StorageError};
pub use table::{
    Dialect, IterOptions, KeyedRow, Relations, Row, SchemaSource, Table, TableOptions, TableRows,
    TableSource,
};
pub use types::FieldType;
pub use value::Value;
