//! Table: a data source bound to a Table Schema
//!
//! Rows are read from CSV files, URLs, readers or in-memory rows, then cast
//! by the schema while iterating. Iteration is a single forward pass that
//! parses rows as they are consumed; call [`Table::iter`] again for another
//! pass.

pub mod dialect;
pub mod reader;
pub mod relations;
pub mod rows;

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, Stream};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info};

use crate::descriptor::DescriptorSource;
use crate::error::{Error, Result};
use crate::schema::{self, Field, ForeignKey, Headers, Schema, SchemaOptions};
use crate::storage::{self, StorageError};
use crate::value::Value;

pub use dialect::Dialect;
pub use reader::{ReaderFactory, TableSource};
pub use relations::Relations;
pub use rows::{KeyedRow, Row};

use reader::Loaded;

/// Data rows with their 1-based source row numbers
type NumberedRows = Box<dyn Iterator<Item = Result<(usize, Vec<Value>)>> + Send>;

/// Default number of rows sampled by [`Table::infer`]
pub const DEFAULT_INFER_LIMIT: usize = 100;

/// Schema given to [`Table::load`]: already loaded, or a descriptor to load
#[derive(Debug)]
pub enum SchemaSource {
    Loaded(Schema),
    Descriptor(DescriptorSource),
}

impl From<Schema> for SchemaSource {
    fn from(schema: Schema) -> Self {
        SchemaSource::Loaded(schema)
    }
}

impl From<JsonValue> for SchemaSource {
    fn from(descriptor: JsonValue) -> Self {
        SchemaSource::Descriptor(DescriptorSource::Inline(descriptor))
    }
}

impl From<&str> for SchemaSource {
    fn from(location: &str) -> Self {
        SchemaSource::Descriptor(DescriptorSource::from(location))
    }
}

/// Options for [`Table::load`]
#[derive(Debug, Default)]
pub struct TableOptions {
    pub schema: Option<SchemaSource>,
    /// Strict mode for a schema loaded from a descriptor
    pub strict: bool,
    /// Header row number or explicit names. Defaults to the first row, or
    /// no header row when the dialect says so.
    pub headers: Option<Headers>,
    /// `csv` or `tsv`; guessed from the path extension when absent
    pub format: Option<String>,
    pub encoding: Option<String>,
    pub dialect: Option<Dialect>,
}

/// Options for [`Table::iter`] and [`Table::read`]
#[derive(Debug, Clone)]
pub struct IterOptions {
    /// Emit [`Row::Keyed`] rows
    pub keyed: bool,
    /// Emit [`Row::Extended`] rows; takes precedence over `keyed`
    pub extended: bool,
    /// Cast values with the schema; raw values otherwise
    pub cast: bool,
    /// Replace failing rows with [`Row::Invalid`] instead of stopping
    pub force_cast: bool,
    /// Referenced rows used to check and resolve foreign keys
    pub relations: Option<Relations>,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            keyed: false,
            extended: false,
            cast: true,
            force_cast: false,
            relations: None,
        }
    }
}

impl IterOptions {
    pub fn keyed() -> Self {
        Self {
            keyed: true,
            ..Default::default()
        }
    }
}

/// Tabular data bound to an optional schema
#[derive(Debug)]
pub struct Table {
    loaded: Loaded,
    location: Option<String>,
    schema: Option<Schema>,
    strict: bool,
    dialect: Dialect,
    header_row: usize,
    headers: Option<Vec<String>>,
}

impl Table {
    /// Load a table source and its schema.
    ///
    /// Local files are reopened and factories called on every pass; URLs
    /// and readers are read into memory once. Only the header row is
    /// parsed here.
    pub async fn load(source: impl Into<TableSource>, options: TableOptions) -> Result<Self> {
        reader::check_encoding(options.encoding.as_deref())?;

        let source = source.into();
        let location = match &source {
            TableSource::Path(path) => Some(path.clone()),
            _ => None,
        };

        let dialect = match options.dialect {
            Some(dialect) => dialect,
            None => reader::dialect_for_format(options.format.as_deref(), location.as_deref())?
                .unwrap_or_default(),
        };

        let loaded = match source {
            TableSource::Path(path) if storage::is_remote_path(&path) => {
                let bytes = storage::read_location(None, &path).await?;
                debug!("Read {} bytes from {}", bytes.len(), path);
                Loaded::Bytes(Arc::new(bytes))
            }
            TableSource::Path(path) => {
                if !tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                    return Err(StorageError::FileNotFound(path).into());
                }
                Loaded::File(PathBuf::from(path))
            }
            TableSource::Inline(rows) => Loaded::Rows(Arc::new(rows)),
            TableSource::Reader(mut reader) => {
                let mut bytes = Vec::new();
                reader.read_to_end(&mut bytes)?;
                Loaded::Bytes(Arc::new(bytes))
            }
            TableSource::Factory(factory) => Loaded::Factory(factory),
        };

        let schema = match options.schema {
            Some(SchemaSource::Loaded(schema)) => Some(schema),
            Some(SchemaSource::Descriptor(source)) => Some(
                Schema::load(
                    source,
                    SchemaOptions {
                        strict: options.strict,
                        ..Default::default()
                    },
                )
                .await?,
            ),
            None => None,
        };

        let (header_row, headers) = match options.headers {
            Some(Headers::Names(names)) => (0, Some(names)),
            Some(Headers::Row(row)) => (row, None),
            None if dialect.header => (1, None),
            None => (0, None),
        };

        let mut table = Self {
            loaded,
            location,
            schema,
            strict: options.strict,
            dialect,
            header_row,
            headers,
        };

        if table.header_row > 0 {
            let header = table
                .loaded
                .records(&table.dialect)?
                .nth(table.header_row - 1)
                .transpose()?;
            table.headers = header.map(|row| row.iter().map(Value::to_raw_string).collect());
        }

        Ok(table)
    }

    /// Column names from the header row or the `headers` option
    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn schema_mut(&mut self) -> Option<&mut Schema> {
        self.schema.as_mut()
    }

    /// Rows after the header row, read as the iterator advances
    fn data_rows(&self) -> Result<NumberedRows> {
        let rows = self
            .loaded
            .records(&self.dialect)?
            .enumerate()
            .skip(self.header_row)
            .map(|(index, row)| row.map(|row| (index + 1, row)));
        Ok(Box::new(rows))
    }

    /// Start a pass over the rows. A missing schema is inferred first when
    /// casting is requested.
    pub fn iter(&mut self, options: IterOptions) -> Result<TableRows> {
        if options.cast && self.schema.is_none() {
            self.infer(None)?;
        }
        let rows = self.data_rows()?;
        Ok(TableRows::new(rows, self.headers.clone(), self.schema.as_ref(), options))
    }

    /// Same rows as [`Table::iter`], as a stream
    pub fn stream(&mut self, options: IterOptions) -> Result<impl Stream<Item = Result<Row>> + use<>> {
        Ok(stream::iter(self.iter(options)?))
    }

    /// Read rows into memory, at most `limit` of them
    pub fn read(&mut self, options: IterOptions, limit: Option<usize>) -> Result<Vec<Row>> {
        let rows = self.iter(options)?;
        match limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }

    /// Infer a schema from up to `limit` rows (100 by default) unless one
    /// is already set, and return its descriptor
    pub fn infer(&mut self, limit: Option<usize>) -> Result<&JsonValue> {
        if self.schema.is_none() {
            let sample: Vec<Vec<Value>> = self
                .data_rows()?
                .take(limit.unwrap_or(DEFAULT_INFER_LIMIT))
                .map(|row| row.map(|(_, row)| row))
                .collect::<Result<_>>()?;
            let headers = match &self.headers {
                Some(names) => Headers::Names(names.clone()),
                None => Headers::Row(0),
            };

            let mut schema = Schema::from_descriptor(
                json!({"fields": []}),
                SchemaOptions {
                    strict: self.strict,
                    ..Default::default()
                },
            )?;
            schema.infer(&sample, headers)?;
            info!(
                "Inferred schema for {} from {} rows",
                self.location.as_deref().unwrap_or("inline table"),
                sample.len()
            );
            self.schema = Some(schema);
        }

        match &self.schema {
            Some(schema) => Ok(schema.descriptor()),
            None => Err(Error::Descriptor("Table has no schema".to_string())),
        }
    }

    /// Write the source rows as comma separated CSV, header row first
    pub async fn save(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
        if let Some(headers) = &self.headers {
            writer.write_record(headers)?;
        }
        for row in self.data_rows()? {
            let (_, row) = row?;
            writer.write_record(row.iter().map(Value::to_raw_string))?;
        }
        let content = writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        storage::write_location(&target.to_string_lossy(), &content).await?;
        info!("Saved table to {}", target.display());
        Ok(())
    }
}

/// Uniqueness tracking for a unique field or the primary key
#[derive(Debug)]
struct UniqueCheck {
    indexes: Vec<usize>,
    names: Vec<String>,
    primary_key: bool,
    seen: HashSet<String>,
}

impl UniqueCheck {
    fn check(&mut self, row: &[Value]) -> Result<()> {
        let values: Vec<&Value> = self.indexes.iter().filter_map(|i| row.get(*i)).collect();
        if self.primary_key && values.iter().any(|v| v.is_null()) {
            return Err(Error::constraint(
                self.names.join(", "),
                "primary key value is required",
            ));
        }
        if values.iter().all(|v| v.is_null()) {
            return Ok(());
        }
        let key = values
            .iter()
            .map(|v| v.lookup_key())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        if !self.seen.insert(key) {
            return Err(Error::Unique {
                fields: self.names.clone(),
            });
        }
        Ok(())
    }
}

/// Lazy, single-pass iterator over table rows.
///
/// Without `force_cast` the first error is yielded and iteration ends.
pub struct TableRows {
    rows: NumberedRows,
    headers: Vec<String>,
    fields: Option<Vec<Field>>,
    header_error: Option<String>,
    unique_checks: Vec<UniqueCheck>,
    foreign_keys: Vec<ForeignKey>,
    options: IterOptions,
    done: bool,
}

fn headers_match(headers: &[String], names: &[&str], case_insensitive: bool) -> bool {
    headers.len() == names.len()
        && headers.iter().zip(names).all(|(header, name)| {
            if case_insensitive {
                header.to_lowercase() == name.to_lowercase()
            } else {
                header == name
            }
        })
}

impl TableRows {
    fn new(
        rows: NumberedRows,
        headers: Option<Vec<String>>,
        schema: Option<&Schema>,
        options: IterOptions,
    ) -> Self {
        let mut header_error = None;
        let mut unique_checks = Vec::new();
        let mut foreign_keys = Vec::new();
        let mut fields = None;

        if let Some(schema) = schema {
            let names = schema.field_names();
            if options.cast {
                if let Some(headers) = &headers
                    && !headers_match(headers, &names, schema.case_insensitive_headers())
                {
                    header_error = Some(format!(
                        "header names \"{}\" do not match the field names \"{}\"",
                        headers.join(", "),
                        names.join(", ")
                    ));
                }

                for (index, field) in schema.fields().iter().enumerate() {
                    if field.constraints().unique {
                        unique_checks.push(UniqueCheck {
                            indexes: vec![index],
                            names: vec![field.name().to_string()],
                            primary_key: false,
                            seen: HashSet::new(),
                        });
                    }
                }
                let primary_key = schema.primary_key();
                if !primary_key.is_empty() {
                    unique_checks.push(UniqueCheck {
                        indexes: primary_key
                            .iter()
                            .filter_map(|name| names.iter().position(|n| n == name))
                            .collect(),
                        names: primary_key.to_vec(),
                        primary_key: true,
                        seen: HashSet::new(),
                    });
                }
                fields = Some(schema.fields().to_vec());
            }
            foreign_keys = schema.foreign_keys().to_vec();
        }

        let headers = headers
            .or_else(|| schema.map(|s| s.field_names().into_iter().map(str::to_string).collect()))
            .unwrap_or_default();

        Self {
            rows,
            headers,
            fields,
            header_error,
            unique_checks,
            foreign_keys,
            options,
            done: false,
        }
    }

    /// Column names used for keyed and extended rows
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn process(&mut self, row_number: usize, mut values: Vec<Value>) -> Result<Row> {
        if let Some(fields) = &self.fields {
            if let Some(message) = &self.header_error {
                return Err(Error::cast(self.headers.join(", "), message.clone()));
            }
            values = schema::cast_values(fields, &values, false)?;
            for check in &mut self.unique_checks {
                check.check(&values)?;
            }
        }

        if let Some(related) = &self.options.relations {
            for foreign_key in &self.foreign_keys {
                relations::resolve(&mut values, &self.headers, foreign_key, related)?;
            }
        }

        let headers = if self.headers.is_empty() {
            (1..=values.len()).map(|i| format!("field{}", i)).collect()
        } else {
            self.headers.clone()
        };

        Ok(if self.options.extended {
            Row::Extended {
                row_number,
                headers,
                values,
            }
        } else if self.options.keyed {
            Row::Keyed(KeyedRow::from_parts(&headers, values))
        } else {
            Row::Values(values)
        })
    }
}

impl Iterator for TableRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let (row_number, values) = match self.rows.next()? {
            Ok(row) => row,
            Err(error) => {
                self.done = true;
                return Some(Err(error));
            }
        };
        match self.process(row_number, values) {
            Ok(row) => Some(Ok(row)),
            Err(error) if self.options.force_cast => Some(Ok(Row::Invalid { row_number, error })),
            Err(error) => {
                self.done = true;
                Some(Err(Error::Row {
                    row_number,
                    source: Box::new(error),
                }))
            }
        }
    }
}

impl std::iter::FusedIterator for TableRows {}
