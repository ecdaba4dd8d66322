//! Table data sources and CSV parsing

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::dialect::Dialect;
use crate::error::{Error, Result};
use crate::value::Value;

/// Function returning a fresh reader over CSV content, called once per pass
pub type ReaderFactory = Arc<dyn Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync>;

/// Where table rows come from
pub enum TableSource {
    /// Local CSV path or remote URL
    Path(String),
    /// In-memory rows, header row included when the headers option points at one
    Inline(Vec<Vec<Value>>),
    /// CSV content read once on load
    Reader(Box<dyn Read + Send>),
    /// CSV content re-read from a new reader on every pass
    Factory(ReaderFactory),
}

impl fmt::Debug for TableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            TableSource::Inline(rows) => f.debug_tuple("Inline").field(&rows.len()).finish(),
            TableSource::Reader(_) => f.write_str("Reader"),
            TableSource::Factory(_) => f.write_str("Factory"),
        }
    }
}

impl From<&str> for TableSource {
    fn from(path: &str) -> Self {
        TableSource::Path(path.to_string())
    }
}

impl From<String> for TableSource {
    fn from(path: String) -> Self {
        TableSource::Path(path)
    }
}

impl From<&Path> for TableSource {
    fn from(path: &Path) -> Self {
        TableSource::Path(path.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for TableSource {
    fn from(path: PathBuf) -> Self {
        TableSource::from(path.as_path())
    }
}

impl From<Vec<Vec<Value>>> for TableSource {
    fn from(rows: Vec<Vec<Value>>) -> Self {
        TableSource::Inline(rows)
    }
}

impl TableSource {
    /// Build an inline source from JSON data: an array of arrays, or an
    /// array of objects whose keys become the header row
    pub fn from_json(data: &JsonValue) -> Result<Self> {
        Ok(TableSource::Inline(json_rows(data)?))
    }

    pub fn from_factory<F>(factory: F) -> Self
    where
        F: Fn() -> io::Result<Box<dyn Read + Send>> + Send + Sync + 'static,
    {
        TableSource::Factory(Arc::new(factory))
    }
}

/// Convert inline JSON data into rows
pub(crate) fn json_rows(data: &JsonValue) -> Result<Vec<Vec<Value>>> {
    let items = data
        .as_array()
        .ok_or_else(|| Error::Descriptor("Inline data must be an array".to_string()))?;

    match items.first() {
        None => Ok(Vec::new()),
        Some(JsonValue::Object(first)) => {
            let headers: Vec<String> = first.keys().cloned().collect();
            let mut rows = vec![headers.iter().map(|h| Value::from(h.as_str())).collect()];
            for item in items {
                let object = item.as_object().ok_or_else(|| {
                    Error::Descriptor("Inline data mixes objects and arrays".to_string())
                })?;
                rows.push(
                    headers
                        .iter()
                        .map(|h| object.get(h).map(Value::from).unwrap_or(Value::Null))
                        .collect(),
                );
            }
            Ok(rows)
        }
        Some(_) => items
            .iter()
            .map(|item| {
                item.as_array()
                    .map(|cells| cells.iter().map(Value::from).collect())
                    .ok_or_else(|| Error::Descriptor("Inline data rows must be arrays".to_string()))
            })
            .collect(),
    }
}

/// Source rows in file order, header rows included
pub(crate) type Records = Box<dyn Iterator<Item = Result<Vec<Value>>> + Send>;

/// Source content after loading. Every pass opens a fresh record reader.
#[derive(Clone)]
pub(crate) enum Loaded {
    Rows(Arc<Vec<Vec<Value>>>),
    Bytes(Arc<Vec<u8>>),
    File(PathBuf),
    Factory(ReaderFactory),
}

impl fmt::Debug for Loaded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loaded::Rows(rows) => f.debug_tuple("Rows").field(&rows.len()).finish(),
            Loaded::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Loaded::File(path) => f.debug_tuple("File").field(path).finish(),
            Loaded::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Shared buffer readable through a [`Cursor`]
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl Loaded {
    /// Start reading records; CSV content is parsed as the iterator advances
    pub(crate) fn records(&self, dialect: &Dialect) -> Result<Records> {
        let reader: Box<dyn Read + Send> = match self {
            Loaded::Rows(rows) => {
                let rows = Arc::clone(rows);
                return Ok(Box::new((0..rows.len()).map(move |index| Ok(rows[index].clone()))));
            }
            Loaded::Bytes(bytes) => Box::new(Cursor::new(SharedBytes(Arc::clone(bytes)))),
            Loaded::File(path) => Box::new(File::open(path)?),
            Loaded::Factory(factory) => factory()?,
        };
        csv_records(reader, dialect)
    }
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Lazily parse CSV content into rows of string values
pub(crate) fn csv_records(reader: Box<dyn Read + Send>, dialect: &Dialect) -> Result<Records> {
    let mut reader = BufReader::new(reader);
    if reader.fill_buf()?.starts_with(BOM) {
        reader.consume(BOM.len());
    }
    let trim = dialect.skip_initial_space;
    let records = dialect.reader_builder()?.from_reader(reader).into_records();
    Ok(Box::new(records.map(move |record| {
        let record = record?;
        Ok(record
            .iter()
            .map(|cell| {
                if trim {
                    Value::from(cell.trim_start())
                } else {
                    Value::from(cell)
                }
            })
            .collect())
    })))
}

/// Accept only UTF-8 encodings
pub(crate) fn check_encoding(encoding: Option<&str>) -> Result<()> {
    match encoding.map(str::to_ascii_lowercase).as_deref() {
        None | Some("utf-8") | Some("utf8") => Ok(()),
        Some(other) => Err(Error::Descriptor(format!(
            "Encoding \"{}\" is not supported, only utf-8",
            other
        ))),
    }
}

/// Dialect implied by a format name or file extension
pub(crate) fn dialect_for_format(format: Option<&str>, location: Option<&str>) -> Result<Option<Dialect>> {
    let format = format.map(str::to_ascii_lowercase).or_else(|| {
        location
            .and_then(|l| l.split(['?', '#']).next())
            .and_then(|l| l.rsplit('/').next())
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
    });
    match format.as_deref() {
        None | Some("csv") => Ok(None),
        Some("tsv") => Ok(Some(Dialect::tsv())),
        Some(other) => Err(Error::Descriptor(format!(
            "Format \"{}\" is not supported, only csv and tsv",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(bytes: &[u8], dialect: &Dialect) -> Vec<Vec<Value>> {
        Loaded::Bytes(Arc::new(bytes.to_vec()))
            .records(dialect)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_parse_csv_with_bom_and_spaces() {
        let rows = parse(b"\xEF\xBB\xBFid, name\n1, english\n", &Dialect::default());
        assert_eq!(rows[0], vec![Value::from("id"), Value::from("name")]);
        assert_eq!(rows[1], vec![Value::from("1"), Value::from("english")]);

        let dialect = Dialect {
            skip_initial_space: false,
            ..Default::default()
        };
        let rows = parse(b"id, name\n", &dialect);
        assert_eq!(rows[0][1], Value::from(" name"));
    }

    #[test]
    fn test_parse_quoted_cells() {
        let rows = parse(b"a,b\n\"x, y\",\"say \"\"hi\"\"\"\n", &Dialect::default());
        assert_eq!(rows[1][0], Value::from("x, y"));
        assert_eq!(rows[1][1], Value::from("say \"hi\""));
    }

    #[test]
    fn test_records_are_read_on_demand() {
        // A malformed tail does not stop the first rows from being read
        let mut records = Loaded::Bytes(Arc::new(b"a\n1\n\xFF\xFE\n".to_vec()))
            .records(&Dialect::default())
            .unwrap();
        assert_eq!(records.next().unwrap().unwrap(), vec![Value::from("a")]);
        assert_eq!(records.next().unwrap().unwrap(), vec![Value::from("1")]);
        assert!(records.next().unwrap().is_err());
    }

    #[test]
    fn test_json_rows() {
        let rows = json_rows(&json!([["id", "name"], [1, "a"]])).unwrap();
        assert_eq!(rows[1][0], Value::Integer(1));

        let rows = json_rows(&json!([{"id": 1, "name": "a"}, {"id": 2}])).unwrap();
        assert_eq!(rows[0], vec![Value::from("id"), Value::from("name")]);
        assert_eq!(rows[2], vec![Value::Integer(2), Value::Null]);

        assert!(json_rows(&json!({"id": 1})).is_err());
        assert!(json_rows(&json!([[1], {"id": 1}])).is_err());
    }

    #[test]
    fn test_factory_is_called_per_pass() {
        let loaded = Loaded::Factory(Arc::new(|| {
            Ok(Box::new(io::Cursor::new(b"a\n1\n".to_vec())) as Box<dyn Read + Send>)
        }));
        let dialect = Dialect::default();
        assert_eq!(loaded.records(&dialect).unwrap().count(), 2);
        assert_eq!(loaded.records(&dialect).unwrap().count(), 2);
    }

    #[test]
    fn test_encoding_and_format() {
        assert!(check_encoding(Some("UTF-8")).is_ok());
        assert!(check_encoding(None).is_ok());
        assert!(check_encoding(Some("latin1")).is_err());

        assert_eq!(dialect_for_format(None, Some("data.tsv")).unwrap(), Some(Dialect::tsv()));
        assert_eq!(dialect_for_format(Some("csv"), None).unwrap(), None);
        assert_eq!(dialect_for_format(None, Some("https://example.com/data.csv?raw=1")).unwrap(), None);
        assert_eq!(dialect_for_format(None, Some("data.v1/table")).unwrap(), None);
        assert!(dialect_for_format(Some("xlsx"), None).is_err());
    }
}
