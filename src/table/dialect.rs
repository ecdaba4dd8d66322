//! CSV dialect description and parser setup

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};

/// CSV Dialect as found in a resource `dialect` property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dialect {
    pub delimiter: String,
    pub double_quote: bool,
    pub line_terminator: String,
    pub quote_char: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escape_char: Option<String>,
    /// Trim whitespace at the start of every cell
    pub skip_initial_space: bool,
    /// First row holds the column names
    pub header: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_char: Option<String>,
    pub case_sensitive_header: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            double_quote: true,
            line_terminator: "\r\n".to_string(),
            quote_char: "\"".to_string(),
            escape_char: None,
            skip_initial_space: true,
            header: true,
            comment_char: None,
            case_sensitive_header: false,
        }
    }
}

fn single_byte(name: &str, value: &str) -> Result<u8> {
    match value.as_bytes() {
        [byte] => Ok(*byte),
        _ => Err(Error::Descriptor(format!(
            "Dialect {} must be a single ASCII character, got \"{}\"",
            name, value
        ))),
    }
}

impl Dialect {
    /// Tab separated values
    pub fn tsv() -> Self {
        Self {
            delimiter: "\t".to_string(),
            ..Default::default()
        }
    }

    /// Parse a dialect descriptor, filling defaults for missing keys
    pub fn from_descriptor(descriptor: &JsonValue) -> Result<Self> {
        serde_json::from_value(descriptor.clone())
            .map_err(|e| Error::Descriptor(format!("Invalid dialect: {}", e)))
    }

    /// CSV reader configured for this dialect. Header rows are handled by
    /// the table, so the reader returns every record.
    pub(crate) fn reader_builder(&self) -> Result<csv::ReaderBuilder> {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(single_byte("delimiter", &self.delimiter)?)
            .quote(single_byte("quoteChar", &self.quote_char)?)
            .double_quote(self.double_quote)
            .escape(
                self.escape_char
                    .as_deref()
                    .map(|c| single_byte("escapeChar", c))
                    .transpose()?,
            )
            .comment(
                self.comment_char
                    .as_deref()
                    .map(|c| single_byte("commentChar", c))
                    .transpose()?,
            );
        Ok(builder)
    }
}
