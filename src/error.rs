//! Error types for schema, table, resource and package operations

use thiserror::Error;

use crate::storage::StorageError;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading, validating, casting or saving tabular data
#[derive(Error, Debug)]
pub enum Error {
    /// Descriptor could not be fetched, parsed or dereferenced
    #[error("Descriptor error: {0}")]
    Descriptor(String),

    /// Descriptor does not match its profile
    #[error("Validation error: {0}")]
    Validation(String),

    /// Value can't be parsed as the declared field type
    #[error("Cast error in field \"{field}\": {message}")]
    Cast { field: String, message: String },

    /// Parsed value violates a field constraint
    #[error("Constraint error in field \"{field}\": {message}")]
    Constraint { field: String, message: String },

    /// Duplicate value for a unique field or primary key
    #[error("Unique error: duplicate value for \"{}\"", fields.join(", "))]
    Unique { fields: Vec<String> },

    /// Foreign key reference is unresolved or its target is missing
    #[error("Relation error: {0}")]
    Relation(String),

    /// Error attached to a specific data row
    #[error("Row {row_number}: {source}")]
    Row {
        row_number: usize,
        #[source]
        source: Box<Error>,
    },

    /// Several errors reported together (lenient validation, non fail-fast casting)
    #[error("There are {} errors: {}", .0.len(), join_messages(.0))]
    Multiple(Vec<Error>),

    /// Storage backend error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// ZIP archive error
    #[cfg(feature = "zip-bundle")]
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub(crate) fn cast(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Cast {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn constraint(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Constraint {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Collapse a list of errors into one: the error itself when there is
    /// only one, `Multiple` otherwise.
    pub fn from_errors(mut errors: Vec<Error>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            Error::Multiple(errors)
        }
    }

    /// Strip `Row` wrappers and return the underlying error
    pub fn root(&self) -> &Error {
        match self {
            Error::Row { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when this error (or every error it aggregates) is a cast failure
    pub fn is_cast(&self) -> bool {
        match self.root() {
            Error::Cast { .. } => true,
            Error::Multiple(errors) => !errors.is_empty() && errors.iter().all(Error::is_cast),
            _ => false,
        }
    }

    /// True when this error is a constraint or uniqueness violation
    pub fn is_constraint(&self) -> bool {
        match self.root() {
            Error::Constraint { .. } | Error::Unique { .. } => true,
            Error::Multiple(errors) => errors.iter().any(Error::is_constraint),
            _ => false,
        }
    }

    /// True when this error is a foreign key violation
    pub fn is_relation(&self) -> bool {
        matches!(self.root(), Error::Relation(_))
    }

    /// Row number this error is attached to, if any
    pub fn row_number(&self) -> Option<usize> {
        match self {
            Error::Row { row_number, .. } => Some(*row_number),
            _ => None,
        }
    }
}
