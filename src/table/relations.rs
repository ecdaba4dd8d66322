//! Foreign key resolution against referenced rows

use std::collections::HashMap;

use serde_json::{Map, Value as JsonValue};

use super::rows::KeyedRow;
use crate::error::{Error, Result};
use crate::schema::ForeignKey;
use crate::value::Value;

/// Referenced rows per resource name. The empty name holds the rows of
/// the table itself for self references.
pub type Relations = HashMap<String, Vec<KeyedRow>>;

/// Replace the foreign key values of `row` with the referenced row.
///
/// Rows whose key values are all null pass through. A foreign key to a
/// resource missing from `relations` is not checked.
pub(crate) fn resolve(
    row: &mut [Value],
    headers: &[String],
    foreign_key: &ForeignKey,
    relations: &Relations,
) -> Result<()> {
    let Some(reference) = relations.get(&foreign_key.reference.resource) else {
        return Ok(());
    };

    let mut pairs = Vec::with_capacity(foreign_key.fields.len());
    for (field, ref_field) in foreign_key.fields.iter().zip(&foreign_key.reference.fields) {
        let index = headers
            .iter()
            .position(|h| h == field)
            .filter(|index| *index < row.len())
            .ok_or_else(|| {
                Error::Relation(format!("Foreign key field \"{}\" is not in the row", field))
            })?;
        pairs.push((index, ref_field));
    }

    if pairs.iter().all(|(index, _)| row[*index].is_null()) {
        return Ok(());
    }

    let matched = reference.iter().find(|candidate| {
        pairs.iter().all(|(index, ref_field)| {
            candidate
                .get(ref_field)
                .is_some_and(|value| value.lookup_key() == row[*index].lookup_key())
        })
    });

    match matched {
        Some(referenced) => {
            let object: Map<String, JsonValue> = referenced.to_map();
            for (index, _) in &pairs {
                row[*index] = Value::Object(object.clone());
            }
            Ok(())
        }
        None => Err(Error::Relation(format!(
            "Foreign key \"{}\" violation: no match in \"{}\"",
            foreign_key.fields.join(", "),
            foreign_key.reference.resource
        ))),
    }
}
