//! Field types and value casting
//!
//! Each Table Schema type has a caster taking a raw [`Value`] (usually a
//! string read from CSV) and a format. Casters return `None` when the value
//! can't be represented in the type; callers turn that into a cast error.
//! A value that already has the target variant is returned unchanged.

pub mod boolean;
pub mod duration;
pub mod geo;
pub mod number;
pub mod string;
pub mod structured;
pub mod temporal;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::value::Value;

/// Table Schema field types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Date,
    Time,
    Datetime,
    Year,
    Yearmonth,
    Duration,
    Geopoint,
    Geojson,
    Any,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Datetime => "datetime",
            FieldType::Year => "year",
            FieldType::Yearmonth => "yearmonth",
            FieldType::Duration => "duration",
            FieldType::Geopoint => "geopoint",
            FieldType::Geojson => "geojson",
            FieldType::Any => "any",
        }
    }

    /// Cast `value` according to this type and `format`
    pub fn cast(&self, format: &str, value: &Value, options: &CastOptions) -> Option<Value> {
        match self {
            FieldType::String => string::cast_string(format, value),
            FieldType::Number => number::cast_number(value, options),
            FieldType::Integer => number::cast_integer(value, options),
            FieldType::Boolean => boolean::cast_boolean(value, options),
            FieldType::Object => structured::cast_object(value),
            FieldType::Array => structured::cast_array(value),
            FieldType::Date => temporal::cast_date(format, value),
            FieldType::Time => temporal::cast_time(format, value),
            FieldType::Datetime => temporal::cast_datetime(format, value),
            FieldType::Year => temporal::cast_year(value),
            FieldType::Yearmonth => temporal::cast_yearmonth(value),
            FieldType::Duration => duration::cast_duration(value),
            FieldType::Geopoint => geo::cast_geopoint(format, value),
            FieldType::Geojson => geo::cast_geojson(format, value),
            FieldType::Any => Some(value.clone()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "integer" => Ok(FieldType::Integer),
            "boolean" => Ok(FieldType::Boolean),
            "object" => Ok(FieldType::Object),
            "array" => Ok(FieldType::Array),
            "date" => Ok(FieldType::Date),
            "time" => Ok(FieldType::Time),
            "datetime" => Ok(FieldType::Datetime),
            "year" => Ok(FieldType::Year),
            "yearmonth" => Ok(FieldType::Yearmonth),
            "duration" => Ok(FieldType::Duration),
            "geopoint" => Ok(FieldType::Geopoint),
            "geojson" => Ok(FieldType::Geojson),
            "any" => Ok(FieldType::Any),
            other => Err(format!("Unknown field type \"{}\"", other)),
        }
    }
}

/// Type-specific options read from a field descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct CastOptions {
    pub decimal_char: String,
    pub group_char: Option<String>,
    pub bare_number: bool,
    pub true_values: Vec<String>,
    pub false_values: Vec<String>,
}

pub const DEFAULT_TRUE_VALUES: [&str; 4] = ["true", "True", "TRUE", "1"];
pub const DEFAULT_FALSE_VALUES: [&str; 4] = ["false", "False", "FALSE", "0"];

impl Default for CastOptions {
    fn default() -> Self {
        Self {
            decimal_char: ".".to_string(),
            group_char: None,
            bare_number: true,
            true_values: DEFAULT_TRUE_VALUES.iter().map(|s| s.to_string()).collect(),
            false_values: DEFAULT_FALSE_VALUES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CastOptions {
    /// Read `decimalChar`, `groupChar`, `bareNumber`, `trueValues` and
    /// `falseValues` from a field descriptor, keeping defaults for the rest
    pub fn from_descriptor(descriptor: &Map<String, JsonValue>) -> Self {
        let mut options = Self::default();
        if let Some(decimal_char) = descriptor.get("decimalChar").and_then(JsonValue::as_str) {
            options.decimal_char = decimal_char.to_string();
        }
        if let Some(group_char) = descriptor.get("groupChar").and_then(JsonValue::as_str) {
            options.group_char = Some(group_char.to_string());
        }
        if let Some(bare_number) = descriptor.get("bareNumber").and_then(JsonValue::as_bool) {
            options.bare_number = bare_number;
        }
        if let Some(values) = string_list(descriptor.get("trueValues")) {
            options.true_values = values;
        }
        if let Some(values) = string_list(descriptor.get("falseValues")) {
            options.false_values = values;
        }
        options
    }
}

fn string_list(value: Option<&JsonValue>) -> Option<Vec<String>> {
    value?.as_array().map(|items| {
        items
            .iter()
            .filter_map(JsonValue::as_str)
            .map(str::to_string)
            .collect()
    })
}
