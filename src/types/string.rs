//! `string` type: default, email, uri, binary and uuid formats

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());

static URI_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/$.?#][^\s]*$").unwrap());

pub fn cast_string(format: &str, value: &Value) -> Option<Value> {
    let text = value.as_str()?;
    let accepted = match format {
        "email" => EMAIL_REGEX.is_match(text),
        "uri" => URI_REGEX.is_match(text),
        "uuid" => uuid::Uuid::parse_str(text).is_ok(),
        "binary" => STANDARD.decode(text).is_ok(),
        _ => true,
    };
    accepted.then(|| value.clone())
}

/// Detect the most specific string format every sample satisfies
pub fn detect_format<'a>(samples: impl IntoIterator<Item = &'a str>) -> &'static str {
    let samples: Vec<&str> = samples.into_iter().collect();
    if samples.is_empty() {
        return "default";
    }
    for format in ["uuid", "email", "uri"] {
        if samples
            .iter()
            .all(|s| cast_string(format, &Value::from(*s)).is_some())
        {
            return format;
        }
    }
    "default"
}
