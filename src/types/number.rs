//! `number` and `integer` types

use once_cell::sync::Lazy;
use regex::Regex;

use super::CastOptions;
use crate::value::Value;

static NUMBER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap());

static INTEGER_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?\d+$").unwrap());

// Leading currency symbols or trailing units/percent signs around a number
static NON_BARE_LEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\d+\-.]+").unwrap());
static NON_BARE_TRAILING: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.]+$").unwrap());

fn strip_non_bare(text: &str) -> String {
    let text = NON_BARE_LEADING.replace(text, "");
    NON_BARE_TRAILING.replace(&text, "").into_owned()
}

pub fn cast_number(value: &Value, options: &CastOptions) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::Integer(i) => Some(Value::Number(*i as f64)),
        Value::String(raw) => {
            let mut text = raw.trim().to_string();
            match text.as_str() {
                "NaN" | "nan" => return Some(Value::Number(f64::NAN)),
                "INF" | "inf" | "Infinity" => return Some(Value::Number(f64::INFINITY)),
                "-INF" | "-inf" | "-Infinity" => return Some(Value::Number(f64::NEG_INFINITY)),
                _ => {}
            }
            if let Some(group_char) = &options.group_char {
                text = text.replace(group_char.as_str(), "");
            }
            if options.decimal_char != "." {
                text = text.replace(options.decimal_char.as_str(), ".");
            }
            if !options.bare_number {
                text = strip_non_bare(&text);
            }
            if !NUMBER_REGEX.is_match(&text) {
                return None;
            }
            text.parse::<f64>().ok().map(Value::Number)
        }
        _ => None,
    }
}

pub fn cast_integer(value: &Value, options: &CastOptions) -> Option<Value> {
    match value {
        Value::Integer(_) => Some(value.clone()),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
            Some(Value::Integer(*n as i64))
        }
        Value::String(raw) => {
            let mut text = raw.trim().to_string();
            if !options.bare_number {
                text = strip_non_bare(&text);
            }
            if !INTEGER_REGEX.is_match(&text) {
                return None;
            }
            text.trim_start_matches('+').parse::<i64>().ok().map(Value::Integer)
        }
        _ => None,
    }
}
