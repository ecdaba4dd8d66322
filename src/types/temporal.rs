//! `date`, `time`, `datetime`, `year` and `yearmonth` types
//!
//! Formats are `default` (ISO 8601), `any` (a list of common layouts) or a
//! strftime pattern. The legacy `fmt:` prefix on patterns is accepted.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

const ANY_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%Y%m%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

const ANY_TIME_FORMATS: &[&str] = &[
    "%H:%M:%S",
    "%H:%M:%S%.f",
    "%H:%M",
    "%I:%M %p",
    "%I:%M:%S %p",
];

const ANY_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

static YEAR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());
static YEARMONTH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").unwrap());

fn pattern(format: &str) -> &str {
    format.strip_prefix("fmt:").unwrap_or(format)
}

pub fn cast_date(format: &str, value: &Value) -> Option<Value> {
    let text = match value {
        Value::Date(_) => return Some(value.clone()),
        Value::String(s) => s.trim(),
        _ => return None,
    };
    let parsed = match format {
        "default" => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok(),
        "any" => ANY_DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(text, f).ok()),
        custom => NaiveDate::parse_from_str(text, pattern(custom)).ok(),
    };
    parsed.map(Value::Date)
}

pub fn cast_time(format: &str, value: &Value) -> Option<Value> {
    let text = match value {
        Value::Time(_) => return Some(value.clone()),
        Value::String(s) => s.trim(),
        _ => return None,
    };
    let parsed = match format {
        "default" => NaiveTime::parse_from_str(text, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S%.f"))
            .ok(),
        "any" => ANY_TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(text, f).ok()),
        custom => NaiveTime::parse_from_str(text, pattern(custom)).ok(),
    };
    parsed.map(Value::Time)
}

pub fn cast_datetime(format: &str, value: &Value) -> Option<Value> {
    let text = match value {
        Value::DateTime(_) => return Some(value.clone()),
        Value::String(s) => s.trim(),
        _ => return None,
    };
    let parsed = match format {
        "default" => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        "any" => DateTime::parse_from_rfc3339(text)
            .or_else(|_| DateTime::parse_from_rfc2822(text))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                ANY_DATETIME_FORMATS
                    .iter()
                    .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                    .map(|naive| naive.and_utc())
            }),
        custom => {
            let layout = pattern(custom);
            DateTime::parse_from_str(text, layout)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, layout)
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        }
    };
    parsed.map(Value::DateTime)
}

pub fn cast_year(value: &Value) -> Option<Value> {
    match value {
        Value::Year(_) => Some(value.clone()),
        Value::Integer(i) if (0..=9999).contains(i) => Some(Value::Year(*i as i32)),
        Value::String(s) if YEAR_REGEX.is_match(s.trim()) => s.trim().parse().ok().map(Value::Year),
        _ => None,
    }
}

pub fn cast_yearmonth(value: &Value) -> Option<Value> {
    let (year, month) = match value {
        Value::YearMonth(..) => return Some(value.clone()),
        Value::String(s) => {
            let captures = YEARMONTH_REGEX.captures(s.trim())?;
            (captures[1].parse().ok()?, captures[2].parse().ok()?)
        }
        Value::Array(items) if items.len() == 2 => (
            i32::try_from(items[0].as_i64()?).ok()?,
            u32::try_from(items[1].as_i64()?).ok()?,
        ),
        _ => return None,
    };
    (1..=12).contains(&month).then_some(Value::YearMonth(year, month))
}
