//! `duration` type: ISO 8601 durations such as `P1Y2M3DT10H30M45.5S`

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$",
    )
    .unwrap()
});

/// Calendar-aware duration. Months and years are kept apart from the
/// seconds part because their length varies.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IsoDuration {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: f64,
}

impl IsoDuration {
    /// Approximate length in seconds (30-day months, 365-day years), for ordering
    pub fn total_seconds(&self) -> f64 {
        let days = self.years as f64 * 365.0 + self.months as f64 * 30.0 + self.days as f64;
        days * 86_400.0 + self.hours as f64 * 3_600.0 + self.minutes as f64 * 60.0 + self.seconds
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P")?;
        if self.years > 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months > 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0.0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0.0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        if *self == IsoDuration::default() {
            write!(f, "T0S")?;
        }
        Ok(())
    }
}

pub fn cast_duration(value: &Value) -> Option<Value> {
    let text = match value {
        Value::Duration(_) => return Some(value.clone()),
        Value::String(s) => s.trim(),
        _ => return None,
    };
    // "P" and "PT" alone carry no components
    if text == "P" || text.ends_with('T') {
        return None;
    }
    let captures = DURATION_REGEX.captures(text)?;
    let part = |i: usize| -> Option<u32> {
        captures
            .get(i)
            .map(|m| m.as_str().parse().ok())
            .unwrap_or(Some(0))
    };
    let weeks = part(3)?;
    Some(Value::Duration(IsoDuration {
        years: part(1)?,
        months: part(2)?,
        days: part(4)?.checked_add(weeks.checked_mul(7)?)?,
        hours: part(5)?,
        minutes: part(6)?,
        seconds: captures
            .get(7)
            .map(|m| m.as_str().parse().ok())
            .unwrap_or(Some(0.0))?,
    }))
}
